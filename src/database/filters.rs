use std::str::FromStr;

use sqlx::{Postgres, QueryBuilder};

use super::{
    error::Error,
    pagination::Pagination,
    schema::Id,
};

/// Decoded query string. Keys may repeat (`?tags=hot&tags=cold`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    /// Last value given for `key`, ignoring empty values.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>, Error> {
        match self.get(key) {
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| Error::field(key, "Enter a valid value.")),
            None => Ok(None),
        }
    }

    pub fn parse_bool(&self, key: &str) -> Result<Option<bool>, Error> {
        match self.get(key) {
            Some(value) => parse_bool(value)
                .map(Some)
                .ok_or_else(|| Error::field(key, "Enter a valid boolean.")),
            None => Ok(None),
        }
    }

    /// Copy with every `key` replaced by a single `key=value`, keeping its position.
    pub fn with(&self, key: &str, value: &str) -> Self {
        let mut pairs: Vec<(String, String)> = vec![];
        let mut replaced = false;

        for (k, v) in &self.pairs {
            if k == key {
                if !replaced {
                    pairs.push((k.clone(), value.to_string()));
                    replaced = true;
                }
            } else {
                pairs.push((k.clone(), v.clone()));
            }
        }
        if !replaced {
            pairs.push((key.to_string(), value.to_string()));
        }

        Self { pairs }
    }

    pub fn to_query_string(&self) -> String {
        serde_urlencoded::to_string(&self.pairs).unwrap_or_default()
    }
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Filters accepted by the recipe listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tags: Vec<String>,
    pub author: Option<Id>,
    pub is_favorited: Option<bool>,
    pub is_in_shopping_cart: Option<bool>,
}

impl RecipeFilter {
    pub fn from_params(params: &QueryParams) -> Result<Self, Error> {
        Ok(Self {
            tags: params
                .get_all("tags")
                .into_iter()
                .map(str::to_string)
                .collect(),
            author: params.parse("author")?,
            is_favorited: params.parse_bool("is_favorited")?,
            is_in_shopping_cart: params.parse_bool("is_in_shopping_cart")?,
        })
    }

    /// Appends the `AND ...` conditions for this filter. Expects the recipe table aliased as `r`.
    pub fn push_conditions(&self, viewer: Option<Id>, qb: &mut QueryBuilder<'static, Postgres>) {
        if viewer.is_none() {
            qb.push(" AND NOT r.is_private");

            // favorites and cart only exist for an identified requester
            if self.is_favorited.is_some() || self.is_in_shopping_cart.is_some() {
                qb.push(" AND FALSE");
            }
        }

        if let Some(author) = self.author {
            qb.push(" AND r.author_id = ").push_bind(author);
        }

        if !self.tags.is_empty() {
            qb.push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(self.tags.clone())
            .push("))");
        }

        if let Some(viewer) = viewer {
            if self.is_favorited == Some(true) {
                qb.push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                    .push_bind(viewer)
                    .push(")");
            }
            if self.is_in_shopping_cart == Some(true) {
                qb.push(" AND EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ")
                    .push_bind(viewer)
                    .push(")");
            }
        }
    }
}

/// `SELECT` of recipe rows as seen by `viewer`, ending in `WHERE TRUE` so that
/// conditions can be appended.
pub fn recipe_select(viewer: Option<Id>) -> QueryBuilder<'static, Postgres> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT r.id, r.author_id, r.name, r.text, r.image, r.cooking_time, r.is_private, r.created, ",
    );
    qb.push("EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
        .push_bind(viewer)
        .push(") AS is_favorited, ");
    qb.push("EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ")
        .push_bind(viewer)
        .push(") AS is_in_shopping_cart, ");
    qb.push("COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");
    qb
}

pub fn recipe_listing(
    filter: &RecipeFilter,
    viewer: Option<Id>,
    pagination: Pagination,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = recipe_select(viewer);
    filter.push_conditions(viewer, &mut qb);
    qb.push(" ORDER BY r.id DESC LIMIT ")
        .push_bind(pagination.limit)
        .push(" OFFSET ")
        .push_bind(pagination.offset());
    qb
}

/// Escapes `LIKE` wildcards so user input matches literally.
pub fn like_prefix(prefix: &str) -> String {
    let escaped = prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        QueryParams::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn repeated_tags_are_collected() {
        let filter =
            RecipeFilter::from_params(&params(&[("tags", "hot"), ("tags", "cold"), ("author", "3")]))
                .unwrap();
        assert_eq!(filter.tags, vec!["hot", "cold"]);
        assert_eq!(filter.author, Some(3));
    }

    #[test]
    fn boolean_filters_accept_numbers_and_words() {
        let filter = RecipeFilter::from_params(&params(&[
            ("is_favorited", "1"),
            ("is_in_shopping_cart", "false"),
        ]))
        .unwrap();
        assert_eq!(filter.is_favorited, Some(true));
        assert_eq!(filter.is_in_shopping_cart, Some(false));
    }

    #[test]
    fn malformed_filters_are_field_errors() {
        let error = RecipeFilter::from_params(&params(&[("author", "me")])).unwrap_err();
        assert!(error.fields.unwrap().contains_key("author"));
        assert!(RecipeFilter::from_params(&params(&[("is_favorited", "maybe")])).is_err());
    }

    #[test]
    fn anonymous_listing_hides_private_recipes() {
        let qb = recipe_listing(&RecipeFilter::default(), None, Pagination { page: 1, limit: 6 });
        assert!(qb.sql().contains("AND NOT r.is_private"));
        assert!(!qb.sql().contains("AND FALSE"));
    }

    #[test]
    fn anonymous_favorited_filter_matches_nothing() {
        let filter = RecipeFilter {
            is_favorited: Some(true),
            ..RecipeFilter::default()
        };
        let qb = recipe_listing(&filter, None, Pagination { page: 1, limit: 6 });
        assert!(qb.sql().contains("AND FALSE"));

        let filter = RecipeFilter {
            is_in_shopping_cart: Some(false),
            ..RecipeFilter::default()
        };
        let qb = recipe_listing(&filter, None, Pagination { page: 1, limit: 6 });
        assert!(qb.sql().contains("AND FALSE"));
    }

    #[test]
    fn authenticated_filters_join_on_viewer() {
        let filter = RecipeFilter {
            tags: vec![String::from("hot")],
            author: Some(2),
            is_favorited: Some(true),
            is_in_shopping_cart: Some(true),
        };
        let qb = recipe_listing(&filter, Some(7), Pagination { page: 1, limit: 6 });
        let sql = qb.sql();

        assert!(!sql.contains("NOT r.is_private"));
        assert!(sql.contains("r.author_id = "));
        assert!(sql.contains("t.slug = ANY("));
        assert!(sql.contains("FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = "));
        assert!(sql.contains("FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = "));
        assert!(sql.ends_with("ORDER BY r.id DESC LIMIT $7 OFFSET $8"));
    }

    #[test]
    fn false_boolean_filter_is_a_no_op_for_viewer() {
        let filter = RecipeFilter {
            is_favorited: Some(false),
            ..RecipeFilter::default()
        };
        let qb = recipe_listing(&filter, Some(1), Pagination { page: 1, limit: 6 });
        assert!(qb.sql().ends_with("WHERE TRUE ORDER BY r.id DESC LIMIT $3 OFFSET $4"));
    }

    #[test]
    fn with_replaces_in_place() {
        let query = params(&[("page", "1"), ("tags", "hot"), ("page", "5")]);
        assert_eq!(
            query.with("page", "2").to_query_string(),
            "page=2&tags=hot"
        );
        assert_eq!(
            params(&[]).with("limit", "6").to_query_string(),
            "limit=6"
        );
    }

    #[test]
    fn empty_values_are_ignored() {
        let query = params(&[("author", ""), ("tags", "")]);
        assert_eq!(query.get("author"), None);
        assert!(query.get_all("tags").is_empty());
    }

    #[test]
    fn like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("sal"), "sal%");
        assert_eq!(like_prefix("50%_"), "50\\%\\_%");
    }
}
