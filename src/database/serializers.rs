//! JSON representations returned by the API.
//!
//! Viewer-dependent fields (`is_subscribed`, `is_favorited`,
//! `is_in_shopping_cart`) are computed by the queries for an explicit viewer id
//! and only copied here; nothing in this module looks at the request.

use std::collections::HashMap;

use serde::Serialize;

use super::schema::{
    AuthorRow, Id, RecipeIngredientRow, RecipeRow, RecipeShortRow, RecipeTagRow, Tag, User,
    UserRow,
};

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct UserRepr {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub is_subscribed: bool,
}

impl From<UserRow> for UserRepr {
    fn from(row: UserRow) -> Self {
        Self {
            email: row.email,
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            is_subscribed: row.is_subscribed,
        }
    }
}

impl UserRepr {
    /// A user looking at themself is never subscribed.
    pub fn own(user: User) -> Self {
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_subscribed: false,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RecipeIngredientRepr {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RecipeRepr {
    pub id: Id,
    pub tags: Vec<Tag>,
    pub author: UserRepr,
    pub ingredients: Vec<RecipeIngredientRepr>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub is_private: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RecipeShortRepr {
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRepr {
    #[serde(flatten)]
    pub author: UserRepr,
    pub recipes: Vec<RecipeShortRepr>,
    pub recipes_count: i64,
}

pub fn media_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

pub fn recipe_short(row: RecipeShortRow, media_base: &str) -> RecipeShortRepr {
    RecipeShortRepr {
        id: row.id,
        image: media_url(media_base, &row.image),
        name: row.name,
        cooking_time: row.cooking_time,
    }
}

/// Joins recipe rows with their batch-loaded tags, ingredients and authors.
/// Rows whose author is missing from `authors` are dropped.
pub fn recipes(
    rows: Vec<RecipeRow>,
    tags: Vec<RecipeTagRow>,
    ingredients: Vec<RecipeIngredientRow>,
    authors: Vec<UserRow>,
    media_base: &str,
) -> Vec<RecipeRepr> {
    let mut tags_by_recipe: HashMap<Id, Vec<Tag>> = HashMap::new();
    tags.into_iter().for_each(|tag| {
        tags_by_recipe.entry(tag.recipe_id).or_default().push(Tag {
            id: tag.id,
            name: tag.name,
            color: tag.color,
            slug: tag.slug,
        })
    });

    let mut ingredients_by_recipe: HashMap<Id, Vec<RecipeIngredientRepr>> = HashMap::new();
    ingredients.into_iter().for_each(|part| {
        ingredients_by_recipe
            .entry(part.recipe_id)
            .or_default()
            .push(RecipeIngredientRepr {
                id: part.id,
                name: part.name,
                measurement_unit: part.measurement_unit,
                amount: part.amount,
            })
    });

    let authors: HashMap<Id, UserRepr> = authors
        .into_iter()
        .map(|author| (author.id, UserRepr::from(author)))
        .collect();

    rows.into_iter()
        .filter_map(|row| {
            let author = authors.get(&row.author_id)?.clone();
            Some(RecipeRepr {
                id: row.id,
                tags: tags_by_recipe.remove(&row.id).unwrap_or_default(),
                author,
                ingredients: ingredients_by_recipe.remove(&row.id).unwrap_or_default(),
                is_favorited: row.is_favorited,
                is_in_shopping_cart: row.is_in_shopping_cart,
                name: row.name,
                image: media_url(media_base, &row.image),
                text: row.text,
                cooking_time: row.cooking_time,
                is_private: row.is_private,
            })
        })
        .collect()
}

/// Attaches up to `recipes_limit` recipes to every author.
pub fn subscriptions(
    authors: Vec<AuthorRow>,
    recipes: Vec<RecipeShortRow>,
    recipes_limit: Option<usize>,
    media_base: &str,
) -> Vec<SubscriptionRepr> {
    let mut recipes_by_author: HashMap<Id, Vec<RecipeShortRepr>> = HashMap::new();
    for recipe in recipes {
        let list = recipes_by_author.entry(recipe.author_id).or_default();
        if recipes_limit.map_or(true, |limit| list.len() < limit) {
            list.push(recipe_short(recipe, media_base));
        }
    }

    authors
        .into_iter()
        .map(|author| SubscriptionRepr {
            recipes: recipes_by_author.remove(&author.id).unwrap_or_default(),
            recipes_count: author.recipes_count,
            author: UserRepr {
                email: author.email,
                id: author.id,
                username: author.username,
                first_name: author.first_name,
                last_name: author.last_name,
                is_subscribed: author.is_subscribed,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn user_row(id: Id, is_subscribed: bool) -> UserRow {
        UserRow {
            id,
            email: format!("user{id}@example.com"),
            username: format!("user{id}"),
            first_name: String::from("Name"),
            last_name: None,
            is_subscribed,
            count: 1,
        }
    }

    fn recipe_row(id: Id, author_id: Id) -> RecipeRow {
        RecipeRow {
            id,
            author_id,
            name: format!("Recipe {id}"),
            text: String::from("Cook it."),
            image: format!("recipes/images/{id}.png"),
            cooking_time: 10,
            is_private: false,
            created: Utc::now(),
            is_favorited: id == 1,
            is_in_shopping_cart: false,
            count: 2,
        }
    }

    fn short_row(id: Id, author_id: Id) -> RecipeShortRow {
        RecipeShortRow {
            id,
            author_id,
            name: format!("Recipe {id}"),
            image: format!("recipes/images/{id}.jpg"),
            cooking_time: 5,
        }
    }

    #[test]
    fn recipes_collect_their_own_tags_and_ingredients() {
        let rows = vec![recipe_row(2, 10), recipe_row(1, 11)];
        let tags = vec![RecipeTagRow {
            recipe_id: 1,
            id: 3,
            name: String::from("Hot"),
            color: Some(String::from("#FF0000")),
            slug: String::from("hot"),
        }];
        let ingredients = vec![
            RecipeIngredientRow {
                recipe_id: 2,
                id: 7,
                name: String::from("Salt"),
                measurement_unit: String::from("g"),
                amount: 5,
            },
            RecipeIngredientRow {
                recipe_id: 1,
                id: 8,
                name: String::from("Egg"),
                measurement_unit: String::from("pcs"),
                amount: 2,
            },
        ];

        let result = recipes(
            rows,
            tags,
            ingredients,
            vec![user_row(10, true), user_row(11, false)],
            "/media/",
        );

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, 2);
        assert!(result[0].tags.is_empty());
        assert_eq!(result[0].ingredients[0].name, "Salt");
        assert!(result[0].author.is_subscribed);
        assert_eq!(result[1].tags[0].slug, "hot");
        assert!(result[1].is_favorited);
        assert_eq!(result[1].image, "/media/recipes/images/1.png");
    }

    #[test]
    fn subscriptions_respect_recipes_limit() {
        let author = AuthorRow {
            id: 4,
            email: String::from("chef@example.com"),
            username: String::from("chef"),
            first_name: String::from("Chef"),
            last_name: Some(String::from("Cook")),
            is_subscribed: true,
            recipes_count: 3,
            count: 1,
        };
        let recipes = vec![short_row(9, 4), short_row(8, 4), short_row(7, 4)];

        let result = subscriptions(vec![author], recipes, Some(2), "/media");

        assert_eq!(result[0].recipes.len(), 2);
        assert_eq!(result[0].recipes_count, 3);

        let value = serde_json::to_value(&result[0]).unwrap();
        assert_eq!(value["username"], json!("chef"));
        assert_eq!(value["is_subscribed"], json!(true));
        assert_eq!(value["recipes"][0]["image"], json!("/media/recipes/images/9.jpg"));
    }

    #[test]
    fn media_url_joins_without_double_slash() {
        assert_eq!(media_url("/media/", "/a.png"), "/media/a.png");
        assert_eq!(media_url("/media", "a.png"), "/media/a.png");
    }
}
