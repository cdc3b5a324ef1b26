use std::collections::BTreeSet;

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use crate::{
    error::{Error, FieldErrors, HtmlError, QueryError},
    filters::{recipe_listing, recipe_select, RecipeFilter},
    pagination::Pagination,
    schema::{Id, Recipe, RecipeRow, RecipeShortRow},
    serializers::{self, RecipeRepr},
    validators::RecipeChanges,
};

use super::{
    ingredients::{fetch_recipe_ingredients, missing_ingredients, set_recipe_ingredients},
    tags::{fetch_recipe_tags, missing_tags, set_recipe_tags},
    users::fetch_users,
};

/// One page of recipes matching `filter` as seen by `viewer`, with the size of the whole listing.
pub async fn fetch_recipes(
    pool: &Pool<Postgres>,
    filter: &RecipeFilter,
    viewer: Option<Id>,
    pagination: Pagination,
) -> Result<(Vec<RecipeRow>, i64), Error> {
    let mut qb = recipe_listing(filter, viewer, pagination);

    let rows: Vec<RecipeRow> = qb
        .build_query_as::<RecipeRow>()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    Ok((rows, total_count))
}

/// A single recipe, or `None` when it does not exist or `viewer` may not see it.
pub async fn fetch_recipe(
    pool: &Pool<Postgres>,
    recipe_id: Id,
    viewer: Option<Id>,
) -> Result<Option<RecipeRow>, Error> {
    let mut qb = recipe_select(viewer);
    RecipeFilter::default().push_conditions(viewer, &mut qb);
    qb.push(" AND r.id = ").push_bind(recipe_id);

    let row: Option<RecipeRow> = qb
        .build_query_as::<RecipeRow>()
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_recipe(pool: &Pool<Postgres>, recipe_id: Id) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(recipe_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_recipe_short(
    pool: &Pool<Postgres>,
    recipe_id: Id,
) -> Result<Option<RecipeShortRow>, Error> {
    let row: Option<RecipeShortRow> = sqlx::query_as(
        "SELECT id, author_id, name, image, cooking_time FROM recipes WHERE id = $1",
    )
    .bind(recipe_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row)
}

/// Loads tags, ingredients and authors of `rows` in three batched queries.
pub async fn recipe_reprs(
    pool: &Pool<Postgres>,
    rows: Vec<RecipeRow>,
    viewer: Option<Id>,
    media_url: &str,
) -> Result<Vec<RecipeRepr>, Error> {
    if rows.is_empty() {
        return Ok(vec![]);
    }

    let recipe_ids: Vec<Id> = rows.iter().map(|row| row.id).collect();
    let author_ids: Vec<Id> = rows
        .iter()
        .map(|row| row.author_id)
        .collect::<BTreeSet<Id>>()
        .into_iter()
        .collect();

    let tags = fetch_recipe_tags(pool, &recipe_ids).await?;
    let ingredients = fetch_recipe_ingredients(pool, &recipe_ids).await?;
    let authors = fetch_users(pool, &author_ids, viewer).await?;

    Ok(serializers::recipes(rows, tags, ingredients, authors, media_url))
}

/// Field errors for tag and ingredient ids that do not exist.
async fn check_references(conn: &mut PgConnection, changes: &RecipeChanges) -> Result<(), Error> {
    let mut fields = FieldErrors::new();

    if let Some(tags) = &changes.tags {
        let missing = missing_tags(&mut *conn, tags).await?;
        if !missing.is_empty() {
            fields.insert(
                String::from("tags"),
                missing
                    .iter()
                    .map(|id| format!("Invalid pk \"{id}\" - object does not exist."))
                    .collect(),
            );
        }
    }

    if let Some(ingredients) = &changes.ingredients {
        let ids: Vec<Id> = ingredients.iter().map(|part| part.id).collect();
        let missing = missing_ingredients(&mut *conn, &ids).await?;
        if !missing.is_empty() {
            fields.insert(
                String::from("ingredients"),
                missing
                    .iter()
                    .map(|id| format!("Ingredient with id {id} does not exist."))
                    .collect(),
            );
        }
    }

    if fields.is_empty() {
        Ok(())
    } else {
        Err(Error::validation(fields))
    }
}

fn recipe_error(e: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db) = &e {
        if db.constraint() == Some("recipes_name_author_key") {
            return Error::field("name", "You already have a recipe with this name.");
        }
    }
    QueryError::from(e).into()
}

/// Creates the recipe with its tags and ingredients in one transaction.
/// `changes` must come from a full (non-partial) validation; `image` is the stored file path.
pub async fn create_recipe(
    pool: &Pool<Postgres>,
    author_id: Id,
    changes: &RecipeChanges,
    image: &str,
) -> Result<Id, Error> {
    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    check_references(&mut tx, changes).await?;

    let recipe: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time, is_private)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(changes.name.as_deref().unwrap_or_default())
    .bind(changes.text.as_deref().unwrap_or_default())
    .bind(image)
    .bind(changes.cooking_time.unwrap_or_default())
    .bind(changes.is_private.unwrap_or(false))
    .fetch_one(&mut *tx)
    .await
    .map_err(recipe_error)?;

    let recipe_id = recipe.0;

    set_recipe_tags(&mut tx, recipe_id, changes.tags.as_deref().unwrap_or_default()).await?;
    set_recipe_ingredients(
        &mut tx,
        recipe_id,
        changes.ingredients.as_deref().unwrap_or_default(),
    )
    .await?;

    tx.commit().await.map_err(QueryError::from)?;

    log::info!("User {author_id} created recipe {recipe_id}");
    Ok(recipe_id)
}

/// Applies the supplied fields in one transaction. Tags and ingredients are
/// replaced as a whole when present and left alone when absent.
pub async fn update_recipe(
    pool: &Pool<Postgres>,
    recipe_id: Id,
    changes: &RecipeChanges,
    image: Option<&str>,
) -> Result<(), Error> {
    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    check_references(&mut tx, changes).await?;

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE recipes SET ");
    let mut has_fields = false;
    {
        let mut fields = qb.separated(", ");
        if let Some(name) = &changes.name {
            fields.push("name = ").push_bind_unseparated(name.clone());
            has_fields = true;
        }
        if let Some(text) = &changes.text {
            fields.push("text = ").push_bind_unseparated(text.clone());
            has_fields = true;
        }
        if let Some(cooking_time) = changes.cooking_time {
            fields
                .push("cooking_time = ")
                .push_bind_unseparated(cooking_time);
            has_fields = true;
        }
        if let Some(is_private) = changes.is_private {
            fields.push("is_private = ").push_bind_unseparated(is_private);
            has_fields = true;
        }
        if let Some(image) = image {
            fields.push("image = ").push_bind_unseparated(image.to_string());
            has_fields = true;
        }
    }

    if has_fields {
        qb.push(" WHERE id = ").push_bind(recipe_id);
        qb.build()
            .execute(&mut *tx)
            .await
            .map_err(recipe_error)?;
    }

    if let Some(tags) = &changes.tags {
        set_recipe_tags(&mut tx, recipe_id, tags).await?;
    }
    if let Some(ingredients) = &changes.ingredients {
        set_recipe_ingredients(&mut tx, recipe_id, ingredients).await?;
    }

    tx.commit().await.map_err(QueryError::from)?;

    log::info!("Updated recipe {recipe_id}");
    Ok(())
}

/// Deletes the recipe and returns it, so that its image can be removed.
pub async fn delete_recipe(pool: &Pool<Postgres>, recipe_id: Id) -> Result<Recipe, Error> {
    let row: Option<Recipe> = sqlx::query_as("DELETE FROM recipes WHERE id = $1 RETURNING *")
        .bind(recipe_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    let recipe = row.ok_or_else(|| HtmlError::NotFound.default())?;
    log::info!("Deleted recipe {recipe_id}");
    Ok(recipe)
}

pub async fn set_recipe_image(pool: &Pool<Postgres>, recipe_id: Id, image: &str) -> Result<(), Error> {
    let query = sqlx::query("UPDATE recipes SET image = $1 WHERE id = $2")
        .bind(image)
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if query.rows_affected() == 0 {
        return Err(HtmlError::NotFound.default());
    }
    Ok(())
}
