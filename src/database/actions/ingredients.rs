use std::collections::HashSet;

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use crate::{
    error::{Error, QueryError},
    filters::like_prefix,
    form::IngredientAmount,
    schema::{Id, Ingredient, RecipeIngredientRow, ShoppingListRow},
};

/// Ingredients ordered by name, optionally narrowed to a case-insensitive name prefix.
pub async fn list_ingredients(
    pool: &Pool<Postgres>,
    name_prefix: Option<&str>,
) -> Result<Vec<Ingredient>, Error> {
    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT id, name, measurement_unit FROM ingredients");
    if let Some(prefix) = name_prefix {
        qb.push(" WHERE LOWER(name) LIKE ")
            .push_bind(like_prefix(&prefix.to_lowercase()));
    }
    qb.push(" ORDER BY name, measurement_unit");

    let rows: Vec<Ingredient> = qb
        .build_query_as::<Ingredient>()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn get_ingredient(pool: &Pool<Postgres>, id: Id) -> Result<Option<Ingredient>, Error> {
    let row: Option<Ingredient> =
        sqlx::query_as("SELECT id, name, measurement_unit FROM ingredients WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row)
}

/// Returns true when the ingredient was created, false when it already existed.
pub async fn get_or_create_ingredient(
    pool: &Pool<Postgres>,
    name: &str,
    measurement_unit: &str,
) -> Result<bool, Error> {
    let query = sqlx::query(
        "
        INSERT INTO ingredients (name, measurement_unit)
        VALUES ($1, $2)
        ON CONFLICT (name, measurement_unit) DO NOTHING
    ",
    )
    .bind(name)
    .bind(measurement_unit)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(query.rows_affected() > 0)
}

/// The ids out of `ids` that no ingredient has.
pub async fn missing_ingredients(conn: &mut PgConnection, ids: &[Id]) -> Result<Vec<Id>, Error> {
    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(ids.to_vec())
        .fetch_all(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    let found: HashSet<Id> = found.into_iter().map(|(id,)| id).collect();
    Ok(ids.iter().copied().filter(|id| !found.contains(id)).collect())
}

pub async fn fetch_recipe_ingredients(
    pool: &Pool<Postgres>,
    recipe_ids: &[Id],
) -> Result<Vec<RecipeIngredientRow>, Error> {
    let rows: Vec<RecipeIngredientRow> = sqlx::query_as(
        "
        SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
        ORDER BY ri.id
    ",
    )
    .bind(recipe_ids.to_vec())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

/// Replaces the ingredient set of a recipe.
pub async fn set_recipe_ingredients(
    conn: &mut PgConnection,
    recipe_id: Id,
    ingredients: &[IngredientAmount],
) -> Result<(), Error> {
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    if ingredients.is_empty() {
        return Ok(());
    }

    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    qb.push_values(ingredients, |mut b, part| {
        b.push_bind(recipe_id)
            .push_bind(part.id)
            .push_bind(part.amount);
    });
    qb.build()
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// Ingredient rows of every recipe in the user's cart, in the order the recipes
/// were added and then the order of the recipe's ingredient list.
pub async fn shopping_list_rows(
    pool: &Pool<Postgres>,
    user_id: Id,
) -> Result<Vec<ShoppingListRow>, Error> {
    let rows: Vec<ShoppingListRow> = sqlx::query_as(
        "
        SELECT i.name, i.measurement_unit, ri.amount
        FROM shopping_cart c
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
        ORDER BY c.id, ri.id
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}
