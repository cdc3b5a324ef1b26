use std::collections::HashSet;

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use crate::{
    error::{Error, QueryError},
    schema::{Id, RecipeTagRow, Tag},
};

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let rows: Vec<Tag> = sqlx::query_as("SELECT id, name, color, slug FROM tags ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn get_tag(pool: &Pool<Postgres>, id: Id) -> Result<Option<Tag>, Error> {
    let row: Option<Tag> = sqlx::query_as("SELECT id, name, color, slug FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Returns false when a tag with the same name or slug already exists.
pub async fn create_tag(
    pool: &Pool<Postgres>,
    name: &str,
    color: &str,
    slug: &str,
) -> Result<bool, Error> {
    let query = sqlx::query(
        "
        INSERT INTO tags (name, color, slug)
        VALUES ($1, $2, $3)
        ON CONFLICT DO NOTHING
    ",
    )
    .bind(name)
    .bind(color)
    .bind(slug)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(query.rows_affected() > 0)
}

pub async fn fetch_recipe_tags(
    pool: &Pool<Postgres>,
    recipe_ids: &[Id],
) -> Result<Vec<RecipeTagRow>, Error> {
    let rows: Vec<RecipeTagRow> = sqlx::query_as(
        "
        SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.name
    ",
    )
    .bind(recipe_ids.to_vec())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

/// The ids out of `ids` that no tag has.
pub async fn missing_tags(conn: &mut PgConnection, ids: &[Id]) -> Result<Vec<Id>, Error> {
    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(ids.to_vec())
        .fetch_all(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    let found: HashSet<Id> = found.into_iter().map(|(id,)| id).collect();
    Ok(ids.iter().copied().filter(|id| !found.contains(id)).collect())
}

/// Replaces the tag set of a recipe.
pub async fn set_recipe_tags(
    conn: &mut PgConnection,
    recipe_id: Id,
    tag_ids: &[Id],
) -> Result<(), Error> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    if tag_ids.is_empty() {
        return Ok(());
    }

    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    qb.push_values(tag_ids, |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });
    qb.build()
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}
