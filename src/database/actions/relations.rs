use sqlx::{Pool, Postgres};

use crate::{
    error::{Error, HtmlError, QueryError},
    schema::{Id, RecipeRelation, ToggleMode},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Created,
    /// Only reachable in idempotent mode.
    AlreadyPresent,
}

/// What a POST does, given whether the insert added a row.
pub fn toggle_outcome(
    inserted: bool,
    relation: RecipeRelation,
    mode: ToggleMode,
) -> Result<ToggleOutcome, Error> {
    match (inserted, mode) {
        (true, _) => Ok(ToggleOutcome::Created),
        (false, ToggleMode::Idempotent) => Ok(ToggleOutcome::AlreadyPresent),
        (false, ToggleMode::Strict) => Err(HtmlError::InvalidRequest.new(relation.already_present())),
    }
}

/// A DELETE that removed nothing means the pair was absent.
pub fn removal_outcome(removed: u64, relation: RecipeRelation) -> Result<(), Error> {
    if removed == 0 {
        return Err(HtmlError::NotFound.new(relation.not_present()));
    }
    Ok(())
}

/// Adds a favorite or cart entry. The recipe must exist.
pub async fn add_relation(
    pool: &Pool<Postgres>,
    relation: RecipeRelation,
    user_id: Id,
    recipe_id: Id,
    mode: ToggleMode,
) -> Result<ToggleOutcome, Error> {
    let query = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        relation.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    toggle_outcome(query.rows_affected() > 0, relation, mode)
}

pub async fn remove_relation(
    pool: &Pool<Postgres>,
    relation: RecipeRelation,
    user_id: Id,
    recipe_id: Id,
) -> Result<(), Error> {
    let query = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        relation.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    removal_outcome(query.rows_affected(), relation)
}
