use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    error::{Error, HtmlError, QueryError},
    pagination::Pagination,
    schema::{AuthorRow, Id, RecipeShortRow},
};

fn author_select(viewer: Id) -> QueryBuilder<'static, Postgres> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT u.id, u.email, u.username, u.first_name, u.last_name, ",
    );
    qb.push("EXISTS (SELECT 1 FROM subscriptions s WHERE s.author_id = u.id AND s.subscriber_id = ")
        .push_bind(viewer)
        .push(") AS is_subscribed, ");
    qb.push("(SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count, ");
    qb.push("COUNT(*) OVER() AS count FROM users u");
    qb
}

/// Maps the affected row count of an insert or delete on `subscriptions` to its result.
pub fn subscription_outcome(affected: u64, subscribing: bool) -> Result<(), Error> {
    match (affected, subscribing) {
        (0, true) => Err(HtmlError::InvalidRequest.new("You are already subscribed to this author.")),
        (0, false) => Err(HtmlError::NotFound.new("You are not subscribed to this author.")),
        _ => Ok(()),
    }
}

pub async fn subscribe(pool: &Pool<Postgres>, subscriber_id: Id, author_id: Id) -> Result<(), Error> {
    if subscriber_id == author_id {
        return Err(HtmlError::InvalidRequest.new("You cannot subscribe to yourself."));
    }

    let query = sqlx::query(
        "
        INSERT INTO subscriptions (author_id, subscriber_id)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
    ",
    )
    .bind(author_id)
    .bind(subscriber_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    subscription_outcome(query.rows_affected(), true)
}

pub async fn unsubscribe(
    pool: &Pool<Postgres>,
    subscriber_id: Id,
    author_id: Id,
) -> Result<(), Error> {
    let query = sqlx::query("DELETE FROM subscriptions WHERE author_id = $1 AND subscriber_id = $2")
        .bind(author_id)
        .bind(subscriber_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    subscription_outcome(query.rows_affected(), false)
}

/// Authors followed by `subscriber_id`, oldest subscription first.
pub async fn list_subscriptions(
    pool: &Pool<Postgres>,
    subscriber_id: Id,
    pagination: Pagination,
) -> Result<(Vec<AuthorRow>, i64), Error> {
    let mut qb = author_select(subscriber_id);
    qb.push(" INNER JOIN subscriptions sub ON sub.author_id = u.id WHERE sub.subscriber_id = ")
        .push_bind(subscriber_id)
        .push(" ORDER BY sub.id LIMIT ")
        .push_bind(pagination.limit)
        .push(" OFFSET ")
        .push_bind(pagination.offset());

    let rows: Vec<AuthorRow> = qb
        .build_query_as::<AuthorRow>()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    Ok((rows, total_count))
}

pub async fn fetch_author(
    pool: &Pool<Postgres>,
    author_id: Id,
    viewer: Id,
) -> Result<Option<AuthorRow>, Error> {
    let mut qb = author_select(viewer);
    qb.push(" WHERE u.id = ").push_bind(author_id);

    let row: Option<AuthorRow> = qb
        .build_query_as::<AuthorRow>()
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Recipes of the given authors, newest first.
pub async fn fetch_author_recipes(
    pool: &Pool<Postgres>,
    author_ids: &[Id],
) -> Result<Vec<RecipeShortRow>, Error> {
    let rows: Vec<RecipeShortRow> = sqlx::query_as(
        "
        SELECT id, author_id, name, image, cooking_time
        FROM recipes
        WHERE author_id = ANY($1)
        ORDER BY id DESC
    ",
    )
    .bind(author_ids.to_vec())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}
