use sqlx::{Pool, Postgres};

use crate::{
    error::{Error, QueryError},
    jwt::SessionData,
};

/// Revokes the token of `session` until it would have expired anyway.
pub async fn revoke_token(pool: &Pool<Postgres>, session: &SessionData) -> Result<(), Error> {
    sqlx::query(
        "
        INSERT INTO revoked_tokens (jti, expires_at)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
    ",
    )
    .bind(&session.jti)
    .bind(session.expires_at)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    // expired tokens fail verification before revocation is consulted
    let purged = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < NOW()")
        .execute(pool)
        .await
        .map_err(QueryError::from)?;
    if purged.rows_affected() > 0 {
        log::debug!("Purged {} expired revocations", purged.rows_affected());
    }

    Ok(())
}

pub async fn is_token_revoked(pool: &Pool<Postgres>, jti: &str) -> Result<bool, Error> {
    let row: Option<(String,)> = sqlx::query_as("SELECT jti FROM revoked_tokens WHERE jti = $1")
        .bind(jti)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row.is_some())
}
