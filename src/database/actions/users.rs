use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::generate_jwt_session,
    },
    config::Config,
    error::{Error, HtmlError, QueryError},
    form::{LoginForm, RegisterForm, SetPasswordForm},
    pagination::Pagination,
    schema::{Id, User, UserRow},
    validators::validate_password,
};

const INVALID_CREDENTIALS: &str = "Unable to log in with provided credentials.";

/// `SELECT` of users as seen by `viewer`, ending in `WHERE TRUE`.
fn user_select(viewer: Option<Id>) -> QueryBuilder<'static, Postgres> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT u.id, u.email, u.username, u.first_name, u.last_name, ",
    );
    qb.push("EXISTS (SELECT 1 FROM subscriptions s WHERE s.author_id = u.id AND s.subscriber_id = ")
        .push_bind(viewer)
        .push(") AS is_subscribed, ");
    qb.push("COUNT(*) OVER() AS count FROM users u WHERE TRUE");
    qb
}

/// Emails are compared and stored lowercased, matching the `users_email_key` index.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn get_user_by_email(
    pool: &Pool<Postgres>,
    email: &str,
) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Id) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Field errors for the unique columns, so that clients can point at the offending input.
fn registration_error(e: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db) = &e {
        match db.constraint() {
            Some("users_email_key") => {
                return Error::field("email", "A user with that email already exists.")
            }
            Some("users_username_key") => {
                return Error::field("username", "A user with that username already exists.")
            }
            _ => {}
        }
    }
    QueryError::from(e).into()
}

/// Stores a new user with an argon2 hash of the given password. The form must be validated.
pub async fn register_user(pool: &Pool<Postgres>, form: &RegisterForm) -> Result<User, Error> {
    let password = hash_password(&form.password).map_err(|e| {
        log::error!("Failed to hash password: {e}");
        HtmlError::InternalServerError.default()
    })?;

    let user: User = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
    ",
    )
    .bind(normalize_email(&form.email))
    .bind(form.username.trim())
    .bind(form.first_name.trim())
    .bind(form.last_name.as_deref().map(str::trim))
    .bind(password)
    .fetch_one(pool)
    .await
    .map_err(registration_error)?;

    log::info!("Registered user {} ({})", user.id, user.username);
    Ok(user)
}

/// Checks the credentials and issues a token.
pub async fn login_user(
    pool: &Pool<Postgres>,
    form: &LoginForm,
    config: &Config,
) -> Result<String, Error> {
    let user = get_user_by_email(pool, &normalize_email(&form.email))
        .await?
        .ok_or_else(|| HtmlError::InvalidRequest.new(INVALID_CREDENTIALS))?;

    let authenticated = verify_password(&form.password, &user.password).map_err(|e| {
        log::error!("Stored password hash of user {} is unreadable: {e}", user.id);
        HtmlError::InternalServerError.default()
    })?;
    if !authenticated {
        return Err(HtmlError::InvalidRequest.new(INVALID_CREDENTIALS));
    }

    generate_jwt_session(&user, &config.jwt_secret, config.token_lifetime_hours)
}

pub async fn set_password(
    pool: &Pool<Postgres>,
    user_id: Id,
    form: &SetPasswordForm,
) -> Result<(), Error> {
    let user = get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    let authenticated = verify_password(&form.current_password, &user.password).map_err(|e| {
        log::error!("Stored password hash of user {} is unreadable: {e}", user.id);
        HtmlError::InternalServerError.default()
    })?;
    if !authenticated {
        return Err(Error::field("current_password", "Invalid password."));
    }
    validate_password(&form.new_password)
        .map_err(|message| Error::field("new_password", &message))?;

    let password = hash_password(&form.new_password).map_err(|e| {
        log::error!("Failed to hash password: {e}");
        HtmlError::InternalServerError.default()
    })?;

    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// One page of users, with the size of the whole listing.
pub async fn list_users(
    pool: &Pool<Postgres>,
    viewer: Option<Id>,
    pagination: Pagination,
) -> Result<(Vec<UserRow>, i64), Error> {
    let mut qb = user_select(viewer);
    qb.push(" ORDER BY u.id LIMIT ")
        .push_bind(pagination.limit)
        .push(" OFFSET ")
        .push_bind(pagination.offset());

    let rows: Vec<UserRow> = qb
        .build_query_as::<UserRow>()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    Ok((rows, total_count))
}

pub async fn fetch_user(
    pool: &Pool<Postgres>,
    user_id: Id,
    viewer: Option<Id>,
) -> Result<Option<UserRow>, Error> {
    let mut qb = user_select(viewer);
    qb.push(" AND u.id = ").push_bind(user_id);

    let row: Option<UserRow> = qb
        .build_query_as::<UserRow>()
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn fetch_users(
    pool: &Pool<Postgres>,
    user_ids: &[Id],
    viewer: Option<Id>,
) -> Result<Vec<UserRow>, Error> {
    let mut qb = user_select(viewer);
    qb.push(" AND u.id = ANY(").push_bind(user_ids.to_vec()).push(")");

    let rows: Vec<UserRow> = qb
        .build_query_as::<UserRow>()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_differing_in_case_normalize_to_one_login() {
        assert_eq!(normalize_email("  Cook@Example.COM "), "cook@example.com");
        assert_eq!(
            normalize_email("Cook@x.com"),
            normalize_email("cook@x.com")
        );
    }

    #[test]
    fn email_uniqueness_ignores_case() {
        let schema = include_str!("../../../migrations/20240101000000_initial.sql");

        assert!(schema.contains("CREATE UNIQUE INDEX users_email_key ON users (LOWER(email));"));
        assert!(!schema.contains("UNIQUE (email)"));
    }
}
