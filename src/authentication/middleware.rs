use warp::{reject::Rejection, Filter};

use crate::{
    actions::is_token_revoked,
    api::routes::ApiContext,
    constants::AUTH_HEADER_PREFIXES,
    error::{Error, HtmlError},
};

use super::jwt::{verify_jwt_session, SessionData};

/// Strips the `Token ` / `Bearer ` scheme from an `Authorization` header value.
pub fn token_from_header(header: &str) -> Option<&str> {
    AUTH_HEADER_PREFIXES
        .iter()
        .find_map(|prefix| header.strip_prefix(prefix))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn authenticate(ctx: &ApiContext, header: &str) -> Result<SessionData, Error> {
    let token = token_from_header(header).ok_or_else(|| HtmlError::InvalidSession.default())?;
    let session = verify_jwt_session(token, &ctx.config.jwt_secret)?;

    if is_token_revoked(&ctx.pool, &session.jti).await? {
        return Err(HtmlError::InvalidSession.new("Token has been revoked."));
    }

    Ok(session.into())
}

/// `None` without an `Authorization` header. A header carrying an invalid,
/// expired or revoked token rejects the request with 401.
pub fn with_possible_session(
    ctx: ApiContext,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let ctx = ctx.clone();
        async move {
            match header {
                None => Ok(None),
                Some(header) => authenticate(&ctx, &header)
                    .await
                    .map(Some)
                    .map_err(warp::reject::custom),
            }
        }
    })
}
