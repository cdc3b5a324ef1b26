use warp::http::Method;

use crate::{
    error::{Error, HtmlError},
    jwt::SessionData,
    schema::Id,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    AllowAny,
    ReadOnly,
    IsAuthenticated,
    IsAuthenticatedOrReadOnly,
    /// Object-level: non-safe methods require the requester to own the object.
    /// Passes while no object is known yet.
    IsOwnerOrReadOnly,
}

/// What a permission gets to look at for one request.
pub struct Access<'a> {
    pub method: &'a Method,
    pub session: Option<&'a SessionData>,
    pub owner_id: Option<Id>,
}

impl<'a> Access<'a> {
    pub fn new(method: &'a Method, session: Option<&'a SessionData>) -> Self {
        Self {
            method,
            session,
            owner_id: None,
        }
    }

    pub fn with_owner(mut self, owner_id: Id) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    fn is_safe(&self) -> bool {
        [Method::GET, Method::HEAD, Method::OPTIONS].contains(self.method)
    }
}

impl Permission {
    pub fn allows(self, access: &Access) -> bool {
        match self {
            Permission::AllowAny => true,
            Permission::ReadOnly => access.is_safe(),
            Permission::IsAuthenticated => access.session.is_some(),
            Permission::IsAuthenticatedOrReadOnly => access.is_safe() || access.session.is_some(),
            Permission::IsOwnerOrReadOnly => {
                if access.is_safe() {
                    return true;
                }
                match (access.session, access.owner_id) {
                    (Some(session), Some(owner_id)) => session.user_id == owner_id,
                    (Some(_), None) => true,
                    (None, _) => false,
                }
            }
        }
    }
}

/// Evaluates `permissions` in order. The first one that denies decides the response:
/// 401 for an anonymous requester, 403 otherwise.
pub fn authorize(permissions: &[Permission], access: &Access) -> Result<(), Error> {
    match permissions.iter().find(|permission| !permission.allows(access)) {
        None => Ok(()),
        Some(_) if access.session.is_none() => Err(HtmlError::Unauthorized.default()),
        Some(_) => Err(HtmlError::Forbidden.default()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use warp::http::StatusCode;

    use super::*;

    fn session(user_id: Id) -> SessionData {
        SessionData {
            user_id,
            email: String::from("someone@example.com"),
            jti: String::from("jti"),
            expires_at: Utc::now(),
        }
    }

    #[test]
    fn read_only_allows_safe_methods_only() {
        assert!(authorize(&[Permission::ReadOnly], &Access::new(&Method::GET, None)).is_ok());

        let error =
            authorize(&[Permission::ReadOnly], &Access::new(&Method::POST, None)).unwrap_err();
        assert_eq!(error.code, StatusCode::UNAUTHORIZED);

        let user = session(1);
        let error = authorize(&[Permission::ReadOnly], &Access::new(&Method::PATCH, Some(&user)))
            .unwrap_err();
        assert_eq!(error.code, StatusCode::FORBIDDEN);
    }

    #[test]
    fn anonymous_writes_need_authentication() {
        let permissions = [Permission::IsAuthenticatedOrReadOnly];
        assert!(authorize(&permissions, &Access::new(&Method::GET, None)).is_ok());
        assert_eq!(
            authorize(&permissions, &Access::new(&Method::POST, None))
                .unwrap_err()
                .code,
            StatusCode::UNAUTHORIZED
        );

        let user = session(3);
        assert!(authorize(&permissions, &Access::new(&Method::POST, Some(&user))).is_ok());
    }

    #[test]
    fn only_owner_may_modify() {
        let permissions = [
            Permission::IsAuthenticatedOrReadOnly,
            Permission::IsOwnerOrReadOnly,
        ];
        let owner = session(5);
        let stranger = session(6);

        assert!(authorize(
            &permissions,
            &Access::new(&Method::PATCH, Some(&owner)).with_owner(5)
        )
        .is_ok());
        assert_eq!(
            authorize(
                &permissions,
                &Access::new(&Method::DELETE, Some(&stranger)).with_owner(5)
            )
            .unwrap_err()
            .code,
            StatusCode::FORBIDDEN
        );
        assert!(authorize(&permissions, &Access::new(&Method::GET, None).with_owner(5)).is_ok());
    }

    #[test]
    fn first_denial_wins() {
        let permissions = [Permission::IsAuthenticated, Permission::ReadOnly];
        let error = authorize(&permissions, &Access::new(&Method::POST, None)).unwrap_err();
        assert_eq!(
            error.info.as_deref(),
            Some("Authentication credentials were not provided.")
        );
    }

    #[test]
    fn allow_any_allows_everything() {
        assert!(authorize(&[Permission::AllowAny], &Access::new(&Method::DELETE, None)).is_ok());
        assert!(authorize(&[], &Access::new(&Method::DELETE, None)).is_ok());
    }
}
