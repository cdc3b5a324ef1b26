use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use serde_json::{json, Value};
use warp::{
    http::StatusCode,
    reject::Reject,
    reply::{self, Response},
    Reply,
};

/// Field name -> list of messages, rendered as-is in 400 responses.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlError {
    InvalidRequest,
    InvalidSession,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    LengthRequired,
    PayloadTooLarge,
    UnsupportedMediaType,
    InternalServerError,
}

impl HtmlError {
    pub fn status(&self) -> StatusCode {
        match self {
            HtmlError::InvalidRequest => StatusCode::BAD_REQUEST,
            HtmlError::InvalidSession => StatusCode::UNAUTHORIZED,
            HtmlError::Unauthorized => StatusCode::UNAUTHORIZED,
            HtmlError::Forbidden => StatusCode::FORBIDDEN,
            HtmlError::NotFound => StatusCode::NOT_FOUND,
            HtmlError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            HtmlError::LengthRequired => StatusCode::LENGTH_REQUIRED,
            HtmlError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            HtmlError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            HtmlError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn default_info(&self) -> &'static str {
        match self {
            HtmlError::InvalidRequest => "Invalid request.",
            HtmlError::InvalidSession => "Invalid token.",
            HtmlError::Unauthorized => "Authentication credentials were not provided.",
            HtmlError::Forbidden => "You do not have permission to perform this action.",
            HtmlError::NotFound => "Not found.",
            HtmlError::MethodNotAllowed => "Method not allowed.",
            HtmlError::LengthRequired => "Content-Length header is required.",
            HtmlError::PayloadTooLarge => "Request body is too large.",
            HtmlError::UnsupportedMediaType => "Unsupported media type in request.",
            HtmlError::InternalServerError => "Internal server error.",
        }
    }

    pub fn new(self, info: &str) -> Error {
        Error {
            code: self.status(),
            info: Some(info.to_string()),
            fields: None,
        }
    }

    pub fn default(self) -> Error {
        self.new(self.default_info())
    }
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: StatusCode,
    pub info: Option<String>,
    pub fields: Option<FieldErrors>,
}

impl Error {
    pub fn validation(fields: FieldErrors) -> Self {
        Self {
            code: StatusCode::BAD_REQUEST,
            info: None,
            fields: Some(fields),
        }
    }

    pub fn field(name: &str, message: &str) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(name.to_string(), vec![message.to_string()]);
        Self::validation(fields)
    }

    pub fn body(&self) -> Value {
        match &self.fields {
            Some(fields) => json!(fields),
            None => json!({ "detail": self.info.as_deref().unwrap_or_default() }),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.info, &self.fields) {
            (Some(info), _) => write!(f, "{} ({})", info, self.code),
            (None, Some(fields)) => write!(f, "validation failed on {:?} ({})", fields.keys(), self.code),
            (None, None) => write!(f, "{}", self.code),
        }
    }
}

impl std::error::Error for Error {}

impl Reject for Error {}

impl Reply for Error {
    fn into_response(self) -> Response {
        reply::with_status(reply::json(&self.body()), self.code).into_response()
    }
}

/// Classifies a `sqlx` failure into the client or server error it stands for.
pub struct QueryError {
    kind: HtmlError,
    info: String,
}

impl QueryError {
    pub fn new(kind: HtmlError, info: String) -> Self {
        Self { kind, info }
    }
}

fn constraint_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("users_email_key") => "A user with that email already exists.",
        Some("users_username_key") => "A user with that username already exists.",
        Some("recipes_name_author_key") => "You already have a recipe with this name.",
        Some("recipe_ingredients_recipe_ingredient_key") => "Ingredients must not repeat.",
        Some("recipe_ingredients_amount_check") => "Amount must be at least 1.",
        Some("recipes_cooking_time_check") => "Cooking time must be at least 1 minute.",
        Some("tags_color_check") => "Color must be a hex value such as #RRGGBB or #RGB.",
        Some("subscriptions_no_self_check") => "You cannot subscribe to yourself.",
        Some("subscriptions_author_subscriber_key") => "You are already subscribed to this author.",
        Some("favorites_user_recipe_key") => "Recipe is already in favorites.",
        Some("shopping_cart_user_recipe_key") => "Recipe is already in the shopping cart.",
        _ => "Request conflicts with existing data.",
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::RowNotFound => Self::new(HtmlError::NotFound, String::from("Not found.")),
            sqlx::Error::Database(e)
                if e.is_unique_violation() || e.is_check_violation() =>
            {
                Self::new(
                    HtmlError::InvalidRequest,
                    constraint_message(e.constraint()).to_string(),
                )
            }
            sqlx::Error::Database(e) if e.is_foreign_key_violation() => Self::new(
                HtmlError::InvalidRequest,
                String::from("Referenced object does not exist."),
            ),
            sqlx::Error::PoolTimedOut => {
                log::error!("Database pool timed out");
                Self::new(HtmlError::InternalServerError, String::from("Pool timed out"))
            }
            e => {
                log::error!("Query failed: {e}");
                Self::new(
                    HtmlError::InternalServerError,
                    HtmlError::InternalServerError.default_info().to_string(),
                )
            }
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        value.kind.new(&value.info)
    }
}

/// Failure to convert a raw value (query parameter, enum name) into its typed form.
#[derive(Debug, thiserror::Error)]
#[error("({info})")]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl From<TypeError> for Error {
    fn from(value: TypeError) -> Self {
        HtmlError::InvalidRequest.new(&value.info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_errors_render_as_detail_object() {
        let error = HtmlError::NotFound.new("No recipe exists with specified id");

        assert_eq!(error.code, StatusCode::NOT_FOUND);
        assert_eq!(
            error.body(),
            json!({ "detail": "No recipe exists with specified id" })
        );
    }

    #[test]
    fn field_errors_render_as_field_map() {
        let error = Error::field("cooking_time", "Cooking time must be at least 1 minute.");

        assert_eq!(error.code, StatusCode::BAD_REQUEST);
        assert_eq!(
            error.body(),
            json!({ "cooking_time": ["Cooking time must be at least 1 minute."] })
        );
    }

    #[test]
    fn default_messages_follow_kind() {
        assert_eq!(
            HtmlError::Unauthorized.default().info.as_deref(),
            Some("Authentication credentials were not provided.")
        );
        assert_eq!(HtmlError::Forbidden.default().code, StatusCode::FORBIDDEN);
    }

    #[test]
    fn row_not_found_maps_to_404() {
        let error: Error = QueryError::from(sqlx::Error::RowNotFound).into();
        assert_eq!(error.code, StatusCode::NOT_FOUND);
    }

    #[test]
    fn unknown_failures_map_to_500() {
        let error: Error = QueryError::from(sqlx::Error::PoolClosed).into();
        assert_eq!(error.code, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
