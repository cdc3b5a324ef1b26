mod database {
    pub mod actions;
    pub mod error;
    pub mod filters;
    pub mod form;
    pub mod pagination;
    pub mod schema;
    pub mod serializers;
    pub mod shopping_list;
    pub mod validators;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
pub mod api {
    pub mod handlers;
    pub mod rejection;
    pub mod routes;
}
pub mod config;
mod constants;
pub mod management;
pub mod media;

pub use authentication::*;
pub use constants::*;
pub use database::*;
