//! Database access. Every function takes the pool (or a connection inside a
//! running transaction) explicitly, and read paths take the viewer id explicitly.

mod ingredients;
mod recipes;
mod relations;
mod subscriptions;
mod tags;
mod tokens;
mod users;

pub use ingredients::*;
pub use recipes::*;
pub use relations::*;
pub use subscriptions::*;
pub use tags::*;
pub use tokens::*;
pub use users::*;
