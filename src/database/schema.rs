use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::TypeError;

pub type Id = i32;

/// What a POST on an already present favorite / cart entry does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToggleMode {
    /// Reject the request with 400.
    #[default]
    Strict,
    /// Answer 200 and leave the relation as it is.
    Idempotent,
}

impl FromStr for ToggleMode {
    type Err = TypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "idempotent" => Ok(Self::Idempotent),
            _ => Err(TypeError::new("Invalid variant")),
        }
    }
}

/// Join tables linking a user to a recipe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecipeRelation {
    Favorite,
    ShoppingCart,
}

impl RecipeRelation {
    pub fn table(&self) -> &'static str {
        match self {
            RecipeRelation::Favorite => "favorites",
            RecipeRelation::ShoppingCart => "shopping_cart",
        }
    }

    pub fn already_present(&self) -> &'static str {
        match self {
            RecipeRelation::Favorite => "Recipe is already in favorites.",
            RecipeRelation::ShoppingCart => "Recipe is already in the shopping cart.",
        }
    }

    pub fn not_present(&self) -> &'static str {
        match self {
            RecipeRelation::Favorite => "Recipe is not in favorites.",
            RecipeRelation::ShoppingCart => "Recipe is not in the shopping cart.",
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub password: String,
    pub date_joined: DateTime<Utc>,
}

/// A user as seen by a particular viewer.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct UserRow {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub is_subscribed: bool,

    pub count: i64,
}

/// A followed author, with the number of recipes they have published.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct AuthorRow {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub is_subscribed: bool,
    pub recipes_count: i64,

    pub count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: Id,
    pub name: String,
    pub color: Option<String>,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ingredient {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Recipe {
    pub id: Id,
    pub author_id: Id,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub is_private: bool,
    pub created: DateTime<Utc>,
}

/// A recipe as seen by a particular viewer, with the window count of the listing.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeRow {
    pub id: Id,
    pub author_id: Id,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub is_private: bool,
    pub created: DateTime<Utc>,

    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,

    pub count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeTagRow {
    pub recipe_id: Id,
    pub id: Id,
    pub name: String,
    pub color: Option<String>,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeIngredientRow {
    pub recipe_id: Id,
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeShortRow {
    pub id: Id,
    pub author_id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct ShoppingListRow {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}
