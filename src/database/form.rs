use serde::Deserialize;

use super::schema::Id;

#[derive(Deserialize, Debug, Clone)]
pub struct RegisterForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    pub last_name: Option<String>,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SetPasswordForm {
    pub new_password: String,
    pub current_password: String,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientAmountForm {
    pub id: Option<Id>,
    pub amount: Option<i32>,
}

/// Body of recipe create and update requests. Every field is optional so that
/// partial updates can be expressed; create-time presence is checked by the validators.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RecipeForm {
    pub ingredients: Option<Vec<IngredientAmountForm>>,
    pub tags: Option<Vec<Id>>,
    /// `data:image/<ext>;base64,<payload>`
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub is_private: Option<bool>,
}

/// Ingredient amounts after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientAmount {
    pub id: Id,
    pub amount: i32,
}
