use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::{
    IMAGE_EXTENSIONS, RECIPE_NAME_MAX_LENGTH, USER_EMAIL_MAX_LENGTH, USER_NAME_MAX_LENGTH,
};

use super::{
    error::{Error, FieldErrors},
    form::{IngredientAmount, IngredientAmountForm, RecipeForm, RegisterForm},
    schema::Id,
};

static COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#([0-9A-Fa-f]{3}|[0-9A-Fa-f]{6})$").expect("valid color regex"));
static USERNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid username regex"));

pub fn validate_color(color: &str) -> Result<(), String> {
    if COLOR.is_match(color) {
        Ok(())
    } else {
        Err(String::from(
            "Color must be a hex value such as #RRGGBB or #RGB.",
        ))
    }
}

pub fn validate_image_name(name: &str) -> Result<(), String> {
    let name = name.to_lowercase();
    if IMAGE_EXTENSIONS
        .iter()
        .any(|ext| name.ends_with(&format!(".{ext}")))
    {
        Ok(())
    } else {
        Err(String::from("Image must be a JPG or PNG file."))
    }
}

pub fn validate_recipe_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err(String::from("This field may not be blank."));
    }
    if name.chars().count() > RECIPE_NAME_MAX_LENGTH {
        return Err(format!(
            "Ensure this field has no more than {RECIPE_NAME_MAX_LENGTH} characters."
        ));
    }
    if !name.chars().any(char::is_alphabetic) {
        return Err(String::from(
            "Recipe name must contain at least one letter.",
        ));
    }
    Ok(())
}

pub fn validate_cooking_time(cooking_time: i32) -> Result<(), String> {
    if cooking_time < 1 {
        return Err(String::from("Cooking time must be at least 1 minute."));
    }
    Ok(())
}

pub fn validate_ingredients(
    ingredients: &[IngredientAmountForm],
) -> Result<Vec<IngredientAmount>, String> {
    if ingredients.is_empty() {
        return Err(String::from("A recipe needs at least one ingredient."));
    }

    let mut seen: HashSet<Id> = HashSet::new();
    let mut validated = Vec::with_capacity(ingredients.len());

    for ingredient in ingredients {
        let (id, amount) = match (ingredient.id, ingredient.amount) {
            (Some(id), Some(amount)) => (id, amount),
            _ => {
                return Err(String::from(
                    "Every ingredient needs an id and an amount.",
                ))
            }
        };
        if amount < 1 {
            return Err(String::from("Ingredient amount must be greater than zero."));
        }
        if !seen.insert(id) {
            return Err(String::from("Ingredients must not repeat."));
        }
        validated.push(IngredientAmount { id, amount });
    }

    Ok(validated)
}

pub fn validate_tags(tags: &[Id]) -> Result<(), String> {
    let unique: HashSet<&Id> = tags.iter().collect();
    if unique.len() != tags.len() {
        return Err(String::from("Tags must not repeat."));
    }
    Ok(())
}

/// Accumulates per-field messages so that one response reports every problem.
#[derive(Debug, Default)]
pub struct Validation {
    errors: FieldErrors,
}

impl Validation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, field: &str, result: Result<(), String>) {
        if let Err(message) = result {
            self.add(field, message);
        }
    }

    pub fn add(&mut self, field: &str, message: String) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message);
    }

    pub fn require<T>(&mut self, field: &str, value: &Option<T>) {
        if value.is_none() {
            self.add(field, String::from("This field is required."));
        }
    }

    pub fn finish(self) -> Result<(), Error> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::validation(self.errors))
        }
    }
}

/// A recipe body that passed field-level validation. Reference checks
/// (do the tag and ingredient ids exist) happen against the database.
#[derive(Debug, Clone, Default)]
pub struct RecipeChanges {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub is_private: Option<bool>,
    pub tags: Option<Vec<Id>>,
    pub ingredients: Option<Vec<IngredientAmount>>,
    pub image: Option<String>,
}

/// `partial` is true for updates, where omitted fields keep their stored value.
pub fn validate_recipe_form(form: RecipeForm, partial: bool) -> Result<RecipeChanges, Error> {
    let mut validation = Validation::new();

    if !partial {
        validation.require("ingredients", &form.ingredients);
        validation.require("image", &form.image);
        validation.require("name", &form.name);
        validation.require("text", &form.text);
        validation.require("cooking_time", &form.cooking_time);
    }

    let ingredients = match &form.ingredients {
        Some(ingredients) => match validate_ingredients(ingredients) {
            Ok(ingredients) => Some(ingredients),
            Err(message) => {
                validation.add("ingredients", message);
                None
            }
        },
        None => None,
    };

    if let Some(tags) = &form.tags {
        validation.check("tags", validate_tags(tags));
    }
    if let Some(name) = &form.name {
        validation.check("name", validate_recipe_name(name));
    }
    if let Some(text) = &form.text {
        if text.trim().is_empty() {
            validation.add("text", String::from("This field may not be blank."));
        }
    }
    if let Some(cooking_time) = form.cooking_time {
        validation.check("cooking_time", validate_cooking_time(cooking_time));
    }
    if let Some(image) = &form.image {
        if image.trim().is_empty() {
            validation.add("image", String::from("This field may not be blank."));
        }
    }

    validation.finish()?;

    Ok(RecipeChanges {
        name: form.name.map(|name| name.trim().to_string()),
        text: form.text,
        cooking_time: form.cooking_time,
        is_private: form.is_private,
        tags: form.tags,
        ingredients,
        image: form.image,
    })
}

fn validate_length(value: &str, max: usize) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(String::from("This field may not be blank."));
    }
    if value.chars().count() > max {
        return Err(format!(
            "Ensure this field has no more than {max} characters."
        ));
    }
    Ok(())
}

pub fn validate_register_form(form: &RegisterForm) -> Result<(), Error> {
    let mut validation = Validation::new();

    validation.check("email", validate_length(&form.email, USER_EMAIL_MAX_LENGTH));
    if !form.email.contains('@') {
        validation.add("email", String::from("Enter a valid email address."));
    }

    validation.check(
        "username",
        validate_length(&form.username, USER_NAME_MAX_LENGTH),
    );
    if !form.username.is_empty() && !USERNAME.is_match(&form.username) {
        validation.add(
            "username",
            String::from("Enter a valid username. Letters, digits and @/./+/-/_ only."),
        );
    }

    validation.check(
        "first_name",
        validate_length(&form.first_name, USER_NAME_MAX_LENGTH),
    );
    if let Some(last_name) = &form.last_name {
        if last_name.chars().count() > USER_NAME_MAX_LENGTH {
            validation.add(
                "last_name",
                format!("Ensure this field has no more than {USER_NAME_MAX_LENGTH} characters."),
            );
        }
    }

    validation.check("password", validate_password(&form.password));

    validation.finish()
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err(String::from("This field may not be blank."));
    }
    if password.chars().count() < 8 {
        return Err(String::from(
            "This password is too short. It must contain at least 8 characters.",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingredient(id: Id, amount: i32) -> IngredientAmountForm {
        IngredientAmountForm {
            id: Some(id),
            amount: Some(amount),
        }
    }

    fn full_form() -> RecipeForm {
        RecipeForm {
            ingredients: Some(vec![ingredient(1, 5), ingredient(2, 3)]),
            tags: Some(vec![1, 2]),
            image: Some(String::from("data:image/png;base64,iVBORw0KGgo=")),
            name: Some(String::from("Pancakes")),
            text: Some(String::from("Mix and fry.")),
            cooking_time: Some(20),
            is_private: None,
        }
    }

    #[test]
    fn colors_accept_short_and_long_hex() {
        assert!(validate_color("#FF0000").is_ok());
        assert!(validate_color("#0fa").is_ok());
        assert!(validate_color("FF0000").is_err());
        assert!(validate_color("#GG0000").is_err());
        assert!(validate_color("#FF00").is_err());
    }

    #[test]
    fn images_must_be_jpg_or_png() {
        assert!(validate_image_name("dinner.jpg").is_ok());
        assert!(validate_image_name("DINNER.PNG").is_ok());
        assert!(validate_image_name("dinner.gif").is_err());
        assert!(validate_image_name("jpg").is_err());
    }

    #[test]
    fn recipe_names_need_a_letter() {
        assert!(validate_recipe_name("Borscht").is_ok());
        assert!(validate_recipe_name("123 !!").is_err());
        assert!(validate_recipe_name("   ").is_err());
        assert!(validate_recipe_name(&"a".repeat(201)).is_err());
    }

    #[test]
    fn duplicate_ingredient_is_rejected() {
        let result = validate_ingredients(&[ingredient(1, 5), ingredient(1, 2)]);
        assert_eq!(result.unwrap_err(), "Ingredients must not repeat.");
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        assert!(validate_ingredients(&[ingredient(1, 0)]).is_err());
        assert!(validate_ingredients(&[ingredient(1, -3)]).is_err());
    }

    #[test]
    fn missing_ingredient_fields_are_rejected() {
        let partial = IngredientAmountForm {
            id: Some(1),
            amount: None,
        };
        assert!(validate_ingredients(&[partial]).is_err());
        assert!(validate_ingredients(&[]).is_err());
    }

    #[test]
    fn duplicate_tags_are_rejected() {
        assert!(validate_tags(&[1, 2, 3]).is_ok());
        assert!(validate_tags(&[1, 2, 1]).is_err());
    }

    #[test]
    fn create_with_zero_cooking_time_fails() {
        let form = RecipeForm {
            cooking_time: Some(0),
            ..full_form()
        };
        let error = validate_recipe_form(form, false).unwrap_err();
        let fields = error.fields.unwrap();
        assert!(fields.contains_key("cooking_time"));
    }

    #[test]
    fn create_with_duplicate_ingredient_fails() {
        let form = RecipeForm {
            ingredients: Some(vec![ingredient(4, 1), ingredient(4, 1)]),
            ..full_form()
        };
        let error = validate_recipe_form(form, false).unwrap_err();
        assert_eq!(
            error.fields.unwrap()["ingredients"],
            vec![String::from("Ingredients must not repeat.")]
        );
    }

    #[test]
    fn create_requires_all_fields() {
        let error = validate_recipe_form(RecipeForm::default(), false).unwrap_err();
        let fields = error.fields.unwrap();
        for field in ["ingredients", "image", "name", "text", "cooking_time"] {
            assert!(fields.contains_key(field), "missing {field}");
        }
    }

    #[test]
    fn update_accepts_partial_body() {
        let form = RecipeForm {
            name: Some(String::from("  Soup ")),
            ..RecipeForm::default()
        };
        let changes = validate_recipe_form(form, true).unwrap();
        assert_eq!(changes.name.as_deref(), Some("Soup"));
        assert!(changes.ingredients.is_none());
        assert!(changes.tags.is_none());
    }

    #[test]
    fn valid_create_keeps_ingredient_order() {
        let changes = validate_recipe_form(full_form(), false).unwrap();
        assert_eq!(
            changes.ingredients.unwrap(),
            vec![
                IngredientAmount { id: 1, amount: 5 },
                IngredientAmount { id: 2, amount: 3 }
            ]
        );
    }

    #[test]
    fn register_form_reports_every_field() {
        let form = RegisterForm {
            email: String::from("not-an-email"),
            username: String::from("bad name!"),
            first_name: String::new(),
            last_name: None,
            password: String::from("short"),
        };
        let fields = validate_register_form(&form).unwrap_err().fields.unwrap();
        for field in ["email", "username", "first_name", "password"] {
            assert!(fields.contains_key(field), "missing {field}");
        }
    }

    #[test]
    fn register_form_accepts_valid_user() {
        let form = RegisterForm {
            email: String::from("cook@example.com"),
            username: String::from("cook.one"),
            first_name: String::from("Ada"),
            last_name: Some(String::from("Cook")),
            password: String::from("long enough password"),
        };
        assert!(validate_register_form(&form).is_ok());
    }
}
