pub const MAX_PAGE_SIZE: i64 = 100;

pub const SHOPPING_LIST_HEADER: &str = "Shopping list:";
pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";

pub const INGREDIENTS_CSV_PATH: &str = "data/ingredients.csv";

/// (name, color, slug)
pub const DEFAULT_TAGS: &[(&str, &str, &str)] = &[
    ("Hot", "#FF0000", "hot"),
    ("Cold", "#00FFFF", "cold"),
    ("Dessert", "#FFFF00", "dessert"),
];

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "png"];
pub const IMAGE_DIRECTORY: &str = "recipes/images";

pub const USER_NAME_MAX_LENGTH: usize = 150;
pub const USER_EMAIL_MAX_LENGTH: usize = 200;
pub const RECIPE_NAME_MAX_LENGTH: usize = 200;

pub const AUTH_HEADER_PREFIXES: &[&str] = &["Token ", "Bearer "];
