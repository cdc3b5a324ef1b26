use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use foodgram::{
    management::{load_ingredients, load_tags},
    INGREDIENTS_CSV_PATH,
};

#[derive(Parser)]
#[command(name = "foodgram-manage", about = "Foodgram maintenance commands")]
struct Cli {
    /// Database URL, read from DATABASE_URL when omitted
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Import ingredients from a headerless `name,measurement_unit` CSV file
    LoadIngredients {
        #[arg(long, default_value = INGREDIENTS_CSV_PATH)]
        path: PathBuf,
    },
    /// Seed the default tags
    LoadTags,
    /// Import ingredients from the bundled CSV file and seed the default tags
    LoadData,
}

async fn connect(database_url: &str) -> Result<Pool<Postgres>> {
    PgPoolOptions::new()
        .max_connections(1)
        .connect(database_url)
        .await
        .context("Failed to connect to the database")
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let pool = connect(&cli.database_url).await?;

    match cli.command {
        Command::Migrate => {
            sqlx::migrate!().run(&pool).await.context("Failed to run migrations")?;
            println!("Migrations applied");
        }
        Command::LoadIngredients { path } => {
            let report = load_ingredients(&pool, &path).await?;
            println!(
                "Ingredients: {} created, {} already present",
                report.created, report.existing
            );
        }
        Command::LoadTags => {
            let report = load_tags(&pool).await?;
            println!(
                "Tags: {} created, {} already present",
                report.created, report.existing
            );
        }
        Command::LoadData => {
            let ingredients = load_ingredients(&pool, PathBuf::from(INGREDIENTS_CSV_PATH).as_path()).await?;
            let tags = load_tags(&pool).await?;
            println!(
                "Ingredients: {} created, {} already present",
                ingredients.created, ingredients.existing
            );
            println!("Tags: {} created, {} already present", tags.created, tags.existing);
        }
    }

    Ok(())
}
