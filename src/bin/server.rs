use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;

use foodgram::{
    api::routes::{routes, ApiContext},
    config::Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load().context("Failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to the database")?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    tokio::fs::create_dir_all(&config.media_root)
        .await
        .with_context(|| format!("Failed to create {}", config.media_root.display()))?;

    let address = config.address();
    log::info!("Listening on {}:{}", address.0, address.1);

    warp::serve(routes(ApiContext::new(pool, config)))
        .run(address)
        .await;

    Ok(())
}
