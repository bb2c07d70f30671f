use std::net::SocketAddr;

use scrap_exchange::app::{build_router, AppState};
use scrap_exchange::config::AppConfig;
use scrap_exchange::db;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let config = AppConfig::load()?;
    log::info!("Loaded config: {:?}", config);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));

    let pool = db::establish_pool(&config.database_url, config.pool_max_size)?;
    db::run_migrations(&pool)?;
    let mut conn = pool.get()?;
    let test_query = db::ping(&mut conn)?;
    log::info!("Database test query result: {}", test_query);

    if config.identity_provider_secret.is_none() {
        log::warn!("IDENTITY_PROVIDER_SECRET not set; /auth/login is disabled");
    }

    log::info!("Starting server on {}", addr);

    let app = build_router(AppState { config, pool });
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app.into_make_service()).await?;

    Ok(())
}
