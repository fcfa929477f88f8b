mod app;
mod config;
mod error;
mod openfoodfacts;
mod products;
mod state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "pickbetter=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    tracing::info!("starting application");
    let app_state = state::AppState::init().await?;
    tracing::info!(
        env = %app_state.config.app_env,
        cache_days = app_state.config.product_cache_days,
        "configuration loaded"
    );

    if let Err(e) = sqlx::migrate!("./migrations").run(&app_state.db).await {
        tracing::warn!(error = %e, "migration failed; continuing");
    }

    let host = app_state.config.host.clone();
    let port = app_state.config.port;
    let db = app_state.db.clone();

    app::serve(app::build_app(app_state), &host, port).await?;

    db.close().await;
    tracing::info!("shutdown complete");
    Ok(())
}
