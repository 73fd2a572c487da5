//main.rs
use std::net::SocketAddr;
use std::sync::Arc;

use code_manager::api::api::router;
use code_manager::manager::manager::ContainerManager;
use code_manager::utils::config_management::load_execution_limits_from_json;
use tokio::net::TcpListener;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use util::config::AppConfig;
use util::execution_config::ExecutionLimits;
use util::languages::LanguageRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;

    let level = config.log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(level))
        .init();

    let limits = match &config.execution_config_file {
        Some(path) => load_execution_limits_from_json(path)?,
        None => ExecutionLimits::default(),
    };
    let registry = match &config.languages_file {
        Some(path) => LanguageRegistry::from_json_file(path)?,
        None => LanguageRegistry::builtin(),
    };
    tracing::info!(languages = ?registry.ids(), "language registry loaded");

    let manager = Arc::new(ContainerManager::from_config(&config, limits, registry));

    // Keep serving when docker is down; runs will report the backend as unavailable.
    if let Err(e) = manager.check_backend().await {
        tracing::error!(error = %e, "sandbox backend not reachable at startup");
    }
    let prefetch = Arc::clone(&manager);
    tokio::spawn(async move {
        if let Err(e) = prefetch.ensure_images().await {
            tracing::warn!(error = %e, "could not prefetch sandbox images");
        }
    });

    let addr: SocketAddr =
        format!("{}:{}", config.code_manager_host, config.code_manager_port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router(Arc::clone(&manager)))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    manager.shutdown().await;
    Ok(())
}
