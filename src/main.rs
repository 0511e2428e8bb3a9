use actix_web::{web, App, HttpServer};
use anyhow::Context;
use insight_proxy::config::{Config, LogFormat};
use insight_proxy::{health, insights};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "insight_proxy=debug,actix_web=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match config.app.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!("Starting Insight Proxy");
    tracing::info!("Environment: {}", config.app.env);
    tracing::info!("Credential mode: {}", config.credentials.name());
    tracing::info!("Server binding to: {}", config.server.bind_address());

    if let Some(reason) = config.credentials.misconfiguration() {
        tracing::warn!("Insight requests will fail until fixed: {}", reason);
    }
    if config.app.is_production() && config.cors.allowed_origins.is_empty() {
        tracing::warn!("ALLOWED_ORIGINS is empty in production; insight requests will fail");
    }

    let state = web::Data::new(
        insights::InsightState::from_config(&config).context("Failed to build insight state")?,
    );

    // Start HTTP server
    let bind_address = config.server.bind_address();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(state.clone())
            .configure(health::configure)
            .configure(insights::configure)
    })
    .workers(config.server.workers)
    .shutdown_timeout(config.server.shutdown_timeout_secs)
    .bind(&bind_address)?
    .run();

    tracing::info!("Server started at http://{}", bind_address);

    server.await?;
    Ok(())
}
