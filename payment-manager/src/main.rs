use payment_manager::config::PaymentManagerConfig;
use payment_manager::services::init_metrics;
use payment_manager::startup::Application;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Recorder first, so nothing recorded during startup is lost.
    init_metrics().map_err(|e| std::io::Error::other(e.to_string()))?;

    let config = PaymentManagerConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    init_tracing(
        "payment-manager",
        &config.common.log_level,
        config.common.otlp_endpoint.as_deref(),
    );
    tracing::info!(store = ?config.store, "Starting payment-manager");

    let application = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;
    tracing::info!(port = application.port(), "payment-manager ready");

    application.run_until_stopped().await
}
