//! invoice-app entry point.

use invoice_app::config::AppConfig;
use invoice_app::startup::Application;

use service_core::observability::init_tracing;
use tokio::signal;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    init_tracing(
        "invoice-app",
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    // Mask sensitive values
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        http_port = %config.common.port,
        app_url = %config.app_url,
        email_enabled = config.email.enabled,
        max_page_size = config.max_page_size,
        db_max_connections = config.database.max_connections,
        db_min_connections = config.database.min_connections,
        otlp_endpoint = ?config.otlp_endpoint,
        "Starting invoice-app"
    );

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to build application");
        std::io::Error::other(format!("Application build error: {}", e))
    })?;

    tokio::select! {
        result = app.run_until_stopped() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Server error");
                return Err(std::io::Error::other(format!("Server error: {}", e)));
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("Shutting down invoice-app");
        }
    }

    Ok(())
}
