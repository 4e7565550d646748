//! Application startup and lifecycle management.

use crate::auth::{IdentityProvider, SessionTokenProvider};
use crate::config::AppConfig;
use crate::handlers::{account, health, invoices};
use crate::services::providers::{EmailProvider, MockEmailProvider, ResendProvider};
use crate::services::{init_metrics, Database, Store};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{request_id, request_id_middleware, security_headers_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub email: Arc<dyn EmailProvider>,
    pub identity: Arc<dyn IdentityProvider>,
}

/// Assemble the HTTP router over already constructed collaborators.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/api/invoices",
            post(invoices::create_invoice).get(invoices::list_invoices),
        )
        .route(
            "/api/invoices/:id",
            get(invoices::get_invoice).put(invoices::update_invoice),
        )
        .route("/api/invoices/:id/email", post(invoices::send_invoice_email))
        .route("/api/dashboard", get(account::dashboard_stats))
        .route(
            "/api/settings",
            get(account::get_settings).put(account::update_settings),
        )
        .route(
            "/api/user",
            get(account::get_current_user).patch(account::update_user),
        );

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics_handler))
        .merge(api)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id(request),
                        method = %request.method(),
                        uri = %request.uri(),
                        user_id = tracing::field::Empty,
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Pick the delivery provider. Without delivery enabled, messages go to the
/// mock provider and are only logged.
pub fn email_provider(config: &AppConfig) -> Result<Arc<dyn EmailProvider>, AppError> {
    if !config.email.enabled {
        tracing::warn!("Email delivery disabled - using mock provider");
        return Ok(Arc::new(MockEmailProvider::new(true)));
    }

    let provider = ResendProvider::new(config.email.clone())
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Email provider: {}", e)))?;
    tracing::info!(api_url = %config.email.api_url, "Email provider initialized");
    Ok(Arc::new(provider))
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: AppConfig) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            e
        })?;

        let email = email_provider(&config)?;
        let identity = Arc::new(SessionTokenProvider::new(&config.auth.secret));

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        let state = AppState {
            config: Arc::new(config),
            store: Arc::new(db),
            email,
            identity,
        };

        tracing::info!(port = port, "invoice-app listener bound");

        Ok(Self {
            port,
            listener,
            router: build_router(state),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), AppError> {
        tracing::info!(port = self.port, "HTTP server started");
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
