//! Shared harness for invoice-app router tests.
//!
//! [`TestApp::spawn`] runs the router over the in-memory store and the mock
//! email provider. [`TestApp::postgres`] runs it over a fresh database
//! created on the server named by `TEST_DATABASE_URL`.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use secrecy::Secret;
use serde_json::{json, Value};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPoolOptions};
use sqlx::Connection;
use std::str::FromStr;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use invoice_app::auth::{encode_session_token, Identity, SessionTokenProvider};
use invoice_app::config::{
    AppConfig, AuthConfig, DatabaseConfig, EmailConfig, DEFAULT_EMAIL_API_URL, DEFAULT_EMAIL_FROM,
};
use invoice_app::services::providers::MockEmailProvider;
use invoice_app::services::{Database, InMemoryStore, Store};
use invoice_app::startup::{build_router, AppState};

pub const TEST_SECRET: &str = "integration-test-secret";
pub const TEST_APP_URL: &str = "https://invoices.test";

pub fn test_config() -> AppConfig {
    AppConfig {
        common: service_core::config::Config { port: 0 },
        database: DatabaseConfig {
            url: Secret::new("postgres://unused".to_string()),
            max_connections: 1,
            min_connections: 0,
        },
        auth: AuthConfig {
            secret: Secret::new(TEST_SECRET.to_string()),
        },
        email: EmailConfig {
            enabled: false,
            api_url: DEFAULT_EMAIL_API_URL.to_string(),
            api_key: Secret::new(String::new()),
            from: DEFAULT_EMAIL_FROM.to_string(),
        },
        app_url: TEST_APP_URL.to_string(),
        max_page_size: 100,
        log_level: "debug".to_string(),
        otlp_endpoint: None,
    }
}

pub struct TestApp {
    pub router: Router,
    pub email: Arc<MockEmailProvider>,
    memory: Option<Arc<InMemoryStore>>,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::with_email(MockEmailProvider::new(true))
    }

    pub fn with_email(email: MockEmailProvider) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::assemble(store.clone(), Some(store), Arc::new(email))
    }

    /// Router over a freshly migrated database of its own, or `None` when
    /// `TEST_DATABASE_URL` is not set.
    pub async fn postgres() -> Option<Self> {
        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set, skipping PostgreSQL test");
            return None;
        };

        let name = format!("invoice_test_{}", Uuid::new_v4().simple());
        let mut admin = PgConnection::connect(&url)
            .await
            .expect("Failed to connect to TEST_DATABASE_URL");
        sqlx::query(&format!(r#"CREATE DATABASE "{name}""#))
            .execute(&mut admin)
            .await
            .expect("Failed to create test database");

        let options = PgConnectOptions::from_str(&url)
            .expect("Invalid TEST_DATABASE_URL")
            .database(&name);
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .expect("Failed to connect to test database");

        let db = Database::from_pool(pool);
        db.run_migrations().await.expect("Failed to run migrations");

        Some(Self::assemble(
            Arc::new(db),
            None,
            Arc::new(MockEmailProvider::new(true)),
        ))
    }

    fn assemble(
        store: Arc<dyn Store>,
        memory: Option<Arc<InMemoryStore>>,
        email: Arc<MockEmailProvider>,
    ) -> Self {
        let config = test_config();
        let identity = Arc::new(SessionTokenProvider::new(&config.auth.secret));

        let state = AppState {
            config: Arc::new(config),
            store,
            email: email.clone(),
            identity,
        };

        Self {
            router: build_router(state),
            email,
            memory,
        }
    }

    /// The in-memory store behind a [`TestApp::spawn`] router.
    pub fn memory(&self) -> &InMemoryStore {
        self.memory
            .as_deref()
            .expect("Not an in-memory test app")
    }

    /// A signed-in caller with no account row yet. The row is provisioned
    /// from the session claims on first use.
    pub fn sign_up(&self, email: &str) -> Identity {
        let mut identity = Identity::new(Uuid::new_v4(), email);
        identity.first_name = Some("Test".to_string());
        identity.last_name = Some("Owner".to_string());
        identity
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes()
            .to_vec();
        (status, body)
    }

    /// Issue a JSON request, optionally signed in as `caller`.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        caller: Option<&Identity>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(identity) = caller {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(identity)));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let (status, bytes) = self.send(request).await;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Response is not JSON")
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, caller: Option<&Identity>) -> (StatusCode, Value) {
        self.call(Method::GET, uri, caller, None).await
    }

    /// Create an invoice and return its id.
    pub async fn create(&self, caller: &Identity, form: Value) -> Uuid {
        let (status, body) = self
            .call(Method::POST, "/api/invoices", Some(caller), Some(form))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
        body["data"]["invoice_id"]
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .expect("Missing invoice_id")
    }
}

pub fn token(identity: &Identity) -> String {
    encode_session_token(
        identity,
        &Secret::new(TEST_SECRET.to_string()),
        Duration::hours(1),
    )
    .expect("Failed to sign session token")
}

/// A valid invoice form dated today, one item of 2 x 10.
pub fn invoice_form(invoice_no: &str, client_email: Option<&str>) -> Value {
    let today = Utc::now().date_naive();
    json!({
        "invoice_no": invoice_no,
        "invoice_date": today.to_string(),
        "due_date": (today + Duration::days(14)).to_string(),
        "from": {
            "name": "Acme Ltd",
            "email": "billing@acme.test",
            "address1": "1 Main St"
        },
        "to": {
            "name": "Jane Client",
            "email": client_email,
            "address1": "9 High St"
        },
        "items": [
            { "item_name": "Consulting", "quantity": 2, "price": 10.00, "total": 20.00 }
        ],
        "sub_total": 20.00,
        "total": 20.00
    })
}
