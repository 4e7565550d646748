//! Dashboard, email, settings and profile integration tests for invoice-app.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{invoice_form, TestApp, TEST_APP_URL};
use serde_json::Value;
use invoice_app::services::providers::MockEmailProvider;
use serde_json::json;

#[tokio::test]
async fn dashboard_sums_window_revenue() {
    let app = TestApp::spawn();
    let owner = app.sign_up("owner@acme.test");

    let mut paid = invoice_form("INV-001", None);
    paid["status"] = json!("PAID");
    paid["sub_total"] = json!(100.00);
    paid["total"] = json!(100.00);
    app.create(&owner, paid).await;

    let mut unpaid = invoice_form("INV-002", None);
    unpaid["total"] = json!(50.00);
    app.create(&owner, unpaid).await;

    let old_date = Utc::now().date_naive() - Duration::days(45);
    let mut old = invoice_form("INV-000", None);
    old["invoice_date"] = json!(old_date.to_string());
    old["due_date"] = json!((old_date + Duration::days(7)).to_string());
    old["total"] = json!(999.00);
    app.create(&owner, old).await;

    let (status, body) = app.get("/api/dashboard", Some(&owner)).await;

    assert_eq!(status, StatusCode::OK);
    let stats = &body["data"];
    assert_eq!(stats["totalRevenue"], json!(150.0));
    assert_eq!(stats["totalInvoices"], 2);
    assert_eq!(stats["paidInvoices"], 1);
    assert_eq!(stats["unpaidInvoices"], 1);
    assert_eq!(stats["recentInvoices"].as_array().map(Vec::len), Some(3));
    assert_eq!(stats["recentInvoices"][0]["invoice_no"], "INV-000");
    assert_eq!(stats["chartData"].as_array().map(Vec::len), Some(2));
}

/// Invoice form dated `days_ago` days before today.
fn dated_form(invoice_no: &str, days_ago: i64, total: f64) -> Value {
    let date = Utc::now().date_naive() - Duration::days(days_ago);
    let mut form = invoice_form(invoice_no, None);
    form["invoice_date"] = json!(date.to_string());
    form["due_date"] = json!((date + Duration::days(7)).to_string());
    form["sub_total"] = json!(total);
    form["total"] = json!(total);
    form
}

#[tokio::test]
async fn dashboard_counts_other_statuses_only_in_totals() {
    let app = TestApp::spawn();
    let owner = app.sign_up("owner@acme.test");

    let mut paid = dated_form("INV-001", 0, 100.0);
    paid["status"] = json!("PAID");
    app.create(&owner, paid).await;
    app.create(&owner, dated_form("INV-002", 0, 50.0)).await;
    let mut overdue = dated_form("INV-003", 3, 30.0);
    overdue["status"] = json!("OVERDUE");
    app.create(&owner, overdue).await;
    let mut cancelled = dated_form("INV-004", 5, 20.0);
    cancelled["status"] = json!("CANCELLED");
    app.create(&owner, cancelled).await;

    let (status, body) = app.get("/api/dashboard", Some(&owner)).await;

    assert_eq!(status, StatusCode::OK);
    let stats = &body["data"];
    assert_eq!(stats["totalInvoices"], 4);
    assert_eq!(stats["totalRevenue"], json!(200.0));
    assert_eq!(stats["paidInvoices"], 1);
    assert_eq!(stats["unpaidInvoices"], 1);
}

#[tokio::test]
async fn dashboard_window_starts_thirty_days_back() {
    let app = TestApp::spawn();
    let owner = app.sign_up("owner@acme.test");

    app.create(&owner, dated_form("INV-030", 30, 10.0)).await;
    app.create(&owner, dated_form("INV-031", 31, 1000.0)).await;

    let (status, body) = app.get("/api/dashboard", Some(&owner)).await;

    assert_eq!(status, StatusCode::OK);
    let stats = &body["data"];
    assert_eq!(stats["totalInvoices"], 1);
    assert_eq!(stats["unpaidInvoices"], 1);
    assert_eq!(stats["totalRevenue"], json!(10.0));
    assert_eq!(stats["chartData"].as_array().map(Vec::len), Some(1));
    assert_eq!(stats["recentInvoices"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn dashboard_groups_chart_by_day_on_request() {
    let app = TestApp::spawn();
    let owner = app.sign_up("owner@acme.test");

    let mut paid = invoice_form("INV-001", None);
    paid["status"] = json!("PAID");
    app.create(&owner, paid).await;
    app.create(&owner, invoice_form("INV-002", None)).await;

    let (status, body) = app.get("/api/dashboard?bucket=day", Some(&owner)).await;

    assert_eq!(status, StatusCode::OK);
    let chart = body["data"]["chartData"].as_array().cloned().unwrap_or_default();
    assert_eq!(chart.len(), 1);
    assert_eq!(chart[0]["date"], Utc::now().date_naive().to_string());
    assert_eq!(chart[0]["totalRevenue"], json!(40.0));
    assert_eq!(chart[0]["paidRevenue"], json!(20.0));
}

#[tokio::test]
async fn dashboard_of_new_account_is_empty() {
    let app = TestApp::spawn();
    let owner = app.sign_up("owner@acme.test");

    let (status, body) = app.get("/api/dashboard", Some(&owner)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalRevenue"], json!(0.0));
    assert_eq!(body["data"]["totalInvoices"], 0);
    assert_eq!(body["data"]["chartData"], json!([]));
}

#[tokio::test]
async fn dashboard_store_failure_is_reported() {
    let app = TestApp::spawn();
    let owner = app.sign_up("owner@acme.test");
    app.memory().set_unavailable(true);

    let (status, body) = app.get("/api/dashboard", Some(&owner)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to fetch dashboard stats");
}

#[tokio::test]
async fn email_goes_to_client_with_payment_link() {
    let app = TestApp::spawn();
    let owner = app.sign_up("owner@acme.test");
    let id = app
        .create(&owner, invoice_form("INV-001", Some("jane@client.test")))
        .await;

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/invoices/{id}/email"),
            Some(&owner),
            Some(json!({ "subject": "Invoice INV-001" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(
        body,
        json!({ "success": true, "message": "Email sent successfully" })
    );

    let sent = app.email.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "jane@client.test");
    assert_eq!(sent[0].subject, "Invoice INV-001");
    let link = format!("{TEST_APP_URL}/invoice/paid/{id}");
    assert!(sent[0].body_text.as_deref().unwrap_or_default().contains(&link));
    assert!(sent[0]
        .body_html
        .as_deref()
        .unwrap_or_default()
        .contains(&id.to_string()));
}

#[tokio::test]
async fn email_without_client_address_is_not_sent() {
    let app = TestApp::spawn();
    let owner = app.sign_up("owner@acme.test");
    let id = app.create(&owner, invoice_form("INV-001", None)).await;

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/invoices/{id}/email"),
            Some(&owner),
            Some(json!({ "subject": "Invoice INV-001" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Client email not found");
    assert_eq!(app.email.send_count(), 0);
}

#[tokio::test]
async fn email_for_foreign_invoice_is_not_found() {
    let app = TestApp::spawn();
    let owner = app.sign_up("owner@acme.test");
    let stranger = app.sign_up("stranger@elsewhere.test");
    let id = app
        .create(&owner, invoice_form("INV-001", Some("jane@client.test")))
        .await;

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/invoices/{id}/email"),
            Some(&stranger),
            Some(json!({ "subject": "Invoice INV-001" })),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Invoice not found");
    assert_eq!(app.email.send_count(), 0);
}

#[tokio::test]
async fn delivery_failure_reports_provider_message() {
    let app = TestApp::with_email(MockEmailProvider::failing("Domain not verified"));
    let owner = app.sign_up("owner@acme.test");
    let id = app
        .create(&owner, invoice_form("INV-001", Some("jane@client.test")))
        .await;

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/invoices/{id}/email"),
            Some(&owner),
            Some(json!({ "subject": "Invoice INV-001" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Domain not verified");
}

#[tokio::test]
async fn settings_start_empty_then_upsert() {
    let app = TestApp::spawn();
    let owner = app.sign_up("owner@acme.test");

    let (status, body) = app.get("/api/settings", Some(&owner)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "data": null }));

    let (status, body) = app
        .call(
            Method::PUT,
            "/api/settings",
            Some(&owner),
            Some(json!({
                "invoice_logo": "https://cdn.test/logo.png",
                "signature": { "name": "T. Owner", "image": "https://cdn.test/sig.png" }
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let settings_id = body["data"]["settings_id"].clone();

    let (_, body) = app
        .call(
            Method::PUT,
            "/api/settings",
            Some(&owner),
            Some(json!({ "invoice_logo": "https://cdn.test/logo-v2.png" })),
        )
        .await;
    assert_eq!(body["data"]["settings_id"], settings_id);

    let (_, body) = app.get("/api/settings", Some(&owner)).await;
    assert_eq!(body["data"]["invoice_logo"], "https://cdn.test/logo-v2.png");
    assert_eq!(body["data"]["signature"]["name"], "T. Owner");
}

#[tokio::test]
async fn first_request_provisions_account_from_session() {
    let app = TestApp::spawn();
    let owner = app.sign_up("owner@acme.test");

    let (status, body) = app.get("/api/user", Some(&owner)).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["user_id"], owner.id.to_string());
    assert_eq!(body["data"]["email"], "owner@acme.test");
    assert_eq!(body["data"]["last_name"], "Owner");

    let (_, again) = app.get("/api/user", Some(&owner)).await;
    assert_eq!(again["data"]["created_utc"], body["data"]["created_utc"]);
}

#[tokio::test]
async fn email_of_another_account_is_a_conflict() {
    let app = TestApp::spawn();
    let owner = app.sign_up("owner@acme.test");
    app.create(&owner, invoice_form("INV-001", None)).await;

    let impostor = app.sign_up("owner@acme.test");
    let (status, body) = app
        .call(
            Method::POST,
            "/api/invoices",
            Some(&impostor),
            Some(invoice_form("INV-002", None)),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Email already registered");
}

#[tokio::test]
async fn profile_patch_changes_only_given_fields() {
    let app = TestApp::spawn();
    let owner = app.sign_up("owner@acme.test");

    let (status, body) = app.get("/api/user", Some(&owner)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "owner@acme.test");

    let (status, body) = app
        .call(
            Method::PATCH,
            "/api/user",
            Some(&owner),
            Some(json!({ "currency": "gbp" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["currency"], "GBP");
    assert_eq!(body["data"]["first_name"], "Test");
    assert_eq!(body["data"]["role"], "USER");
}

#[tokio::test]
async fn profile_patch_rejects_bad_currency() {
    let app = TestApp::spawn();
    let owner = app.sign_up("owner@acme.test");

    let (status, body) = app
        .call(
            Method::PATCH,
            "/api/user",
            Some(&owner),
            Some(json!({ "currency": "dollars" })),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Invalid request data");
}
