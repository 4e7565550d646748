//! Dashboard statistics model.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::RecentInvoice;

/// How revenue points are grouped in `chartData`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartBucket {
    /// One point per invoice, in store order.
    #[default]
    Invoice,
    /// One point per calendar day, summed, ascending by date.
    Day,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    pub bucket: ChartBucket,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub date: NaiveDate,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub paid_revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
    pub total_invoices: i64,
    pub paid_invoices: i64,
    pub unpaid_invoices: i64,
    pub recent_invoices: Vec<RecentInvoice>,
    pub chart_data: Vec<ChartPoint>,
}
