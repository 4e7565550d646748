//! Dashboard statistics over a trailing 30-day window.

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::BTreeMap;
use tracing::instrument;

use crate::auth::{require_identity, Identity};
use crate::models::{
    ChartBucket, ChartPoint, DashboardStats, InvoiceCountFilter, InvoiceStatus, RevenueSample,
};
use crate::services::store::InvoiceStore;

pub const WINDOW_DAYS: i64 = 30;
pub const RECENT_INVOICES: u32 = 5;

/// First calendar day inside the window ending at `today`.
pub fn window_start(today: NaiveDate) -> NaiveDate {
    today - Duration::days(WINDOW_DAYS)
}

#[instrument(skip(store, identity))]
pub async fn dashboard_stats<S: InvoiceStore + ?Sized>(
    store: &S,
    identity: Option<&Identity>,
    bucket: ChartBucket,
) -> Result<DashboardStats, AppError> {
    let identity = require_identity(identity)?;
    let since = window_start(Utc::now().date_naive());

    let in_window = |status| InvoiceCountFilter {
        since: Some(since),
        status,
    };
    let all = in_window(None);
    let paid = in_window(Some(InvoiceStatus::Paid));
    let unpaid = in_window(Some(InvoiceStatus::Unpaid));

    let (samples, total_invoices, paid_invoices, unpaid_invoices, recent_invoices) = tokio::try_join!(
        store.revenue_samples(identity.id, since),
        store.count_invoices(identity.id, &all),
        store.count_invoices(identity.id, &paid),
        store.count_invoices(identity.id, &unpaid),
        store.recent_invoices(identity.id, RECENT_INVOICES),
    )?;

    Ok(DashboardStats {
        total_revenue: total_revenue(&samples),
        total_invoices,
        paid_invoices,
        unpaid_invoices,
        recent_invoices,
        chart_data: chart_data(&samples, bucket),
    })
}

/// Sum of all totals, whatever their status.
pub fn total_revenue(samples: &[RevenueSample]) -> Decimal {
    samples.iter().map(|s| s.total).sum()
}

fn point(sample: &RevenueSample) -> ChartPoint {
    let paid_revenue = if sample.status == InvoiceStatus::Paid {
        sample.total
    } else {
        Decimal::ZERO
    };
    ChartPoint {
        date: sample.invoice_date,
        total_revenue: sample.total,
        paid_revenue,
    }
}

pub fn chart_data(samples: &[RevenueSample], bucket: ChartBucket) -> Vec<ChartPoint> {
    match bucket {
        ChartBucket::Invoice => samples.iter().map(point).collect(),
        ChartBucket::Day => {
            let mut days: BTreeMap<NaiveDate, ChartPoint> = BTreeMap::new();
            for sample in samples {
                let p = point(sample);
                days.entry(p.date)
                    .and_modify(|day| {
                        day.total_revenue += p.total_revenue;
                        day.paid_revenue += p.paid_revenue;
                    })
                    .or_insert(p);
            }
            days.into_values().collect()
        }
    }
}
