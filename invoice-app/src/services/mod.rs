//! Services module for invoice-app.

pub mod dashboard;
pub mod database;
pub mod formatting;
pub mod invoices;
pub mod memory;
pub mod metrics;
pub mod notifications;
pub mod providers;
pub mod settings;
pub mod store;
pub mod users;

pub use database::Database;
pub use memory::InMemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use store::{InvoiceStore, SettingsStore, Store, UserStore};
