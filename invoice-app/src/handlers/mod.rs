pub mod account;
pub mod envelope;
pub mod health;
pub mod invoices;

pub use envelope::{ApiError, Envelope};
