//! invoice-app: invoices, dashboard statistics, invoice email and account
//! settings behind a JSON API.

pub mod auth;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
