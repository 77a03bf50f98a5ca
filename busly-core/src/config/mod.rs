//! Configuration module for Busly.
//!
//! Backend connection settings come from the environment; user preferences
//! are stored in SQLite.

mod api;
mod settings;

pub use api::{ApiConfig, BASE_URL_ENV, DEFAULT_BASE_URL, DEFAULT_TIMEOUT, TIMEOUT_ENV};
pub use settings::{Language, Settings, DEFAULT_CURRENCY, SUPPORTED_CURRENCIES};
