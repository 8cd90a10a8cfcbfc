//! RDS transport: configuration, HTTP page source and client wiring

pub mod client;
pub mod config;
pub mod http;

pub use client::{database_locator, format_locate_error, DatabaseLocator};
pub use config::{load_config, Config};
pub use http::RdsHttpClient;
