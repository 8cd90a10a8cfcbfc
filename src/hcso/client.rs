//! RDS client construction and error formatting

use anyhow::Result;

use super::config::Config;
use super::http::RdsHttpClient;
use crate::resource::locator::{LocateError, LocatorConfig, ResourceLocator};
use crate::resource::protocol::TransportError;

/// Locator for SQL Server databases backed by the RDS HTTP API
pub type DatabaseLocator = ResourceLocator<RdsHttpClient>;

/// Build a locator from configuration
pub fn database_locator(config: &Config) -> Result<DatabaseLocator> {
    let mut locator_config =
        LocatorConfig::default().with_param("project_id", config.require_project_id()?);
    locator_config.pagination.limit = config.page_size;
    locator_config.pagination.max_pages = config.max_pages;

    let http = RdsHttpClient::new(config, &locator_config.list_key)?;
    Ok(ResourceLocator::new(http, locator_config))
}

/// Format locate errors into user-friendly messages
pub fn format_locate_error(err: &LocateError) -> String {
    match err {
        LocateError::Transport(transport) => match transport {
            TransportError::Status { status: 401, .. } => {
                "Unauthorized - check HCSO_AUTH_TOKEN".to_string()
            }
            TransportError::Status { status: 403, .. } => {
                "Access denied - check IAM permissions for RDS".to_string()
            }
            TransportError::Status { status: 404, .. } => {
                "Instance not found - check the instance ID and project".to_string()
            }
            TransportError::Http(e) if e.is_timeout() => {
                "Request timed out - check connection".to_string()
            }
            TransportError::Http(e) if e.is_connect() => {
                "Connection failed - check endpoint and network".to_string()
            }
            _ => truncate_message(err.to_string()),
        },
        _ => err.to_string(),
    }
}

fn truncate_message(message: String) -> String {
    if message.chars().count() > 120 {
        let truncated: String = message.chars().take(120).collect();
        format!("{}...", truncated)
    } else {
        message
    }
}
