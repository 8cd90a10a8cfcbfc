//! Resource locator
//!
//! Finds a single database by its composite identifier when the API only
//! offers a paginated listing of every database in an instance.

use super::identifier::{CompositeId, MalformedIdentifier};
use super::normalize::build_collection;
use super::paginate::fetch_all;
use super::path_query::{PathQuery, QueryError};
use super::protocol::{PageSource, PaginationConfig, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// List endpoint for the databases of an RDS SQL Server instance
pub const DEFAULT_PATH_TEMPLATE: &str = "v3/{project_id}/instances/{instance_id}/database/detail";

#[derive(Debug, Error)]
pub enum LocateError {
    #[error(transparent)]
    MalformedIdentifier(#[from] MalformedIdentifier),

    #[error("error retrieving RDS SQLServer database: {0}")]
    Transport(#[from] TransportError),

    #[error("error get RDS SQLServer database by instanceID {instance_id} and name {name}")]
    NotFound { instance_id: String, name: String },

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("RDS SQLServer database {name} still exists in instance {instance_id}")]
    StillExists { instance_id: String, name: String },
}

/// Where and how to look for a record
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocatorConfig {
    /// Request path; `{instance_id}` and every key of `params` are substituted
    #[serde(default = "default_path_template")]
    pub path_template: String,

    /// Response key holding the list items
    #[serde(default = "default_list_key")]
    pub list_key: String,

    /// Item field compared against the name segment of the identifier
    #[serde(default = "default_match_field")]
    pub match_field: String,

    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Extra path template parameters (e.g., `project_id`)
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

fn default_path_template() -> String {
    DEFAULT_PATH_TEMPLATE.to_string()
}

fn default_list_key() -> String {
    "databases".to_string()
}

fn default_match_field() -> String {
    "name".to_string()
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            path_template: default_path_template(),
            list_key: default_list_key(),
            match_field: default_match_field(),
            pagination: PaginationConfig::default(),
            params: BTreeMap::new(),
        }
    }
}

impl LocatorConfig {
    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }
}

/// Replace `{key}` placeholders in `template`, URL-encoding each value
pub fn render_path<'a, I>(template: &str, params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut path = template.to_string();
    for (key, value) in params {
        path = path.replace(&format!("{{{}}}", key), &urlencoding::encode(value));
    }
    path
}

/// Looks records up through a [`PageSource`]
///
/// The locator holds no mutable state, so one instance can serve concurrent
/// lookups whenever its source can.
pub struct ResourceLocator<S> {
    source: S,
    config: LocatorConfig,
}

impl<S: PageSource> ResourceLocator<S> {
    pub fn new(source: S, config: LocatorConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Find the record addressed by `raw_id` (`<instance_id>/<name>`)
    pub fn locate(&self, raw_id: &str) -> Result<Value, LocateError> {
        let id: CompositeId = raw_id.parse()?;
        self.locate_id(&id)
    }

    pub fn locate_id(&self, id: &CompositeId) -> Result<Value, LocateError> {
        let query = PathQuery::first_match(&self.config.list_key, &self.config.match_field, &id.name)?;
        let path = self.request_path(id);
        debug!("Locating {} via {} with query {}", id, path, query);

        let items = fetch_all(&self.source, &path, &self.config.pagination)?;
        debug!("Fetched {} items for instance {}", items.len(), id.instance_id);

        let tree = build_collection(&self.config.list_key, &items).map_err(TransportError::from)?;
        match query.search(&tree) {
            Value::Null => Err(LocateError::NotFound {
                instance_id: id.instance_id.clone(),
                name: id.name.clone(),
            }),
            record => Ok(record),
        }
    }

    /// Succeeds only when the record addressed by `raw_id` no longer exists
    pub fn locate_absent(&self, raw_id: &str) -> Result<(), LocateError> {
        let id: CompositeId = raw_id.parse()?;
        match self.locate_id(&id) {
            Err(LocateError::NotFound { .. }) => Ok(()),
            Ok(_) => Err(LocateError::StillExists {
                instance_id: id.instance_id,
                name: id.name,
            }),
            Err(e) => Err(e),
        }
    }

    /// Request path for the listing that contains `id`
    pub fn request_path(&self, id: &CompositeId) -> String {
        let params = self
            .config
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .chain(std::iter::once(("instance_id", id.instance_id.as_str())));
        render_path(&self.config.path_template, params)
    }
}
