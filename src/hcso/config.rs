//! Configuration loading
//!
//! Sources, lowest precedence first:
//! - Profile section of the config file (~/.hcso/config or HCSO_CONFIG_FILE)
//! - Environment variables (HCSO_REGION_NAME, HCSO_PROJECT_ID, HCSO_RDS_ENDPOINT,
//!   HCSO_AUTH_TOKEN)
//!
//! Command-line flags are applied on top by the binary.

use crate::resource::protocol::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE};
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_DOMAIN: &str = "myhuaweicloud.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub region: Option<String>,
    pub project_id: Option<String>,
    /// Overrides the endpoint derived from region and domain
    pub endpoint: Option<String>,
    pub domain: String,
    /// Sent as X-Auth-Token when present
    pub auth_token: Option<String>,
    pub timeout_secs: u64,
    pub page_size: u32,
    pub max_pages: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: None,
            project_id: None,
            endpoint: None,
            domain: DEFAULT_DOMAIN.to_string(),
            auth_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl Config {
    /// Project the list path is scoped to
    pub fn require_project_id(&self) -> Result<&str> {
        self.project_id
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| anyhow!("No project ID configured. Set HCSO_PROJECT_ID or use --project-id"))
    }

    /// Base URL of the RDS service, always ending in '/'
    pub fn rds_endpoint(&self) -> Result<String> {
        let endpoint = match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => {
                let region = self
                    .region
                    .as_deref()
                    .filter(|r| !r.is_empty())
                    .ok_or_else(|| anyhow!("No region configured. Set HCSO_REGION_NAME or use --region"))?;
                format!("https://rds.{}.{}/", region, self.domain)
            }
        };

        if endpoint.ends_with('/') {
            Ok(endpoint)
        } else {
            Ok(format!("{}/", endpoint))
        }
    }

    fn apply_section(&mut self, section: &HashMap<String, String>) -> Result<()> {
        for (key, value) in section {
            match key.as_str() {
                "region" => self.region = Some(value.clone()),
                "project_id" => self.project_id = Some(value.clone()),
                "endpoint" => self.endpoint = Some(value.clone()),
                "domain" => self.domain = value.clone(),
                "auth_token" => self.auth_token = Some(value.clone()),
                "timeout_secs" => {
                    self.timeout_secs = value
                        .parse()
                        .with_context(|| format!("Invalid timeout_secs '{}'", value))?
                }
                "page_size" => {
                    self.page_size = value
                        .parse()
                        .with_context(|| format!("Invalid page_size '{}'", value))?
                }
                "max_pages" => {
                    self.max_pages = value
                        .parse()
                        .with_context(|| format!("Invalid max_pages '{}'", value))?
                }
                other => debug!("Ignoring unknown config key '{}'", other),
            }
        }
        Ok(())
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(region) = lookup("HCSO_REGION_NAME") {
            self.region = Some(region);
        }
        if let Some(project_id) = lookup("HCSO_PROJECT_ID") {
            self.project_id = Some(project_id);
        }
        if let Some(endpoint) = lookup("HCSO_RDS_ENDPOINT") {
            self.endpoint = Some(endpoint);
        }
        if let Some(token) = lookup("HCSO_AUTH_TOKEN") {
            self.auth_token = Some(token);
        }
    }
}

/// Location of the config file
pub fn config_file_path() -> Result<PathBuf> {
    if let Ok(path) = env::var("HCSO_CONFIG_FILE") {
        return Ok(PathBuf::from(path));
    }

    dirs::home_dir()
        .map(|h| h.join(".hcso").join("config"))
        .ok_or_else(|| anyhow!("Could not find home directory"))
}

/// Load configuration for `profile` from the config file and environment
pub fn load_config(profile: &str) -> Result<Config> {
    let path = config_file_path().ok();
    load_config_from(profile, path.as_deref(), |key| env::var(key).ok())
}

pub fn load_config_from<F>(profile: &str, path: Option<&Path>, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = Config::default();

    if let Some(path) = path.filter(|p| p.exists()) {
        let content =
            fs::read_to_string(path).with_context(|| format!("Could not read {:?}", path))?;
        let sections = parse_ini_file(&content);
        match sections.get(profile) {
            Some(section) => {
                debug!("Loaded profile '{}' from {:?}", profile, path);
                config.apply_section(section)?;
            }
            None if profile != "default" => {
                return Err(anyhow!("Profile '{}' not found in {:?}", profile, path));
            }
            None => debug!("No default profile in {:?}", path),
        }
    }

    config.apply_env(lookup);
    Ok(config)
}

/// Parse an INI-style file into sections
fn parse_ini_file(content: &str) -> HashMap<String, HashMap<String, String>> {
    let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current_section = String::new();

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            current_section = line[1..line.len() - 1].trim().to_string();
            if let Some(name) = current_section.strip_prefix("profile ") {
                current_section = name.trim().to_string();
            }
            sections.entry(current_section.clone()).or_default();
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            if !current_section.is_empty() {
                sections
                    .entry(current_section.clone())
                    .or_default()
                    .insert(key.trim().to_string(), value.trim().to_string());
            }
        }
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_ini_file() {
        let content = r#"
# comment
[default]
region = cn-north-4
project_id = 0123456789abcdef

[profile staging]
region=cn-south-1
; another comment
endpoint = https://rds.internal.example.com
"#;

        let sections = parse_ini_file(content);
        assert_eq!(sections["default"]["region"], "cn-north-4");
        assert_eq!(sections["default"]["project_id"], "0123456789abcdef");
        assert_eq!(sections["staging"]["region"], "cn-south-1");
        assert_eq!(
            sections["staging"]["endpoint"],
            "https://rds.internal.example.com"
        );
    }

    #[test]
    fn test_load_profile_from_file() {
        let file = write_config(
            "[staging]\nregion = cn-south-1\nproject_id = p1\npage_size = 50\nmax_pages = 7\n",
        );

        let config = load_config_from("staging", Some(file.path()), no_env).unwrap();
        assert_eq!(config.region.as_deref(), Some("cn-south-1"));
        assert_eq!(config.project_id.as_deref(), Some("p1"));
        assert_eq!(config.page_size, 50);
        assert_eq!(config.max_pages, 7);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_config("[default]\nregion = cn-south-1\nproject_id = p1\n");
        let env = |key: &str| match key {
            "HCSO_REGION_NAME" => Some("cn-north-4".to_string()),
            "HCSO_AUTH_TOKEN" => Some("secret-token".to_string()),
            _ => None,
        };

        let config = load_config_from("default", Some(file.path()), env).unwrap();
        assert_eq!(config.region.as_deref(), Some("cn-north-4"));
        assert_eq!(config.project_id.as_deref(), Some("p1"));
        assert_eq!(config.auth_token.as_deref(), Some("secret-token"));
    }

    #[test]
    fn test_missing_named_profile() {
        let file = write_config("[default]\nregion = cn-south-1\n");

        let result = load_config_from("prod", Some(file.path()), no_env);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config =
            load_config_from("default", Some(Path::new("/nonexistent/hcso/config")), no_env)
                .unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_number() {
        let file = write_config("[default]\npage_size = lots\n");

        let result = load_config_from("default", Some(file.path()), no_env);
        assert!(result.is_err());
    }

    #[test]
    fn test_rds_endpoint() {
        let config = Config {
            region: Some("cn-north-4".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.rds_endpoint().unwrap(),
            "https://rds.cn-north-4.myhuaweicloud.com/"
        );

        let config = Config {
            endpoint: Some("http://127.0.0.1:8080".to_string()),
            ..Default::default()
        };
        assert_eq!(config.rds_endpoint().unwrap(), "http://127.0.0.1:8080/");

        assert!(Config::default().rds_endpoint().is_err());
    }

    #[test]
    fn test_require_project_id() {
        assert!(Config::default().require_project_id().is_err());

        let config = Config {
            project_id: Some("p1".to_string()),
            ..Default::default()
        };
        assert_eq!(config.require_project_id().unwrap(), "p1");
    }
}
