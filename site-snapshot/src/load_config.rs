//! `load_config` module: loads the `snapshot-create` YAML file and injects credentials from the environment.
//!
//! The YAML file holds no secrets. Elasticsearch credentials come from
//! `ELASTICSEARCH_USERNAME` / `ELASTICSEARCH_PASSWORD` (a `.env` file is read
//! by `main`), and both are optional.
//!
//! Example:
//!
//! ```yaml
//! site:
//!   url: https://drupal-static-elasticsearch.ddev.site:4443
//!   export_dir: .wget-export
//!   cache_clear_command: drush cr
//! elasticsearch:
//!   url: https://drupal-static-elasticsearch.ddev.site:9201
//!   source_index: db_default
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use site_snapshot_core::elasticsearch::DEFAULT_REQUEST_TIMEOUT;
use site_snapshot_core::index::{AdminEndpoint, DEFAULT_INDEX_PREFIX, DEFAULT_SOURCE_INDEX};
use site_snapshot_core::mirror::MirrorConfig;
use site_snapshot_core::pipeline::SiteSnapshotConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

pub const USERNAME_ENV: &str = "ELASTICSEARCH_USERNAME";
pub const PASSWORD_ENV: &str = "ELASTICSEARCH_PASSWORD";

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    pub site: SiteSection,
    #[serde(default)]
    pub elasticsearch: Option<ElasticsearchSection>,
}

#[derive(Debug, Deserialize)]
pub struct SiteSection {
    pub url: String,
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
    #[serde(default)]
    pub cache_clear_command: Option<String>,
    #[serde(default = "default_mirror_program")]
    pub mirror_program: String,
}

#[derive(Deserialize)]
pub struct ElasticsearchSection {
    pub url: String,
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,
    #[serde(default = "default_source_index")]
    pub source_index: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub wait_for_clone: bool,
    #[serde(skip)]
    pub username: Option<String>,
    #[serde(skip)]
    pub password: Option<String>,
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(".wget-export")
}

fn default_mirror_program() -> String {
    "wget".to_string()
}

fn default_index_prefix() -> String {
    DEFAULT_INDEX_PREFIX.to_string()
}

fn default_source_index() -> String {
    DEFAULT_SOURCE_INDEX.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

impl SiteSection {
    pub fn to_pipeline_config(&self) -> SiteSnapshotConfig {
        let mut mirror = MirrorConfig::new(&self.url, self.export_dir.clone());
        mirror.program = self.mirror_program.clone();
        SiteSnapshotConfig {
            mirror,
            cache_clear_command: self
                .cache_clear_command
                .clone()
                .filter(|c| !c.trim().is_empty()),
        }
    }
}

impl std::fmt::Debug for ElasticsearchSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchSection")
            .field("url", &self.url)
            .field("index_prefix", &self.index_prefix)
            .field("source_index", &self.source_index)
            .field("timeout_secs", &self.timeout_secs)
            .field("wait_for_clone", &self.wait_for_clone)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ElasticsearchSection {
    pub fn endpoint(&self) -> AdminEndpoint {
        AdminEndpoint::new(&self.url).with_credentials(self.username.clone(), self.password.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Check that a configured URL is absolute http(s) with a host.
pub fn validate_url(field: &str, raw: &str) -> Result<url::Url> {
    let parsed = url::Url::parse(raw).with_context(|| format!("{field} is not a valid URL: {raw}"))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        _ => anyhow::bail!("{field} must be an http(s) URL with a host, got: {raw}"),
    }
}

/// Loads a static YAML config file (no secrets) and injects credentials from env vars.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    validate_url("site.url", &config.site.url)?;

    if let Some(es) = config.elasticsearch.as_mut() {
        validate_url("elasticsearch.url", &es.url)?;
        if es.source_index.trim().is_empty() {
            anyhow::bail!("elasticsearch.source_index must not be empty");
        }
        if es.timeout_secs == 0 {
            anyhow::bail!("elasticsearch.timeout_secs must be at least 1");
        }
        es.username = std::env::var(USERNAME_ENV).ok();
        es.password = std::env::var(PASSWORD_ENV).ok();
        info!(
            es_url = %es.url,
            username_set = es.username.as_deref().is_some_and(|u| !u.is_empty()),
            "Injected Elasticsearch credentials from environment"
        );
    }

    info!(
        site_url = %config.site.url,
        export_dir = %config.site.export_dir.display(),
        search = config.elasticsearch.is_some(),
        "Config loaded and merged successfully"
    );
    Ok(config)
}
