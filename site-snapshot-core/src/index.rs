use std::fmt;

use thiserror::Error;

/// Namespace prepended to every index name created by the Drupal search module.
pub const DEFAULT_INDEX_PREFIX: &str = "elasticsearch_index_";

/// Short name of the index the site writes to.
pub const DEFAULT_SOURCE_INDEX: &str = "db_default";

/// Characters Elasticsearch refuses anywhere in an index name.
const FORBIDDEN_INDEX_CHARS: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ' ', ',', '#', ':'];

const MAX_INDEX_NAME_BYTES: usize = 255;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid index name {name:?}: {reason}")]
pub struct InvalidIndexName {
    pub name: String,
    pub reason: String,
}

/// A full (prefixed) search index name, e.g. `elasticsearch_index_db_default`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexName(String);

impl IndexName {
    /// Joins the namespace prefix and a short index name.
    pub fn prefixed(prefix: &str, short_name: &str) -> Self {
        IndexName(format!("{prefix}{short_name}"))
    }

    /// Checks the name against the cluster's index naming rules, so a bad
    /// name is caught before the source index is frozen.
    pub fn validate(&self) -> Result<(), InvalidIndexName> {
        let name = self.0.as_str();
        let reason = if name.is_empty() {
            Some("empty".to_string())
        } else if name == "." || name == ".." {
            Some("reserved name".to_string())
        } else if name.len() > MAX_INDEX_NAME_BYTES {
            Some(format!("longer than {MAX_INDEX_NAME_BYTES} bytes"))
        } else if name.starts_with(['-', '_', '+']) {
            Some("must not start with '-', '_' or '+'".to_string())
        } else if name.chars().any(char::is_uppercase) {
            Some("must be lowercase".to_string())
        } else {
            name.chars()
                .find(|c| FORBIDDEN_INDEX_CHARS.contains(c))
                .map(|c| format!("contains forbidden character {c:?}"))
        };
        match reason {
            Some(reason) => Err(InvalidIndexName {
                name: name.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Base URL and optional credentials for the cluster's administrative HTTP API.
#[derive(Clone)]
pub struct AdminEndpoint {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl AdminEndpoint {
    pub fn new(base_url: &str) -> Self {
        AdminEndpoint {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: None,
            password: None,
        }
    }

    /// Empty strings count as "no credential", matching how the task runner passed them.
    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username.filter(|u| !u.is_empty());
        self.password = password.filter(|p| !p.is_empty());
        self
    }

    /// Basic auth pair to send, if any credential was supplied.
    pub fn basic_auth(&self) -> Option<(&str, Option<&str>)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (None, None) => None,
            (user, pass) => Some((user.unwrap_or(""), pass)),
        }
    }

    /// Joins a path onto the base URL without doubling slashes.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

// Keeps the password out of logs.
impl fmt::Debug for AdminEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminEndpoint")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// The pair of indices one snapshot run operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRequest {
    pub source: IndexName,
    pub snapshot: IndexName,
}

impl SnapshotRequest {
    /// Builds both prefixed names, rejecting any the cluster would refuse.
    pub fn new(
        prefix: &str,
        source_short: &str,
        snapshot_id: &str,
    ) -> Result<Self, InvalidIndexName> {
        let request = SnapshotRequest {
            source: IndexName::prefixed(prefix, source_short),
            snapshot: IndexName::prefixed(prefix, snapshot_id),
        };
        request.source.validate()?;
        request.snapshot.validate()?;
        Ok(request)
    }
}
