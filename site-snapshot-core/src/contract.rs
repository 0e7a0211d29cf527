//! # contract: the search cluster's administrative surface
//!
//! [`IndexAdmin`] is the seam between the snapshot sequence and the cluster.
//! The real implementation is [`crate::elasticsearch::ElasticsearchAdmin`];
//! tests use the `mockall`-generated `MockIndexAdmin` to script responses and
//! assert on call order.
//!
//! Implementations must not retry. A failed call is reported once, as an
//! [`AdminError`], and the caller decides what to do next.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::AdminError;
use crate::index::IndexName;

/// A successful (2xx) administrative response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminResponse {
    pub status: u16,
    pub body: String,
}

impl AdminResponse {
    pub fn ok(body: &str) -> Self {
        AdminResponse {
            status: 200,
            body: body.to_string(),
        }
    }
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait IndexAdmin: Send + Sync {
    /// Set or clear `index.blocks.write` on an index.
    async fn set_write_block(
        &self,
        index: &IndexName,
        blocked: bool,
    ) -> Result<AdminResponse, AdminError>;

    /// Clone `source` into a new index named `target`.
    async fn clone_index(
        &self,
        source: &IndexName,
        target: &IndexName,
    ) -> Result<AdminResponse, AdminError>;

    /// Block until `index` reaches at least yellow health or `timeout` elapses
    /// on the cluster side.
    async fn wait_for_index(
        &self,
        index: &IndexName,
        timeout: Duration,
    ) -> Result<AdminResponse, AdminError>;
}
