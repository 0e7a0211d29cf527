//! reqwest-backed [`IndexAdmin`] for Elasticsearch.
//!
//! Wire format:
//! - `PUT {endpoint}/{index}/_settings` with `{"settings": {"index.blocks.write": <bool>}}`
//! - `POST {endpoint}/{source}/_clone/{target}` with no body
//! - `GET {endpoint}/_cluster/health/{index}?wait_for_status=yellow&timeout=<N>s`
//!
//! Credentials are sent as HTTP basic auth when present. Every request is
//! bounded by the client timeout and is never retried. The health wait is the
//! exception: its request timeout is the cluster-side wait plus
//! [`HEALTH_WAIT_MARGIN`], so the cluster's own `timed_out` answer arrives
//! before the client gives up.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info};

use crate::contract::{AdminResponse, IndexAdmin};
use crate::error::AdminError;
use crate::index::{AdminEndpoint, IndexName};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra client-side time allowed on top of a cluster-side health wait.
pub const HEALTH_WAIT_MARGIN: Duration = Duration::from_secs(5);

pub struct ElasticsearchAdmin {
    client: Client,
    endpoint: AdminEndpoint,
}

impl ElasticsearchAdmin {
    pub fn new(endpoint: AdminEndpoint, timeout: Duration) -> Result<Self, AdminError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdminError::from_reqwest(&endpoint.base_url, e))?;
        info!(
            base_url = %endpoint.base_url,
            auth = endpoint.basic_auth().is_some(),
            timeout_secs = timeout.as_secs(),
            "Initialized Elasticsearch admin client"
        );
        Ok(ElasticsearchAdmin { client, endpoint })
    }

    pub fn endpoint(&self) -> &AdminEndpoint {
        &self.endpoint
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match self.endpoint.basic_auth() {
            Some((user, pass)) => req.basic_auth(user, pass),
            None => req,
        }
    }

    async fn send(&self, url: &str, req: RequestBuilder) -> Result<AdminResponse, AdminError> {
        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| {
                error!(url = %url, error = %e, "Elasticsearch request failed before a response");
                AdminError::from_reqwest(url, e)
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<Failed to decode response body>"));

        if !status.is_success() {
            error!(url = %url, status = status.as_u16(), body = %body, "Elasticsearch returned error");
            return Err(AdminError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        debug!(url = %url, status = status.as_u16(), body = %body, "Elasticsearch request succeeded");
        Ok(AdminResponse {
            status: status.as_u16(),
            body,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ClusterHealth {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    timed_out: bool,
}

#[async_trait]
impl IndexAdmin for ElasticsearchAdmin {
    async fn set_write_block(
        &self,
        index: &IndexName,
        blocked: bool,
    ) -> Result<AdminResponse, AdminError> {
        let url = self.endpoint.url(&format!("{index}/_settings"));
        let body = json!({ "settings": { "index.blocks.write": blocked } });
        info!(url = %url, blocked, "PUT index write block");
        self.send(&url, self.client.put(&url).json(&body)).await
    }

    async fn clone_index(
        &self,
        source: &IndexName,
        target: &IndexName,
    ) -> Result<AdminResponse, AdminError> {
        let url = self.endpoint.url(&format!("{source}/_clone/{target}"));
        info!(url = %url, "POST index clone");
        self.send(&url, self.client.post(&url)).await
    }

    async fn wait_for_index(
        &self,
        index: &IndexName,
        timeout: Duration,
    ) -> Result<AdminResponse, AdminError> {
        let url = self.endpoint.url(&format!("_cluster/health/{index}"));
        let wait = format!("{}s", timeout.as_secs());
        info!(url = %url, timeout = %wait, "GET cluster health for clone");
        let req = self
            .client
            .get(&url)
            .query(&[("wait_for_status", "yellow"), ("timeout", wait.as_str())])
            .timeout(timeout + HEALTH_WAIT_MARGIN);
        let response = self.send(&url, req).await?;

        // The health API answers 200 with `timed_out: true` when the wait expires.
        match serde_json::from_str::<ClusterHealth>(&response.body) {
            Ok(health) if health.timed_out => Err(AdminError::Status {
                url,
                status: response.status,
                body: response.body,
            }),
            Ok(health) => {
                info!(index = %index, status = ?health.status, "Clone reported healthy");
                Ok(response)
            }
            Err(e) => {
                error!(error = %e, body = %response.body, "Unparseable cluster health response");
                Err(AdminError::Status {
                    url,
                    status: response.status,
                    body: response.body,
                })
            }
        }
    }
}
