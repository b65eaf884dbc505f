//! JSON-over-pRPC client for the fleet inventory `ListCachingServices` call.

use async_trait::async_trait;
use labcache_types::{CachingService, InventoryEndpointConfig, InventoryError, ServiceState};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::InventoryClient;

pub const LIST_CACHING_SERVICES_PATH: &str =
    "/prpc/unifiedfleet.api.v1.rpc.Fleet/ListCachingServices";

/// pRPC prepends this to JSON bodies to defeat cross-site script inclusion.
const XSSI_PREFIX: &str = ")]}'";

/// Upper bound on error bodies kept for diagnostics.
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListCachingServicesRequest {
    page_size: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    page_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListCachingServicesResponse {
    caching_services: Vec<serde_json::Value>,
    next_page_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireCachingService {
    name: String,
    port: i64,
    serving_subnets: Vec<String>,
    /// Older inventory revisions carry a single subnet
    serving_subnet: String,
    state: serde_json::Value,
}

impl From<WireCachingService> for CachingService {
    fn from(wire: WireCachingService) -> Self {
        let mut subnets = wire.serving_subnets;
        if !wire.serving_subnet.is_empty() && !subnets.contains(&wire.serving_subnet) {
            subnets.push(wire.serving_subnet);
        }
        let state = match wire.state.as_str() {
            Some(name) => ServiceState::from_proto_name(name),
            None if wire.state.is_null() => ServiceState::Unspecified,
            None => ServiceState::Other,
        };
        CachingService::new(wire.name, wire.port, subnets, state)
    }
}

pub struct PrpcInventoryClient {
    http: Client,
    config: InventoryEndpointConfig,
    bearer_token: Option<String>,
}

impl PrpcInventoryClient {
    pub fn new(config: InventoryEndpointConfig) -> Result<Self, InventoryError> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| InventoryError::Transport { message: e.to_string() })?;
        Ok(Self { http, config, bearer_token: None })
    }

    /// Send `Authorization: Bearer <token>` with every call.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.config.base_url(), LIST_CACHING_SERVICES_PATH)
    }

    async fn fetch_page(&self, page_token: &str) -> Result<ListCachingServicesResponse, InventoryError> {
        let body = ListCachingServicesRequest {
            page_size: self.config.page_size,
            page_token: page_token.to_string(),
        };

        let mut req = self
            .http
            .post(self.endpoint())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header("namespace", self.config.namespace.as_str())
            .json(&body);
        if let Some(token) = &self.bearer_token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| InventoryError::Transport { message: e.to_string() })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| InventoryError::Transport { message: e.to_string() })?;

        if !status.is_success() {
            return Err(InventoryError::Status {
                code: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        decode_response(&text)
    }

    async fn fetch_all(&self) -> Result<Vec<CachingService>, InventoryError> {
        let mut services = Vec::new();
        let mut page_token = String::new();

        loop {
            let page = self.fetch_page(&page_token).await?;
            services.extend(page.caching_services.into_iter().filter_map(decode_record));

            if page.next_page_token.is_empty() {
                break;
            }
            if page.next_page_token == page_token {
                return Err(InventoryError::Decode {
                    message: format!("page token {:?} repeated", page_token),
                });
            }
            page_token = page.next_page_token;
        }

        Ok(services)
    }
}

fn decode_response(text: &str) -> Result<ListCachingServicesResponse, InventoryError> {
    let json = text.trim_start().strip_prefix(XSSI_PREFIX).unwrap_or(text);
    serde_json::from_str(json).map_err(|e| InventoryError::from_json_error(&e))
}

/// Malformed records are dropped; the rest of the page survives.
fn decode_record(value: serde_json::Value) -> Option<CachingService> {
    match serde_json::from_value::<WireCachingService>(value) {
        Ok(wire) => Some(wire.into()),
        Err(e) => {
            tracing::warn!(error = %e, "Dropping undecodable caching service record");
            None
        },
    }
}

#[async_trait]
impl InventoryClient for PrpcInventoryClient {
    async fn list_caching_services(
        &self,
        timeout: Duration,
    ) -> Result<Vec<CachingService>, InventoryError> {
        match tokio::time::timeout(timeout, self.fetch_all()).await {
            Ok(result) => result,
            Err(_) => Err(InventoryError::Timeout { millis: timeout.as_millis() as u64 }),
        }
    }
}
