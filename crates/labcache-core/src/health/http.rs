//! Direct HTTP health probe.

use async_trait::async_trait;
use reqwest::Client;

use super::HealthProbe;

/// Healthy iff a GET against the backend yields any HTTP response.
///
/// Status codes are not inspected: a backend that answers at all is up.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl HttpProbe {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self, backend: &str) -> bool {
        match self.client.get(backend).send().await {
            Ok(resp) => {
                tracing::trace!(backend = %backend, status = %resp.status(), "HTTP probe answered");
                true
            },
            Err(e) => {
                tracing::debug!(backend = %backend, error = %e, "HTTP probe failed");
                false
            },
        }
    }
}
