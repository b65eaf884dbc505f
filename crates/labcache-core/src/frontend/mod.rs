//! Cache frontend: route a DUT to its subnet and pick a healthy backend.
//!
//! Selection is deterministic on the artifact path. With a fixed snapshot
//! and fixed health outcomes the same `(dut, path)` always yields the same
//! backend; when that backend is unhealthy its share moves to the next one
//! in sorted order and moves back once it recovers.

mod artifact_url;
mod selection;


use labcache_types::AssignError;
use std::future::Future;
use std::net::Ipv4Addr;
use std::sync::Arc;
use url::Url;

use crate::context::CallContext;
use crate::environment::Environment;

pub use artifact_url::{artifact_path, download_url};
pub use selection::{find_subnet, fnv1a32, probe_order, select_backend};

pub struct Frontend {
    env: Arc<dyn Environment>,
}

impl Frontend {
    pub fn new(env: Arc<dyn Environment>) -> Self {
        Self { env }
    }

    pub fn environment(&self) -> &Arc<dyn Environment> {
        &self.env
    }

    /// Assign a backend for `artifact_path` to the DUT at `dut_address`.
    pub async fn assign_backend(&self, dut_address: &str, artifact_path: &str) -> Result<String, AssignError> {
        self.assign_backend_with(&CallContext::background(), dut_address, artifact_path).await
    }

    /// [`Frontend::assign_backend`] under the caller's cancellation and
    /// deadline. Cancelling aborts any in-flight refresh or health probe.
    pub async fn assign_backend_with(
        &self,
        ctx: &CallContext,
        dut_address: &str,
        artifact_path: &str,
    ) -> Result<String, AssignError> {
        let ip = parse_dut_address(dut_address)?;
        if artifact_path.is_empty() {
            return Err(AssignError::EmptyArtifactPath);
        }
        run_with_context(ctx, self.assign(ctx, ip, artifact_path)).await
    }

    /// Rewrite `artifact_url` to the download URL on the DUT's backend.
    pub async fn cache_url_for_dut(
        &self,
        ctx: &CallContext,
        dut_address: &str,
        artifact_url: &str,
    ) -> Result<Url, AssignError> {
        let path = artifact_path(artifact_url)?;
        let backend = self.assign_backend_with(ctx, dut_address, &path).await?;
        let url = download_url(&backend, &path)?;
        tracing::info!(dut = %dut_address, url = %url, "Assigned cache URL");
        Ok(url)
    }

    async fn assign(&self, ctx: &CallContext, ip: Ipv4Addr, artifact_path: &str) -> Result<String, AssignError> {
        let topology = self.env.snapshot(ctx).await;
        let subnet = find_subnet(&topology, ip)
            .ok_or_else(|| AssignError::NotInAnySubnet { address: ip.to_string() })?;

        match select_backend(self.env.as_ref(), subnet, artifact_path).await {
            Some(backend) => {
                tracing::debug!(dut = %ip, cidr = %subnet.cidr(), backend = %backend, "Selected backend");
                Ok(backend.to_string())
            },
            None => {
                tracing::warn!(dut = %ip, cidr = %subnet.cidr(), "All backends in subnet are unhealthy");
                Err(AssignError::NoHealthyBackend {
                    cidr: subnet.cidr().to_string(),
                    tried: subnet.backends().len(),
                })
            },
        }
    }
}

fn parse_dut_address(raw: &str) -> Result<Ipv4Addr, AssignError> {
    raw.trim().parse::<Ipv4Addr>().map_err(|e| AssignError::InvalidAddress {
        address: raw.to_string(),
        message: e.to_string(),
    })
}

/// Race `fut` against the caller's cancellation and deadline. The losing
/// future is dropped, which aborts whatever I/O it had in flight.
async fn run_with_context<T, F>(ctx: &CallContext, fut: F) -> Result<T, AssignError>
where
    F: Future<Output = Result<T, AssignError>>,
{
    let deadline = async {
        match ctx.deadline() {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        () = ctx.cancel_token().cancelled() => Err(AssignError::Cancelled),
        () = deadline => Err(AssignError::DeadlineExceeded),
        result = fut => result,
    }
}
