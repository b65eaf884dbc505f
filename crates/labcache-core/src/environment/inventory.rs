//! Topology maintained from the fleet inventory with hourly refresh.
//!
//! Refresh is inline: a `snapshot()` call that finds the deadline passed
//! takes the refresh lock, pushes the deadline out by [`REFRESH_INTERVAL`]
//! and then fetches. Callers that cross the deadline concurrently either
//! lose the `try_lock` or see the extended deadline; both read the current
//! snapshot without waiting. A failed refresh keeps the old snapshot.
//!
//! The read path takes no lock: the deadline is an atomic millisecond
//! offset from the environment's creation instant, and the topology is an
//! `ArcSwap`. A caller whose context is cancelled mid-refresh abandons the
//! fetch and reads the current snapshot.

use arc_swap::ArcSwap;
use async_trait::async_trait;
use ipnet::Ipv4Net;
use labcache_types::models::{
    normalize_backend_url, CachingService, Subnet, INVENTORY_RPC_TIMEOUT, REFRESH_INTERVAL,
};
use labcache_types::{EnvironmentError, InventoryError, Topology};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{publish, Environment};
use crate::context::CallContext;
use crate::health::{HealthProbe, SshCurlProbe};
use crate::inventory::InventoryClient;

const PROVIDER: &str = "inventory";

/// Build a topology from inventory descriptors.
///
/// Only `SERVING` descriptors are used. Records with an unusable name or
/// port are dropped, as are individual malformed CIDRs; everything else is
/// published.
pub fn assemble_inventory_topology(services: &[CachingService]) -> Topology {
    let mut buckets: BTreeMap<Ipv4Net, Vec<String>> = BTreeMap::new();

    for svc in services.iter().filter(|s| s.is_serving()) {
        let Some(backend) = svc.backend_url() else {
            tracing::warn!(name = %svc.name, port = svc.port, "Dropping caching service with unusable name or port");
            continue;
        };
        let backend = match normalize_backend_url(&backend) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(name = %svc.name, error = %e, "Dropping caching service with invalid URL");
                continue;
            },
        };

        for raw in &svc.serving_subnets {
            match raw.trim().parse::<Ipv4Net>() {
                Ok(net) => buckets.entry(net.trunc()).or_default().push(backend.clone()),
                Err(e) => tracing::warn!(
                    name = %svc.name,
                    subnet = %raw,
                    error = %e,
                    "Ignoring malformed serving subnet"
                ),
            }
        }
    }

    let subnets = buckets
        .into_iter()
        .filter_map(|(net, backends)| match Subnet::new(net, backends) {
            Ok(subnet) => Some(subnet),
            Err(e) => {
                tracing::warn!(cidr = %net, error = %e, "Dropping subnet");
                None
            },
        })
        .collect();

    publish(subnets)
}

/// Inventory-backed environment.
pub struct InventoryEnv {
    client: Arc<dyn InventoryClient>,
    probe: Arc<dyn HealthProbe>,
    topology: ArcSwap<Vec<Subnet>>,
    epoch: Instant,
    /// Refresh deadline, in milliseconds past `epoch`
    next_refresh_ms: AtomicU64,
    refresh_lock: Mutex<()>,
}

fn as_millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

impl InventoryEnv {
    /// Fetch the initial topology, probing backends with `ssh <host> curl`.
    pub async fn new(client: Arc<dyn InventoryClient>) -> Result<Self, EnvironmentError> {
        Self::with_probe(client, Arc::new(SshCurlProbe::default())).await
    }

    pub async fn with_probe(
        client: Arc<dyn InventoryClient>,
        probe: Arc<dyn HealthProbe>,
    ) -> Result<Self, EnvironmentError> {
        Self::with_context(&CallContext::background(), client, probe).await
    }

    /// Like [`InventoryEnv::with_probe`], bounding the initial fetch by the
    /// caller's deadline.
    pub async fn with_context(
        ctx: &CallContext,
        client: Arc<dyn InventoryClient>,
        probe: Arc<dyn HealthProbe>,
    ) -> Result<Self, EnvironmentError> {
        let topology = fetch_topology(client.as_ref(), ctx)
            .await
            .map_err(|e| EnvironmentError::initialization(PROVIDER, e))?;

        tracing::info!(subnets = topology.len(), "Loaded inventory cache topology");

        Ok(Self {
            client,
            probe,
            topology: ArcSwap::new(topology),
            epoch: Instant::now(),
            next_refresh_ms: AtomicU64::new(as_millis(REFRESH_INTERVAL)),
            refresh_lock: Mutex::new(()),
        })
    }

    /// When the next `snapshot()` will try to refresh.
    pub fn next_refresh(&self) -> Instant {
        self.epoch + Duration::from_millis(self.next_refresh_ms.load(Ordering::Acquire))
    }

    fn refresh_due(&self) -> bool {
        Instant::now() >= self.next_refresh()
    }

    fn push_deadline(&self) {
        let offset = as_millis(Instant::now().saturating_duration_since(self.epoch) + REFRESH_INTERVAL);
        self.next_refresh_ms.store(offset, Ordering::Release);
    }

    async fn refresh_if_due(&self, ctx: &CallContext) {
        let Ok(_guard) = self.refresh_lock.try_lock() else {
            return;
        };
        // Another caller may have finished a refresh between our check and the lock.
        if !self.refresh_due() {
            return;
        }
        self.push_deadline();

        match fetch_topology(self.client.as_ref(), ctx).await {
            Ok(topology) => {
                tracing::info!(subnets = topology.len(), "Refreshed inventory cache topology");
                self.topology.store(topology);
            },
            Err(e) => {
                tracing::warn!(error = %e, "Inventory refresh failed, keeping previous topology");
            },
        }
    }
}

async fn fetch_topology(client: &dyn InventoryClient, ctx: &CallContext) -> Result<Topology, String> {
    let timeout = ctx.effective_timeout(INVENTORY_RPC_TIMEOUT);
    let services = client
        .list_caching_services(timeout)
        .await
        .map_err(|e: InventoryError| e.to_string())?;

    let topology = assemble_inventory_topology(&services);
    if topology.is_empty() {
        return Err(format!("no usable caching services among {} records", services.len()));
    }
    Ok(topology)
}

#[async_trait]
impl Environment for InventoryEnv {
    async fn snapshot(&self, ctx: &CallContext) -> Topology {
        if self.refresh_due() {
            tokio::select! {
                biased;
                () = ctx.cancel_token().cancelled() => {
                    tracing::debug!("Caller cancelled, abandoning inventory refresh");
                },
                () = self.refresh_if_due(ctx) => {},
            }
        }
        self.topology.load_full()
    }

    async fn is_healthy(&self, backend: &str) -> bool {
        self.probe.probe(backend).await
    }
}

#[cfg(test)]
mod tests;
