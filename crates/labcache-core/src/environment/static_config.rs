//! Topology from a single line-oriented configuration file.
//!
//! Two lines matter:
//!
//! ```text
//! dev_server = http://1.1.1.1:8082,http://1.1.2.1:8082
//! restricted_subnets = 1.1.1.0/24,1.1.2.0/24
//! ```
//!
//! Each `dev_server` entry names the administrative endpoint of a backend
//! host. Clients are sent to the caching endpoint on the same host, so the
//! port is rewritten to [`PUBLISH_PORT`] before the backend is stored.

use async_trait::async_trait;
use ipnet::Ipv4Net;
use labcache_types::models::{check_disjoint, normalize_backend_url, Subnet, PUBLISH_PORT};
use labcache_types::{EnvironmentError, Topology};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;
use url::{Host, Url};

use super::{publish, Environment};
use crate::context::CallContext;
use crate::health::{HealthProbe, HttpProbe};

const PROVIDER: &str = "static-config";
const BACKENDS_KEY: &str = "dev_server";
const SUBNETS_KEY: &str = "restricted_subnets";

/// The two recognized values of a static configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticConfig {
    /// Backend base URLs, exactly as written
    pub backends: Vec<String>,
    /// Restricted subnets, masked
    pub subnets: Vec<Ipv4Net>,
}

/// Parse the configuration text. Only the first occurrence of each key is
/// used; unrecognized lines are ignored.
pub fn parse_static_config(text: &str) -> Result<StaticConfig, EnvironmentError> {
    let mut backends_line = None;
    let mut subnets_line = None;

    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim() {
            BACKENDS_KEY if backends_line.is_none() => backends_line = Some(value.trim()),
            SUBNETS_KEY if subnets_line.is_none() => subnets_line = Some(value.trim()),
            _ => {},
        }
    }

    let backends = split_list(backends_line, BACKENDS_KEY)?;
    let subnets = split_list(subnets_line, SUBNETS_KEY)?
        .iter()
        .map(|raw| {
            raw.parse::<Ipv4Net>().map(|net| net.trunc()).map_err(|e| {
                EnvironmentError::initialization(PROVIDER, format!("malformed CIDR {:?}: {}", raw, e))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(StaticConfig { backends, subnets })
}

fn split_list(line: Option<&str>, key: &str) -> Result<Vec<String>, EnvironmentError> {
    let value = line.ok_or_else(|| {
        EnvironmentError::initialization(PROVIDER, format!("missing `{} = ` line", key))
    })?;

    let items: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();

    if items.is_empty() {
        return Err(EnvironmentError::initialization(PROVIDER, format!("`{}` is empty", key)));
    }
    Ok(items)
}

/// Resolve a configured backend to its host IP and publish URL.
fn publish_endpoint(raw: &str) -> Result<(Ipv4Addr, String), EnvironmentError> {
    let malformed = |message: String| {
        EnvironmentError::initialization(PROVIDER, format!("malformed backend URL {:?}: {}", raw, message))
    };

    let mut url = Url::parse(raw).map_err(|e| malformed(e.to_string()))?;
    let ip = match url.host() {
        Some(Host::Ipv4(ip)) => ip,
        Some(other) => return Err(malformed(format!("host {} is not an IPv4 address", other))),
        None => return Err(malformed("missing host".to_string())),
    };
    url.set_port(Some(PUBLISH_PORT)).map_err(|()| malformed("cannot carry a port".to_string()))?;

    let endpoint = normalize_backend_url(url.as_str()).map_err(|e| malformed(e.to_string()))?;
    Ok((ip, endpoint))
}

/// Group backends into their restricted subnets.
///
/// Backends outside every listed subnet are dropped: the configuration is
/// authoritative and such hosts are unreachable from any DUT it covers.
fn build_subnets(config: &StaticConfig) -> Result<Vec<Subnet>, EnvironmentError> {
    check_disjoint(config.subnets.iter().copied())
        .map_err(|e| EnvironmentError::initialization(PROVIDER, format!("restricted {}", e)))?;

    let mut buckets: BTreeMap<Ipv4Net, Vec<String>> =
        config.subnets.iter().map(|net| (*net, Vec::new())).collect();

    for raw in &config.backends {
        let (ip, endpoint) = publish_endpoint(raw)?;
        match buckets.iter_mut().find(|(net, _)| net.contains(&ip)) {
            Some((_, bucket)) => bucket.push(endpoint),
            None => tracing::debug!(backend = %raw, "Backend is outside every restricted subnet, ignoring"),
        }
    }

    let subnets: Vec<Subnet> = buckets
        .into_iter()
        .filter(|(_, backends)| !backends.is_empty())
        .map(|(net, backends)| Subnet::new(net, backends))
        .collect::<Result<_, _>>()
        .map_err(|e| EnvironmentError::initialization(PROVIDER, e.to_string()))?;

    Ok(subnets)
}

/// Fixed topology parsed once at construction.
pub struct StaticConfigEnv {
    topology: Topology,
    probe: Arc<dyn HealthProbe>,
}

impl std::fmt::Debug for StaticConfigEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticConfigEnv").field("topology", &self.topology).finish_non_exhaustive()
    }
}

impl StaticConfigEnv {
    /// Load from `path`, probing backends with a direct HTTP GET.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EnvironmentError> {
        Self::load_with_probe(path, Arc::new(HttpProbe::default()))
    }

    pub fn load_with_probe(
        path: impl AsRef<Path>,
        probe: Arc<dyn HealthProbe>,
    ) -> Result<Self, EnvironmentError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EnvironmentError::from_io_error(PROVIDER, path, &e))?;
        Self::from_text(&text, probe)
    }

    pub fn from_text(text: &str, probe: Arc<dyn HealthProbe>) -> Result<Self, EnvironmentError> {
        let config = parse_static_config(text)?;
        Self::from_config(&config, probe)
    }

    pub fn from_config(config: &StaticConfig, probe: Arc<dyn HealthProbe>) -> Result<Self, EnvironmentError> {
        let subnets = build_subnets(config)?;
        let topology = publish(subnets);
        tracing::info!(subnets = topology.len(), "Loaded static cache topology");

        Ok(Self { topology, probe })
    }

    /// The topology, without going through the async trait.
    pub fn topology(&self) -> Topology {
        Arc::clone(&self.topology)
    }
}

#[async_trait]
impl Environment for StaticConfigEnv {
    async fn snapshot(&self, _ctx: &CallContext) -> Topology {
        Arc::clone(&self.topology)
    }

    async fn is_healthy(&self, backend: &str) -> bool {
        self.probe.probe(backend).await
    }
}
