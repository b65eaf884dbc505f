//! Subnet lookup and deterministic backend selection.

use labcache_types::models::Subnet;
use std::net::Ipv4Addr;

use crate::environment::Environment;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over the UTF-8 bytes of `key`.
///
/// Independent callers must agree on where a path lands, so the exact
/// algorithm is fixed.
pub fn fnv1a32(key: &str) -> u32 {
    key.bytes()
        .fold(FNV_OFFSET_BASIS, |hash, byte| (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME))
}

/// The subnet containing `ip`, if any. Published topologies are disjoint,
/// so the first match is the only match.
pub fn find_subnet(subnets: &[Subnet], ip: Ipv4Addr) -> Option<&Subnet> {
    subnets.iter().find(|s| s.contains(ip))
}

/// Order in which backends are probed for `artifact_path`: start at
/// `hash mod n` and walk forward, wrapping around.
pub fn probe_order<'a>(subnet: &'a Subnet, artifact_path: &str) -> impl Iterator<Item = &'a str> + 'a {
    let backends = subnet.backends();
    let n = backends.len();
    let start = if n == 0 { 0 } else { fnv1a32(artifact_path) as usize % n };
    (0..n).map(move |offset| backends[(start + offset) % n].as_str())
}

/// First healthy backend in probe order, or `None` once all `n` probes fail.
pub async fn select_backend<'a>(
    env: &dyn Environment,
    subnet: &'a Subnet,
    artifact_path: &str,
) -> Option<&'a str> {
    for candidate in probe_order(subnet, artifact_path) {
        if env.is_healthy(candidate).await {
            return Some(candidate);
        }
        tracing::debug!(backend = %candidate, cidr = %subnet.cidr(), "Backend unhealthy, trying next");
    }
    None
}
