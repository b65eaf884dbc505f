//! Routed network segments and the caching backends reachable from them.

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::Arc;
use url::Url;

use crate::error::SubnetError;

/// Immutable, consistently observed set of subnets, sorted by CIDR.
///
/// Published behind an atomic pointer; readers hold the `Arc` for the
/// duration of one call and never observe a partially built value.
pub type Topology = Arc<Vec<Subnet>>;

/// One routed network segment served by a fixed set of caching backends.
///
/// Deserialization goes through [`Subnet::new`], so a decoded subnet is
/// masked, sorted and non-empty like any other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSubnet")]
pub struct Subnet {
    cidr: Ipv4Net,
    backends: Vec<String>,
}

#[derive(Deserialize)]
struct RawSubnet {
    cidr: Ipv4Net,
    backends: Vec<String>,
}

impl TryFrom<RawSubnet> for Subnet {
    type Error = SubnetError;

    fn try_from(raw: RawSubnet) -> Result<Self, Self::Error> {
        Subnet::new(raw.cidr, raw.backends)
    }
}

impl Subnet {
    /// Build a subnet, masking the CIDR and normalizing the backend list.
    ///
    /// Backends are reduced to `scheme://host:port`, sorted lexicographically
    /// and deduplicated. Fails if no backend remains.
    pub fn new<I, S>(cidr: Ipv4Net, backends: I) -> Result<Self, SubnetError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cidr = cidr.trunc();
        let mut normalized = backends
            .into_iter()
            .map(|raw| normalize_backend_url(raw.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        normalized.sort();
        normalized.dedup();

        if normalized.is_empty() {
            return Err(SubnetError::EmptyBackends { cidr: cidr.to_string() });
        }

        Ok(Self { cidr, backends: normalized })
    }

    pub fn cidr(&self) -> Ipv4Net {
        self.cidr
    }

    /// Backends in their stable, sorted order.
    pub fn backends(&self) -> &[String] {
        &self.backends
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        self.cidr.contains(&ip)
    }

    /// True if the two subnets share at least one address.
    pub fn overlaps(&self, other: &Subnet) -> bool {
        nets_overlap(self.cidr, other.cidr)
    }
}

fn nets_overlap(a: Ipv4Net, b: Ipv4Net) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}

/// Reduce a backend URL to `scheme://host:port`.
///
/// Path, query and trailing slash are dropped so that two spellings of one
/// endpoint sort and hash identically.
pub fn normalize_backend_url(raw: &str) -> Result<String, SubnetError> {
    let invalid = |message: &str| SubnetError::InvalidBackendUrl {
        url: raw.to_string(),
        message: message.to_string(),
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
    let port = url.port_or_known_default().ok_or_else(|| invalid("missing port"))?;

    Ok(format!("{}://{}:{}", url.scheme(), host, port))
}

/// Verify that no two CIDRs share addresses.
pub fn check_disjoint<I>(cidrs: I) -> Result<(), SubnetError>
where
    I: IntoIterator<Item = Ipv4Net>,
{
    let cidrs: Vec<Ipv4Net> = cidrs.into_iter().collect();
    for (i, a) in cidrs.iter().enumerate() {
        if let Some(b) = cidrs.iter().skip(i + 1).find(|b| nets_overlap(*a, **b)) {
            return Err(SubnetError::Overlap { cidr: b.to_string(), other: a.to_string() });
        }
    }
    Ok(())
}
