//! Backend health probes.
//!
//! A probe is a side-effecting, point-in-time check of one backend. Results
//! are never cached; every call may issue fresh I/O. Probes must not fail:
//! anything that goes wrong is reported as unhealthy.
//!
//! # Implementations
//!
//! ```text
//! ┌──────────────────┬──────────────────────────────────────────────┐
//! │ HttpProbe        │ GET <backend> directly from this process     │
//! │ SshCurlProbe     │ `ssh <host> curl <backend>` on a reachable host │
//! │ Fn(&str) -> bool │ injected predicate (tests, custom wiring)     │
//! └──────────────────┴──────────────────────────────────────────────┘
//! ```

mod http;
mod ssh;


use async_trait::async_trait;

pub use http::HttpProbe;
pub use ssh::SshCurlProbe;

/// Point-in-time health judgement about a backend URL.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, backend: &str) -> bool;
}

#[async_trait]
impl<F> HealthProbe for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    async fn probe(&self, backend: &str) -> bool {
        self(backend)
    }
}
