//! Indirect probe that runs `curl` on the backend host over SSH.
//!
//! DUT subnets may be restricted so the frontend cannot open TCP connections
//! to a backend itself. The host running the backend can, so the fetch is
//! executed there and only the exit status comes back.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use url::Url;

use super::HealthProbe;

const DEFAULT_SSH_PROGRAM: &str = "ssh";

#[derive(Debug, Clone)]
pub struct SshCurlProbe {
    program: String,
}

impl Default for SshCurlProbe {
    fn default() -> Self {
        Self { program: DEFAULT_SSH_PROGRAM.to_string() }
    }
}

impl SshCurlProbe {
    /// Use `program` in place of `ssh`. It is invoked as
    /// `program <host> curl <backend>`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    fn command(&self, host: &str, backend: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(host)
            .arg("curl")
            .arg(backend)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl HealthProbe for SshCurlProbe {
    async fn probe(&self, backend: &str) -> bool {
        let host = match Url::parse(backend) {
            Ok(url) => match url.host_str() {
                Some(host) => host.to_string(),
                None => {
                    tracing::warn!(backend = %backend, "Backend URL has no host, reporting unhealthy");
                    return false;
                },
            },
            Err(e) => {
                tracing::warn!(backend = %backend, error = %e, "Unparseable backend URL, reporting unhealthy");
                return false;
            },
        };

        match self.command(&host, backend).status().await {
            Ok(status) if status.success() => true,
            Ok(status) => {
                tracing::debug!(backend = %backend, host = %host, status = %status, "SSH probe exited non-zero");
                false
            },
            Err(e) => {
                tracing::debug!(backend = %backend, program = %self.program, error = %e, "SSH probe could not run");
                false
            },
        }
    }
}
