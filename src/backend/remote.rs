//! Remote session backend: XML-RPC against a long-lived unoserver.
//!
//! ## Session ownership
//!
//! A [`UnoSession`] comes in two flavours. [`UnoSession::spawn`] starts the
//! companion server itself and owns the process — when the session goes out
//! of scope the process is terminated (best effort, failures swallowed).
//! [`UnoSession::connect`] attaches to a server somebody else manages —
//! typically one in a container sharing this filesystem — and owns nothing
//! but the URL. Both wait for the server to answer a `system.listMethods`
//! probe before reporting success; a server that never becomes reachable
//! within the poll budget is a [`ErrorReason::StartFailed`].
//!
//! ## Failure mapping
//!
//! Conversion failures arrive as protocol faults and are mapped through
//! [`crate::rpc::fault_reason`]; a recognised fault always wins over the
//! transport outcome. Everything else — connection errors, non-OK statuses,
//! undecodable bodies — degrades to [`ErrorReason::Unknown`] with the
//! original cause attached. No retries: a failed conversion is not assumed
//! transient, only server startup is polled.

use crate::backend::check_output_target;
use crate::config::ConvertConfig;
use crate::error::{ConvertError, ErrorReason};
use crate::rpc::{self, RpcResponse};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Probe the server once: POST `system.listMethods` and accept any HTTP-OK
/// answer. Network failure and non-OK statuses both read as "not ready".
pub async fn probe(http: &reqwest::Client, url: &str) -> Result<(), ConvertError> {
    let response = http
        .post(url)
        .body(rpc::list_methods_call())
        .send()
        .await
        .map_err(|e| {
            ConvertError::with_cause(
                ErrorReason::StartFailed,
                format!("server at {url} is unreachable"),
                e,
            )
        })?;
    if response.status().is_success() {
        Ok(())
    } else {
        Err(ConvertError::new(
            ErrorReason::StartFailed,
            format!("server not ready (HTTP {})", response.status()),
        ))
    }
}

/// Retry [`probe`] on a fixed interval until it succeeds or the attempt
/// budget runs out. The defaults (250 ms × 40) give a server roughly ten
/// seconds to come up.
pub async fn wait_ready(
    http: &reqwest::Client,
    url: &str,
    interval: Duration,
    attempts: u32,
) -> Result<(), ConvertError> {
    let attempts = attempts.max(1);
    let mut last = ConvertError::new(ErrorReason::StartFailed, "server readiness budget exhausted");
    for attempt in 1..=attempts {
        match probe(http, url).await {
            Ok(()) => {
                debug!(url, attempt, "server ready");
                return Ok(());
            }
            Err(err) => last = err,
        }
        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }
    Err(last)
}

/// Handle to a reachable RPC session.
#[derive(Debug)]
pub struct UnoSession {
    base_url: String,
    child: Option<Child>,
}

impl UnoSession {
    /// Spawn the companion server and wait for it to become reachable at
    /// the configured endpoint.
    ///
    /// If readiness never arrives, the freshly spawned process is
    /// terminated before the error is returned — a half-started server must
    /// not outlive the failed call.
    pub async fn spawn(
        http: &reqwest::Client,
        config: &ConvertConfig,
    ) -> Result<Self, ConvertError> {
        let (program, args) = config
            .server_command
            .split_first()
            .ok_or_else(|| ConvertError::new(ErrorReason::StartFailed, "server command is empty"))?;

        info!(command = %config.server_command.join(" "), "spawning companion server");
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ConvertError::with_cause(
                    ErrorReason::StartFailed,
                    format!("failed to spawn server '{program}'"),
                    e,
                )
            })?;

        let mut session = Self {
            base_url: config.server_url.clone(),
            child: Some(child),
        };
        if let Err(err) = wait_ready(
            http,
            &session.base_url,
            config.ready_poll_interval,
            config.ready_poll_attempts,
        )
        .await
        {
            session.shutdown().await;
            return Err(ConvertError::with_cause(
                ErrorReason::StartFailed,
                "failed to start server",
                err,
            ));
        }
        Ok(session)
    }

    /// Attach to an externally managed server, waiting until it is
    /// reachable. The session owns no process.
    ///
    /// Note that the server works on filesystem paths, so it is only useful
    /// when it shares a filesystem with this process (same host, or a
    /// container with a matching bind mount).
    pub async fn connect(
        http: &reqwest::Client,
        url: impl Into<String>,
        config: &ConvertConfig,
    ) -> Result<Self, ConvertError> {
        let base_url = url.into();
        wait_ready(
            http,
            &base_url,
            config.ready_poll_interval,
            config.ready_poll_attempts,
        )
        .await?;
        Ok(Self {
            base_url,
            child: None,
        })
    }

    /// The RPC endpoint this session talks to.
    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// Whether this session owns a spawned server process.
    pub fn owns_server(&self) -> bool {
        self.child.is_some()
    }

    /// Terminate the owned server, if any. Termination failures are logged
    /// and swallowed, never propagated.
    pub async fn shutdown(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.kill().await {
                warn!(%err, "failed to terminate companion server");
            }
        }
    }
}

impl Drop for UnoSession {
    fn drop(&mut self) {
        // sync best-effort for sessions dropped without `shutdown`;
        // kill_on_drop on the Child covers the remaining paths
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
    }
}

/// RPC client driving conversions through a [`UnoSession`].
///
/// No client-side concurrency limit is imposed — the server serialises or
/// parallelises at its own discretion.
#[derive(Debug)]
pub struct UnoClient {
    http: reqwest::Client,
    session: UnoSession,
}

impl UnoClient {
    /// Owned-server mode: spawn the companion server from `config` and
    /// connect to it.
    pub async fn start(config: &ConvertConfig) -> Result<Self, ConvertError> {
        let http = reqwest::Client::new();
        let session = UnoSession::spawn(&http, config).await?;
        Ok(Self { http, session })
    }

    /// Externally-managed mode: attach to a running server at `url`.
    pub async fn attach(
        url: impl Into<String>,
        config: &ConvertConfig,
    ) -> Result<Self, ConvertError> {
        let http = reqwest::Client::new();
        let session = UnoSession::connect(&http, url, config).await?;
        Ok(Self { http, session })
    }

    /// The session this client drives.
    pub fn session(&self) -> &UnoSession {
        &self.session
    }

    /// Terminate the session and the owned server process, if any.
    pub async fn shutdown(mut self) {
        self.session.shutdown().await;
    }

    /// Convert `input` into the format named by `output`'s extension.
    pub async fn convert(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<(), ConvertError> {
        let (input, output) = self.request_paths(input.as_ref(), output.as_ref()).await?;
        self.call(rpc::convert_call(&input, &output)).await
    }

    /// Compare two documents, writing the tracked-changes result to
    /// `output`.
    pub async fn compare(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<(), ConvertError> {
        let (input, output) = self.request_paths(input.as_ref(), output.as_ref()).await?;
        self.call(rpc::compare_call(&input, &output)).await
    }

    /// Guard the output target and absolutise both paths. The server's
    /// working directory is not ours, so relative paths would resolve
    /// somewhere surprising on its side.
    async fn request_paths(
        &self,
        input: &Path,
        output: &Path,
    ) -> Result<(String, String), ConvertError> {
        check_output_target(output).await?;
        Ok((absolute_string(input)?, absolute_string(output)?))
    }

    async fn call(&self, body: String) -> Result<(), ConvertError> {
        let response = self
            .http
            .post(self.session.url())
            .body(body)
            .send()
            .await
            .map_err(|e| {
                ConvertError::with_cause(
                    ErrorReason::Unknown,
                    "request to conversion server failed",
                    e,
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConvertError::new(
                ErrorReason::Unknown,
                format!("conversion server returned HTTP {status}"),
            ));
        }

        let text = response.text().await.map_err(|e| {
            ConvertError::with_cause(ErrorReason::Unknown, "failed to read server response", e)
        })?;

        match rpc::decode_response(&text) {
            Ok(RpcResponse::Empty) => Ok(()),
            Ok(RpcResponse::Fault(fault)) => {
                warn!(code = fault.fault_code, text = %fault.fault_string, "server returned a fault");
                Err(ConvertError::with_cause(
                    fault.reason(),
                    fault.fault_string.clone(),
                    fault,
                ))
            }
            Err(err) => Err(ConvertError::with_cause(
                ErrorReason::Unknown,
                "server response could not be decoded",
                err,
            )),
        }
    }
}

/// Render a path absolute without touching the filesystem — the input may
/// legitimately not exist yet on our side of a bind mount, and a
/// nonexistent input must still reach the server to get its canonical
/// "does not exist" fault.
fn absolute_string(path: &Path) -> Result<String, ConvertError> {
    let absolute = std::path::absolute(path).map_err(|e| {
        ConvertError::with_cause(
            ErrorReason::Unknown,
            format!("cannot resolve path '{}'", path.display()),
            e,
        )
    })?;
    Ok(absolute.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_string_resolves_relative_paths() {
        let abs = absolute_string(Path::new("some/relative.txt")).unwrap();
        assert!(Path::new(&abs).is_absolute());
        assert!(abs.ends_with("relative.txt"));
    }

    #[test]
    fn absolute_string_keeps_absolute_paths() {
        let abs = absolute_string(Path::new("/tmp/already/abs.pdf")).unwrap();
        assert_eq!(abs, "/tmp/already/abs.pdf");
    }
}
