//! Configuration for conversion backends.
//!
//! All behaviour is controlled through [`ConvertConfig`], built via its
//! [`ConvertConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share a config between the library and the CLI and to diff
//! two runs to understand why their outcomes differ.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Default endpoint a freshly spawned unoserver listens on.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:2003/RPC2";

/// Common output formats LibreOffice can export to.
///
/// Advisory only — shown in CLI help and docs. The engine is the sole
/// authority on what it can export; an extension outside this list is still
/// handed to the engine, which rejects it with its own diagnostic.
pub const KNOWN_OUTPUT_FORMATS: &[&str] = &[
    "pdf", "docx", "doc", "odt", "html", "rtf", "epub", "jpg", "txt",
];

/// Which backend [`crate::convert::Converter`] drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Backend {
    /// Spawn the engine CLI per conversion. No extra processes to manage,
    /// but every call pays the engine's startup cost. (default)
    #[default]
    Local,
    /// Spawn a companion server process and own its lifetime. Much faster
    /// per conversion once the server is warm.
    OwnedServer,
    /// Attach to an externally managed server at `server_url` (e.g. one
    /// running inside a container that shares this filesystem).
    ExternalServer,
}

/// Configuration for a [`crate::convert::Converter`] and the backends it
/// drives.
///
/// # Example
/// ```rust
/// use libre_convert::ConvertConfig;
///
/// let config = ConvertConfig::builder()
///     .engine_command(["soffice", "--headless"])
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    /// Backend selection. Default: [`Backend::Local`].
    pub backend: Backend,

    /// Command and base arguments for the local engine invocation.
    /// Default: `["soffice", "--headless"]`.
    pub engine_command: Vec<String>,

    /// Command and base arguments for spawning the companion server.
    /// Default: `["unoserver"]`.
    pub server_command: Vec<String>,

    /// RPC endpoint of the companion server. Default:
    /// [`DEFAULT_SERVER_URL`], where a freshly spawned unoserver listens.
    pub server_url: String,

    /// Spacing between readiness probes while waiting for the server.
    /// Default: 250 ms.
    pub ready_poll_interval: Duration,

    /// Number of readiness probes before giving up. Default: 40 — together
    /// with the interval, roughly a 10 s startup budget.
    pub ready_poll_attempts: u32,

    /// Hard limit for a single local engine invocation. Default: `None`.
    ///
    /// The engine has no built-in timeout; a wedged invocation blocks the
    /// conversion permit indefinitely. Setting this kills the engine
    /// process when the limit expires and fails the conversion.
    pub engine_timeout: Option<Duration>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Local,
            engine_command: vec!["soffice".to_owned(), "--headless".to_owned()],
            server_command: vec!["unoserver".to_owned()],
            server_url: DEFAULT_SERVER_URL.to_owned(),
            ready_poll_interval: Duration::from_millis(250),
            ready_poll_attempts: 40,
            engine_timeout: None,
        }
    }
}

impl ConvertConfig {
    /// Create a new builder seeded with the defaults.
    pub fn builder() -> ConvertConfigBuilder {
        ConvertConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Rejected [`ConvertConfigBuilder`] input.
///
/// Distinct from [`crate::error::ConvertError`]: a config that never
/// validated cannot have attempted a conversion, so it gets its own error
/// rather than a slot in the closed conversion taxonomy.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub String);

/// Builder for [`ConvertConfig`].
#[derive(Debug)]
pub struct ConvertConfigBuilder {
    config: ConvertConfig,
}

impl ConvertConfigBuilder {
    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn engine_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.engine_command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn server_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.server_command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.config.server_url = url.into();
        self
    }

    pub fn ready_poll_interval(mut self, interval: Duration) -> Self {
        self.config.ready_poll_interval = interval;
        self
    }

    pub fn ready_poll_attempts(mut self, attempts: u32) -> Self {
        self.config.ready_poll_attempts = attempts.max(1);
        self
    }

    pub fn engine_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.engine_timeout = timeout;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConvertConfig, ConfigError> {
        let c = &self.config;
        if c.engine_command.is_empty() {
            return Err(ConfigError("engine command must not be empty".into()));
        }
        if c.server_command.is_empty() {
            return Err(ConfigError("server command must not be empty".into()));
        }
        if c.server_url.is_empty() {
            return Err(ConfigError("server URL must not be empty".into()));
        }
        if c.ready_poll_attempts == 0 {
            return Err(ConfigError("readiness budget must allow ≥ 1 probe".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_formats_cover_the_common_targets() {
        assert!(KNOWN_OUTPUT_FORMATS.contains(&"pdf"));
        assert!(KNOWN_OUTPUT_FORMATS.contains(&"docx"));
        assert!(KNOWN_OUTPUT_FORMATS.iter().all(|f| !f.starts_with('.')));
    }

    #[test]
    fn defaults_match_the_engine_conventions() {
        let c = ConvertConfig::default();
        assert_eq!(c.engine_command, vec!["soffice", "--headless"]);
        assert_eq!(c.server_command, vec!["unoserver"]);
        assert_eq!(c.server_url, DEFAULT_SERVER_URL);
        assert_eq!(c.ready_poll_interval, Duration::from_millis(250));
        assert_eq!(c.ready_poll_attempts, 40);
        assert_eq!(c.engine_timeout, None);
        assert_eq!(c.backend, Backend::Local);
    }

    #[test]
    fn builder_rejects_empty_engine_command() {
        let err = ConvertConfig::builder()
            .engine_command(Vec::<String>::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("engine command"));
    }

    #[test]
    fn builder_clamps_zero_poll_attempts() {
        let c = ConvertConfig::builder()
            .ready_poll_attempts(0)
            .build()
            .unwrap();
        assert_eq!(c.ready_poll_attempts, 1);
    }

    #[test]
    fn builder_overrides_stick() {
        let c = ConvertConfig::builder()
            .backend(Backend::ExternalServer)
            .server_url("http://10.0.0.7:2003/RPC2")
            .engine_timeout(Some(Duration::from_secs(30)))
            .build()
            .unwrap();
        assert_eq!(c.backend, Backend::ExternalServer);
        assert_eq!(c.server_url, "http://10.0.0.7:2003/RPC2");
        assert_eq!(c.engine_timeout, Some(Duration::from_secs(30)));
    }
}
