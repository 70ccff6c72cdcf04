//! # libre-convert
//!
//! Convert documents between file formats by driving LibreOffice — either
//! the `soffice` CLI as a local subprocess, or a long-lived `unoserver`
//! over its XML-RPC dialect. Which backend runs is a configuration choice;
//! the conversion contract and the error taxonomy are identical across
//! both.
//!
//! ## Architecture
//!
//! ```text
//! convert(input, output)
//!  │
//!  ├─ guard    output target must not be an existing directory
//!  │
//!  ├─ local    permit ──▶ scratch dir ──▶ spawn soffice ──▶ classify
//!  │           (cap 1)    (RAII)          (wait ∥ drain)    stderr
//!  │
//!  └─ remote   session ──▶ encode XML-RPC ──▶ POST ──▶ decode ──▶ map
//!              (owned or   convert/compare              Empty │ Fault
//!               attached)
//! ```
//!
//! The local backend serialises engine invocations with a capacity-1
//! permit (the engine corrupts its profile under concurrent use) and works
//! through a scoped temp directory that is removed on every exit path. The
//! remote backend probes the server with `system.listMethods` until it is
//! reachable, then speaks the wire protocol in [`rpc`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use libre_convert::{ConvertConfig, Converter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Default: spawn `soffice --headless` per conversion.
//!     let converter = Converter::new(&ConvertConfig::default()).await?;
//!     converter.convert("report.docx", "report.pdf").await?;
//!     Ok(())
//! }
//! ```
//!
//! Failures carry one of six canonical [`ErrorReason`]s regardless of
//! backend — match on the reason, not on backend-specific details:
//!
//! ```rust,no_run
//! # use libre_convert::{ConvertConfig, Converter, ErrorReason};
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let converter = Converter::new(&ConvertConfig::default()).await?;
//! match converter.convert("missing.docx", "out.pdf").await {
//!     Ok(()) => println!("done"),
//!     Err(e) if e.reason == ErrorReason::InputFileNotFound => {
//!         eprintln!("input is gone: {}", e.message);
//!     }
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `libre-convert` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! libre-convert = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod convert;
pub mod error;
pub mod rpc;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::local::LocalEngine;
pub use backend::remote::{UnoClient, UnoSession};
pub use config::{
    Backend, ConfigError, ConvertConfig, ConvertConfigBuilder, DEFAULT_SERVER_URL,
    KNOWN_OUTPUT_FORMATS,
};
pub use convert::Converter;
pub use error::{ConvertError, ErrorReason};
pub use rpc::{Fault, RpcResponse};
