//! Error type shared by both conversion backends.
//!
//! The two backends fail in structurally different ways — the local engine
//! gives us an exit code plus free-text stderr, the unoserver gives us
//! XML-RPC faults — but callers should not have to care which backend was
//! configured. Every public operation therefore fails with exactly one
//! [`ConvertError`] carrying a reason from the closed [`ErrorReason`] set.
//! Raw exit codes, HTTP statuses, and protocol faults never escape the
//! library boundary; the original diagnostic is preserved in `cause` for
//! debugging only and is not part of the matching contract.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Canonical reasons a conversion or session operation can fail.
///
/// This enumeration is closed: unrecognised failures degrade to
/// [`ErrorReason::Unknown`] rather than growing new variants, so exhaustive
/// matches in callers stay valid across backend changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorReason {
    /// The engine could not load the input document.
    InputFileNotFound,
    /// The engine process or companion server failed to start or never
    /// became reachable.
    StartFailed,
    /// The output target cannot be produced: unsupported extension, or the
    /// output path resolves to an existing directory.
    BadOutputExtension,
    /// The requested operation is not supported by the server.
    MethodNotFound,
    /// The engine was denied filesystem access.
    PermissionDenied,
    /// Anything the classifiers did not recognise. An abnormal outcome is
    /// never silently swallowed — it surfaces here.
    Unknown,
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Error returned when a conversion, comparison, or session operation fails.
#[derive(Debug, Error)]
#[error("{reason}: {message}")]
pub struct ConvertError {
    /// The classified failure reason. Match on this.
    pub reason: ErrorReason,
    /// Human-readable description — typically the engine diagnostic or the
    /// server fault text, passed through verbatim.
    pub message: String,
    /// The underlying failure, when one exists (io error, transport error,
    /// decoded fault). Debugging aid only.
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ConvertError {
    /// A classified error with no underlying cause.
    pub fn new(reason: ErrorReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
            cause: None,
        }
    }

    /// A classified error wrapping the failure that produced it.
    pub fn with_cause(
        reason: ErrorReason,
        message: impl Into<String>,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            reason,
            message: message.into(),
            cause: Some(cause.into()),
        }
    }
}
