//! Conversion backends.
//!
//! Two interchangeable ways to drive the engine:
//!
//! ```text
//!               ┌─▶ local   spawn `soffice --headless --convert-to …`
//! convert ──────┤           per call, serialised by a capacity-1 permit
//!               └─▶ remote  XML-RPC over HTTP to a long-lived unoserver
//! ```
//!
//! 1. [`local`]  — subprocess per conversion; exit code + stderr are the
//!    only failure signals, classified by substring.
//! 2. [`remote`] — session against a companion server; protocol faults are
//!    the failure signal, mapped through [`crate::rpc::fault_reason`].
//!
//! Both funnel every failure into [`crate::error::ConvertError`] and apply
//! the same output-target guard, so switching backends is
//! behaviour-preserving for callers.

pub mod local;
pub mod remote;

use crate::error::{ConvertError, ErrorReason};
use std::path::Path;

/// Reject an output path that resolves to an existing directory.
///
/// The engine names its own output file after the input, so a directory
/// target can never be written as the named file the caller asked for. The
/// remote server fails the same way for the same reason; both backends run
/// this guard before touching the engine so the behaviours stay aligned.
pub(crate) async fn check_output_target(output: &Path) -> Result<(), ConvertError> {
    match tokio::fs::metadata(output).await {
        Ok(meta) if meta.is_dir() => Err(ConvertError::new(
            ErrorReason::BadOutputExtension,
            format!("output path '{}' is a directory", output.display()),
        )),
        // nonexistent output is the normal case; unreadable metadata will
        // resurface as a copy/RPC failure with a better message
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn directory_output_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_output_target(dir.path()).await.unwrap_err();
        assert_eq!(err.reason, ErrorReason::BadOutputExtension);
    }

    #[tokio::test]
    async fn nonexistent_and_file_outputs_pass() {
        let dir = tempfile::tempdir().unwrap();
        check_output_target(&dir.path().join("fresh.pdf"))
            .await
            .unwrap();

        let existing = dir.path().join("existing.pdf");
        std::fs::write(&existing, b"old contents").unwrap();
        check_output_target(&existing).await.unwrap();
    }
}
