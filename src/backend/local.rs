//! Local process backend: one engine subprocess per conversion.
//!
//! ## Why a capacity-1 permit?
//!
//! The engine is not safe to invoke concurrently from one working profile —
//! parallel invocations corrupt its user installation. Giving every call a
//! fresh `-env:UserInstallation` avoids that but slows conversion roughly
//! 8×, so instead a semaphore with a single permit serialises all
//! invocations on one [`LocalEngine`] instance. Callers may still issue
//! conversions concurrently; they queue on the permit. Mutual exclusion is
//! guaranteed, arrival-order fairness is not.
//!
//! ## Why a scratch directory?
//!
//! The engine CLI cannot be told the output *file* name, only an output
//! directory; it always writes `<input stem>.<ext>`. Converting into a
//! scoped [`tempfile::TempDir`] and copying the produced file to the
//! caller's path keeps partial output away from the destination and makes
//! cleanup automatic on every exit path, including cancellation.

use crate::backend::check_output_target;
use crate::config::ConvertConfig;
use crate::error::{ConvertError, ErrorReason};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Backend that spawns the engine CLI (`soffice --headless` by default) for
/// each conversion.
#[derive(Debug)]
pub struct LocalEngine {
    command: Vec<String>,
    timeout: Option<Duration>,
    permit: Semaphore,
}

impl LocalEngine {
    /// Build a local backend from `config`.
    ///
    /// The conversion permit is scoped to this instance: share the instance
    /// (e.g. behind an `Arc`) to share the serialisation.
    pub fn new(config: &ConvertConfig) -> Self {
        Self {
            command: config.engine_command.clone(),
            timeout: config.engine_timeout,
            permit: Semaphore::new(1),
        }
    }

    /// Convert `input` into the format named by `output`'s extension.
    ///
    /// Diagnostics on the engine's stderr take precedence over its exit
    /// code: a recognised error message fails the conversion even when the
    /// process exits 0, and an unexplained nonzero exit degrades to
    /// [`ErrorReason::Unknown`] rather than being dropped.
    pub async fn convert(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<(), ConvertError> {
        let input = input.as_ref();
        let output = output.as_ref();

        check_output_target(output).await?;
        let ext = output_extension(output)?;

        let workdir = tempfile::Builder::new()
            .prefix("libre-convert-")
            .tempdir()
            .map_err(|e| {
                ConvertError::with_cause(
                    ErrorReason::Unknown,
                    "failed to create scratch directory",
                    e,
                )
            })?;

        let _permit = self.permit.acquire().await.map_err(|e| {
            ConvertError::with_cause(ErrorReason::Unknown, "conversion permit unavailable", e)
        })?;

        let (program, base_args) = self
            .command
            .split_first()
            .ok_or_else(|| ConvertError::new(ErrorReason::StartFailed, "engine command is empty"))?;

        debug!(input = %input.display(), target = %ext, "spawning engine");
        let mut child = Command::new(program)
            .args(base_args)
            .arg("--convert-to")
            .arg(&ext)
            .arg("--outdir")
            .arg(workdir.path())
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ConvertError::with_cause(
                    ErrorReason::StartFailed,
                    format!("failed to spawn engine '{program}'"),
                    e,
                )
            })?;

        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ConvertError::new(ErrorReason::Unknown, "engine stderr was not captured"))?;

        // Exit status and stderr must be awaited together: the engine can
        // fill the pipe buffer before exiting, and an unread pipe blocks
        // process exit.
        let mut diagnostics = String::new();
        let wait_and_drain = async {
            tokio::try_join!(child.wait(), stderr.read_to_string(&mut diagnostics))
        };
        let joined = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, wait_and_drain).await,
            None => Ok(wait_and_drain.await),
        };
        let status = match joined {
            Ok(result) => {
                result
                    .map_err(|e| {
                        ConvertError::with_cause(
                            ErrorReason::Unknown,
                            "failed to await engine process",
                            e,
                        )
                    })?
                    .0
            }
            Err(_elapsed) => {
                let _ = child.kill().await;
                return Err(ConvertError::new(
                    ErrorReason::Unknown,
                    format!(
                        "engine did not finish within {}s",
                        self.timeout.unwrap_or_default().as_secs()
                    ),
                ));
            }
        };

        let diagnostics = diagnostics.trim();
        if let Some(reason) = classify_diagnostics(diagnostics) {
            warn!(%reason, "engine reported a conversion error");
            return Err(ConvertError::new(reason, diagnostics));
        }

        if !status.success() {
            let message = if diagnostics.is_empty() {
                match status.code() {
                    Some(code) => format!("process failed with exit code {code}"),
                    None => "process was terminated by a signal".to_owned(),
                }
            } else {
                diagnostics.to_owned()
            };
            return Err(ConvertError::new(ErrorReason::Unknown, message));
        }

        // The engine wrote `<input stem>.<ext>` into the scratch dir; move
        // it to where the caller asked.
        let stem = input.file_stem().ok_or_else(|| {
            ConvertError::new(
                ErrorReason::Unknown,
                format!("input path '{}' has no file name", input.display()),
            )
        })?;
        let mut produced_name = stem.to_os_string();
        produced_name.push(".");
        produced_name.push(&ext);
        let produced = workdir.path().join(&produced_name);

        tokio::fs::copy(&produced, output).await.map_err(|e| {
            ConvertError::with_cause(
                ErrorReason::Unknown,
                format!(
                    "engine output '{}' could not be copied to '{}'",
                    produced.display(),
                    output.display()
                ),
                e,
            )
        })?;

        info!(input = %input.display(), output = %output.display(), "conversion finished");
        Ok(())
    }
}

/// The output extension without the dot — this is what `--convert-to`
/// receives and what names the produced file. An extensionless output can
/// never select a format, so it fails up front with the same reason the
/// engine would report after a wasted invocation.
fn output_extension(output: &Path) -> Result<String, ConvertError> {
    match output.extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => Ok(ext.to_owned()),
        _ => Err(ConvertError::new(
            ErrorReason::BadOutputExtension,
            format!(
                "output path '{}' has no extension to select a format",
                output.display()
            ),
        )),
    }
}

/// Ordered diagnostic classification; first match wins, independent of the
/// exit code.
fn classify_diagnostics(text: &str) -> Option<ErrorReason> {
    const TABLE: &[(&str, ErrorReason)] = &[
        (
            "Error: source file could not be loaded",
            ErrorReason::InputFileNotFound,
        ),
        ("Error: no export filter", ErrorReason::BadOutputExtension),
        ("Permission denied", ErrorReason::PermissionDenied),
    ];
    for (needle, reason) in TABLE {
        if text.contains(needle) {
            return Some(*reason);
        }
    }
    text.contains("Error: ").then_some(ErrorReason::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_classify_by_first_matching_needle() {
        assert_eq!(
            classify_diagnostics("Error: source file could not be loaded"),
            Some(ErrorReason::InputFileNotFound)
        );
        assert_eq!(
            classify_diagnostics("Error: no export filter for /tmp/out.bogus"),
            Some(ErrorReason::BadOutputExtension)
        );
        assert_eq!(
            classify_diagnostics("cannot open /etc/x: Permission denied"),
            Some(ErrorReason::PermissionDenied)
        );
        assert_eq!(
            classify_diagnostics("Error: something novel went wrong"),
            Some(ErrorReason::Unknown)
        );
        assert_eq!(classify_diagnostics("Warning: fonts missing"), None);
        assert_eq!(classify_diagnostics(""), None);
    }

    #[test]
    fn classification_order_follows_the_table() {
        // both needles present: the export-filter entry sits first
        let text = "Error: no export filter; also Permission denied";
        assert_eq!(
            classify_diagnostics(text),
            Some(ErrorReason::BadOutputExtension)
        );
    }

    #[test]
    fn extensionless_outputs_are_rejected_up_front() {
        let err = output_extension(Path::new("/tmp/result")).unwrap_err();
        assert_eq!(err.reason, ErrorReason::BadOutputExtension);
        assert_eq!(
            output_extension(Path::new("/tmp/result.pdf")).unwrap(),
            "pdf"
        );
    }
}
