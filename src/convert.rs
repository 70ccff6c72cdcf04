//! Conversion orchestrator: one entry point, two backends.
//!
//! [`Converter`] is a thin dispatch layer. Its only independent
//! responsibility is the shared output-target guard — both backends observe
//! it identically, so switching backends never changes what a caller sees
//! for the same request. Everything conversion-shaped lives in
//! [`crate::backend`].

use crate::backend::check_output_target;
use crate::backend::local::LocalEngine;
use crate::backend::remote::UnoClient;
use crate::config::{Backend, ConvertConfig};
use crate::error::{ConvertError, ErrorReason};
use std::path::Path;
use tracing::debug;

/// Converts documents through whichever backend the config selects.
///
/// # Example
/// ```rust,no_run
/// use libre_convert::{ConvertConfig, Converter};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let converter = Converter::new(&ConvertConfig::default()).await?;
///     converter.convert("report.docx", "report.pdf").await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Converter {
    dispatch: Dispatch,
}

#[derive(Debug)]
enum Dispatch {
    Local(LocalEngine),
    Remote(UnoClient),
}

impl Converter {
    /// Build a converter for the configured backend.
    ///
    /// For the server backends this establishes a reachable session up
    /// front — spawning the companion server ([`Backend::OwnedServer`]) or
    /// polling the configured URL ([`Backend::ExternalServer`]) — so the
    /// first `convert` call does not pay the startup wait.
    pub async fn new(config: &ConvertConfig) -> Result<Self, ConvertError> {
        let dispatch = match config.backend {
            Backend::Local => Dispatch::Local(LocalEngine::new(config)),
            Backend::OwnedServer => Dispatch::Remote(UnoClient::start(config).await?),
            Backend::ExternalServer => {
                Dispatch::Remote(UnoClient::attach(config.server_url.clone(), config).await?)
            }
        };
        Ok(Self { dispatch })
    }

    /// Convert `input` into the format named by `output`'s extension.
    pub async fn convert(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<(), ConvertError> {
        let input = input.as_ref();
        let output = output.as_ref();
        check_output_target(output).await?;

        debug!(input = %input.display(), output = %output.display(), "dispatching conversion");
        match &self.dispatch {
            Dispatch::Local(engine) => engine.convert(input, output).await,
            Dispatch::Remote(client) => client.convert(input, output).await,
        }
    }

    /// Compare two documents, writing the tracked-changes result to
    /// `output`. Only the server exposes a compare verb; the engine CLI has
    /// none, so the local backend reports the operation as unsupported.
    pub async fn compare(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<(), ConvertError> {
        let output = output.as_ref();
        check_output_target(output).await?;

        match &self.dispatch {
            Dispatch::Local(_) => Err(ConvertError::new(
                ErrorReason::MethodNotFound,
                "compare is not supported by the local engine backend",
            )),
            Dispatch::Remote(client) => client.compare(input.as_ref(), output).await,
        }
    }

    /// Tear the converter down, terminating an owned companion server if
    /// one was spawned. Dropping the converter does the same best-effort;
    /// this variant waits for the termination.
    pub async fn shutdown(self) {
        if let Dispatch::Remote(client) = self.dispatch {
            client.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_converter_rejects_directory_output_without_engine() {
        // engine command that would fail loudly if it were ever spawned
        let config = ConvertConfig::builder()
            .engine_command(["/nonexistent/engine-binary"])
            .build()
            .unwrap();
        let converter = Converter::new(&config).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let err = converter
            .convert("input.txt", dir.path())
            .await
            .unwrap_err();
        assert_eq!(err.reason, ErrorReason::BadOutputExtension);
    }

    #[tokio::test]
    async fn local_converter_has_no_compare_verb() {
        let converter = Converter::new(&ConvertConfig::default()).await.unwrap();
        let err = converter
            .compare("a.docx", "diff.pdf")
            .await
            .unwrap_err();
        assert_eq!(err.reason, ErrorReason::MethodNotFound);
    }
}
