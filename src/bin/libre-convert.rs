//! CLI binary for libre-convert.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConvertConfig` and reports the outcome.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use libre_convert::{Backend, ConvertConfig, Converter, ConvertError, ErrorReason};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert with the local soffice CLI
  libre-convert report.docx report.pdf

  # Spawn a unoserver, convert through it, tear it down
  libre-convert --backend server report.docx report.pdf

  # Attach to a unoserver that is already running (e.g. in a container
  # sharing this filesystem)
  libre-convert --backend server --server-url http://localhost:2003/RPC2 in.odt out.pdf

  # Compare two documents, writing the tracked-changes result (server only)
  libre-convert --backend server --compare old.docx changes.pdf

  # Machine-readable result record on stdout
  libre-convert --json report.docx report.pdf

COMMON OUTPUT FORMATS:
  pdf docx doc odt html rtf epub jpg txt

  The list is advisory: the engine decides what it can export. An
  unsupported extension fails with reason BadOutputExtension.

ENVIRONMENT VARIABLES:
  LIBRE_CONVERT_ENGINE       Engine command (default: "soffice --headless")
  LIBRE_CONVERT_SERVER       Server command (default: "unoserver")
  LIBRE_CONVERT_SERVER_URL   RPC endpoint of a running unoserver
  LIBRE_CONVERT_TIMEOUT      Per-invocation engine timeout in seconds
"#;

/// Convert documents between file formats with LibreOffice.
#[derive(Parser, Debug)]
#[command(
    name = "libre-convert",
    version,
    about = "Convert documents between file formats with LibreOffice",
    long_about = "Convert documents between file formats by driving LibreOffice — either the \
soffice CLI as a local subprocess, or a long-lived unoserver over XML-RPC. The output file's \
extension selects the target format.",
    arg_required_else_help = true,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input document path.
    input: PathBuf,

    /// Output document path; the extension selects the target format.
    output: PathBuf,

    /// Conversion backend.
    #[arg(long, value_enum, default_value = "local")]
    backend: BackendArg,

    /// Attach to a running unoserver at this URL instead of spawning one
    /// (server backend).
    #[arg(long, env = "LIBRE_CONVERT_SERVER_URL")]
    server_url: Option<String>,

    /// Engine command for the local backend, split on whitespace.
    #[arg(long, env = "LIBRE_CONVERT_ENGINE", default_value = "soffice --headless")]
    engine: String,

    /// Server command for the owned-server backend, split on whitespace.
    #[arg(long, env = "LIBRE_CONVERT_SERVER", default_value = "unoserver")]
    server: String,

    /// Kill a local engine invocation after this many seconds.
    #[arg(long, env = "LIBRE_CONVERT_TIMEOUT")]
    timeout_secs: Option<u64>,

    /// Run the server's compare verb instead of convert.
    #[arg(long)]
    compare: bool,

    /// Print a JSON result record on stdout instead of human-readable text.
    #[arg(long)]
    json: bool,

    /// Disable the spinner.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq)]
enum BackendArg {
    Local,
    Server,
}

/// Machine-readable outcome for `--json`.
#[derive(serde::Serialize)]
struct Report<'a> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<ErrorReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    // ── Config ───────────────────────────────────────────────────────────
    let backend = match (cli.backend, cli.server_url.as_deref()) {
        (BackendArg::Local, _) => Backend::Local,
        (BackendArg::Server, Some(_)) => Backend::ExternalServer,
        (BackendArg::Server, None) => Backend::OwnedServer,
    };
    if cli.compare && backend == Backend::Local {
        bail!("--compare requires --backend server (the soffice CLI has no compare verb)");
    }

    let mut builder = ConvertConfig::builder()
        .backend(backend)
        .engine_command(cli.engine.split_whitespace())
        .server_command(cli.server.split_whitespace())
        .engine_timeout(cli.timeout_secs.map(Duration::from_secs));
    if let Some(url) = &cli.server_url {
        builder = builder.server_url(url.clone());
    }
    let config = builder.build().context("invalid configuration")?;

    // ── Convert ──────────────────────────────────────────────────────────
    let spinner = (!cli.quiet && !cli.json && !cli.no_progress).then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(format!("Converting {}…", cli.input.display()));
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    let result = run(&cli, &config).await;

    if let Some(bar) = &spinner {
        bar.finish_and_clear();
    }

    // ── Report ───────────────────────────────────────────────────────────
    match result {
        Ok(()) => {
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&Report {
                        ok: true,
                        reason: None,
                        message: None,
                    })?
                );
            } else if !cli.quiet {
                eprintln!(
                    "{} {} → {}",
                    green("✔"),
                    cli.input.display(),
                    cli.output.display()
                );
            }
            Ok(())
        }
        Err(err) => {
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&Report {
                        ok: false,
                        reason: Some(err.reason),
                        message: Some(&err.message),
                    })?
                );
                std::process::exit(1);
            }
            eprintln!("{} {}", red("✘"), err);
            Err(err).context(format!("failed to convert '{}'", cli.input.display()))
        }
    }
}

async fn run(cli: &Cli, config: &ConvertConfig) -> Result<(), ConvertError> {
    let converter = Converter::new(config).await?;
    let outcome = if cli.compare {
        converter.compare(&cli.input, &cli.output).await
    } else {
        converter.convert(&cli.input, &cli.output).await
    };
    converter.shutdown().await;
    outcome
}
