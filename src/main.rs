//! UdonSharp linter server executable
//!
//! Speaks LSP over stdio. Stdout belongs to the wire framing, so all
//! logging goes to file sinks under `logs/`: `server.log` for the session,
//! `boot.log` for one startup line, `fatal.log` for unrecoverable failures.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tower_lsp::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use ushlint::build_service;

#[derive(Parser)]
#[command(
    name = "ushlint",
    version,
    about = "UdonSharp Linter Language Server",
    long_about = "Static-analysis language server for UdonSharp. Speaks LSP over stdio."
)]
struct Cli {
    /// Directory for log files (defaults to logs/ beside the executable)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Extra policy pack files, loaded after the bundled packs
    #[arg(long, value_name = "FILE")]
    policy_pack: Vec<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let base_dir = match base_dir() {
        Ok(dir) => dir,
        Err(err) => {
            fatal(Path::new("."), &format!("cannot resolve base directory: {err:#}"));
        }
    };
    let log_dir = cli.log_dir.clone().unwrap_or_else(|| base_dir.join("logs"));
    let _log_guard = match init_logging(&log_dir) {
        Ok(guard) => guard,
        Err(err) => {
            fatal(&log_dir, &format!("cannot initialise logging: {err:#}"));
        }
    };

    if let Err(err) = append_line(
        &log_dir.join("boot.log"),
        &format!("ushlint {} starting", env!("CARGO_PKG_VERSION")),
    ) {
        tracing::warn!(error = %err, "could not write boot log");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            fatal(&log_dir, &format!("cannot start runtime: {err}"));
        }
    };

    runtime.block_on(serve(base_dir, cli.policy_pack));
    tracing::info!("clean shutdown");
}

async fn serve(base_dir: PathBuf, extra_packs: Vec<PathBuf>) {
    if !extra_packs.is_empty() {
        tracing::info!(packs = extra_packs.len(), "extra policy packs from the command line");
    }
    tracing::info!(base_dir = %base_dir.display(), "starting UdonSharp linter server");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    let (service, socket) = build_service(base_dir, extra_packs);
    Server::new(stdin, stdout, socket).serve(service).await;
}

/// Directory the bundled PolicyPacks/ and Stubs/ trees live beside
fn base_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("current_exe")?;
    exe.parent()
        .map(Path::to_path_buf)
        .context("executable has no parent directory")
}

fn init_logging(log_dir: &Path) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("create {}", log_dir.display()))?;
    let appender = tracing_appender::rolling::never(log_dir, "server.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("USHLINT_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();
    Ok(guard)
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)
}

/// Record an unrecoverable initialisation failure and exit non-zero
fn fatal(log_dir: &Path, message: &str) -> ! {
    let _ = std::fs::create_dir_all(log_dir);
    let _ = append_line(&log_dir.join("fatal.log"), message);
    eprintln!("ushlint: {message}");
    std::process::exit(1);
}
