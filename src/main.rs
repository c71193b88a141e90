use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use data_sync::config::{Settings, TransportKind};
use data_sync::ext_data::{ExternalDataProvider, FileExternalData};
use data_sync::fs::{LocalTransport, RsyncTransport, Transport};
use data_sync::{Manager, ManagerOptions};

/// Keep configured files and directories in sync with the sibling node.
#[derive(Debug, Parser)]
#[command(name = "data-sync", version)]
struct Cli {
    /// Daemon settings file (TOML).
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Directory holding the sync entry documents (*.json).
    #[arg(long)]
    entries_dir: Option<PathBuf>,

    /// Runtime state document with role, peer address and credentials.
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Copy with the local transport instead of rsync.
    #[arg(long)]
    local: bool,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.settings {
        Some(path) => Settings::load(path).with_context(|| format!("Failed to load settings {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(dir) = &cli.entries_dir {
        settings.entries_dir = dir.clone();
    }
    if let Some(file) = &cli.state_file {
        settings.state_file = file.clone();
    }
    if cli.local {
        settings.transport.kind = TransportKind::Local;
    }
    Ok(settings)
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("Failed to wait for Ctrl-C")?,
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await.context("Failed to wait for Ctrl-C")?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let settings = load_settings(&cli)?;
    info!(
        entries_dir = %settings.entries_dir.display(),
        state_file = %settings.state_file.display(),
        transport = ?settings.transport.kind,
        "starting data sync"
    );

    let provider: Arc<dyn ExternalDataProvider> = Arc::new(FileExternalData::new(&settings.state_file));
    let transport: Arc<dyn Transport> = match settings.transport.kind {
        TransportKind::Rsync => Arc::new(RsyncTransport::new(&settings.transport)),
        TransportKind::Local => Arc::new(LocalTransport::new()),
    };
    let options = ManagerOptions {
        role_refresh: settings.role_refresh,
        notify_settle: settings.notify_settle,
    };

    let manager = Manager::with_options(provider, transport, &settings.entries_dir, options);
    shutdown_signal().await?;

    info!("shutdown requested");
    manager.shutdown().await;
    Ok(())
}
