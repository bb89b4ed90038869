//! lutebox - MCP transport, request-routing, and single-instance
//! coordination bridge for a local music-playback service.
//!
//! Subcommands:
//! - `lutebox serve` - run the shared HTTP backend (default if no
//!   subcommand is given)
//! - `lutebox stdio` - run the stdio-facing proxy, discovering or launching
//!   the backend as needed
//!
//! Configuration is loaded from (in order, later wins):
//! 1. Compiled defaults
//! 2. /etc/lutebox/config.toml
//! 3. `<user-config-dir>/lutebox/config.toml`
//! 4. ./lutebox.toml (or a path passed via --config)
//! 5. LUTEBOX_* environment variables

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use lutebox::{proxy, BackendSupervisor};
use lutebox_config::{AppPaths, ConfigSources, LuteboxConfig};

#[derive(Parser)]
#[command(name = "lutebox")]
#[command(about = "MCP transport, request-routing, and single-instance coordination bridge for a local music-playback service")]
#[command(version)]
struct Cli {
    /// Path to a config file (overrides ./lutebox.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print the resolved configuration and which files/env vars
    /// contributed to it, then exit without starting anything.
    #[arg(long, global = true)]
    show_config: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the shared HTTP backend: binds the loopback listener and
    /// publishes the discovery record other instances coordinate through.
    Serve,
    /// Run the stdio-facing proxy: discovers (or launches) the backend and
    /// forwards MCP traffic between stdin/stdout and it.
    Stdio,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        let (config, sources) =
            LuteboxConfig::load_with_sources_from(cli.config.as_deref()).context("failed to load configuration")?;
        print_resolved_config(&config, &sources);
        return Ok(());
    }

    let command = cli.command.unwrap_or(Commands::Serve);

    // stdio transport must keep stdout clean for MCP frames, so logs go to
    // stderr there; serve has no such constraint.
    if matches!(command, Commands::Stdio) {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
            )
            .init();
    }

    let config = LuteboxConfig::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    let paths = AppPaths::resolve(config.temp_dir_override.as_deref());

    match command {
        Commands::Serve => run_serve(paths, config).await,
        Commands::Stdio => run_stdio(paths, config).await,
    }
}

async fn run_serve(paths: AppPaths, config: LuteboxConfig) -> Result<()> {
    let (supervisor, listener) = BackendSupervisor::start(paths, &config)
        .await
        .context("failed to start backend")?;

    tokio::select! {
        result = listener.serve() => {
            result.context("HTTP listener error")?;
        }
        () = shutdown_signal() => {
            tracing::info!("received shutdown signal");
        }
    }

    supervisor.shutdown();
    Ok(())
}

async fn run_stdio(paths: AppPaths, config: LuteboxConfig) -> Result<()> {
    proxy::run(tokio::io::stdin(), tokio::io::stdout(), &paths, &config).await
}

/// `--show-config`: prints the fully-merged configuration plus which files
/// and env vars contributed to it, for diagnosing why a deployment picked up
/// an unexpected port or timeout.
fn print_resolved_config(config: &LuteboxConfig, sources: &ConfigSources) {
    println!("port = {}", config.port);
    println!("poll_interval_ms = {}", config.poll_interval_ms);
    println!("discovery_timeout_ms = {}", config.discovery_timeout_ms);
    println!("http_roundtrip_timeout_ms = {}", config.http_roundtrip_timeout_ms);
    println!("server_name = {:?}", config.server_name);
    println!("server_version = {:?}", config.server_version);
    println!("temp_dir_override = {:?}", config.temp_dir_override);
    println!();
    if sources.files.is_empty() {
        println!("files: (none found; using compiled defaults)");
    } else {
        println!("files:");
        for path in &sources.files {
            println!("  {}", path.display());
        }
    }
    if sources.env_overrides.is_empty() {
        println!("env overrides: (none)");
    } else {
        println!("env overrides:");
        for var in &sources.env_overrides {
            println!("  {var}");
        }
    }
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate_signal() => {}
    }
}

#[cfg(unix)]
async fn terminate_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    sigterm.recv().await;
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending::<()>().await
}
