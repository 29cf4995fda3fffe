//! nettwist command - inject packet loss, bandwidth limits and latency.

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use nettwist::Config;
use nettwist::xdp::XdpMode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nettwist", version, about = "Network impairment tool")]
struct Cli {
    /// Configuration file (JSON).
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit JSON logs.
    #[arg(long, global = true)]
    production_mode: bool,

    /// Name or path of the tc binary.
    #[arg(long, global = true)]
    tc_path: Option<String>,

    /// Compiled XDP object file.
    #[arg(long, global = true)]
    bpf_object: Option<PathBuf>,

    /// XDP attach mode (default, skb, driver, hardware).
    #[arg(long, global = true)]
    xdp_mode: Option<XdpMode>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the REST API server.
    Serve(commands::serve::ServeCmd),

    /// Apply impairments directly until interrupted.
    Start(commands::start::StartCmd),
}

fn init_tracing(level: &str, production: bool) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("invalid log level {level:?}"))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if production {
        builder.json().with_current_span(false).init();
    } else {
        builder.init();
    }
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(tc) = &cli.tc_path {
        config = config.with_tc_path(tc.clone());
    }
    if let Some(object) = &cli.bpf_object {
        config = config.with_bpf_object(object.clone());
    }
    if let Some(mode) = cli.xdp_mode {
        config = config.with_xdp_mode(mode);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.production_mode)?;
    let config = load_config(&cli)?;

    match cli.command {
        Command::Serve(cmd) => cmd.run(config).await,
        Command::Start(cmd) => cmd.run(config).await,
    }
}
