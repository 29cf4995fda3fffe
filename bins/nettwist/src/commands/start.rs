//! nettwist start command implementation.

use std::time::Duration;

use clap::Args;
use nettwist::{Config, ControlPlane, Params};

use super::shutdown_signal;

#[derive(Args)]
pub struct StartCmd {
    /// Network interface to impair.
    #[arg(short = 'd', long = "dev")]
    dev: String,

    /// Packet loss percentage (0-100).
    #[arg(short = 'p', long, value_parser = clap::value_parser!(i32).range(0..=100))]
    packet_loss: Option<i32>,

    /// Bandwidth limit in bytes per second.
    #[arg(short = 'b', long)]
    bandwidth: Option<u64>,

    /// Added latency in milliseconds.
    #[arg(short = 'l', long)]
    latency: Option<u64>,

    /// Latency jitter in milliseconds.
    #[arg(short = 'j', long, default_value_t = 0, requires = "latency")]
    jitter: u64,
}

impl StartCmd {
    fn params(&self) -> Vec<Params> {
        let mut params = Vec::new();
        if let Some(rate) = self.packet_loss {
            params.push(Params::packet_loss(rate));
        }
        if let Some(limit) = self.bandwidth {
            params.push(Params::bandwidth(limit));
        }
        if let Some(latency) = self.latency {
            params.push(Params::latency(
                Duration::from_millis(latency),
                Duration::from_millis(self.jitter),
            ));
        }
        params
    }

    pub async fn run(self, config: Config) -> anyhow::Result<()> {
        let params = self.params();
        if params.is_empty() {
            anyhow::bail!("nothing to start: pass at least one of --packet-loss, --bandwidth or --latency");
        }

        let control = ControlPlane::new(config);
        for p in params {
            if let Err(e) = control.start(p, &self.dev).await {
                if let Err(cleanup) = control.shutdown_all().await {
                    tracing::warn!(error = %cleanup, "cleanup after failed start");
                }
                return Err(e.into());
            }
        }

        tracing::info!(dev = %self.dev, "impairments applied, press Ctrl-C to stop");
        shutdown_signal().await;

        control.shutdown_all().await?;
        Ok(())
    }
}
