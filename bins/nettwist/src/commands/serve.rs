//! nettwist serve command implementation.

use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use nettwist::{Config, ControlPlane};
use tokio::net::TcpListener;

use super::shutdown_signal;

#[derive(Args)]
pub struct ServeCmd {
    /// Address to listen on, e.g. 0.0.0.0:9007 or :9007.
    #[arg(long)]
    serve_addr: Option<String>,

    /// Value of the Access-Control-Allow-Origin header.
    #[arg(long)]
    origin_allowed: Option<String>,
}

impl ServeCmd {
    pub async fn run(self, mut config: Config) -> anyhow::Result<()> {
        if let Some(addr) = self.serve_addr {
            config = config.with_serve_addr(addr);
        }
        if let Some(origin) = self.origin_allowed {
            config = config.with_origin_allowed(origin);
        }
        config.validate()?;

        let addr = config.server.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;

        let control = Arc::new(ControlPlane::new(config));
        nettwist::api::serve(control.clone(), listener, shutdown_signal()).await?;

        tracing::info!("server stopped, shutting down services");
        control.shutdown_all().await?;
        Ok(())
    }
}
