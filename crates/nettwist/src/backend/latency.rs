use std::time::Duration;

use crate::Result;
use crate::interface::Interface;
use crate::tc::{NetemConfig, Tc};

/// Adds delay and jitter with a netem root qdisc.
#[derive(Debug)]
pub struct Latency {
    netem: NetemConfig,
    tc: Tc,
    dev: Option<String>,
    running: bool,
}

impl Latency {
    pub(crate) fn new(tc: Tc) -> Self {
        Self {
            netem: NetemConfig::new(),
            tc,
            dev: None,
            running: false,
        }
    }

    /// Added delay.
    pub fn delay(&self) -> Duration {
        self.netem.delay
    }

    /// Delay variation.
    pub fn jitter(&self) -> Duration {
        self.netem.jitter
    }

    pub(crate) async fn set_delay(&mut self, delay: Duration, jitter: Duration) -> Result<()> {
        let netem = NetemConfig::new().delay(delay).jitter(jitter);
        if let (true, Some(dev)) = (self.running, self.dev.as_deref()) {
            self.tc.change_netem(dev, &netem).await?;
            tracing::info!(dev, ?delay, ?jitter, "latency updated");
        }
        self.netem = netem;
        Ok(())
    }

    pub(crate) async fn activate(&mut self, interface: &Interface) -> Result<()> {
        let dev = interface.name();
        self.tc.ensure_installed()?;

        // A leftover qdisc from an earlier run would make `add` fail.
        self.tc.del_netem(dev).await?;

        if let Err(err) = self.tc.add_netem(dev, &self.netem).await {
            if let Err(cleanup) = self.tc.del_netem(dev).await {
                tracing::warn!(dev, error = %cleanup, "removing partial netem qdisc failed");
            }
            return Err(err);
        }

        self.dev = Some(dev.to_string());
        self.running = true;
        tracing::info!(interface = %interface, delay = ?self.netem.delay, jitter = ?self.netem.jitter, "latency applied");
        Ok(())
    }

    pub(crate) async fn deactivate(&mut self) -> Result<()> {
        let Some(dev) = self.dev.as_deref() else {
            return Ok(());
        };
        self.tc.del_netem(dev).await?;
        self.running = false;
        Ok(())
    }

    pub(crate) async fn is_active(&self) -> Result<bool> {
        match self.dev.as_deref() {
            Some(dev) => self.tc.has_netem(dev).await,
            None => Ok(false),
        }
    }
}
