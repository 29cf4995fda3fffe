//! Thin wrapper around the `tc` utility for netem root qdiscs.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use nettwist::command::SystemRunner;
//! use nettwist::tc::{NetemConfig, Tc};
//!
//! let tc = Tc::new("tc", Arc::new(SystemRunner));
//! let netem = NetemConfig::new()
//!     .delay(Duration::from_millis(100))
//!     .jitter(Duration::from_millis(10));
//!
//! tc.add_netem("eth0", &netem).await?;
//! tc.change_netem("eth0", &netem.delay(Duration::from_millis(50))).await?;
//! tc.del_root("eth0").await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::command::{CommandRunner, Output};
use crate::{Error, Result};

/// Delay parameters for a netem qdisc.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetemConfig {
    /// Added delay.
    pub delay: Duration,
    /// Delay jitter (variation).
    pub jitter: Duration,
}

impl NetemConfig {
    /// Create a new netem configuration with no delay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the added delay.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the delay jitter.
    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// The netem arguments, delays in microseconds.
    fn args(&self) -> Vec<String> {
        let mut args = vec!["delay".to_string(), format!("{}us", self.delay.as_micros())];
        if !self.jitter.is_zero() {
            args.push(format!("{}us", self.jitter.as_micros()));
        }
        args
    }
}

/// Handle to the `tc` binary.
#[derive(Debug, Clone)]
pub struct Tc {
    program: String,
    runner: Arc<dyn CommandRunner>,
}

impl Tc {
    /// Create a handle for `program` (a bare name searched on `PATH`, or a path).
    pub fn new(program: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }

    /// Resolve the binary, failing if it is not installed.
    pub fn ensure_installed(&self) -> Result<PathBuf> {
        self.runner
            .resolve(&self.program)
            .ok_or_else(|| Error::ToolNotFound(self.program.clone()))
    }

    async fn run(&self, args: Vec<String>) -> Result<Output> {
        let path = self.ensure_installed()?;
        Ok(self.runner.run(&path, &args).await?)
    }

    /// Check whether a netem qdisc is installed on `dev`.
    pub async fn has_netem(&self, dev: &str) -> Result<bool> {
        let output = self.run(qdisc(["show", "dev", dev])).await?;
        Ok(output.stdout.contains("netem"))
    }

    /// Install a netem root qdisc on `dev`.
    pub async fn add_netem(&self, dev: &str, netem: &NetemConfig) -> Result<()> {
        let mut args = qdisc(["add", "dev", dev, "root", "netem"]);
        args.extend(netem.args());
        self.run(args).await?;
        Ok(())
    }

    /// Change the parameters of the netem root qdisc on `dev` in place.
    pub async fn change_netem(&self, dev: &str, netem: &NetemConfig) -> Result<()> {
        let mut args = qdisc(["change", "dev", dev, "root", "netem"]);
        args.extend(netem.args());
        self.run(args).await?;
        Ok(())
    }

    /// Delete the root qdisc on `dev`.
    pub async fn del_root(&self, dev: &str) -> Result<()> {
        self.run(qdisc(["del", "dev", dev, "root"])).await?;
        Ok(())
    }

    /// Delete the root qdisc on `dev` only if it is a netem qdisc.
    pub async fn del_netem(&self, dev: &str) -> Result<()> {
        if !self.has_netem(dev).await? {
            return Ok(());
        }
        self.del_root(dev).await
    }
}

fn qdisc<const N: usize>(args: [&str; N]) -> Vec<String> {
    std::iter::once("qdisc")
        .chain(args)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_netem_args() {
        let netem = NetemConfig::new()
            .delay(Duration::from_millis(100))
            .jitter(Duration::from_millis(50));
        assert_eq!(netem.args(), ["delay", "100000us", "50000us"]);
    }

    #[test]
    fn test_netem_args_without_jitter() {
        let netem = NetemConfig::new().delay(Duration::from_micros(1500));
        assert_eq!(netem.args(), ["delay", "1500us"]);
    }

    #[test]
    fn test_qdisc_args() {
        assert_eq!(
            qdisc(["del", "dev", "lo", "root"]),
            ["qdisc", "del", "dev", "lo", "root"]
        );
    }
}
