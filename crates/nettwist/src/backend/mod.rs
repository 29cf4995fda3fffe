//! Impairment backends.
//!
//! A backend programs one impairment mechanism on one interface. The three
//! kinds share a contract (program, activate, deactivate, is_active) and are
//! dispatched through the closed [`Backend`] enum.
//!
//! | Kind | Mechanism | Parameter |
//! |------|-----------|-----------|
//! | [`PacketLoss`] | XDP table `packetloss_rate_map` | drop percentage |
//! | [`Bandwidth`] | XDP table `bandwidth_limit_map` | byte-rate ceiling |
//! | [`Latency`] | `tc` netem root qdisc | delay and jitter |

mod bandwidth;
mod latency;
mod packetloss;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub use bandwidth::Bandwidth;
pub use latency::Latency;
pub use packetloss::PacketLoss;

use crate::interface::Interface;
use crate::tc::Tc;
use crate::xdp::XdpAttachment;
use crate::{Error, Result};

/// The three impairment kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    PacketLoss,
    Bandwidth,
    Latency,
}

impl BackendKind {
    /// All kinds, in status reporting order.
    pub const ALL: [BackendKind; 3] = [Self::PacketLoss, Self::Bandwidth, Self::Latency];

    /// The kind's name as used in routes and status.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PacketLoss => "packetloss",
            Self::Bandwidth => "bandwidth",
            Self::Latency => "latency",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| Error::Config(format!("unknown impairment kind: {s}")))
    }
}

/// Parameters for one impairment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Params {
    /// Percentage of received packets to drop, 0 to 100.
    PacketLoss { rate: i32 },
    /// Byte-rate ceiling, 0 disables the cap.
    Bandwidth { limit: u64 },
    /// Added delay and its variation.
    Latency { delay: Duration, jitter: Duration },
}

impl Params {
    /// Packet loss parameters.
    pub fn packet_loss(rate: i32) -> Self {
        Self::PacketLoss { rate }
    }

    /// Bandwidth parameters.
    pub fn bandwidth(limit: u64) -> Self {
        Self::Bandwidth { limit }
    }

    /// Latency parameters.
    pub fn latency(delay: Duration, jitter: Duration) -> Self {
        Self::Latency { delay, jitter }
    }

    /// Which impairment these parameters belong to.
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::PacketLoss { .. } => BackendKind::PacketLoss,
            Self::Bandwidth { .. } => BackendKind::Bandwidth,
            Self::Latency { .. } => BackendKind::Latency,
        }
    }

    /// The wire form reported in service status.
    pub fn to_json(&self) -> Value {
        match *self {
            Self::PacketLoss { rate } => json!({ "packet_loss_rate": rate }),
            Self::Bandwidth { limit } => json!({ "limit": limit }),
            Self::Latency { delay, jitter } => json!({
                "latency_ms": delay.as_millis() as u64,
                "jitter_ms": jitter.as_millis() as u64,
            }),
        }
    }
}

/// The mechanisms backends are built on.
#[derive(Debug, Clone)]
pub struct Mechanisms {
    /// Shared XDP attachment for the kernel-filter backends.
    pub xdp: Arc<XdpAttachment>,
    /// `tc` handle for the latency backend.
    pub tc: Tc,
}

/// One impairment backend.
#[derive(Debug)]
pub enum Backend {
    PacketLoss(PacketLoss),
    Bandwidth(Bandwidth),
    Latency(Latency),
}

impl Backend {
    /// Build the backend matching `params`, programmed with them.
    pub async fn new(params: Params, mechanisms: &Mechanisms) -> Result<Self> {
        let mut backend = match params.kind() {
            BackendKind::PacketLoss => Self::PacketLoss(PacketLoss::new(mechanisms.xdp.clone())),
            BackendKind::Bandwidth => Self::Bandwidth(Bandwidth::new(mechanisms.xdp.clone())),
            BackendKind::Latency => Self::Latency(Latency::new(mechanisms.tc.clone())),
        };
        backend.program(params).await?;
        Ok(backend)
    }

    /// Which impairment this backend applies.
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::PacketLoss(_) => BackendKind::PacketLoss,
            Self::Bandwidth(_) => BackendKind::Bandwidth,
            Self::Latency(_) => BackendKind::Latency,
        }
    }

    /// Current parameters.
    pub fn params(&self) -> Params {
        match self {
            Self::PacketLoss(b) => Params::PacketLoss { rate: b.rate() },
            Self::Bandwidth(b) => Params::Bandwidth { limit: b.limit() },
            Self::Latency(b) => Params::Latency {
                delay: b.delay(),
                jitter: b.jitter(),
            },
        }
    }

    /// Validate and store `params`, re-programming the live mechanism if active.
    pub async fn program(&mut self, params: Params) -> Result<()> {
        match (self, params) {
            (Self::PacketLoss(b), Params::PacketLoss { rate }) => b.set_rate(rate),
            (Self::Bandwidth(b), Params::Bandwidth { limit }) => b.set_limit(limit),
            (Self::Latency(b), Params::Latency { delay, jitter }) => {
                b.set_delay(delay, jitter).await
            }
            (backend, params) => Err(Error::set_param(format!(
                "{} parameters given to the {} backend",
                params.kind(),
                backend.kind()
            ))),
        }
    }

    /// Install the mechanism on `interface`.
    pub async fn activate(&mut self, interface: &Interface) -> Result<()> {
        match self {
            Self::PacketLoss(b) => b.activate(interface),
            Self::Bandwidth(b) => b.activate(interface),
            Self::Latency(b) => b.activate(interface).await,
        }
    }

    /// Remove the mechanism. Calling this on an inactive backend is a no-op.
    pub async fn deactivate(&mut self) -> Result<()> {
        match self {
            Self::PacketLoss(b) => b.deactivate(),
            Self::Bandwidth(b) => b.deactivate(),
            Self::Latency(b) => b.deactivate().await,
        }
    }

    /// Query the mechanism for whether the impairment is still in effect.
    pub async fn is_active(&self) -> Result<bool> {
        match self {
            Self::PacketLoss(b) => b.is_active(),
            Self::Bandwidth(b) => b.is_active(),
            Self::Latency(b) => b.is_active().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(BackendKind::PacketLoss.to_string(), "packetloss");
        assert_eq!("latency".parse::<BackendKind>().unwrap(), BackendKind::Latency);
        assert!("jitter".parse::<BackendKind>().is_err());
        assert_eq!(
            serde_json::to_string(&BackendKind::PacketLoss).unwrap(),
            "\"packetloss\""
        );
    }

    #[test]
    fn test_params_json() {
        assert_eq!(
            Params::packet_loss(10).to_json(),
            json!({ "packet_loss_rate": 10 })
        );
        assert_eq!(Params::bandwidth(100).to_json(), json!({ "limit": 100 }));
        assert_eq!(
            Params::latency(Duration::from_millis(100), Duration::from_millis(50)).to_json(),
            json!({ "latency_ms": 100, "jitter_ms": 50 })
        );
    }
}
