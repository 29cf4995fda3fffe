//! Network impairment control plane for Linux.
//!
//! This crate injects controlled packet loss, bandwidth caps and latency on
//! a network interface. Packet loss and bandwidth are enforced by a shared
//! XDP program; latency by a `netem` qdisc installed through `tc`. All three
//! go through the same start / stop / status / set-parameters operations.
//!
//! # Features
//!
//! - `server` - REST API (axum)
//! - `client` - Remote SDK (reqwest)
//! - `testing` - In-memory doubles for the XDP loader and the `tc` binary
//! - `full` - All features enabled
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use nettwist::{BackendKind, Config, ControlPlane, Params};
//!
//! #[tokio::main]
//! async fn main() -> nettwist::Result<()> {
//!     let control = ControlPlane::new(Config::default());
//!
//!     control.start(Params::bandwidth(1_000_000), "eth0").await?;
//!     control.start(Params::packet_loss(5), "eth0").await?;
//!
//!     // Both share one XDP attachment; stopping one leaves the other running.
//!     control.stop(BackendKind::PacketLoss).await?;
//!
//!     control.shutdown_all().await
//! }
//! ```

pub mod backend;
pub mod command;
pub mod config;
pub mod control;
pub mod error;
pub mod interface;
pub mod message;
pub mod request;
pub mod service;
pub mod status;
pub mod tc;
pub mod xdp;

// Feature-gated modules
#[cfg(feature = "server")]
pub mod api;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "testing")]
pub mod testing;

// Re-export common types at crate root for convenience
pub use backend::{BackendKind, Params};
pub use config::Config;
pub use control::ControlPlane;
pub use error::{Error, Result};
pub use message::{MetaMessage, Slug};
pub use status::ServiceStatus;
