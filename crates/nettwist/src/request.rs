//! JSON request bodies of the REST API.
//!
//! Shared by the server and the client so both sides agree on field names.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::Params;

/// Route prefix of the v1 API.
pub const API_PREFIX: &str = "/api/v1";

/// A request that starts an impairment on an interface.
pub trait StartRequest {
    /// The interface to impair.
    fn interface(&self) -> &str;

    /// The impairment parameters.
    fn params(&self) -> Params;
}

/// Body of `POST /packetloss/start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketLossStartRequest {
    pub network_interface: String,
    pub packet_loss_rate: i32,
}

/// Body of `POST /bandwidth/start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthStartRequest {
    pub network_interface: String,
    pub limit: u64,
}

/// Body of `POST /latency/start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyStartRequest {
    pub network_interface: String,
    pub latency_ms: u64,
    #[serde(default)]
    pub jitter_ms: u64,
}

impl StartRequest for PacketLossStartRequest {
    fn interface(&self) -> &str {
        &self.network_interface
    }

    fn params(&self) -> Params {
        Params::packet_loss(self.packet_loss_rate)
    }
}

impl StartRequest for BandwidthStartRequest {
    fn interface(&self) -> &str {
        &self.network_interface
    }

    fn params(&self) -> Params {
        Params::bandwidth(self.limit)
    }
}

impl StartRequest for LatencyStartRequest {
    fn interface(&self) -> &str {
        &self.network_interface
    }

    fn params(&self) -> Params {
        Params::latency(
            Duration::from_millis(self.latency_ms),
            Duration::from_millis(self.jitter_ms),
        )
    }
}

/// Body of `POST /packetloss/params`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketLossParamsRequest {
    pub packet_loss_rate: i32,
}

/// Body of `POST /bandwidth/params`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthParamsRequest {
    pub limit: u64,
}

/// Body of `POST /latency/params`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyParamsRequest {
    pub latency_ms: u64,
    #[serde(default)]
    pub jitter_ms: u64,
}

impl From<PacketLossParamsRequest> for Params {
    fn from(req: PacketLossParamsRequest) -> Self {
        Params::packet_loss(req.packet_loss_rate)
    }
}

impl From<BandwidthParamsRequest> for Params {
    fn from(req: BandwidthParamsRequest) -> Self {
        Params::bandwidth(req.limit)
    }
}

impl From<LatencyParamsRequest> for Params {
    fn from(req: LatencyParamsRequest) -> Self {
        Params::latency(
            Duration::from_millis(req.latency_ms),
            Duration::from_millis(req.jitter_ms),
        )
    }
}
