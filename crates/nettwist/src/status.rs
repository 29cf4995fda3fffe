//! Service status snapshots.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::Slug;

/// A point-in-time view of one restriction service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    /// Impairment kind: `packetloss`, `bandwidth` or `latency`.
    pub name: String,
    /// Whether the impairment is applied.
    pub ready: bool,
    /// The interface the service was last started on, empty if never started.
    pub network_interface_name: String,
    /// Current parameters, keyed by their wire names.
    #[serde(default)]
    pub params: Value,
}

impl ServiceStatus {
    /// The readiness slug for this status.
    pub fn slug(&self) -> Slug {
        if self.ready {
            Slug::ServiceReady
        } else {
            Slug::ServiceNotReady
        }
    }

    /// Look up one parameter as an integer.
    pub fn param_i64(&self, key: &str) -> Option<i64> {
        self.params.get(key).and_then(Value::as_i64)
    }
}
