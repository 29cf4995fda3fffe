use std::sync::Arc;

use crate::Result;
use crate::interface::Interface;
use crate::xdp::{Table, TableBinding, XdpAttachment};

/// Caps the byte rate in the XDP program.
#[derive(Debug)]
pub struct Bandwidth {
    limit: u64,
    xdp: Arc<XdpAttachment>,
    binding: TableBinding,
}

impl Bandwidth {
    pub(crate) fn new(xdp: Arc<XdpAttachment>) -> Self {
        Self {
            limit: 0,
            xdp,
            binding: TableBinding::new(Table::BandwidthLimit),
        }
    }

    /// Current byte-rate ceiling, 0 when uncapped.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub(crate) fn set_limit(&mut self, limit: u64) -> Result<()> {
        self.binding.update(&self.xdp, limit)?;
        self.limit = limit;
        Ok(())
    }

    pub(crate) fn activate(&mut self, interface: &Interface) -> Result<()> {
        self.binding
            .activate(&self.xdp, interface.index(), self.limit)?;
        tracing::info!(interface = %interface, limit = self.limit, "bandwidth limit applied");
        Ok(())
    }

    pub(crate) fn deactivate(&mut self) -> Result<()> {
        self.binding.deactivate(&self.xdp)
    }

    pub(crate) fn is_active(&self) -> Result<bool> {
        self.binding.is_active(&self.xdp)
    }
}
