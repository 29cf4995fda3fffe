use std::sync::Arc;

use crate::interface::Interface;
use crate::xdp::{Table, TableBinding, XdpAttachment};
use crate::{Error, Result};

/// Drops a percentage of received packets in the XDP program.
#[derive(Debug)]
pub struct PacketLoss {
    rate: i32,
    xdp: Arc<XdpAttachment>,
    binding: TableBinding,
}

impl PacketLoss {
    pub(crate) fn new(xdp: Arc<XdpAttachment>) -> Self {
        Self {
            rate: 0,
            xdp,
            binding: TableBinding::new(Table::PacketLossRate),
        }
    }

    /// Current drop percentage.
    pub fn rate(&self) -> i32 {
        self.rate
    }

    pub(crate) fn set_rate(&mut self, rate: i32) -> Result<()> {
        if !(0..=100).contains(&rate) {
            return Err(Error::set_param(format!(
                "packet loss rate {rate} outside 0..=100"
            )));
        }
        self.binding.update(&self.xdp, rate as u64)?;
        self.rate = rate;
        Ok(())
    }

    pub(crate) fn activate(&mut self, interface: &Interface) -> Result<()> {
        self.binding
            .activate(&self.xdp, interface.index(), self.rate as u64)?;
        tracing::info!(interface = %interface, rate = self.rate, "packet loss applied");
        Ok(())
    }

    pub(crate) fn deactivate(&mut self) -> Result<()> {
        self.binding.deactivate(&self.xdp)
    }

    pub(crate) fn is_active(&self) -> Result<bool> {
        self.binding.is_active(&self.xdp)
    }
}
