//! Shared XDP program attachment.
//!
//! The packet-loss and bandwidth backends are both served by one XDP
//! program. Each backend only owns a table inside that program, so the
//! physical attachment to an interface must be shared: the first backend
//! to start on an interface loads and attaches the program, the last one to
//! stop detaches it.
//!
//! [`XdpAttachment`] is that shared handle. It keeps one attachment per
//! interface index together with a reference count, all behind a single
//! mutex so that different backend kinds racing on the same interface see a
//! consistent count.
//!
//! ```text
//!   PacketLoss ──┐                       ┌─ packetloss_rate_map
//!                ├─ XdpAttachment[ifidx] ┤
//!   Bandwidth ───┘      (refs = 2)       └─ bandwidth_limit_map
//! ```

mod loader;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

pub use loader::AyaLoader;

use crate::{Error, Result};

/// A control table inside the XDP program, keyed by `u32 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// Drop percentage, `i32` in the kernel.
    PacketLossRate,
    /// Byte-rate ceiling, `u64` in the kernel.
    BandwidthLimit,
}

impl Table {
    /// The BPF map name backing this table.
    pub fn map_name(&self) -> &'static str {
        match self {
            Self::PacketLossRate => "packetloss_rate_map",
            Self::BandwidthLimit => "bandwidth_limit_map",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.map_name())
    }
}

/// How the XDP program is attached to the interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XdpMode {
    /// Let the kernel pick.
    #[default]
    Default,
    /// Generic (SKB) mode, works on every driver.
    Skb,
    /// Native driver mode.
    Driver,
    /// Offloaded to the NIC.
    Hardware,
}

impl FromStr for XdpMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "default" => Ok(Self::Default),
            "skb" => Ok(Self::Skb),
            "driver" => Ok(Self::Driver),
            "hardware" => Ok(Self::Hardware),
            _ => Err(Error::Config(format!(
                "unknown XDP mode {s:?} (expected default, skb, driver or hardware)"
            ))),
        }
    }
}

/// A program that is loaded and attached to one interface.
pub trait LoadedProgram: Send + fmt::Debug {
    /// Write `value` into `table`.
    fn write(&mut self, table: Table, value: u64) -> Result<()>;

    /// Read the current value of `table`, `None` if it was never written.
    fn read(&self, table: Table) -> Result<Option<u64>>;

    /// Detach the program from its interface and free it.
    fn detach(self: Box<Self>) -> Result<()>;
}

/// Loads the XDP program and attaches it to an interface.
pub trait ProgramLoader: Send + Sync + fmt::Debug {
    /// Load the program and attach it to `ifindex`.
    fn attach(&self, ifindex: u32) -> Result<Box<dyn LoadedProgram>>;
}

#[derive(Debug)]
struct Attached {
    program: Box<dyn LoadedProgram>,
    refs: usize,
}

/// Reference-counted XDP attachments, one per interface index.
#[derive(Debug)]
pub struct XdpAttachment {
    loader: Box<dyn ProgramLoader>,
    attached: Mutex<HashMap<u32, Attached>>,
}

impl XdpAttachment {
    /// Create an empty attachment registry backed by `loader`.
    pub fn new(loader: impl ProgramLoader + 'static) -> Self {
        Self::from_boxed(Box::new(loader))
    }

    /// Create an empty attachment registry from a boxed loader.
    pub fn from_boxed(loader: Box<dyn ProgramLoader>) -> Self {
        Self {
            loader,
            attached: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u32, Attached>> {
        self.attached.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a reference on the attachment for `ifindex`, attaching on first use.
    ///
    /// Returns the new reference count.
    pub fn acquire(&self, ifindex: u32) -> Result<usize> {
        let mut attached = self.lock();

        if let Some(entry) = attached.get_mut(&ifindex) {
            entry.refs += 1;
            tracing::debug!(ifindex, refs = entry.refs, "sharing XDP attachment");
            return Ok(entry.refs);
        }

        let program = self.loader.attach(ifindex)?;
        attached.insert(ifindex, Attached { program, refs: 1 });
        tracing::info!(ifindex, "XDP program attached");
        Ok(1)
    }

    /// Drop a reference on the attachment for `ifindex`, detaching on the last one.
    ///
    /// Returns the remaining reference count.
    pub fn release(&self, ifindex: u32) -> Result<usize> {
        let mut attached = self.lock();

        let entry = attached
            .get_mut(&ifindex)
            .ok_or(Error::NotAttached { ifindex })?;
        entry.refs -= 1;
        if entry.refs > 0 {
            tracing::debug!(ifindex, refs = entry.refs, "XDP attachment still shared");
            return Ok(entry.refs);
        }

        let Some(entry) = attached.remove(&ifindex) else {
            return Ok(0);
        };
        // The handle is consumed either way; a failed detach leaves the
        // program on the interface until the kernel drops it.
        if let Err(err) = entry.program.detach() {
            tracing::warn!(ifindex, error = %err, "XDP detach failed, program may still be attached");
            return Err(err);
        }
        tracing::info!(ifindex, "XDP program detached");
        Ok(0)
    }

    /// Write `value` into `table` on the attachment for `ifindex`.
    pub fn write(&self, ifindex: u32, table: Table, value: u64) -> Result<()> {
        let mut attached = self.lock();
        let entry = attached
            .get_mut(&ifindex)
            .ok_or(Error::NotAttached { ifindex })?;
        entry.program.write(table, value)?;
        tracing::debug!(ifindex, %table, value, "updated XDP table");
        Ok(())
    }

    /// Read `table` on the attachment for `ifindex`.
    ///
    /// Returns `None` when nothing is attached or the table was never written.
    pub fn read(&self, ifindex: u32, table: Table) -> Result<Option<u64>> {
        let attached = self.lock();
        match attached.get(&ifindex) {
            Some(entry) => entry.program.read(table),
            None => Ok(None),
        }
    }

    /// Current reference count for `ifindex`.
    pub fn refs(&self, ifindex: u32) -> usize {
        self.lock().get(&ifindex).map_or(0, |entry| entry.refs)
    }
}

/// One backend's binding to a table of the shared attachment.
///
/// Tracks whether this backend currently holds a reference so that
/// acquire and release stay balanced even when deactivation is retried.
#[derive(Debug)]
pub(crate) struct TableBinding {
    table: Table,
    ifindex: Option<u32>,
    held: bool,
}

impl TableBinding {
    pub(crate) fn new(table: Table) -> Self {
        Self {
            table,
            ifindex: None,
            held: false,
        }
    }

    pub(crate) fn is_held(&self) -> bool {
        self.held
    }

    /// Acquire the attachment for `ifindex` and write `value`.
    ///
    /// The reference is rolled back if the write fails.
    pub(crate) fn activate(&mut self, xdp: &XdpAttachment, ifindex: u32, value: u64) -> Result<()> {
        if self.held {
            return Err(Error::AlreadyStarted);
        }

        xdp.acquire(ifindex)?;
        if let Err(err) = xdp.write(ifindex, self.table, value) {
            if let Err(release_err) = xdp.release(ifindex) {
                tracing::warn!(ifindex, error = %release_err, "rolling back XDP attachment failed");
            }
            return Err(err);
        }

        self.ifindex = Some(ifindex);
        self.held = true;
        Ok(())
    }

    /// Push `value` into the live table if this binding holds a reference.
    pub(crate) fn update(&self, xdp: &XdpAttachment, value: u64) -> Result<()> {
        match (self.held, self.ifindex) {
            (true, Some(ifindex)) => xdp.write(ifindex, self.table, value),
            _ => Ok(()),
        }
    }

    /// Neutralize the table, then release the reference.
    ///
    /// Without a reference this only re-neutralizes the table if the program
    /// is still attached, so a retried stop never releases twice.
    pub(crate) fn deactivate(&mut self, xdp: &XdpAttachment) -> Result<()> {
        let Some(ifindex) = self.ifindex else {
            return Ok(());
        };

        if !self.held {
            return match xdp.write(ifindex, self.table, 0) {
                Err(Error::NotAttached { .. }) => Ok(()),
                other => other,
            };
        }

        // Other holders keep running the program, so the table must read 0
        // before the reference goes away.
        xdp.write(ifindex, self.table, 0)?;
        self.held = false;
        xdp.release(ifindex)?;
        Ok(())
    }

    /// Whether the table on the last bound interface holds a non-zero value.
    pub(crate) fn is_active(&self, xdp: &XdpAttachment) -> Result<bool> {
        match self.ifindex {
            Some(ifindex) => Ok(xdp.read(ifindex, self.table)?.is_some_and(|v| v != 0)),
            None => Ok(false),
        }
    }
}
