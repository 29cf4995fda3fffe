//! Loading the XDP object file with aya.

use std::path::PathBuf;

use aya::Ebpf;
use aya::maps::{HashMap as BpfHashMap, MapError};
use aya::programs::{Xdp, XdpFlags, xdp::XdpLinkId};

use super::{LoadedProgram, ProgramLoader, Table, XdpMode};
use crate::{Error, Result};

/// Table key used by the XDP program.
const TABLE_KEY: u32 = 0;

impl XdpMode {
    fn flags(self) -> XdpFlags {
        match self {
            Self::Default => XdpFlags::default(),
            Self::Skb => XdpFlags::SKB_MODE,
            Self::Driver => XdpFlags::DRV_MODE,
            Self::Hardware => XdpFlags::HW_MODE,
        }
    }
}

/// Loads a pre-built XDP object file from disk.
#[derive(Debug, Clone)]
pub struct AyaLoader {
    object: PathBuf,
    program: String,
    mode: XdpMode,
}

impl AyaLoader {
    /// Create a loader for the object at `object`, entry point `program`.
    pub fn new(object: impl Into<PathBuf>, program: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            program: program.into(),
            mode: XdpMode::Default,
        }
    }

    /// Set the attach mode.
    pub fn mode(mut self, mode: XdpMode) -> Self {
        self.mode = mode;
        self
    }
}

impl ProgramLoader for AyaLoader {
    fn attach(&self, ifindex: u32) -> Result<Box<dyn LoadedProgram>> {
        if !self.object.is_file() {
            return Err(Error::ProgramNotFound(self.object.clone()));
        }

        let mut bpf = Ebpf::load_file(&self.object).map_err(|e| Error::bpf("load XDP object", e))?;

        let program: &mut Xdp = bpf
            .program_mut(&self.program)
            .ok_or_else(|| Error::bpf("find XDP program", format!("{} not in object", self.program)))?
            .try_into()
            .map_err(|e| Error::bpf("find XDP program", e))?;
        program
            .load()
            .map_err(|e| Error::bpf("load XDP program", e))?;
        let link = program
            .attach_to_if_index(ifindex, self.mode.flags())
            .map_err(|e| Error::bpf("attach XDP program", e))?;

        tracing::debug!(ifindex, object = %self.object.display(), mode = ?self.mode, "loaded XDP program");

        Ok(Box::new(AyaProgram {
            bpf,
            program: self.program.clone(),
            link,
        }))
    }
}

#[derive(Debug)]
struct AyaProgram {
    bpf: Ebpf,
    program: String,
    link: XdpLinkId,
}

impl AyaProgram {
    fn missing_map(table: Table) -> Error {
        Error::bpf("open map", format!("{} not in object", table.map_name()))
    }
}

impl LoadedProgram for AyaProgram {
    fn write(&mut self, table: Table, value: u64) -> Result<()> {
        let map = self
            .bpf
            .map_mut(table.map_name())
            .ok_or_else(|| Self::missing_map(table))?;

        match table {
            Table::PacketLossRate => {
                let rate = i32::try_from(value)
                    .map_err(|_| Error::set_param(format!("packet loss rate {value} overflows i32")))?;
                let mut map: BpfHashMap<_, u32, i32> =
                    BpfHashMap::try_from(map).map_err(|e| Error::bpf("open map", e))?;
                map.insert(TABLE_KEY, rate, 0)
                    .map_err(|e| Error::bpf(format!("update {table}"), e))
            }
            Table::BandwidthLimit => {
                let mut map: BpfHashMap<_, u32, u64> =
                    BpfHashMap::try_from(map).map_err(|e| Error::bpf("open map", e))?;
                map.insert(TABLE_KEY, value, 0)
                    .map_err(|e| Error::bpf(format!("update {table}"), e))
            }
        }
    }

    fn read(&self, table: Table) -> Result<Option<u64>> {
        let map = self
            .bpf
            .map(table.map_name())
            .ok_or_else(|| Self::missing_map(table))?;

        let value = match table {
            Table::PacketLossRate => {
                let map: BpfHashMap<_, u32, i32> =
                    BpfHashMap::try_from(map).map_err(|e| Error::bpf("open map", e))?;
                map.get(&TABLE_KEY, 0).map(|v| u64::try_from(v).unwrap_or(0))
            }
            Table::BandwidthLimit => {
                let map: BpfHashMap<_, u32, u64> =
                    BpfHashMap::try_from(map).map_err(|e| Error::bpf("open map", e))?;
                map.get(&TABLE_KEY, 0)
            }
        };

        match value {
            Ok(v) => Ok(Some(v)),
            Err(MapError::KeyNotFound) => Ok(None),
            Err(e) => Err(Error::bpf(format!("read {table}"), e)),
        }
    }

    fn detach(self: Box<Self>) -> Result<()> {
        let Self {
            mut bpf,
            program,
            link,
        } = *self;
        let xdp: &mut Xdp = bpf
            .program_mut(&program)
            .ok_or_else(|| Error::bpf("detach XDP program", "program vanished"))?
            .try_into()
            .map_err(|e| Error::bpf("detach XDP program", e))?;
        xdp.detach(link)
            .map_err(|e| Error::bpf("detach XDP program", e))
    }
}
