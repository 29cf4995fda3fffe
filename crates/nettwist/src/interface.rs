//! Host network interface references.
//!
//! An [`Interface`] is a name resolved to a kernel interface index at bind
//! time. Resolution never touches traffic control or XDP state, so a failed
//! lookup aborts a start before anything has changed on the host.

use std::ffi::CString;
use std::fmt;

use crate::{Error, Result};

/// Maximum interface name length (including null terminator).
pub const IFNAMSIZ: usize = 16;

/// A resolved network interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interface {
    name: String,
    index: u32,
}

impl Interface {
    /// Resolve an interface by name.
    pub fn resolve(name: &str) -> Result<Self> {
        validate(name)?;
        let index = name_to_index(name)?;
        Ok(Self {
            name: name.to_string(),
            index,
        })
    }

    /// The interface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The kernel interface index.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (index {})", self.name, self.index)
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> Error {
    Error::Interface {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate an interface name.
pub fn validate(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(name, "empty name"));
    }

    if name.len() >= IFNAMSIZ {
        return Err(invalid(
            name,
            format!("name too long (max {} chars)", IFNAMSIZ - 1),
        ));
    }

    if name.contains('/') || name.contains('\0') {
        return Err(invalid(name, "name contains invalid characters"));
    }

    if name.chars().any(|c| c.is_whitespace()) {
        return Err(invalid(name, "name contains whitespace"));
    }

    Ok(())
}

/// Convert an interface name to its index.
fn name_to_index(name: &str) -> Result<u32> {
    let c_name = CString::new(name).map_err(|_| invalid(name, "name contains NUL"))?;
    // SAFETY: `c_name` is a valid NUL-terminated string that outlives the call.
    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
    if index == 0 {
        let err = std::io::Error::last_os_error();
        return Err(invalid(name, format!("lookup network device: {err}")));
    }
    Ok(index)
}
