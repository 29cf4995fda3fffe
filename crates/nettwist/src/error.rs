//! Error types for control plane operations.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::message::Slug;

/// Result type for control plane operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while starting, stopping or reconfiguring an impairment.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The service has no backend yet.
    #[error("service not initialized")]
    NotInitialized,

    /// Start was requested on a service that is already running.
    #[error("service already started")]
    AlreadyStarted,

    /// Stop was requested on a service that is not running.
    #[error("service not started")]
    NotStarted,

    /// Activation failed at the given stage.
    #[error("start service: {stage}: {source}")]
    StartFailed {
        /// The stage that failed (e.g. "resolve interface").
        stage: &'static str,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// Deactivation itself raised an error.
    #[error("stop service: {source}")]
    StopFailed {
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// The mechanism still reported itself active when the stop window closed.
    #[error("stop service: mechanism still active after {timeout:?}")]
    StopTimeout {
        /// The stop window that elapsed.
        timeout: Duration,
    },

    /// Parameters were rejected (wrong kind or out of range).
    #[error("set parameters: {reason}")]
    SetParamFailed {
        /// Why the parameters were rejected.
        reason: String,
    },

    /// The live mechanism rejected a parameter push.
    #[error("set parameters: {source}")]
    ParamPushFailed {
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// An inbound request body could not be decoded.
    #[error("decode request: {0}")]
    DecodeFailed(String),

    /// Interface name was invalid or not present on the host.
    #[error("interface {name}: {reason}")]
    Interface {
        /// The interface name.
        name: String,
        /// What went wrong.
        reason: String,
    },

    /// A BPF program or map operation failed.
    #[error("{operation}: {message}")]
    Bpf {
        /// The operation that failed.
        operation: String,
        /// Human-readable error message.
        message: String,
    },

    /// The XDP object file does not exist.
    #[error("XDP object not found: {}", .0.display())]
    ProgramNotFound(PathBuf),

    /// The shared attachment has no holder for this interface.
    #[error("no XDP attachment on interface index {ifindex}")]
    NotAttached {
        /// The interface index.
        ifindex: u32,
    },

    /// An external command failed.
    #[error(transparent)]
    Command(#[from] crate::command::Error),

    /// An external tool could not be resolved.
    #[error("{0} command not found")]
    ToolNotFound(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Wrap a mechanism error as a start failure at `stage`.
    ///
    /// Category errors (already-started and friends) pass through unchanged.
    pub fn start_failed(self, stage: &'static str) -> Self {
        if self.is_category() {
            return self;
        }
        Self::StartFailed {
            stage,
            source: Box::new(self),
        }
    }

    /// Wrap a mechanism error as a stop failure.
    pub fn stop_failed(self) -> Self {
        if self.is_category() {
            return self;
        }
        Self::StopFailed {
            source: Box::new(self),
        }
    }

    /// Wrap a mechanism error raised while pushing parameters to a live service.
    pub fn set_param_failed(self) -> Self {
        if self.is_category() {
            return self;
        }
        Self::ParamPushFailed {
            source: Box::new(self),
        }
    }

    /// Build a parameter rejection.
    pub fn set_param(reason: impl Into<String>) -> Self {
        Self::SetParamFailed {
            reason: reason.into(),
        }
    }

    /// Build a BPF error with operation context.
    pub fn bpf(operation: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Bpf {
            operation: operation.into(),
            message: err.to_string(),
        }
    }

    fn is_category(&self) -> bool {
        matches!(
            self,
            Self::NotInitialized
                | Self::AlreadyStarted
                | Self::NotStarted
                | Self::StartFailed { .. }
                | Self::StopFailed { .. }
                | Self::StopTimeout { .. }
                | Self::SetParamFailed { .. }
                | Self::ParamPushFailed { .. }
                | Self::DecodeFailed(_)
        )
    }

    /// Machine-readable category of this error.
    pub fn slug(&self) -> Slug {
        match self {
            Self::NotInitialized => Slug::ServiceNotInitialized,
            Self::AlreadyStarted => Slug::ServiceAlreadyStarted,
            Self::NotStarted => Slug::ServiceNotStarted,
            Self::StopFailed { .. } | Self::StopTimeout { .. } => Slug::ServiceStopFailed,
            Self::SetParamFailed { .. } | Self::ParamPushFailed { .. } => {
                Slug::ServiceSetParamFailed
            }
            Self::DecodeFailed(_) => Slug::JsonDecodeFailed,
            _ => Slug::ServiceStartFailed,
        }
    }

    /// Check if the service had not been initialized.
    pub fn is_not_initialized(&self) -> bool {
        matches!(self, Self::NotInitialized)
    }

    /// Check if the service was already running.
    pub fn is_already_started(&self) -> bool {
        matches!(self, Self::AlreadyStarted)
    }

    /// Check if the service was not running.
    pub fn is_not_started(&self) -> bool {
        matches!(self, Self::NotStarted)
    }

    /// Check if stopping failed, either by error or by timeout.
    pub fn is_stop_failed(&self) -> bool {
        matches!(self, Self::StopFailed { .. } | Self::StopTimeout { .. })
    }

    /// Check if parameters were rejected or could not be pushed.
    pub fn is_set_param_failed(&self) -> bool {
        matches!(
            self,
            Self::SetParamFailed { .. } | Self::ParamPushFailed { .. }
        )
    }

    /// Check if this is a "not found" error (interface, tool or object file).
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Interface { .. } | Self::ToolNotFound(_) | Self::ProgramNotFound(_) => true,
            Self::StartFailed { source, .. }
            | Self::StopFailed { source }
            | Self::ParamPushFailed { source } => source.is_not_found(),
            _ => false,
        }
    }
}
