//! Restriction services.
//!
//! A [`RestrictionService`] wraps one backend with interface binding,
//! start/stop orchestration and a readiness flag.
//!
//! ```text
//!  Uninitialized ──initialize──▶ Bound ──start──▶ Running
//!                                  ▲                 │
//!                                  └──────stop───────┘
//! ```
//!
//! Stop is confirmed, not assumed: after deactivating, the service polls the
//! mechanism until it reports inactive. Deactivation and every poll run
//! inside the stop window, so a mechanism call that never returns still ends
//! in [`Error::StopTimeout`].

use std::time::Duration;

use serde_json::Value;

use crate::backend::{Backend, BackendKind, Params};
use crate::config::Config;
use crate::interface::Interface;
use crate::status::ServiceStatus;
use crate::{Error, Result};

/// Lifecycle state of a [`RestrictionService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// No backend yet.
    Uninitialized,
    /// Backend exists, impairment not applied.
    Bound,
    /// Impairment applied.
    Running,
}

/// Timing for the stop confirmation poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopPolicy {
    /// Delay between mechanism checks.
    pub poll_interval: Duration,
    /// Total time allowed for the mechanism to go inactive.
    pub timeout: Duration,
}

impl From<&Config> for StopPolicy {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.stop_poll_interval(),
            timeout: config.stop_timeout(),
        }
    }
}

/// One impairment kind's lifecycle.
#[derive(Debug)]
pub struct RestrictionService {
    kind: BackendKind,
    backend: Option<Backend>,
    interface: Option<Interface>,
    ready: bool,
    policy: StopPolicy,
}

impl RestrictionService {
    /// Create an uninitialized service for `kind`.
    pub fn new(kind: BackendKind, policy: StopPolicy) -> Self {
        Self {
            kind,
            backend: None,
            interface: None,
            ready: false,
            policy,
        }
    }

    /// Create a service around an existing backend.
    pub fn with_backend(backend: Backend, policy: StopPolicy) -> Self {
        let mut service = Self::new(backend.kind(), policy);
        service.backend = Some(backend);
        service
    }

    /// Install the backend. The backend kind must match the service kind.
    pub fn initialize(&mut self, backend: Backend) -> Result<()> {
        if backend.kind() != self.kind {
            return Err(Error::set_param(format!(
                "{} backend given to the {} service",
                backend.kind(),
                self.kind
            )));
        }
        self.backend = Some(backend);
        Ok(())
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn state(&self) -> ServiceState {
        match (&self.backend, self.ready) {
            (None, _) => ServiceState::Uninitialized,
            (Some(_), false) => ServiceState::Bound,
            (Some(_), true) => ServiceState::Running,
        }
    }

    /// The interface the service was last started on.
    pub fn interface(&self) -> Option<&Interface> {
        self.interface.as_ref()
    }

    /// Current parameters, `None` when uninitialized.
    pub fn params(&self) -> Option<Params> {
        self.backend.as_ref().map(Backend::params)
    }

    /// Apply the impairment on `interface_name`.
    pub async fn start(&mut self, interface_name: &str) -> Result<()> {
        let Some(backend) = self.backend.as_mut() else {
            return Err(Error::NotInitialized);
        };
        if self.ready {
            return Err(Error::AlreadyStarted);
        }

        let interface =
            Interface::resolve(interface_name).map_err(|e| e.start_failed("resolve interface"))?;
        backend
            .activate(&interface)
            .await
            .map_err(|e| e.start_failed("activate"))?;

        tracing::info!(service = %self.kind, interface = %interface, "service started");
        self.interface = Some(interface);
        self.ready = true;
        Ok(())
    }

    /// Remove the impairment and wait for the mechanism to confirm.
    ///
    /// On failure the service stays ready so stop can be retried.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(backend) = self.backend.as_mut() else {
            return Err(Error::NotStarted);
        };
        if !self.ready {
            return Err(Error::NotStarted);
        }

        let StopPolicy {
            poll_interval,
            timeout,
        } = self.policy;
        let confirm = async {
            backend.deactivate().await.map_err(Error::stop_failed)?;
            while backend.is_active().await.map_err(Error::stop_failed)? {
                tokio::time::sleep(poll_interval).await;
            }
            Ok::<_, Error>(())
        };

        match tokio::time::timeout(timeout, confirm).await {
            Ok(confirmed) => confirmed?,
            Err(_) => {
                tracing::warn!(service = %self.kind, ?timeout, "mechanism still active");
                return Err(Error::StopTimeout { timeout });
            }
        }

        tracing::info!(service = %self.kind, "service stopped");
        self.ready = false;
        Ok(())
    }

    /// Replace the parameters, re-programming the live mechanism if running.
    ///
    /// A failure to reach the live mechanism is reported as a parameter
    /// failure; the previous parameters stay in place.
    pub async fn set_parameters(&mut self, params: Params) -> Result<()> {
        let backend = self.backend.as_mut().ok_or(Error::NotInitialized)?;
        backend
            .program(params)
            .await
            .map_err(Error::set_param_failed)?;
        tracing::debug!(service = %self.kind, ?params, "parameters updated");
        Ok(())
    }

    /// Snapshot of readiness, interface and parameters.
    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            name: self.kind.name().to_string(),
            ready: self.ready,
            network_interface_name: self
                .interface
                .as_ref()
                .map(|iface| iface.name().to_string())
                .unwrap_or_default(),
            params: self
                .params()
                .map_or_else(|| Value::Object(Default::default()), |p| p.to_json()),
        }
    }
}
