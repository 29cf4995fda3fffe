//! The control plane facade.
//!
//! [`ControlPlane`] owns at most one [`RestrictionService`] per impairment
//! kind. Services are created on first start and live until the process
//! exits; each sits behind its own async mutex, so operations on one kind
//! never wait on another.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use nettwist::{BackendKind, Config, ControlPlane, Params};
//!
//! let control = ControlPlane::new(Config::default());
//!
//! control.start(Params::packet_loss(10), "eth0").await?;
//! control
//!     .start(Params::latency(Duration::from_millis(100), Duration::ZERO), "eth0")
//!     .await?;
//!
//! for status in control.all_statuses().await {
//!     println!("{}: ready={}", status.name, status.ready);
//! }
//!
//! control.shutdown_all().await?;
//! ```

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::backend::{Backend, BackendKind, Mechanisms, Params};
use crate::command::{CommandRunner, SystemRunner};
use crate::config::Config;
use crate::service::{RestrictionService, StopPolicy};
use crate::status::ServiceStatus;
use crate::tc::Tc;
use crate::xdp::{AyaLoader, ProgramLoader, XdpAttachment};
use crate::{Error, Result};

type Slot = Mutex<Option<RestrictionService>>;

/// Dispatches start, stop, status and parameter changes to the services.
#[derive(Debug)]
pub struct ControlPlane {
    config: Config,
    mechanisms: Mechanisms,
    packetloss: Slot,
    bandwidth: Slot,
    latency: Slot,
}

impl ControlPlane {
    /// Create a control plane that drives the host kernel and `tc`.
    pub fn new(config: Config) -> Self {
        let loader = AyaLoader::new(config.bpf_object.clone(), config.xdp_program.clone())
            .mode(config.xdp_mode);
        Self::with_parts(config, loader, Arc::new(SystemRunner))
    }

    /// Create a control plane with a custom program loader and command runner.
    pub fn with_parts(
        config: Config,
        loader: impl ProgramLoader + 'static,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let mechanisms = Mechanisms {
            xdp: Arc::new(XdpAttachment::new(loader)),
            tc: Tc::new(config.tc_path.clone(), runner),
        };
        Self {
            config,
            mechanisms,
            packetloss: Mutex::new(None),
            bandwidth: Mutex::new(None),
            latency: Mutex::new(None),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The shared XDP attachment.
    pub fn xdp(&self) -> &XdpAttachment {
        &self.mechanisms.xdp
    }

    fn slot(&self, kind: BackendKind) -> &Slot {
        match kind {
            BackendKind::PacketLoss => &self.packetloss,
            BackendKind::Bandwidth => &self.bandwidth,
            BackendKind::Latency => &self.latency,
        }
    }

    /// Start the impairment described by `params` on `interface`.
    ///
    /// The service is created on first use. Starting a running service fails
    /// with [`Error::AlreadyStarted`] and leaves its parameters untouched.
    pub async fn start(&self, params: Params, interface: &str) -> Result<()> {
        let kind = params.kind();
        let mut slot = self.slot(kind).lock().await;

        match slot.as_mut() {
            Some(service) if service.is_ready() => return Err(Error::AlreadyStarted),
            Some(service) => service.set_parameters(params).await?,
            None => {
                let backend = Backend::new(params, &self.mechanisms).await?;
                tracing::debug!(service = %kind, "creating service");
                *slot = Some(RestrictionService::with_backend(
                    backend,
                    StopPolicy::from(&self.config),
                ));
            }
        }

        let service = slot.as_mut().ok_or(Error::NotInitialized)?;
        service.start(interface).await
    }

    /// Stop the impairment of `kind`.
    pub async fn stop(&self, kind: BackendKind) -> Result<()> {
        let mut slot = self.slot(kind).lock().await;
        let service = slot.as_mut().ok_or(Error::NotInitialized)?;
        service.stop().await
    }

    /// Status of the service for `kind`.
    pub async fn status(&self, kind: BackendKind) -> Result<ServiceStatus> {
        let slot = self.slot(kind).lock().await;
        slot.as_ref()
            .map(RestrictionService::status)
            .ok_or(Error::NotInitialized)
    }

    /// Change the parameters of an existing service, live if it is running.
    pub async fn set_parameters(&self, params: Params) -> Result<()> {
        let mut slot = self.slot(params.kind()).lock().await;
        let service = slot.as_mut().ok_or(Error::NotInitialized)?;
        service.set_parameters(params).await
    }

    /// Status of every instantiated service: packet loss, bandwidth, latency.
    pub async fn all_statuses(&self) -> Vec<ServiceStatus> {
        let mut out = Vec::with_capacity(BackendKind::ALL.len());
        for kind in BackendKind::ALL {
            if let Some(service) = self.slot(kind).lock().await.as_ref() {
                out.push(service.status());
            }
        }
        out
    }

    /// Stop every running service.
    ///
    /// Keeps going past failures and returns the first one.
    pub async fn shutdown_all(&self) -> Result<()> {
        let mut first = None;
        for kind in BackendKind::ALL {
            let mut slot = self.slot(kind).lock().await;
            let Some(service) = slot.as_mut().filter(|s| s.is_ready()) else {
                continue;
            };
            if let Err(err) = service.stop().await {
                tracing::error!(service = %kind, error = %err, "failed to stop service");
                first.get_or_insert(err);
            }
        }
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
