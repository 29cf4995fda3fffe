//! Remote client for the REST API.
//!
//! # Example
//!
//! ```ignore
//! use nettwist::client::Client;
//! use nettwist::request::PacketLossStartRequest;
//!
//! let client = Client::new("http://127.0.0.1:9007");
//! let req = PacketLossStartRequest {
//!     network_interface: "eth0".into(),
//!     packet_loss_rate: 10,
//! };
//!
//! match client.packetloss_start(&req).await {
//!     Ok(()) => {}
//!     Err(e) if e.is_service_already_started() => {}
//!     Err(e) => return Err(e.into()),
//! }
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::message::{MetaMessage, Slug};
use crate::request::{
    API_PREFIX, BandwidthParamsRequest, BandwidthStartRequest, LatencyParamsRequest,
    LatencyStartRequest, PacketLossParamsRequest, PacketLossStartRequest,
};
use crate::status::ServiceStatus;

/// Errors returned by [`Client`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server answered with an error message.
    #[error("{}: {}", .0.slug, .0.message)]
    Service(MetaMessage),

    /// The server answered with an unexpected status and no message.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be decoded.
    #[error("decode response: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The category slug, if the server sent one.
    pub fn slug(&self) -> Option<Slug> {
        match self {
            Self::Service(msg) => Some(msg.slug),
            _ => None,
        }
    }

    pub fn is_service_not_initialized(&self) -> bool {
        self.slug() == Some(Slug::ServiceNotInitialized)
    }

    pub fn is_service_already_started(&self) -> bool {
        self.slug() == Some(Slug::ServiceAlreadyStarted)
    }

    pub fn is_service_not_started(&self) -> bool {
        self.slug() == Some(Slug::ServiceNotStarted)
    }

    pub fn is_service_start_failed(&self) -> bool {
        self.slug() == Some(Slug::ServiceStartFailed)
    }

    pub fn is_service_stop_failed(&self) -> bool {
        self.slug() == Some(Slug::ServiceStopFailed)
    }

    pub fn is_service_set_param_failed(&self) -> bool {
        self.slug() == Some(Slug::ServiceSetParamFailed)
    }

    pub fn is_service_not_ready(&self) -> bool {
        self.slug() == Some(Slug::ServiceNotReady)
    }
}

/// Result type for client calls.
pub type Result<T> = std::result::Result<T, Error>;

/// Client for a nettwist server.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

impl Client {
    /// Create a client for the server at `base_url` (e.g. `http://127.0.0.1:9007`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// The server base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Route all requests through the proxy at `proxy_url`.
    pub fn set_proxy(&mut self, proxy_url: &str) -> Result<()> {
        let proxy = reqwest::Proxy::all(proxy_url)?;
        self.http = reqwest::Client::builder().proxy(proxy).build()?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.base_url)
    }

    /// Decode a body that may carry an error message.
    fn message(status: reqwest::StatusCode, body: &str) -> Result<MetaMessage> {
        match serde_json::from_str::<MetaMessage>(body) {
            Ok(msg) if msg.is_error() || !status.is_success() => Err(Error::Service(msg)),
            Ok(msg) => Ok(msg),
            Err(_) if !status.is_success() => Err(Error::Status {
                status: status.as_u16(),
                body: body.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: Option<&B>) -> Result<MetaMessage> {
        let mut req = self.http.post(self.url(path));
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        Self::message(status, &body)
    }

    async fn get_message(&self, path: &str) -> Result<MetaMessage> {
        let resp = self.http.get(self.url(path)).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        Self::message(status, &body)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Self::message(status, &body).err().unwrap_or(Error::Status {
                status: status.as_u16(),
                body,
            }));
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn action<B: Serialize + ?Sized>(&self, path: &str, body: Option<&B>) -> Result<()> {
        self.post(path, body).await.map(drop)
    }

    pub async fn packetloss_start(&self, req: &PacketLossStartRequest) -> Result<()> {
        self.action("/packetloss/start", Some(req)).await
    }

    pub async fn packetloss_stop(&self) -> Result<()> {
        self.action::<()>("/packetloss/stop", None).await
    }

    pub async fn packetloss_status(&self) -> Result<MetaMessage> {
        self.get_message("/packetloss/status").await
    }

    pub async fn packetloss_set_params(&self, req: &PacketLossParamsRequest) -> Result<()> {
        self.action("/packetloss/params", Some(req)).await
    }

    pub async fn bandwidth_start(&self, req: &BandwidthStartRequest) -> Result<()> {
        self.action("/bandwidth/start", Some(req)).await
    }

    pub async fn bandwidth_stop(&self) -> Result<()> {
        self.action::<()>("/bandwidth/stop", None).await
    }

    pub async fn bandwidth_status(&self) -> Result<MetaMessage> {
        self.get_message("/bandwidth/status").await
    }

    pub async fn bandwidth_set_params(&self, req: &BandwidthParamsRequest) -> Result<()> {
        self.action("/bandwidth/params", Some(req)).await
    }

    pub async fn latency_start(&self, req: &LatencyStartRequest) -> Result<()> {
        self.action("/latency/start", Some(req)).await
    }

    pub async fn latency_stop(&self) -> Result<()> {
        self.action::<()>("/latency/stop", None).await
    }

    pub async fn latency_status(&self) -> Result<MetaMessage> {
        self.get_message("/latency/status").await
    }

    pub async fn latency_set_params(&self, req: &LatencyParamsRequest) -> Result<()> {
        self.action("/latency/params", Some(req)).await
    }

    /// Status of every instantiated service.
    pub async fn all_services_status(&self) -> Result<Vec<ServiceStatus>> {
        self.get_json(self.url("/services/status")).await
    }

    /// Every route the server answers.
    pub async fn routes(&self) -> Result<Vec<String>> {
        self.get_json(format!("{}/", self.base_url)).await
    }
}
