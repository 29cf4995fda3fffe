//! Structured messages exchanged with transport adapters.
//!
//! Every response that is not a data payload is a [`MetaMessage`]. Its
//! [`Slug`] is the machine-readable category a remote client branches on.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Severity of a [`MetaMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Info,
    Warning,
    Error,
}

/// Category slugs carried by every [`MetaMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Slug {
    ServiceAlreadyStarted,
    ServiceStartFailed,
    ServiceStopFailed,
    ServiceNotStarted,
    ServiceNotInitialized,
    ServiceReady,
    ServiceNotReady,
    ServiceSetParamFailed,
    JsonDecodeFailed,
    /// Any slug this build does not know about.
    #[serde(other)]
    Unknown,
}

impl Slug {
    /// The wire form of the slug.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceAlreadyStarted => "service-already-started",
            Self::ServiceStartFailed => "service-start-failed",
            Self::ServiceStopFailed => "service-stop-failed",
            Self::ServiceNotStarted => "service-not-started",
            Self::ServiceNotInitialized => "service-not-initialized",
            Self::ServiceReady => "service-ready",
            Self::ServiceNotReady => "service-not-ready",
            Self::ServiceSetParamFailed => "service-set-param-failed",
            Self::JsonDecodeFailed => "json-decode-failed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, human-readable status or error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaMessage {
    #[serde(rename = "type", default)]
    pub kind: MessageType,
    pub slug: Slug,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
}

impl MetaMessage {
    /// Create an info message.
    pub fn info(slug: Slug, title: impl Into<String>) -> Self {
        Self {
            kind: MessageType::Info,
            slug,
            title: title.into(),
            message: String::new(),
        }
    }

    /// Create an error message.
    pub fn error(slug: Slug, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: MessageType::Error,
            slug,
            title: title.into(),
            message: message.into(),
        }
    }

    /// Check if this message reports an error.
    pub fn is_error(&self) -> bool {
        self.kind == MessageType::Error
    }
}

impl From<&Error> for MetaMessage {
    fn from(err: &Error) -> Self {
        let title = match err.slug() {
            Slug::ServiceNotInitialized => "Service not initiated",
            Slug::ServiceAlreadyStarted => "Service already started",
            Slug::ServiceNotStarted => "Service not started",
            Slug::ServiceStopFailed => "Service stop failed",
            Slug::ServiceSetParamFailed => "Setting service parameters failed",
            Slug::JsonDecodeFailed => "JSON decode failed",
            _ => "Service start failed",
        };
        Self::error(err.slug(), title, err.to_string())
    }
}
