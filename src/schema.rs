//! Nested objects of the Cloud Logging `LogEntry` JSON payload.
//!
//! See <https://cloud.google.com/logging/docs/reference/v2/rest/v2/LogEntry>.

use std::time::Duration;

use serde::ser::{Error as _, SerializeMap};
use serde::{Serialize, Serializer};

use crate::error::ConfigError;

pub const SOURCE_LOCATION_KEY: &str = "logging.googleapis.com/sourceLocation";
pub const OPERATION_KEY: &str = "logging.googleapis.com/operation";
pub const SERVICE_CONTEXT_KEY: &str = "serviceContext";
pub const HTTP_REQUEST_KEY: &str = "httpRequest";

/// Identifies the service that produced the entry. Attached once per logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceContext {
    pub service: String,
    pub version: String,
}

impl ServiceContext {
    pub fn new(service: impl Into<String>, version: impl Into<String>) -> Result<Self, ConfigError> {
        let service = service.into();
        if service.is_empty() {
            return Err(ConfigError::EmptyServiceName);
        }
        Ok(ServiceContext { service, version: version.into() })
    }
}

impl Serialize for ServiceContext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.service.is_empty() {
            return Err(S::Error::custom("service name is mandatory"));
        }
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("service", &self.service)?;
        map.serialize_entry("version", &self.version)?;
        map.end()
    }
}

/// Transport-level summary of one request and its outcome.
///
/// Also serves as the request descriptor for intercepted gRPC calls, where
/// `url` holds the service and `method` the RPC method name.
///
/// See <https://cloud.google.com/logging/docs/reference/v2/rest/v2/LogEntry#HttpRequest>.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub user_agent: String,
    pub referrer: String,
    /// `None` until the outcome is known, or when it carried no status code.
    pub status: Option<i32>,
    pub remote_ip: String,
    pub latency: Duration,
}

/// Duration in the protobuf JSON form, e.g. `"1.5s"`.
pub fn format_latency(latency: Duration) -> String {
    format!("{}s", latency.as_secs_f64())
}

impl Serialize for HttpRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(7))?;
        map.serialize_entry("requestMethod", &self.method)?;
        map.serialize_entry("requestUrl", &self.url)?;
        map.serialize_entry("userAgent", &self.user_agent)?;
        map.serialize_entry("referrer", &self.referrer)?;
        map.serialize_entry("remoteIp", &self.remote_ip)?;
        map.serialize_entry("status", &self.status.unwrap_or_default())?;
        map.serialize_entry("latency", &format_latency(self.latency))?;
        map.end()
    }
}

/// Where in the source the entry was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub function: Option<String>,
}

impl Serialize for SourceLocation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("file", &self.file)?;
        map.serialize_entry("line", &self.line)?;
        if let Some(function) = self.function.as_deref().filter(|f| !f.is_empty()) {
            map.serialize_entry("function", function)?;
        }
        map.end()
    }
}
