use std::borrow::Cow;
use std::net::SocketAddr;

use tonic::metadata::MetadataMap;
use tonic::Request;

use crate::schema::HttpRequest;

pub const USER_AGENT: &str = "user-agent";

/// Transport facts about one inbound call.
#[derive(Debug, Clone, Default)]
pub struct CallInfo {
    /// Routing name in the `/package.Service/Method` form.
    pub full_method: String,
    pub metadata: MetadataMap,
    pub remote_addr: Option<SocketAddr>,
}

impl CallInfo {
    pub fn new(full_method: impl Into<String>) -> Self {
        CallInfo {
            full_method: full_method.into(),
            ..CallInfo::default()
        }
    }

    pub fn with_metadata(mut self, metadata: MetadataMap) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Collect metadata and peer address from a `tonic` request.
    pub fn from_request<T>(full_method: impl Into<String>, request: &Request<T>) -> Self {
        CallInfo {
            full_method: full_method.into(),
            metadata: request.metadata().clone(),
            remote_addr: request.remote_addr(),
        }
    }

    /// First `user-agent` value. Bytes that are not UTF-8 are replaced.
    pub fn user_agent(&self) -> Option<Cow<'_, str>> {
        self.metadata
            .get(USER_AGENT)
            .map(|v| String::from_utf8_lossy(v.as_bytes()))
    }
}

/// Split a routing name into `(service, method)` at the last `/`.
///
/// A leading `/` is not part of the service. Names without any `/` yield
/// `("unknown", "unknown")`.
pub fn split_method(name: &str) -> (&str, &str) {
    match name.rfind('/') {
        Some(i) => {
            let service = &name[..i];
            (service.strip_prefix('/').unwrap_or(service), &name[i + 1..])
        }
        None => ("unknown", "unknown"),
    }
}

/// Request descriptor of a call as it enters the server: no status, no latency.
pub fn describe(call: &CallInfo) -> HttpRequest {
    let (service, method) = split_method(&call.full_method);
    HttpRequest {
        method: method.to_string(),
        url: service.to_string(),
        user_agent: call.user_agent().map(Cow::into_owned).unwrap_or_default(),
        remote_ip: call.remote_addr.map(|a| a.to_string()).unwrap_or_default(),
        ..HttpRequest::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::metadata::AsciiMetadataValue;

    #[test]
    fn split() {
        assert_eq!(split_method("/example.Service/Method"), ("example.Service", "Method"));
        assert_eq!(split_method("service/method"), ("service", "method"));
        assert_eq!(split_method("/a.b.C/"), ("a.b.C", ""));
        assert_eq!(split_method("/Method"), ("", "Method"));
        assert_eq!(split_method("Method"), ("unknown", "unknown"));
        assert_eq!(split_method(""), ("unknown", "unknown"));
    }

    #[test]
    fn describe_call() {
        let mut metadata = MetadataMap::new();
        metadata.insert(USER_AGENT, "curl".parse().unwrap());
        metadata.append(USER_AGENT, "grpc-go".parse().unwrap());
        let call = CallInfo::new("/example.Service/Method")
            .with_metadata(metadata)
            .with_remote_addr("127.0.0.1:50051".parse().unwrap());

        let req = describe(&call);
        assert_eq!(req.method, "Method");
        assert_eq!(req.url, "example.Service");
        assert_eq!(req.user_agent, "curl");
        assert_eq!(req.remote_ip, "127.0.0.1:50051");
        assert_eq!(req.status, None);
        assert!(req.latency.is_zero());
    }

    #[test]
    fn user_agent_beyond_ascii() {
        let mut metadata = MetadataMap::new();
        let value = AsciiMetadataValue::try_from("büro-client/2.0".as_bytes()).unwrap();
        metadata.insert(USER_AGENT, value);

        let req = describe(&CallInfo::new("/pkg.Svc/Get").with_metadata(metadata));
        assert_eq!(req.user_agent, "büro-client/2.0");
    }

    #[test]
    fn describe_bare_call() {
        let req = describe(&CallInfo::new("nonsense"));
        assert_eq!((req.method.as_str(), req.url.as_str()), ("unknown", "unknown"));
        assert_eq!(req.user_agent, "");
        assert_eq!(req.remote_ip, "");
    }

    #[test]
    fn from_tonic_request() {
        let mut request = Request::new(());
        request.metadata_mut().insert(USER_AGENT, "grpcurl/1.8".parse().unwrap());

        let call = CallInfo::from_request("/pkg.Svc/Get", &request);
        assert_eq!(call.user_agent().as_deref(), Some("grpcurl/1.8"));
        assert_eq!(call.remote_addr, None);
    }
}
