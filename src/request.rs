// 📨 Request metadata handed to the core by the HTTP layer

use crate::error::{ReconcileError, Result};
use std::collections::HashMap;

/// Where a request came in from, used to build absolute URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
    /// Value of `X-Forwarded-Proto`, if a proxy set one
    pub forwarded_proto: Option<String>,
    base_url: String,
}

impl RequestOrigin {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        RequestOrigin {
            scheme: scheme.into(),
            host: host.into(),
            forwarded_proto: None,
            base_url: "/".to_string(),
        }
    }

    pub fn with_forwarded_proto(mut self, proto: Option<String>) -> Self {
        self.forwarded_proto = proto.filter(|p| !p.trim().is_empty());
        self
    }

    /// Mount point of the service; always starts and ends with `/`
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The proxy's scheme wins over the one the socket saw
    pub fn effective_scheme(&self) -> &str {
        self.forwarded_proto.as_deref().unwrap_or(&self.scheme)
    }

    /// `{scheme}://{host}{base_url}`
    pub fn service_url(&self) -> String {
        format!("{}://{}{}", self.effective_scheme(), self.host, self.base_url)
    }
}

fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}

/// One inbound call: origin, merged query/form parameters and the actor
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub origin: RequestOrigin,
    pub params: HashMap<String, String>,
    pub actor: Option<String>,
}

impl ServiceRequest {
    pub fn new(origin: RequestOrigin) -> Self {
        ServiceRequest {
            origin,
            params: HashMap::new(),
            actor: None,
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn with_actor(mut self, actor: Option<String>) -> Self {
        self.actor = actor;
        self
    }

    /// Non-empty parameter value
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Non-negative integer parameter, `default` when absent
    pub fn usize_param(&self, key: &str, default: usize) -> Result<usize> {
        match self.param(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                ReconcileError::bad_query(format!("'{}' must be a non-negative integer, got '{}'", key, raw))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarded_proto_overrides_scheme() {
        let origin = RequestOrigin::new("http", "localhost:8001");
        assert_eq!(origin.service_url(), "http://localhost:8001/");

        let proxied = origin.with_forwarded_proto(Some("https".into()));
        assert_eq!(proxied.effective_scheme(), "https");
        assert_eq!(proxied.service_url(), "https://localhost:8001/");
    }

    #[test]
    fn test_base_url_normalized() {
        for (raw, expected) in [("", "/"), ("/", "/"), ("data", "/data/"), ("/data", "/data/"), ("/a/b/", "/a/b/")] {
            let origin = RequestOrigin::new("http", "h").with_base_url(raw);
            assert_eq!(origin.base_url(), expected, "base_url {:?}", raw);
        }
    }

    #[test]
    fn test_params() {
        let request = ServiceRequest::new(RequestOrigin::new("http", "h"))
            .with_param("prefix", "Fi")
            .with_param("cursor", "2")
            .with_param("limit", "lots")
            .with_param("empty", "");

        assert_eq!(request.param("prefix"), Some("Fi"));
        assert_eq!(request.param("empty"), None);
        assert_eq!(request.usize_param("cursor", 0).unwrap(), 2);
        assert_eq!(request.usize_param("missing", 7).unwrap(), 7);
        assert!(matches!(
            request.usize_param("limit", 5),
            Err(ReconcileError::BadQuery(_))
        ));
    }
}
