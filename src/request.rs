//! Request descriptors.
//!
//! An [`ArangoRequest`] describes one REST call before the dispatcher turns
//! it into a prepared wire request: method, path, query, headers, body and
//! the routing flags (host pin, dirty read, timeout).

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use http::Method;
use serde_json::Value;

/// The query-string part of a request.
#[derive(Debug, Clone)]
pub enum Query {
    /// Used verbatim (a leading `?` is stripped).
    Raw(String),
    /// Serialized as a percent-encoded query string. Pairs with a `None`
    /// value are dropped.
    Params(Vec<(String, Option<String>)>),
}

impl Query {
    pub(crate) fn serialize(&self) -> Option<String> {
        match self {
            Query::Raw(raw) => {
                let raw = raw.trim_start_matches('?');
                if raw.is_empty() {
                    None
                } else {
                    Some(raw.to_string())
                }
            }
            Query::Params(params) => {
                let mut serializer = url::form_urlencoded::Serializer::new(String::new());
                let mut appended = false;
                for (key, value) in params {
                    if let Some(value) = value {
                        serializer.append_pair(key, value);
                        appended = true;
                    }
                }
                appended.then(|| serializer.finish())
            }
        }
    }
}

/// The request body, driving the `content-type` header.
#[derive(Debug, Clone, Default)]
pub enum Body {
    #[default]
    None,
    /// Serialized as JSON with `content-type: application/json`.
    Json(Value),
    /// Sent as `text/plain`.
    Text(String),
    /// Sent untouched as `application/octet-stream`.
    Binary(Bytes),
}

/// A request descriptor for [`Connection::request`](crate::Connection::request).
#[derive(Debug, Clone)]
pub struct ArangoRequest {
    pub method: Method,
    /// Prefix prepended to `path`, e.g. `/_db/mydb`.
    pub base_path: Option<String>,
    pub path: String,
    pub query: Option<Query>,
    /// Caller headers; the highest-priority overlay.
    pub headers: HashMap<String, String>,
    pub body: Body,
    /// Pins execution to a host index. Pinned requests are never failed over.
    pub host: Option<usize>,
    /// Routes via the dirty-read cursor and marks the request as allowed to
    /// read possibly-stale data from a follower.
    pub allow_dirty_read: bool,
    pub timeout: Option<Duration>,
    /// Skip JSON handling of the response and deliver raw bytes.
    pub expect_binary: bool,
}

impl ArangoRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            base_path: None,
            path: path.into(),
            query: None,
            headers: HashMap::new(),
            body: Body::None,
            host: None,
            allow_dirty_read: false,
            timeout: None,
            expect_binary: false,
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_json_body(mut self, body: Value) -> Self {
        self.body = Body::Json(body);
        self
    }

    pub fn with_text_body(mut self, body: impl Into<String>) -> Self {
        self.body = Body::Text(body.into());
        self
    }

    pub fn with_binary_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Body::Binary(body.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Pins this request to the host with the given index (as previously
    /// reported by [`ArangoResponse::host`](crate::ArangoResponse)).
    pub fn with_host(mut self, host: usize) -> Self {
        self.host = Some(host);
        self
    }

    pub fn with_dirty_read(mut self) -> Self {
        self.allow_dirty_read = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn expecting_binary(mut self) -> Self {
        self.expect_binary = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_query_passthrough() {
        assert_eq!(
            Query::Raw("a=1&b=2".to_string()).serialize(),
            Some("a=1&b=2".to_string())
        );
        assert_eq!(
            Query::Raw("?a=1".to_string()).serialize(),
            Some("a=1".to_string())
        );
        assert_eq!(Query::Raw(String::new()).serialize(), None);
    }

    #[test]
    fn test_param_query_drops_none_values() {
        let query = Query::Params(vec![
            ("waitForSync".to_string(), Some("true".to_string())),
            ("returnNew".to_string(), None),
            ("collection".to_string(), Some("my stuff".to_string())),
        ]);
        assert_eq!(
            query.serialize(),
            Some("waitForSync=true&collection=my+stuff".to_string())
        );
    }

    #[test]
    fn test_all_none_params_yield_no_query() {
        let query = Query::Params(vec![("a".to_string(), None), ("b".to_string(), None)]);
        assert_eq!(query.serialize(), None);
    }

    #[test]
    fn test_builder_defaults() {
        let request = ArangoRequest::new(Method::GET, "/_api/version");
        assert_eq!(request.method, Method::GET);
        assert!(request.host.is_none());
        assert!(!request.allow_dirty_read);
        assert!(!request.expect_binary);
        assert!(matches!(request.body, Body::None));
    }

    #[test]
    fn test_builder_flags() {
        let request = ArangoRequest::new(Method::PUT, "/_api/cursor/123")
            .with_host(2)
            .with_dirty_read()
            .with_timeout(Duration::from_secs(5));
        assert_eq!(request.host, Some(2));
        assert!(request.allow_dirty_read);
        assert_eq!(request.timeout, Some(Duration::from_secs(5)));
    }
}
