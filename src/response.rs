//! Response envelope and interpretation.
//!
//! Every non-redirected transport success passes through [`interpret`]
//! exactly once. It parses JSON-tagged bodies, detects the server's error
//! envelope and classifies the outcome as success, domain error or HTTP
//! error before the caller ever sees the response.

use bytes::Bytes;
use http::header::HeaderMap;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ArangoError, DriverError, HttpError, Result};
use crate::transport::RawResponse;

/// A successful response from a coordinator.
#[derive(Debug)]
pub struct ArangoResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Raw body bytes, always retained.
    pub body: Bytes,
    /// Parsed JSON body, when the response was JSON-tagged and the request
    /// did not ask for binary output.
    pub parsed: Option<Value>,
    /// Index of the host that served this response. Pass it back via
    /// [`ArangoRequest::with_host`](crate::ArangoRequest::with_host) to keep
    /// follow-up requests (e.g. cursor continuations) on the same
    /// coordinator.
    pub host: Option<usize>,
}

impl ArangoResponse {
    /// Deserializes the response body into a typed value.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.parsed {
            Some(value) => serde_json::from_value(value.clone()).map_err(|source| DriverError::Parse {
                text: value.to_string(),
                source,
            }),
            None => serde_json::from_slice(&self.body).map_err(|source| DriverError::Parse {
                text: String::from_utf8_lossy(&self.body).into_owned(),
                source,
            }),
        }
    }
}

/// Whether a `content-type` marks the body as parseable JSON.
///
/// Matches `json` or `javascript` subtypes followed by a non-word character
/// or the end of the value, so `application/json; charset=utf-8` and
/// `text/javascript` qualify while `application/jsonl` does not.
pub(crate) fn is_json_media_type(content_type: &str) -> bool {
    for marker in ["/json", "/javascript"] {
        if let Some(position) = content_type.find(marker) {
            let rest = &content_type[position + marker.len()..];
            match rest.chars().next() {
                None => return true,
                Some(next) if !next.is_alphanumeric() && next != '_' => return true,
                Some(_) => {}
            }
        }
    }
    false
}

fn error_envelope(value: &Value) -> Option<ArangoError> {
    let object = value.as_object()?;
    let is_envelope = object.contains_key("error")
        && object.contains_key("code")
        && object.contains_key("errorMessage")
        && object.contains_key("errorNum");
    if !is_envelope {
        return None;
    }
    Some(ArangoError {
        error_num: object.get("errorNum").and_then(Value::as_i64).unwrap_or_default(),
        code: object.get("code").and_then(Value::as_u64).unwrap_or_default() as u16,
        message: object
            .get("errorMessage")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

/// Classifies a raw transport success into a caller-visible outcome.
pub(crate) fn interpret(raw: RawResponse, host: usize, expect_binary: bool) -> Result<ArangoResponse> {
    let mut parsed = None;
    let content_type = raw
        .headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if is_json_media_type(content_type) && !raw.body.is_empty() {
        match serde_json::from_slice::<Value>(&raw.body) {
            Ok(value) => parsed = Some(value),
            Err(source) => {
                // A binary-expecting caller gets the raw bytes back instead.
                if !expect_binary {
                    return Err(DriverError::Parse {
                        text: String::from_utf8_lossy(&raw.body).into_owned(),
                        source,
                    });
                }
            }
        }
    }

    // The error envelope wins over the HTTP status.
    if let Some(value) = &parsed {
        if let Some(error) = error_envelope(value) {
            return Err(DriverError::Arango(error));
        }
    }

    if raw.status.is_client_error() || raw.status.is_server_error() {
        return Err(DriverError::Http(HttpError {
            status: raw.status,
            body: parsed,
        }));
    }

    Ok(ArangoResponse {
        status: raw.status,
        headers: raw.headers,
        body: raw.body,
        parsed: if expect_binary { None } else { parsed },
        host: Some(host),
    })
}
