//! The host list: the ordered, deduplicated set of coordinator endpoints.

use std::sync::Arc;

use url::Url;

use crate::config::AgentOptions;
use crate::error::{DriverError, Result};
use crate::sanitize::sanitize_url;
use crate::transport::HostTransport;

/// One coordinator endpoint: a normalized URL and its transport.
pub(crate) struct Endpoint {
    pub url: Url,
    pub transport: HostTransport,
}

/// Append-only list of endpoints. Indices are stable for the life of the
/// pool; an endpoint is never reordered or removed.
pub(crate) struct HostList {
    endpoints: Vec<Arc<Endpoint>>,
}

impl HostList {
    pub(crate) fn new() -> Self {
        Self {
            endpoints: Vec::new(),
        }
    }

    /// Sanitizes and appends each URL, skipping duplicates. Returns, in
    /// input order, the index of every URL — newly assigned or
    /// pre-existing. The dispatcher relies on this to resolve a leader
    /// redirect to a stable host index.
    pub(crate) fn add<I, S>(&mut self, urls: I, agent: &AgentOptions) -> Result<Vec<usize>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut indices = Vec::new();
        for raw in urls {
            let normalized = sanitize_url(raw.as_ref());
            let parsed = Url::parse(&normalized).map_err(|err| {
                DriverError::Config(format!("invalid server URL {:?}: {err}", raw.as_ref()))
            })?;
            if let Some(existing) = self.endpoints.iter().position(|endpoint| endpoint.url == parsed) {
                indices.push(existing);
                continue;
            }
            let transport = HostTransport::new(&parsed, agent)?;
            self.endpoints.push(Arc::new(Endpoint {
                url: parsed,
                transport,
            }));
            indices.push(self.endpoints.len() - 1);
        }
        Ok(indices)
    }

    pub(crate) fn get(&self, index: usize) -> Arc<Endpoint> {
        Arc::clone(&self.endpoints[index])
    }

    pub(crate) fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.endpoints
            .iter()
            .map(|endpoint| endpoint.url.to_string())
            .collect()
    }
}
