//! Connection configuration.
//!
//! [`ConnectionConfig`] collects everything a [`Connection`](crate::Connection)
//! needs at construction time: the coordinator URLs, the load-balancing
//! strategy, the retry policy and the transport tuning knobs.

use std::collections::HashMap;

/// Default single-server endpoint.
pub const DEFAULT_URL: &str = "http://localhost:8529";

/// Default driver protocol version, sent as `x-arango-version`.
pub const DEFAULT_ARANGO_VERSION: u32 = 30400;

/// How the dispatcher picks a host for an unpinned request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadBalancingStrategy {
    /// Always use the current primary host; move it only on failover.
    #[default]
    None,
    /// Advance the primary cursor on every request. Disables the
    /// failover cursor advance (the cursor already rotates per request).
    RoundRobin,
    /// Pick a random host once at startup and stick to it.
    OneRandom,
}

/// Bound on transparent retries after a refused connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaxRetries {
    /// Never retry; surface the first transport error.
    Disabled,
    /// Retry up to `host count - 1` times, once per remaining host.
    #[default]
    PerHost,
    /// Retry at most this many times, regardless of host count.
    Limit(u32),
}

impl MaxRetries {
    pub(crate) fn allows_retry(&self) -> bool {
        !matches!(self, MaxRetries::Disabled)
    }

    pub(crate) fn effective_max(&self, host_count: usize) -> u32 {
        match self {
            MaxRetries::Disabled => 0,
            MaxRetries::PerHost => host_count.saturating_sub(1) as u32,
            MaxRetries::Limit(limit) => *limit,
        }
    }
}

/// Transport tuning, applied to every endpoint.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Socket budget per host.
    pub max_sockets: usize,
    /// Reuse idle connections across requests.
    pub keep_alive: bool,
    /// How long an idle kept-alive connection survives, in milliseconds.
    pub keep_alive_msecs: u64,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            max_sockets: 3,
            keep_alive: true,
            keep_alive_msecs: 1000,
        }
    }
}

impl AgentOptions {
    /// Concurrency ceiling for the dispatcher. Keep-alive doubles the
    /// effective parallelism of the socket budget.
    pub(crate) fn max_tasks(&self) -> usize {
        self.max_sockets * if self.keep_alive { 2 } else { 1 }
    }
}

/// Configuration for a [`Connection`](crate::Connection).
///
/// # Example
///
/// ```
/// use arango_client::{ConnectionConfig, LoadBalancingStrategy, MaxRetries};
///
/// let config = ConnectionConfig::new("tcp://db1.example.com:8529")
///     .with_url("tcp://db2.example.com:8529")
///     .with_load_balancing(LoadBalancingStrategy::RoundRobin)
///     .with_max_retries(MaxRetries::Limit(2));
/// assert_eq!(config.urls.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Coordinator URLs. Sanitized and deduplicated at construction.
    pub urls: Vec<String>,
    /// Value of the `x-arango-version` request header.
    pub arango_version: u32,
    pub load_balancing: LoadBalancingStrategy,
    pub max_retries: MaxRetries,
    pub agent: AgentOptions,
    /// Lowest-priority header overlay merged into every request.
    pub headers: HashMap<String, String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            urls: vec![DEFAULT_URL.to_string()],
            arango_version: DEFAULT_ARANGO_VERSION,
            load_balancing: LoadBalancingStrategy::default(),
            max_retries: MaxRetries::default(),
            agent: AgentOptions::default(),
            headers: HashMap::new(),
        }
    }
}

impl ConnectionConfig {
    /// Creates a configuration pointing at a single coordinator.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            ..Default::default()
        }
    }

    /// Adds another coordinator URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.urls.push(url.into());
        self
    }

    pub fn with_arango_version(mut self, version: u32) -> Self {
        self.arango_version = version;
        self
    }

    pub fn with_load_balancing(mut self, strategy: LoadBalancingStrategy) -> Self {
        self.load_balancing = strategy;
        self
    }

    pub fn with_max_retries(mut self, max_retries: MaxRetries) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_agent_options(mut self, agent: AgentOptions) -> Self {
        self.agent = agent;
        self
    }

    /// Adds a default header sent with every request. Header names are
    /// lowercased on the wire.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}
