//! The connection pool and request dispatcher.
//!
//! A [`Connection`] fronts a set of interchangeable coordinator endpoints
//! and turns the server's REST surface into reliable, load-balanced,
//! failover-aware request execution.
//!
//! # Scheduling model
//!
//! The dispatcher is a single logical scheduler: task submission, transport
//! completion and policy mutation all serialize on one mutex, which is never
//! held across an await point. Transport I/O itself runs in parallel on
//! spawned tasks, up to the `max_tasks` ceiling derived from the socket
//! budget. Every transport completion is followed by a pump step, so a
//! freed slot is always refilled and the queue cannot stall.
//!
//! # Host selection
//!
//! A task pinned to a host executes there, always. A dirty read takes the
//! dirty cursor and advances it. Everything else takes the primary cursor,
//! which advances per request under [`LoadBalancingStrategy::RoundRobin`]
//! and otherwise only moves on failover or leader redirect.
//!
//! # Recovery
//!
//! Two outcomes are recovered transparently: a refused connection on an
//! unpinned task (requeued up to the retry bound) and a 503 carrying the
//! `x-arango-endpoint` header (the task is pinned to the advertised leader
//! and requeued without counting as a retry). Everything else surfaces to
//! the caller.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use http::{Method, StatusCode};
use rand::Rng;
use serde::Deserialize;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::{AgentOptions, ConnectionConfig, LoadBalancingStrategy, MaxRetries};
use crate::database::Database;
use crate::error::{DriverError, Result, TransportError};
use crate::host::HostList;
use crate::request::{ArangoRequest, Body, Query};
use crate::response::{interpret, ArangoResponse};
use crate::transport::{PreparedRequest, RawResponse};

const DIRTY_READ_HEADER: &str = "x-arango-allow-dirty-read";
const ENDPOINT_HEADER: &str = "x-arango-endpoint";
const VERSION_HEADER: &str = "x-arango-version";
const TRANSACTION_HEADER: &str = "x-arango-trx-id";

/// One pending request: the prepared wire request, its routing state and
/// the one-shot completion it must resolve exactly once.
struct Task {
    prepared: PreparedRequest,
    host_pin: Option<usize>,
    allow_dirty_read: bool,
    retries: u32,
    sink: oneshot::Sender<Result<ArangoResponse>>,
}

struct DispatcherState {
    queue: VecDeque<Task>,
    active: usize,
    hosts: HostList,
    primary: usize,
    dirty: usize,
    default_headers: HashMap<String, String>,
    transaction_id: Option<String>,
    database_names: HashMap<String, Arc<str>>,
    closed: bool,
}

struct Inner {
    state: Mutex<DispatcherState>,
    arango_version: u32,
    load_balancing: LoadBalancingStrategy,
    max_retries: MaxRetries,
    max_tasks: usize,
    agent: AgentOptions,
}

/// Server version information, from `GET /_api/version`.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
    pub server: String,
    pub version: String,
    #[serde(default)]
    pub license: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClusterEndpoints {
    endpoints: Vec<ClusterEndpoint>,
}

#[derive(Debug, Deserialize)]
struct ClusterEndpoint {
    endpoint: String,
}

/// A handle to the connection pool. Cheap to clone; all clones share the
/// same dispatcher.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Builds the pool: sanitizes and deduplicates the configured URLs,
    /// creates one transport per endpoint and seeds the host cursors.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        if config.urls.is_empty() {
            return Err(DriverError::Config("at least one server URL is required".to_string()));
        }
        if config.agent.max_sockets == 0 {
            return Err(DriverError::Config("max_sockets must be at least 1".to_string()));
        }

        let mut hosts = HostList::new();
        hosts.add(&config.urls, &config.agent)?;

        let (primary, dirty) = match config.load_balancing {
            LoadBalancingStrategy::OneRandom => {
                let mut rng = rand::thread_rng();
                (rng.gen_range(0..hosts.len()), rng.gen_range(0..hosts.len()))
            }
            _ => (0, 0),
        };

        let default_headers = config
            .headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();

        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(DispatcherState {
                    queue: VecDeque::new(),
                    active: 0,
                    hosts,
                    primary,
                    dirty,
                    default_headers,
                    transaction_id: None,
                    database_names: HashMap::new(),
                    closed: false,
                }),
                arango_version: config.arango_version,
                load_balancing: config.load_balancing,
                max_retries: config.max_retries,
                max_tasks: config.agent.max_tasks(),
                agent: config.agent,
            }),
        })
    }

    /// Executes a request and waits for its interpreted outcome.
    pub async fn request(&self, request: ArangoRequest) -> Result<ArangoResponse> {
        let receiver = self.submit(request)?;
        match receiver.await {
            Ok(outcome) => outcome,
            // The sink is dropped only when the dispatcher itself goes away.
            Err(_) => Err(DriverError::Closed),
        }
    }

    /// Executes a request and deserializes the response body.
    pub async fn request_json<T: serde::de::DeserializeOwned>(&self, request: ArangoRequest) -> Result<T> {
        self.request(request).await?.deserialize()
    }

    /// `GET /_api/version`, typed.
    pub async fn server_version(&self) -> Result<VersionInfo> {
        self.request_json(ArangoRequest::new(Method::GET, "/_api/version")).await
    }

    /// Asks the cluster for its coordinator endpoints and appends any new
    /// ones to the host list. Returns the resulting host count.
    pub async fn acquire_host_list(&self) -> Result<usize> {
        let response = self
            .request(ArangoRequest::new(Method::GET, "/_api/cluster/endpoints"))
            .await?;
        let listing: ClusterEndpoints = response.deserialize()?;

        let mut state = self.inner.lock_state();
        state.hosts.add(
            listing.endpoints.iter().map(|entry| entry.endpoint.as_str()),
            &self.inner.agent,
        )?;
        info!(hosts = state.hosts.len(), "acquired cluster host list");
        Ok(state.hosts.len())
    }

    /// Returns a handle for the named database. Handles are keyed by name;
    /// repeated lookups share the interned name.
    pub fn database(&self, name: &str) -> Database {
        let interned = {
            let mut state = self.inner.lock_state();
            state
                .database_names
                .entry(name.to_string())
                .or_insert_with(|| Arc::from(name))
                .clone()
        };
        Database::new(self.clone(), interned)
    }

    /// The current host list, in index order.
    pub fn hosts(&self) -> Vec<String> {
        self.inner.lock_state().hosts.urls()
    }

    /// Sets or clears a default header sent with every request.
    pub fn set_header(&self, name: &str, value: Option<&str>) {
        let mut state = self.inner.lock_state();
        let name = name.to_ascii_lowercase();
        match value {
            Some(value) => {
                state.default_headers.insert(name, value.to_string());
            }
            None => {
                state.default_headers.remove(&name);
            }
        }
    }

    /// Attaches a transaction id to every subsequent request as
    /// `x-arango-trx-id`.
    pub fn set_transaction_id(&self, id: impl Into<String>) {
        self.inner.lock_state().transaction_id = Some(id.into());
    }

    pub fn clear_transaction_id(&self) {
        self.inner.lock_state().transaction_id = None;
    }

    /// Stops accepting new requests. Queued and in-flight tasks still run
    /// to completion; idle sockets are reclaimed by the per-endpoint pools.
    pub fn close(&self) {
        self.inner.lock_state().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock_state().closed
    }

    fn submit(&self, request: ArangoRequest) -> Result<oneshot::Receiver<Result<ArangoResponse>>> {
        let (sender, receiver) = oneshot::channel();
        {
            let mut state = self.inner.lock_state();
            if state.closed {
                return Err(DriverError::Closed);
            }
            if let Some(pin) = request.host {
                if pin >= state.hosts.len() {
                    return Err(DriverError::Config(format!(
                        "host index {pin} is out of range for {} hosts",
                        state.hosts.len()
                    )));
                }
            }
            let task = build_task(&self.inner, &state, request, sender)?;
            state.queue.push_back(task);
        }
        Inner::pump(&self.inner);
        Ok(receiver)
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, DispatcherState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drains the queue into transport while slots are free. Each iteration
    /// picks a host under the lock, then spawns the transport future.
    fn pump(inner: &Arc<Inner>) {
        loop {
            let (task, host_index, endpoint) = {
                let mut state = inner.lock_state();
                if state.active >= inner.max_tasks || state.queue.is_empty() {
                    return;
                }
                let Some(mut task) = state.queue.pop_front() else {
                    return;
                };
                let host_index = if let Some(pin) = task.host_pin {
                    pin
                } else if task.allow_dirty_read {
                    let chosen = state.dirty;
                    state.dirty = (state.dirty + 1) % state.hosts.len();
                    task.prepared.headers.insert(
                        HeaderName::from_static(DIRTY_READ_HEADER),
                        HeaderValue::from_static("true"),
                    );
                    chosen
                } else {
                    let chosen = state.primary;
                    if inner.load_balancing == LoadBalancingStrategy::RoundRobin {
                        state.primary = (state.primary + 1) % state.hosts.len();
                    }
                    chosen
                };
                state.active += 1;
                let endpoint = state.hosts.get(host_index);
                (task, host_index, endpoint)
            };

            debug!(host = host_index, retries = task.retries, "dispatching request");
            let inner = Arc::clone(inner);
            tokio::spawn(async move {
                let outcome = endpoint.transport.execute(&task.prepared).await;
                Inner::handle_outcome(&inner, task, host_index, outcome);
            });
        }
    }

    /// Interprets one transport completion: requeue for failover or leader
    /// redirect, or settle the task's sink.
    fn handle_outcome(
        inner: &Arc<Inner>,
        task: Task,
        host: usize,
        outcome: std::result::Result<RawResponse, TransportError>,
    ) {
        let settled: Option<(Task, Result<RawResponse>)> = {
            let mut state = inner.lock_state();
            state.active -= 1;
            match outcome {
                Err(error) => {
                    // Round-robin already rotates per selection, so the
                    // failover advance would double-step the cursor.
                    let use_failover = inner.load_balancing != LoadBalancingStrategy::RoundRobin;
                    // Only the first failure observed on the current
                    // primary moves it; concurrent failures on the same
                    // host must not each advance the cursor.
                    if use_failover
                        && state.hosts.len() > 1
                        && !task.allow_dirty_read
                        && state.primary == host
                    {
                        state.primary = (state.primary + 1) % state.hosts.len();
                        warn!(
                            failed_host = host,
                            next_host = state.primary,
                            "transport failure, advancing primary host"
                        );
                    }

                    let limit = inner.max_retries.effective_max(state.hosts.len());
                    let eligible = inner.max_retries.allows_retry()
                        && task.host_pin.is_none()
                        && task.retries < limit
                        && matches!(error, TransportError::ConnectionRefused { .. });
                    if eligible {
                        let mut task = task;
                        task.retries += 1;
                        debug!(host, retries = task.retries, "connection refused, requeueing");
                        state.queue.push_back(task);
                        None
                    } else {
                        Some((task, Err(error.into())))
                    }
                }
                Ok(raw) => {
                    if raw.status == StatusCode::SERVICE_UNAVAILABLE {
                        let leader = raw
                            .headers
                            .get(ENDPOINT_HEADER)
                            .and_then(|value| value.to_str().ok())
                            .map(str::to_owned);
                        if let Some(leader) = leader {
                            match state.hosts.add([leader.as_str()], &inner.agent) {
                                Ok(indices) => {
                                    let target = indices[0];
                                    info!(leader = %leader, host = target, "following leader redirect");
                                    let mut task = task;
                                    task.host_pin = Some(target);
                                    if state.primary == host {
                                        state.primary = target;
                                    }
                                    state.queue.push_back(task);
                                    None
                                }
                                Err(error) => Some((task, Err(error))),
                            }
                        } else {
                            Some((task, Ok(raw)))
                        }
                    } else {
                        Some((task, Ok(raw)))
                    }
                }
            }
        };

        if let Some((task, result)) = settled {
            let delivered = match result {
                Ok(raw) => interpret(raw, host, task.prepared.expect_binary),
                Err(error) => Err(error),
            };
            let _ = task.sink.send(delivered);
        }

        Inner::pump(inner);
    }
}

/// Builds a task from a request descriptor: body encoding, header layering
/// and URL composition.
///
/// Headers are layered lowest priority first: the connection's default
/// headers, then `content-type` and `x-arango-version`, then the active
/// transaction id, then the caller's headers.
fn build_task(
    inner: &Inner,
    state: &DispatcherState,
    request: ArangoRequest,
    sink: oneshot::Sender<Result<ArangoResponse>>,
) -> Result<Task> {
    let ArangoRequest {
        method,
        base_path,
        path,
        query,
        headers: caller_headers,
        body,
        host,
        allow_dirty_read,
        timeout,
        expect_binary,
    } = request;

    let (body, content_type) = match body {
        Body::Binary(bytes) => (bytes, Some("application/octet-stream")),
        Body::Json(value) => (
            Bytes::from(serde_json::to_vec(&value).map_err(DriverError::Encode)?),
            Some("application/json"),
        ),
        Body::Text(text) => (Bytes::from(text), Some("text/plain")),
        Body::None => (Bytes::new(), None),
    };

    let mut headers = HeaderMap::new();
    for (name, value) in &state.default_headers {
        insert_header(&mut headers, name, value)?;
    }
    if let Some(content_type) = content_type {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    insert_header(&mut headers, VERSION_HEADER, &inner.arango_version.to_string())?;
    if let Some(transaction_id) = &state.transaction_id {
        insert_header(&mut headers, TRANSACTION_HEADER, transaction_id)?;
    }
    for (name, value) in &caller_headers {
        insert_header(&mut headers, name, value)?;
    }

    let path = match base_path {
        Some(base) => format!("{base}{path}"),
        None => path,
    };
    let search = query.as_ref().and_then(Query::serialize);

    Ok(Task {
        prepared: PreparedRequest {
            method,
            path,
            search,
            headers,
            body,
            expect_binary,
            timeout,
        },
        host_pin: host,
        allow_dirty_read,
        retries: 0,
        sink,
    })
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<()> {
    let lowered = name.to_ascii_lowercase();
    let header_name = HeaderName::try_from(lowered.as_str())
        .map_err(|err| DriverError::Config(format!("invalid header name {name:?}: {err}")))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|err| DriverError::Config(format!("invalid value for header {name:?}: {err}")))?;
    headers.insert(header_name, header_value);
    Ok(())
}
