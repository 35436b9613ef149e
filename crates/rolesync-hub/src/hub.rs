//! In-process pub/sub hub with per-client bounded buffers.
//!
//! Every connected client owns a bounded channel. Broadcasting never waits on
//! a client: an event that does not fit in a client's buffer disconnects that
//! client instead, so one stalled reader cannot hold up the others.
//!
//! Events that carry an `id` are delivered to a client at most once and only
//! if the id is newer than everything that client has already been given
//! (including the ids of its `init` events).

use crate::error::{HubError, Result};
use crate::hooks::SyncHooks;
use axum::http::request::Parts;
use parking_lot::Mutex;
use rolesync_core::Event;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

/// Configuration for the hub.
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Events buffered per client before it is considered too slow.
    pub client_buffer: usize,
    /// Interval between keep-alive comments on idle streams (in seconds).
    pub keep_alive_secs: u64,
}

impl HubConfig {
    /// Keep-alive interval, never shorter than one second.
    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs.max(1))
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            client_buffer: 256,
            keep_alive_secs: 15,
        }
    }
}

/// Builder for hub configuration.
pub struct HubConfigBuilder {
    config: HubConfig,
}

impl HubConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: HubConfig::default(),
        }
    }

    pub fn client_buffer(mut self, events: usize) -> Self {
        self.config.client_buffer = events;
        self
    }

    /// Keep-alive interval in seconds; values below 1 are raised to 1.
    pub fn keep_alive(mut self, secs: u64) -> Self {
        self.config.keep_alive_secs = secs.max(1);
        self
    }

    pub fn build(self) -> HubConfig {
        self.config
    }
}

impl Default for HubConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier the hub assigns to each connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

struct Client<R> {
    role: R,
    /// Highest event id handed to this client.
    last_id: u64,
    tx: mpsc::Sender<Event>,
}

struct Registry<R> {
    next_id: u64,
    clients: HashMap<ClientId, Client<R>>,
    /// Subscriptions not yet dropped, registered or not.
    active: usize,
    closed: bool,
}

struct HubInner<H: SyncHooks> {
    hooks: H,
    config: HubConfig,
    registry: Mutex<Registry<H::Role>>,
    drained: Notify,
}

/// Broadcast handler: accepts clients and fans events out to them.
pub struct Hub<H: SyncHooks> {
    inner: Arc<HubInner<H>>,
}

impl<H: SyncHooks> Clone for Hub<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: SyncHooks> Hub<H> {
    /// Create a hub that consults `hooks` for every client.
    pub fn new(hooks: H, config: HubConfig) -> Self {
        Self {
            inner: Arc::new(HubInner {
                hooks,
                config,
                registry: Mutex::new(Registry {
                    next_id: 1,
                    clients: HashMap::new(),
                    active: 0,
                    closed: false,
                }),
                drained: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    /// Register a new client for `request`.
    ///
    /// The registry stays locked while `init` runs, so no broadcast can reach
    /// the client before its init events are queued. The client starts at the
    /// watermark the hooks report.
    pub fn connect(&self, request: &Parts) -> Result<Subscription<H>> {
        let role = self.inner.hooks.connected(request);

        let mut registry = self.inner.registry.lock();
        if registry.closed {
            return Err(HubError::Closed);
        }

        let (initial, watermark) = self.inner.hooks.init_with_watermark(&role);
        let capacity = self.inner.config.client_buffer.max(initial.len()).max(1);
        let (tx, rx) = mpsc::channel(capacity);

        let mut last_id = watermark;
        for event in initial {
            if let Some(id) = event.id {
                last_id = last_id.max(id);
            }
            // capacity covers every init event
            let _ = tx.try_send(event);
        }

        let id = ClientId(registry.next_id);
        registry.next_id += 1;
        registry.clients.insert(
            id,
            Client {
                role: role.clone(),
                last_id,
                tx,
            },
        );
        registry.active += 1;
        drop(registry);

        debug!(client = %id, role = ?role, "client connected");

        Ok(Subscription {
            id,
            role,
            rx,
            _guard: ConnectionGuard {
                inner: Arc::clone(&self.inner),
                id,
            },
        })
    }

    /// Offer `event` to every connected client that passes the filter hook.
    ///
    /// Never blocks on a client. Returns how many clients accepted the event.
    pub fn send(&self, event: Event) -> usize {
        let mut registry = self.inner.registry.lock();
        if registry.closed {
            return 0;
        }

        let hooks = &self.inner.hooks;
        let mut delivered = 0;
        let mut evicted = Vec::new();

        for (id, client) in registry.clients.iter_mut() {
            if matches!(event.id, Some(seq) if seq <= client.last_id) {
                continue;
            }
            if !hooks.filter(&client.role, &event) {
                continue;
            }
            match client.tx.try_send(event.clone()) {
                Ok(()) => {
                    if let Some(seq) = event.id {
                        client.last_id = seq;
                    }
                    delivered += 1;
                }
                Err(TrySendError::Full(_)) => {
                    warn!(client = %id, role = ?client.role, "client buffer full, disconnecting");
                    evicted.push(*id);
                }
                Err(TrySendError::Closed(_)) => evicted.push(*id),
            }
        }

        for id in evicted {
            registry.clients.remove(&id);
        }

        delivered
    }

    /// Number of clients currently registered for broadcasts.
    pub fn client_count(&self) -> usize {
        self.inner.registry.lock().clients.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.registry.lock().closed
    }

    /// Stop accepting clients, end every stream and wait until all
    /// subscriptions have been dropped.
    pub async fn close(&self) {
        {
            let mut registry = self.inner.registry.lock();
            if !registry.closed {
                registry.closed = true;
                // dropping the senders ends each stream once its buffer drains
                registry.clients.clear();
                info!(active = registry.active, "hub closing");
            }
        }

        loop {
            let drained = self.inner.drained.notified();
            if self.inner.registry.lock().active == 0 {
                break;
            }
            drained.await;
        }
    }
}

struct ConnectionGuard<H: SyncHooks> {
    inner: Arc<HubInner<H>>,
    id: ClientId,
}

impl<H: SyncHooks> Drop for ConnectionGuard<H> {
    fn drop(&mut self) {
        let mut registry = self.inner.registry.lock();
        registry.clients.remove(&self.id);
        registry.active -= 1;
        let drained = registry.active == 0;
        drop(registry);

        debug!(client = %self.id, "client disconnected");
        if drained {
            self.inner.drained.notify_waiters();
        }
    }
}

/// A connected client's end of the hub.
///
/// Dropping it disconnects the client.
pub struct Subscription<H: SyncHooks> {
    id: ClientId,
    role: H::Role,
    rx: mpsc::Receiver<Event>,
    _guard: ConnectionGuard<H>,
}

impl<H: SyncHooks> Subscription<H> {
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn role(&self) -> &H::Role {
        &self.role
    }

    /// Wait for the next event. `None` once the hub closed or evicted this
    /// client and the buffer is empty.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Take the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Drain every buffered event without waiting.
    pub fn drain(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
