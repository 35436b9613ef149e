//! The public state store: partitions plus the hub that keeps clients in sync.
//!
//! Updates commit under the partition lock and queue their delta events; the
//! lock is released before anything reaches the transport. Queued events are
//! then handed to the hub by whichever caller holds the dispatch lock, oldest
//! first, so clients observe commits in the order they happened.

use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use rolesync_core::{Roles, StateTree};
use rolesync_hub::{Hub, Subscription};
use std::sync::Arc;
use tracing::info;

use crate::config::StoreConfig;
use crate::coordinator::SyncCoordinator;
use crate::error::Result;
use crate::partition::PartitionStore;

/// Role-partitioned application state with snapshot-then-delta sync.
///
/// # Example
///
/// ```rust
/// use axum::http::Request;
/// use rolesync_core::{tree, EventKind, Roles};
/// use rolesync_store::{StateStore, StoreConfig};
///
/// let store = StateStore::new(StoreConfig::default());
/// store.update(tree! { "motd" => "hello" }, Roles::one("viewer")).unwrap();
///
/// let (parts, _) = Request::builder().uri("/events?role=viewer").body(()).unwrap().into_parts();
/// let mut client = store.connect(&parts).unwrap();
///
/// store.update(tree! { "motd" => "bye" }, Roles::All).unwrap();
///
/// let events = client.drain();
/// assert_eq!(events[0].kind, EventKind::Sync);
/// assert_eq!(events[1].kind, EventKind::Delta);
/// assert_eq!(store.snapshot("viewer"), Some(tree! { "motd" => "bye" }));
/// ```
pub struct StateStore {
    partitions: Arc<PartitionStore>,
    hub: Hub<SyncCoordinator>,
    dispatch: Mutex<()>,
}

impl StateStore {
    /// Create a store and its transport.
    pub fn new(config: StoreConfig) -> Self {
        let partitions = Arc::new(PartitionStore::new());
        let coordinator = SyncCoordinator::new(Arc::clone(&partitions), config.role_fn);
        Self {
            partitions,
            hub: Hub::new(coordinator, config.hub),
            dispatch: Mutex::new(()),
        }
    }

    /// Merge `delta` into the partitions for `roles` and broadcast it to
    /// clients of those roles.
    ///
    /// `Roles::All` updates every existing partition and reaches every client.
    pub fn update(&self, delta: StateTree, roles: impl Into<Roles>) -> Result<()> {
        self.partitions.update(delta, roles.into())?;
        self.flush();
        Ok(())
    }

    /// Compute a separate delta per role from its current partition, merge
    /// it, and send it to that role's clients only.
    ///
    /// `f` runs with the partitions locked and must not call back into the
    /// store.
    pub fn update_func<F>(&self, f: F, roles: impl Into<Roles>) -> Result<()>
    where
        F: FnMut(&StateTree, &str) -> StateTree,
    {
        self.partitions.update_func(roles.into(), f)?;
        self.flush();
        Ok(())
    }

    /// Current state for `role`, if any update has named it.
    pub fn snapshot(&self, role: &str) -> Option<StateTree> {
        self.partitions.snapshot(role)
    }

    /// Roles that currently have a partition.
    pub fn roles(&self) -> Vec<String> {
        self.partitions.roles()
    }

    /// Sequence of the last committed update.
    pub fn sequence(&self) -> u64 {
        self.partitions.sequence()
    }

    /// Connect a client in-process.
    pub fn connect(&self, request: &Parts) -> Result<Subscription<SyncCoordinator>> {
        Ok(self.hub.connect(request)?)
    }

    /// Serve a client over server-sent events.
    pub fn serve(&self, request: &Parts) -> Response {
        self.hub.serve(request)
    }

    pub fn hub(&self) -> &Hub<SyncCoordinator> {
        &self.hub
    }

    /// Router serving the event stream with `GET` at `path`.
    pub fn router(self: Arc<Self>, path: &str) -> Router {
        Router::new()
            .route(path, get(stream_events))
            .with_state(self)
    }

    /// Refuse further updates, deliver what was already committed, then close
    /// every client stream and wait for all of them to finish.
    pub async fn close(&self) {
        if self.partitions.close() {
            info!(sequence = self.partitions.sequence(), "state store closing");
        }
        self.flush();
        self.hub.close().await;
    }

    /// Hand queued events to the hub in commit order.
    fn flush(&self) {
        let _dispatch = self.dispatch.lock();
        for event in self.partitions.take_outbox() {
            self.hub.send(event);
        }
    }
}

async fn stream_events(State(store): State<Arc<StateStore>>, request: Request) -> Response {
    let (parts, _body) = request.into_parts();
    store.serve(&parts)
}
