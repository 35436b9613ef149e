//! Transport hooks backed by the partition store.

use axum::http::request::Parts;
use rolesync_core::Event;
use rolesync_hub::SyncHooks;
use std::sync::Arc;
use tracing::debug;

use crate::config::RoleFn;
use crate::partition::PartitionStore;

/// Answers the hub's connect / init / filter calls from a [`PartitionStore`].
pub struct SyncCoordinator {
    partitions: Arc<PartitionStore>,
    role_fn: RoleFn,
}

impl SyncCoordinator {
    pub fn new(partitions: Arc<PartitionStore>, role_fn: RoleFn) -> Self {
        Self {
            partitions,
            role_fn,
        }
    }
}

impl SyncHooks for SyncCoordinator {
    type Role = String;

    fn connected(&self, request: &Parts) -> String {
        (self.role_fn)(request)
    }

    /// At most one `sync` event: the role's partition as of the latest commit.
    fn init(&self, role: &String) -> Vec<Event> {
        self.init_with_watermark(role).0
    }

    /// The latest commit sequence is the watermark whether or not a sync is
    /// sent, so a client never receives a delta committed before it joined.
    fn init_with_watermark(&self, role: &String) -> (Vec<Event>, u64) {
        let (event, seq) = self.partitions.sync_point(role);
        if event.is_none() {
            debug!(role = %role, seq, "no partition to sync");
        }
        (event.into_iter().collect(), seq)
    }

    fn filter(&self, role: &String, event: &Event) -> bool {
        event.is_for(role)
    }
}
