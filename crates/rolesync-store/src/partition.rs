//! Role partitions behind a single lock.
//!
//! [`PartitionStore`] owns every role's [`StateTree`] together with the commit
//! sequence and the queue of delta events waiting to be broadcast. All of it
//! sits behind one mutex and nothing inside ever leaves the lock by
//! reference: callers get clones, encoded events, or run a closure while the
//! lock is held.
//!
//! Each successful `update`/`update_func` is one commit. Commits get
//! increasing sequence numbers, and the delta events they produce are queued
//! in commit order carrying that number as their id. A sync snapshot carries
//! the sequence of the last commit it reflects.

use parking_lot::Mutex;
use rolesync_core::{Event, Roles, StateTree};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

use crate::error::{Result, StoreError};

struct Partitions {
    trees: HashMap<String, StateTree>,
    /// Sequence of the last commit.
    seq: u64,
    /// Delta events committed but not yet handed to the transport.
    outbox: VecDeque<Event>,
    closed: bool,
}

impl Partitions {
    fn commit(&mut self, event: Option<Event>) -> u64 {
        self.seq += 1;
        if let Some(event) = event {
            self.outbox.push_back(event.with_id(self.seq));
        }
        self.seq
    }
}

/// Encode a delta, logging and discarding it if it cannot be encoded.
fn encode_delta(delta: &StateTree, targets: Roles) -> Option<Event> {
    match Event::delta(delta, targets) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(error = %err, "dropping delta event that cannot be encoded");
            None
        }
    }
}

/// The partition map and its lock.
pub struct PartitionStore {
    state: Mutex<Partitions>,
}

impl PartitionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Partitions {
                trees: HashMap::new(),
                seq: 0,
                outbox: VecDeque::new(),
                closed: false,
            }),
        }
    }

    /// Merge `delta` into the partitions named by `roles` and queue one delta
    /// event scoped the same way.
    ///
    /// `Roles::All` reaches only partitions that already exist; named roles
    /// get an empty partition first if they have none. Returns the commit
    /// sequence.
    pub fn update(&self, delta: StateTree, roles: Roles) -> Result<u64> {
        // the payload is immutable input, so it can be encoded before locking
        let event = encode_delta(&delta, roles.clone());

        let mut state = self.state.lock();
        if state.closed {
            return Err(StoreError::Closed);
        }

        match &roles {
            Roles::All => {
                for tree in state.trees.values_mut() {
                    tree.merge_ref(&delta);
                }
            }
            Roles::Only(names) => {
                for name in names {
                    state
                        .trees
                        .entry(name.clone())
                        .or_default()
                        .merge_ref(&delta);
                }
            }
        }

        let seq = state.commit(event);
        debug!(seq, roles = ?roles, "update committed");
        Ok(seq)
    }

    /// For every affected role, compute a delta from that role's current
    /// partition, merge it, and queue it scoped to that role alone.
    ///
    /// The whole pass runs under one lock acquisition; `f` must not call back
    /// into the store. Returns the sequence of the last commit.
    pub fn update_func<F>(&self, roles: Roles, mut f: F) -> Result<u64>
    where
        F: FnMut(&StateTree, &str) -> StateTree,
    {
        let mut state = self.state.lock();
        if state.closed {
            return Err(StoreError::Closed);
        }

        let names: Vec<String> = match roles {
            Roles::All => state.trees.keys().cloned().collect(),
            Roles::Only(names) => names.into_iter().collect(),
        };

        let mut seq = state.seq;
        for name in names {
            let partition = state.trees.entry(name.clone()).or_default();
            let delta = f(partition, &name);
            let event = encode_delta(&delta, Roles::one(name.as_str()));
            partition.merge(delta);
            seq = state.commit(event);
            debug!(seq, role = %name, "computed update committed");
        }
        Ok(seq)
    }

    /// Copy of the partition for `role`, if it has one.
    pub fn snapshot(&self, role: &str) -> Option<StateTree> {
        let state = self.state.lock();
        if state.closed {
            return None;
        }
        state.trees.get(role).cloned()
    }

    /// The partition for `role` encoded as a sync event stamped with the
    /// current commit sequence. `None` when the role has no partition, the
    /// store is closed, or the partition cannot be encoded.
    pub fn sync_event(&self, role: &str) -> Option<Event> {
        self.sync_point(role).0
    }

    /// The sync event for `role` together with the commit sequence it was
    /// taken at, read under one lock acquisition.
    ///
    /// The sequence is returned even when there is no event, so a client
    /// without a partition still knows which commits predate it.
    pub fn sync_point(&self, role: &str) -> (Option<Event>, u64) {
        let state = self.state.lock();
        if state.closed {
            return (None, state.seq);
        }
        let event = state.trees.get(role).and_then(|tree| match Event::sync(tree) {
            Ok(event) => Some(event.with_id(state.seq)),
            Err(err) => {
                warn!(role, error = %err, "dropping sync event that cannot be encoded");
                None
            }
        });
        (event, state.seq)
    }

    /// Take every queued delta event, oldest first.
    pub fn take_outbox(&self) -> Vec<Event> {
        self.state.lock().outbox.drain(..).collect()
    }

    /// Roles that currently have a partition.
    pub fn roles(&self) -> Vec<String> {
        let mut roles: Vec<String> = self.state.lock().trees.keys().cloned().collect();
        roles.sort();
        roles
    }

    pub fn len(&self) -> usize {
        self.state.lock().trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence of the last commit.
    pub fn sequence(&self) -> u64 {
        self.state.lock().seq
    }

    /// Refuse further updates. Waits for any update holding the lock.
    /// Returns `false` if the store was already closed.
    pub fn close(&self) -> bool {
        let mut state = self.state.lock();
        !std::mem::replace(&mut state.closed, true)
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl Default for PartitionStore {
    fn default() -> Self {
        Self::new()
    }
}
