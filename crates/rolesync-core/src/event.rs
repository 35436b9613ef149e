//! Outbound events: full `sync` snapshots and incremental `delta` updates.

use crate::error::Result;
use crate::roles::Roles;
use crate::tree::StateTree;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two kinds of event a client can receive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Complete partition state, sent once on connect.
    Sync,
    /// Changed fields only, to be merged into the client's copy.
    Delta,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Sync => "sync",
            EventKind::Delta => "delta",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event on a client stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// Commit sequence the event reflects.
    pub id: Option<u64>,
    /// Encoded state tree.
    pub data: String,
    /// Roles allowed to receive the event.
    pub targets: Roles,
}

impl Event {
    /// Encode `tree` as an event of the given kind.
    pub fn encode(kind: EventKind, tree: &StateTree, targets: Roles) -> Result<Self> {
        Ok(Event {
            kind,
            id: None,
            data: tree.to_json()?,
            targets,
        })
    }

    /// A full snapshot, addressed to whoever asked for it.
    pub fn sync(tree: &StateTree) -> Result<Self> {
        Self::encode(EventKind::Sync, tree, Roles::All)
    }

    /// An incremental update scoped to `targets`.
    pub fn delta(tree: &StateTree, targets: Roles) -> Result<Self> {
        Self::encode(EventKind::Delta, tree, targets)
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Whether a client of `role` should receive this event.
    pub fn is_for(&self, role: &str) -> bool {
        self.targets.includes(role)
    }

    /// Decode the payload back into a tree.
    pub fn tree(&self) -> Result<StateTree> {
        StateTree::from_json(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EncodeError;
    use crate::tree;

    #[test]
    fn test_kind_names() {
        assert_eq!(EventKind::Sync.to_string(), "sync");
        assert_eq!(EventKind::Delta.as_str(), "delta");
        assert_eq!(serde_json::to_string(&EventKind::Delta).unwrap(), "\"delta\"");
    }

    #[test]
    fn test_delta_carries_targets() {
        let event = Event::delta(&tree! { "1" => "2" }, Roles::one("r1"))
            .unwrap()
            .with_id(7);
        assert_eq!(event.kind, EventKind::Delta);
        assert_eq!(event.id, Some(7));
        assert_eq!(event.data, r#"{"1":"2"}"#);
        assert!(event.is_for("r1"));
        assert!(!event.is_for("r2"));
    }

    #[test]
    fn test_sync_is_unscoped() {
        let event = Event::sync(&tree! { "a" => tree! { "b" => false } }).unwrap();
        assert_eq!(event.kind, EventKind::Sync);
        assert!(event.is_for("whoever"));
        assert_eq!(event.tree().unwrap(), tree! { "a" => tree! { "b" => false } });
    }

    #[test]
    fn test_unencodable_tree_yields_error() {
        let err = Event::delta(&tree! { "x" => f64::INFINITY }, Roles::All).unwrap_err();
        assert_eq!(err, EncodeError::NonRepresentable("x".to_string()));
    }
}
