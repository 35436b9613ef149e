//! The callbacks a hub makes into whatever owns the state.

use axum::http::request::Parts;
use rolesync_core::Event;
use std::fmt;

/// Hooks consulted by the [`Hub`](crate::Hub) over a client's lifetime.
///
/// - `connected` runs once per inbound request to derive the client's role
/// - `init` runs once per new client; its events reach only that client and
///   are queued ahead of any broadcast
/// - `filter` runs per broadcast per connected client
///
/// `init` may take locks of its own. `filter` runs while the hub's registry
/// is locked and must not call back into the hub.
pub trait SyncHooks: Send + Sync + 'static {
    type Role: Clone + fmt::Debug + Send + Sync + 'static;

    fn connected(&self, request: &Parts) -> Self::Role;

    fn init(&self, role: &Self::Role) -> Vec<Event>;

    /// The `init` events plus the id of the newest broadcast they already
    /// account for. Broadcasts at or below that id are not delivered to the
    /// new client.
    ///
    /// Defaults to the highest id among the init events, or 0. Override it
    /// when a client can be current without receiving any init event.
    fn init_with_watermark(&self, role: &Self::Role) -> (Vec<Event>, u64) {
        let events = self.init(role);
        let watermark = events.iter().filter_map(|e| e.id).max().unwrap_or(0);
        (events, watermark)
    }

    fn filter(&self, role: &Self::Role, event: &Event) -> bool;
}
