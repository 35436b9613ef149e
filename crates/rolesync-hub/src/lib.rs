//! # rolesync-hub
//!
//! Broadcast transport for the rolesync state store.
//!
//! This crate provides:
//! - [`SyncHooks`]: the connect / init / filter callbacks a hub makes into
//!   the state owner
//! - [`Hub`]: a pub/sub handler with bounded, non-blocking per-client buffers
//! - [`sse`]: server-sent-events framing and the [`Hub::serve`] response
//!
//! ## Example
//!
//! ```rust
//! use axum::http::{request::Parts, Request};
//! use rolesync_core::{tree, Event, Roles};
//! use rolesync_hub::{Hub, HubConfig, SyncHooks};
//!
//! struct ByPath;
//!
//! impl SyncHooks for ByPath {
//!     type Role = String;
//!
//!     fn connected(&self, request: &Parts) -> String {
//!         request.uri.path().trim_start_matches('/').to_string()
//!     }
//!
//!     fn init(&self, _role: &String) -> Vec<Event> {
//!         Vec::new()
//!     }
//!
//!     fn filter(&self, role: &String, event: &Event) -> bool {
//!         event.is_for(role)
//!     }
//! }
//!
//! let hub = Hub::new(ByPath, HubConfig::default());
//! let (parts, _) = Request::builder().uri("/admin").body(()).unwrap().into_parts();
//! let mut admin = hub.connect(&parts).unwrap();
//!
//! hub.send(Event::delta(&tree! { "x" => 1 }, Roles::one("admin")).unwrap());
//! assert_eq!(admin.try_recv().unwrap().data, r#"{"x":1}"#);
//! ```

pub mod error;
pub mod hooks;
pub mod hub;
pub mod sse;

pub use error::{HubError, Result};
pub use hooks::SyncHooks;
pub use hub::{ClientId, Hub, HubConfig, HubConfigBuilder, Subscription};
