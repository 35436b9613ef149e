//! # rolesync-store
//!
//! Server-side application state partitioned by client role, kept in sync
//! with connected clients over a long-lived event stream.
//!
//! This crate provides:
//! - [`PartitionStore`]: role → state tree map behind a single lock
//! - [`SyncCoordinator`]: the transport hooks (role derivation, `sync` on
//!   connect, per-event role filtering)
//! - [`StateStore`]: the public API tying partitions to a
//!   [`Hub`](rolesync_hub::Hub)
//!
//! ## Protocol
//!
//! A client connects, its role is derived from the request, and it receives
//! one `sync` event with its role's full state (nothing if the role has no
//! state yet). Every later `update` reaches it as a `delta` event holding only
//! the changed fields, which the client merges into its copy with the same
//! rules the server uses ([`StateTree::merge`](rolesync_core::StateTree::merge)).
//!
//! ## Example
//!
//! ```rust,no_run
//! use rolesync_core::{tree, Roles};
//! use rolesync_store::{StateStore, StoreConfigBuilder};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = StoreConfigBuilder::new()
//!         .role_fn(|request| request.headers.get("x-role")
//!             .and_then(|v| v.to_str().ok())
//!             .unwrap_or("guest")
//!             .to_string())
//!         .build();
//!     let store = Arc::new(StateStore::new(config));
//!
//!     store.update(tree! { "banner" => "welcome" }, Roles::from(["guest", "admin"])).unwrap();
//!
//!     let app = Arc::clone(&store).router("/events");
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod partition;
pub mod store;

pub use config::{role_from_query, RoleFn, StoreConfig, StoreConfigBuilder};
pub use coordinator::SyncCoordinator;
pub use error::{Result, StoreError};
pub use partition::PartitionStore;
pub use store::StateStore;
