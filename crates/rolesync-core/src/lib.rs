//! # rolesync-core
//!
//! Data model for the rolesync state store.
//!
//! This crate provides:
//! - [`StateTree`]: nested string-keyed state with a recursive merge
//! - [`Roles`]: scoping of updates and deliveries to client roles
//! - [`Event`]: `sync` / `delta` events carrying an encoded tree
//!
//! ## Example
//!
//! ```rust
//! use rolesync_core::{tree, Event, EventKind, Roles, StateTree};
//!
//! let mut state = tree! { "user" => tree! { "name" => "ada", "online" => false } };
//! let delta = tree! { "user" => tree! { "online" => true } };
//!
//! state.merge_ref(&delta);
//! assert_eq!(state, tree! { "user" => tree! { "name" => "ada", "online" => true } });
//!
//! let event = Event::delta(&delta, Roles::one("admin")).unwrap();
//! assert_eq!(event.kind, EventKind::Delta);
//! assert!(event.is_for("admin") && !event.is_for("guest"));
//! ```

pub mod error;
pub mod event;
pub mod roles;
pub mod tree;

pub use error::{EncodeError, Result};
pub use event::{Event, EventKind};
pub use roles::Roles;
pub use tree::{Scalar, StateTree, Value};
