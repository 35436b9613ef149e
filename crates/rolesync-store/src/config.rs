//! Store configuration and the injected role function.

use axum::extract::Query;
use axum::http::request::Parts;
use rolesync_hub::HubConfig;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Maps an inbound connection request to the client's role.
pub type RoleFn = Arc<dyn Fn(&Parts) -> String + Send + Sync>;

/// Default role function: the percent-decoded `role` query parameter, or
/// `""` when absent or when the query string does not parse.
pub fn role_from_query(request: &Parts) -> String {
    Query::<HashMap<String, String>>::try_from_uri(&request.uri)
        .ok()
        .and_then(|Query(mut params)| params.remove("role"))
        .unwrap_or_default()
}

/// Configuration for a [`StateStore`](crate::StateStore).
#[derive(Clone)]
pub struct StoreConfig {
    /// Transport settings for connected clients.
    pub hub: HubConfig,
    /// Role derivation for new connections.
    pub role_fn: RoleFn,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            hub: HubConfig::default(),
            role_fn: Arc::new(role_from_query),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("hub", &self.hub)
            .field("role_fn", &"<fn>")
            .finish()
    }
}

/// Builder for store configuration.
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: StoreConfig::default(),
        }
    }

    pub fn role_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Parts) -> String + Send + Sync + 'static,
    {
        self.config.role_fn = Arc::new(f);
        self
    }

    pub fn hub(mut self, hub: HubConfig) -> Self {
        self.config.hub = hub;
        self
    }

    pub fn client_buffer(mut self, events: usize) -> Self {
        self.config.hub.client_buffer = events;
        self
    }

    /// Keep-alive interval in seconds; values below 1 are raised to 1.
    pub fn keep_alive(mut self, secs: u64) -> Self {
        self.config.hub.keep_alive_secs = secs.max(1);
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}

impl Default for StoreConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
