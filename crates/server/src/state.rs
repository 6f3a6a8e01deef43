//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::ServerConfig;
use crate::services::payment::GatewayClient;
use crate::services::shipping::ShippingClient;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections, configuration and the
/// outbound API clients.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: SqlitePool,
    gateway: GatewayClient,
    shipping: Option<ShippingClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The shipping client is only constructed when shipping credentials
    /// were configured; without them, return approval skips the pickup
    /// booking and the webhook route still works.
    #[must_use]
    pub fn new(config: ServerConfig, pool: SqlitePool) -> Self {
        let gateway = GatewayClient::new(&config.gateway);
        let shipping = config.shipping.as_ref().map(ShippingClient::new);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                gateway,
                shipping,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    /// Get a reference to the payment gateway client.
    #[must_use]
    pub fn gateway(&self) -> &GatewayClient {
        &self.inner.gateway
    }

    /// Get a reference to the shipping provider client, if configured.
    #[must_use]
    pub fn shipping(&self) -> Option<&ShippingClient> {
        self.inner.shipping.as_ref()
    }
}
