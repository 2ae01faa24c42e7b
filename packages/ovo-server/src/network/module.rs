//! The `axum` front door with a deferred startup lifecycle.
//!
//! Implements the deferred startup pattern: `new()` creates resources,
//! `start()` binds the TCP listener, and `serve()` starts accepting
//! connections. This separation allows the rest of the bootstrap to wire
//! the collection, topology, and queues into `AppState` between `start()`
//! and `serve()`.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use super::config::NetworkConfig;
use super::handlers::{
    apply_command_handler, count_handler, delete_counter_handler, delete_handler, get_and_remove_handler, get_counter_handler,
    get_handler, health_handler, increment_handler, keys_handler, liveness_handler, put_handler, readiness_handler,
    register_node_handler, update_key_handler, update_key_value_if_equal_handler, update_value_if_equal_handler, AppState,
};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;

/// Manages the HTTP server lifecycle.
///
/// 1. `new()` -- allocates the shared shutdown controller
/// 2. `start()` -- binds TCP listener to the configured address
/// 3. `serve()` -- begins accepting connections until shutdown is signalled
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    #[must_use]
    pub fn new(config: NetworkConfig) -> Self {
        Self { config, listener: None, shutdown: Arc::new(ShutdownController::new()) }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the `/ovo/keystorage` and `/ovo/cluster` route table plus
    /// health endpoints, wrapped in the Tower middleware stack.
    #[must_use]
    pub fn build_router(&self, app_state: AppState) -> Router {
        let layers = build_http_layers(&self.config);

        Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .route("/ovo/keystorage", get(count_handler).post(put_handler).put(put_handler))
            .route("/ovo/keystorage/keys", get(keys_handler))
            .route("/ovo/keystorage/counter/increment", post(increment_handler))
            .route("/ovo/keystorage/counter/{key}", get(get_counter_handler).delete(delete_counter_handler))
            .route("/ovo/keystorage/{key}", get(get_handler).delete(delete_handler))
            .route("/ovo/keystorage/{key}/getandremove", get(get_and_remove_handler))
            .route("/ovo/keystorage/{key}/updatevalueifequal", post(update_value_if_equal_handler))
            .route("/ovo/keystorage/{key}/updatekeyvalueifequal", post(update_key_value_if_equal_handler))
            .route("/ovo/keystorage/{key}/updatekey", post(update_key_handler))
            .route("/ovo/cluster/register", post(register_node_handler))
            .route("/ovo/cluster/apply", post(apply_command_handler))
            .layer(layers)
            .with_state(app_state)
    }

    /// Binds the TCP listener to the configured host and port. Returns the
    /// actual bound port, which may differ from the configured one when
    /// port 0 is used (OS-assigned ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        info!(%addr, port, "HTTP listener bound");
        self.listener = Some(listener);
        Ok(port)
    }

    /// Starts serving connections until the shutdown future resolves.
    ///
    /// Consumes `self` because the listener is moved into the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a fatal I/O error.
    ///
    /// # Panics
    ///
    /// Panics if `start()` was not called before `serve()`.
    pub async fn serve(
        self,
        app_state: AppState,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self.listener.expect("start() must be called before serve()");
        let router = self.build_router(app_state);
        self.shutdown.set_ready();

        axum::serve(listener, router).with_graceful_shutdown(shutdown).await?;
        self.shutdown.trigger_shutdown();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_module_without_binding() {
        let module = NetworkModule::new(NetworkConfig::default());
        assert!(module.listener.is_none());
    }

    #[test]
    fn shutdown_controller_returns_shared_arc() {
        let module = NetworkModule::new(NetworkConfig::default());
        let s1 = module.shutdown_controller();
        let s2 = module.shutdown_controller();
        assert!(Arc::ptr_eq(&s1, &s2));
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut module = NetworkModule::new(NetworkConfig { port: 0, ..NetworkConfig::default() });
        let port = module.start().await.expect("start should succeed");
        assert!(port > 0, "OS-assigned port should be > 0");
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    #[should_panic(expected = "start() must be called before serve()")]
    async fn serve_panics_without_start() {
        let module = NetworkModule::new(NetworkConfig::default());
        let state = test_app_state();
        let (_tx, rx) = tokio::sync::watch::channel(false);
        let shutdown = async move {
            let mut rx = rx;
            let _ = rx.changed().await;
        };
        let _ = module.serve(state, shutdown).await;
    }

    fn test_app_state() -> AppState {
        use std::time::Instant;

        use tokio::sync::watch;

        use crate::cluster::{ClusterTopology, NullPeerClient};
        use crate::partition::{InboundQueue, OutboundQueue, Partitioner};
        use crate::storage::DashMapCollection;
        use ovo_core::{Node, NodeState, TopologyNode};

        let node = Node {
            name: "n1".into(),
            host: "0.0.0.0".into(),
            api_host: "127.0.0.1".into(),
            port: 8080,
            ext_host: "127.0.0.1".into(),
            hash_range: vec![0],
            state: NodeState::Active,
        };
        let topology = ClusterTopology::new(TopologyNode::new(node, 0));
        let collection = DashMapCollection::new();
        let (_tx, rx) = watch::channel(false);
        let peer_client = Arc::new(NullPeerClient::new());
        let outbound = OutboundQueue::new(peer_client.clone(), Arc::clone(&topology), rx.clone());
        let inbound = InboundQueue::start(Arc::clone(&collection), 4, rx);
        let partitioner = Arc::new(Partitioner::new("n1", Arc::clone(&topology), Arc::clone(&outbound)));

        AppState {
            collection,
            topology,
            outbound,
            inbound,
            partitioner,
            peer_client,
            shutdown: Arc::new(ShutdownController::new()),
            config: Arc::new(NetworkConfig::default()),
            start_time: Instant::now(),
        }
    }
}
