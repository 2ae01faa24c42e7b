//! HTTP handler definitions for the `ovo` front door.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports all handler functions for convenient access
//! when building the router.

pub mod health;
pub mod keystorage;
pub mod peer;

pub use health::{health_handler, liveness_handler, readiness_handler};
pub use keystorage::*;
pub use peer::*;

use std::sync::Arc;
use std::time::Instant;

use crate::cluster::{ClusterTopology, PeerClient};
use crate::partition::{InboundQueue, OutboundQueue, Partitioner};
use crate::storage::ConcurrentCollection;

use super::{NetworkConfig, ShutdownController};

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references to shared resources so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub collection: Arc<dyn ConcurrentCollection>,
    pub topology: Arc<ClusterTopology>,
    pub outbound: Arc<OutboundQueue>,
    pub inbound: Arc<InboundQueue>,
    pub partitioner: Arc<Partitioner>,
    pub peer_client: Arc<dyn PeerClient>,
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Network configuration (bind address, CORS, timeout).
    pub config: Arc<NetworkConfig>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}
