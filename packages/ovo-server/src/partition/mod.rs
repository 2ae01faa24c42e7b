//! The partitioner and the replication queues it drives.

pub mod apply;
pub mod inbound;
pub mod outbound;
pub mod partitioner;

pub use apply::apply_command;
pub use inbound::InboundQueue;
pub use outbound::OutboundQueue;
pub use partitioner::{Classification, Partitioner, ReadRoute};
