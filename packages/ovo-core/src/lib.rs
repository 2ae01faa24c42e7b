//! ovo-core -- the wire-shaped domain types shared by the server and any
//! client: the storage data model, the replication command record, cluster
//! domain types, the tagged error enum, and the REST envelope.
//!
//! - **Model** ([`model`]): `MetaObject`, `MetaUpdateObject`, `MetaCounter`
//! - **Command** ([`command`]): `Command`, `OpCode`, `CommandPayload`
//! - **Node** ([`node`]): `Node`, `NodeState`, `TopologyNode`
//! - **Error** ([`error`]): `OvoError`
//! - **REST** ([`rest`]): `OvoResponse` and the request/response shapes

pub mod command;
pub mod error;
pub mod model;
pub mod node;
pub mod rest;

pub use command::{Command, CommandPayload, OpCode};
pub use error::OvoError;
pub use model::{MetaCounter, MetaObject, MetaUpdateObject, DEFAULT_COLLECTION};
pub use node::{Node, NodeState, TopologyNode};
pub use rest::{
    OvoKvKeys, OvoKvRequest, OvoKvResponse, OvoKvUpdateRequest, OvoResponse, OvoTopologyNodeView,
    OvoTopologyView,
};
