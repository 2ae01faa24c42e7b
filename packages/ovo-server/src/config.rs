//! Persisted/configuration state: `ServerConf`, loaded at startup and
//! atomically rewritten after each topology mutation.
//!
//! Schema: `{ ServerNode: TopologyNode, Topology: {Nodes:[...]}, Debug: bool,
//! HttpBindAll: bool, TcpBindAll: bool }`. Startup failures become
//! `OvoError::Fatal` rather than aborting the process directly.

use std::fs;
use std::path::Path;

use ovo_core::{OvoError, TopologyNode};
use serde::{Deserialize, Serialize};

/// The `Topology: {Nodes:[...]}` wrapper from the persisted schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologySnapshot {
    #[serde(rename = "Nodes", default)]
    pub nodes: Vec<TopologyNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConf {
    #[serde(rename = "ServerNode")]
    pub server_node: TopologyNode,
    #[serde(rename = "Topology", default)]
    pub topology: TopologySnapshot,
    #[serde(rename = "Debug", default)]
    pub debug: bool,
    #[serde(rename = "HttpBindAll", default)]
    pub http_bind_all: bool,
    #[serde(rename = "TcpBindAll", default)]
    pub tcp_bind_all: bool,
}

impl ServerConf {
    /// Builds a fresh config around `server_node`, with an empty seed
    /// topology (the node registers itself on first save/join).
    #[must_use]
    pub fn bootstrap(server_node: TopologyNode) -> Self {
        Self {
            topology: TopologySnapshot { nodes: vec![server_node.clone()] },
            server_node,
            debug: false,
            http_bind_all: false,
            tcp_bind_all: false,
        }
    }

    /// Loads the JSON config file at `path`. Missing file or malformed
    /// contents are `OvoError::Fatal` -- the one error kind legitimate to
    /// abort the process on.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, OvoError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| OvoError::Fatal(format!("configuration file not found at {}: {e}", path.display())))?;
        serde_json::from_str(&contents)
            .map_err(|e| OvoError::Fatal(format!("configuration file at {} is malformed: {e}", path.display())))
    }

    /// Rewrites the JSON config file at `path`, via a temp file + rename so
    /// a reader never observes a partially written file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), OvoError> {
        let path = path.as_ref();
        let data = serde_json::to_vec_pretty(self)
            .map_err(|e| OvoError::Fatal(format!("failed to serialize configuration: {e}")))?;
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, &data)
            .map_err(|e| OvoError::Fatal(format!("configuration write error at {}: {e}", tmp_path.display())))?;
        fs::rename(&tmp_path, path)
            .map_err(|e| OvoError::Fatal(format!("configuration rename error at {}: {e}", path.display())))
    }
}
