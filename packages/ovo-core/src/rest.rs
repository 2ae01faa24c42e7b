//! REST request/response envelope types, mirrored from the original
//! `server/model/model.go` JSON shapes (PascalCase field names, no
//! serde-renamed snake_case, since these cross the wire as-is).

use serde::{Deserialize, Serialize};

use crate::model::{MetaObject, MetaUpdateObject};
use crate::node::{Node, TopologyNode};

/// The envelope every REST response is wrapped in:
/// `{ "Status": "done"|"error", "Code": "0".."105", "Data": <payload|null> }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OvoResponse<T> {
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Data")]
    pub data: Option<T>,
}

impl<T> OvoResponse<T> {
    #[must_use]
    pub fn ok(data: Option<T>) -> Self {
        Self { status: "done".to_string(), code: "0".to_string(), data }
    }

    #[must_use]
    pub fn error(code: impl Into<String>) -> Self {
        Self { status: "error".to_string(), code: code.into(), data: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OvoKvRequest {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Data", default, with = "serde_bytes")]
    pub data: Vec<u8>,
    #[serde(rename = "Collection", default)]
    pub collection: String,
    #[serde(rename = "TTL", default)]
    pub ttl: u64,
    #[serde(rename = "Hash", default)]
    pub hash: i32,
}

impl From<OvoKvRequest> for MetaObject {
    fn from(req: OvoKvRequest) -> Self {
        MetaObject::new(req.key, req.data, req.collection, req.hash, req.ttl)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OvoKvUpdateRequest {
    #[serde(rename = "Key", default)]
    pub key: String,
    #[serde(rename = "NewKey", default)]
    pub new_key: String,
    #[serde(rename = "Data", default, with = "serde_bytes")]
    pub data: Vec<u8>,
    #[serde(rename = "NewData", default, with = "serde_bytes")]
    pub new_data: Vec<u8>,
    #[serde(rename = "Hash", default)]
    pub hash: i32,
    #[serde(rename = "NewHash", default)]
    pub new_hash: i32,
}

impl From<OvoKvUpdateRequest> for MetaUpdateObject {
    fn from(req: OvoKvUpdateRequest) -> Self {
        MetaUpdateObject {
            key: req.key,
            new_key: req.new_key,
            collection: String::new(),
            data: req.data,
            new_data: req.new_data,
            hash: req.hash,
            new_hash: req.new_hash,
            ttl: 0,
            creation_date: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OvoKvResponse {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Data", with = "serde_bytes")]
    pub data: Vec<u8>,
}

impl From<MetaObject> for OvoKvResponse {
    fn from(obj: MetaObject) -> Self {
        Self { key: obj.key, data: obj.data }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OvoKvKeys {
    #[serde(rename = "Keys")]
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OvoTopologyNodeView {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "HashRange")]
    pub hash_range: Vec<i32>,
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Port")]
    pub port: u16,
}

impl From<&Node> for OvoTopologyNodeView {
    fn from(node: &Node) -> Self {
        Self {
            name: node.name.clone(),
            hash_range: node.hash_range.clone(),
            host: node.ext_host.clone(),
            port: node.port,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OvoTopologyView {
    #[serde(rename = "Nodes")]
    pub nodes: Vec<OvoTopologyNodeView>,
}

impl From<&[TopologyNode]> for OvoTopologyView {
    fn from(nodes: &[TopologyNode]) -> Self {
        Self { nodes: nodes.iter().map(|tn| OvoTopologyNodeView::from(&tn.node)).collect() }
    }
}
