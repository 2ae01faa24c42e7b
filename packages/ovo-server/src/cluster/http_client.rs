//! The real `PeerClient` transport: HTTP/JSON over `reqwest` against the
//! peer's `/ovo/cluster` and `/ovo/keystorage` endpoints, chosen to
//! preserve command-payload bit equivalence (keys, bytes, hash integers,
//! collection name) across the wire.
//!
//! Bounded by a deadline (default 2s): a timed-out or failed request
//! surfaces as `OvoError::PeerFailure` and is retried by the outbound
//! queue's own backoff, never here.

use std::time::Duration;

use async_trait::async_trait;
use ovo_core::{Command, MetaCounter, MetaObject, Node, OvoError, OvoKvResponse, OvoResponse, TopologyNode};

use super::registrar::PeerClient;

/// Default per-request deadline.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(2);

pub struct HttpPeerClient {
    http: reqwest::Client,
}

impl HttpPeerClient {
    #[must_use]
    pub fn new(deadline: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(deadline)
            .build()
            .expect("reqwest client configuration is valid");
        Self { http }
    }

    fn peer_base_url(peer: &Node) -> String {
        format!("http://{}:{}", peer.api_host, peer.port)
    }
}

impl Default for HttpPeerClient {
    fn default() -> Self {
        Self::new(DEFAULT_DEADLINE)
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn register_node(&self, peer: &Node, self_node: &TopologyNode) -> Result<Vec<TopologyNode>, OvoError> {
        let url = format!("{}/ovo/cluster/register", Self::peer_base_url(peer));
        let resp = self
            .http
            .post(&url)
            .json(self_node)
            .send()
            .await
            .map_err(|e| OvoError::PeerFailure(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(OvoError::PeerFailure(format!("register_node: peer returned {}", resp.status())));
        }
        resp.json::<Vec<TopologyNode>>().await.map_err(|e| OvoError::PeerFailure(e.to_string()))
    }

    async fn apply(&self, peer: &Node, cmd: Command) -> Result<(), OvoError> {
        let url = format!("{}/ovo/cluster/apply", Self::peer_base_url(peer));
        let resp = self
            .http
            .post(&url)
            .json(&cmd)
            .send()
            .await
            .map_err(|e| OvoError::PeerFailure(e.to_string()))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(OvoError::PeerFailure(format!("apply: peer returned {}", resp.status())))
        }
    }

    async fn forward_get(&self, peer: &Node, key: &str) -> Result<MetaObject, OvoError> {
        let url = format!("{}/ovo/keystorage/{key}", Self::peer_base_url(peer));
        let resp = self.http.get(&url).send().await.map_err(|e| OvoError::PeerFailure(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(OvoError::NotFound);
        }
        if !resp.status().is_success() {
            return Err(OvoError::PeerFailure(format!("forward_get: peer returned {}", resp.status())));
        }
        let envelope = resp
            .json::<OvoResponse<OvoKvResponse>>()
            .await
            .map_err(|e| OvoError::PeerFailure(e.to_string()))?;
        let kv = envelope.data.ok_or(OvoError::NotFound)?;
        Ok(MetaObject::new(kv.key, kv.data, "", 0, 0))
    }

    async fn forward_increment(&self, peer: &Node, delta: MetaCounter) -> Result<MetaCounter, OvoError> {
        let url = format!("{}/ovo/keystorage/counter/increment", Self::peer_base_url(peer));
        let resp = self
            .http
            .post(&url)
            .json(&delta)
            .send()
            .await
            .map_err(|e| OvoError::PeerFailure(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(OvoError::PeerFailure(format!("forward_increment: peer returned {}", resp.status())));
        }
        let envelope = resp
            .json::<OvoResponse<MetaCounter>>()
            .await
            .map_err(|e| OvoError::PeerFailure(e.to_string()))?;
        envelope.data.ok_or(OvoError::NotFound)
    }
}
