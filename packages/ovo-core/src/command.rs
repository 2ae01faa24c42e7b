//! Replication command record: the unit the outbound/inbound queues move.

use serde::{Deserialize, Serialize};

use crate::model::{MetaCounter, MetaUpdateObject};

/// The seven replicated mutation kinds, matching the collection's write API
/// one-for-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpCode {
    Put,
    Delete,
    UpdateValue,
    UpdateKeyValue,
    UpdateKey,
    SetCounter,
    DeleteCounter,
}

impl OpCode {
    /// Lowercase label for this op code, used in metrics and log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Put => "put",
            Self::Delete => "delete",
            Self::UpdateValue => "updatevalue",
            Self::UpdateKeyValue => "updatekeyvalue",
            Self::UpdateKey => "updatekey",
            Self::SetCounter => "setcounter",
            Self::DeleteCounter => "deletecounter",
        }
    }
}

/// The payload a `Command` carries -- either an object-side mutation or a
/// counter-side one, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CommandPayload {
    Object(MetaUpdateObject),
    Counter(MetaCounter),
}

impl CommandPayload {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Object(o) => &o.key,
            Self::Counter(c) => &c.key,
        }
    }
}

/// A replication record produced by the partitioner and carried by the
/// outbound/inbound queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub op_code: OpCode,
    pub payload: CommandPayload,
    /// Set when the command is routed to a single deterministic owner
    /// rather than the partitioner's full destination set.
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub attempts: u32,
    /// Set when this command is addressed to a stepbrother rather than a
    /// twin or the command's owning node -- a backup replica, not an
    /// owner's copy. The inbound queue applies it regardless; the marker
    /// is carried for a future takeover policy.
    #[serde(default)]
    pub backup: bool,
}

impl Command {
    #[must_use]
    pub fn new(op_code: OpCode, payload: CommandPayload) -> Self {
        Self { op_code, payload, target: None, attempts: 0, backup: false }
    }

    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    #[must_use]
    pub fn with_backup(mut self) -> Self {
        self.backup = true;
        self
    }

    #[must_use]
    pub fn key(&self) -> &str {
        self.payload.key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_code_as_str_matches_serde_rename() {
        assert_eq!(OpCode::UpdateKeyValue.as_str(), "updatekeyvalue");
        assert_eq!(OpCode::Put.as_str(), "put");
    }

    #[test]
    fn op_code_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&OpCode::UpdateKeyValue).unwrap(), "\"updatekeyvalue\"");
        assert_eq!(serde_json::to_string(&OpCode::DeleteCounter).unwrap(), "\"deletecounter\"");
        assert_eq!(serde_json::to_string(&OpCode::Put).unwrap(), "\"put\"");
    }

    #[test]
    fn command_msgpack_roundtrip() {
        let cmd = Command::new(
            OpCode::Put,
            CommandPayload::Object(MetaUpdateObject { key: "a".into(), ..Default::default() }),
        )
        .with_target("node-2");
        let bytes = rmp_serde::to_vec(&cmd).unwrap();
        let back: Command = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(back.key(), "a");
        assert_eq!(back.target.as_deref(), Some("node-2"));
    }
}
