//! Maps a replicated `Command` onto a `ConcurrentCollection` call.
//!
//! Shared by the partitioner's local-apply path and the inbound queue, so
//! the op-code -> collection-method mapping is defined exactly once.

use ovo_core::{Command, CommandPayload, OpCode, OvoError};

use crate::storage::ConcurrentCollection;

pub fn apply_command(collection: &dyn ConcurrentCollection, cmd: &Command) -> Result<(), OvoError> {
    metrics::counter!("ovo_commands_applied_total", "op" => cmd.op_code.as_str()).increment(1);
    match (cmd.op_code, &cmd.payload) {
        (OpCode::Put, CommandPayload::Object(upd)) => {
            let obj = ovo_core::MetaObject::new(upd.key.clone(), upd.data.clone(), upd.collection.clone(), upd.hash, upd.ttl);
            collection.put(obj)
        }
        (OpCode::Delete, CommandPayload::Object(upd)) => {
            collection.delete(&upd.key);
            Ok(())
        }
        (OpCode::UpdateValue, CommandPayload::Object(upd)) => collection.update_value_if_equal(upd),
        (OpCode::UpdateKeyValue, CommandPayload::Object(upd)) => collection.update_kv_if_equal(upd),
        (OpCode::UpdateKey, CommandPayload::Object(upd)) => collection.update_key(upd),
        (OpCode::SetCounter, CommandPayload::Counter(c)) => {
            collection.set_counter(c.clone());
            Ok(())
        }
        (OpCode::DeleteCounter, CommandPayload::Counter(c)) => {
            collection.delete_counter(&c.key);
            Ok(())
        }
        _ => Err(OvoError::NullObject),
    }
}
