//! The `/ovo/keystorage` REST front door, routed through the partitioner
//! rather than touching the collection directly, so a write against a
//! hash owned by a peer is forwarded instead of applied here.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use ovo_core::{
    CommandPayload, MetaCounter, MetaUpdateObject, OpCode, OvoError, OvoKvKeys, OvoKvRequest, OvoKvResponse,
    OvoKvUpdateRequest, OvoResponse,
};
use serde::Deserialize;

use super::AppState;
use crate::partition::ReadRoute;

#[derive(Debug, Deserialize)]
pub struct HashQuery {
    #[serde(default)]
    pub hash: i32,
}

fn error_envelope<T>(code: &str) -> Json<OvoResponse<T>> {
    Json(OvoResponse::error(code))
}

/// `GET /ovo/keystorage` -- local object count.
pub async fn count_handler(State(state): State<AppState>) -> Json<OvoResponse<usize>> {
    Json(OvoResponse::ok(Some(state.collection.count())))
}

/// `GET /ovo/keystorage/keys` -- local key listing, backed by the
/// collection's `keys()` operation.
pub async fn keys_handler(State(state): State<AppState>) -> Json<OvoResponse<OvoKvKeys>> {
    Json(OvoResponse::ok(Some(OvoKvKeys { keys: state.collection.keys() })))
}

/// `GET /ovo/keystorage/:key` -- 200/kv, 404/101 on miss, resolved through
/// the partitioner: a local owner reads the collection directly, a
/// non-owner performs a synchronous forward RPC.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(q): Query<HashQuery>,
) -> (StatusCode, Json<OvoResponse<OvoKvResponse>>) {
    match state.partitioner.route_read(q.hash) {
        ReadRoute::Local => match state.collection.get(&key) {
            Some(obj) => (StatusCode::OK, Json(OvoResponse::ok(Some(OvoKvResponse::from(obj))))),
            None => (StatusCode::NOT_FOUND, error_envelope("101")),
        },
        ReadRoute::Forward(peer) => match state.peer_client.forward_get(&peer, &key).await {
            Ok(obj) => (StatusCode::OK, Json(OvoResponse::ok(Some(OvoKvResponse::from(obj))))),
            Err(_) => (StatusCode::NOT_FOUND, error_envelope("101")),
        },
        ReadRoute::NoOwner => (StatusCode::NOT_FOUND, error_envelope("101")),
    }
}

/// `POST`/`PUT /ovo/keystorage` -- 200, 400/10 on validation failure.
pub async fn put_handler(
    State(state): State<AppState>,
    Json(req): Json<OvoKvRequest>,
) -> (StatusCode, Json<OvoResponse<()>>) {
    if req.key.is_empty() {
        return (StatusCode::BAD_REQUEST, error_envelope("10"));
    }
    let hash = req.hash;
    let upd = MetaUpdateObject {
        key: req.key.clone(),
        new_key: String::new(),
        collection: req.collection.clone(),
        data: req.data.clone(),
        new_data: Vec::new(),
        hash,
        new_hash: 0,
        ttl: req.ttl,
        creation_date: 0,
    };
    let obj: ovo_core::MetaObject = req.into();
    let result = state.partitioner.route_mutation(hash, OpCode::Put, CommandPayload::Object(upd), || state.collection.put(obj.clone()));

    match result {
        Ok(()) => (StatusCode::OK, Json(OvoResponse::ok(None))),
        Err(OvoError::NullKey | OvoError::NullObject) => (StatusCode::BAD_REQUEST, error_envelope("10")),
        Err(OvoError::NoOwner) => (StatusCode::SERVICE_UNAVAILABLE, error_envelope("106")),
        Err(_) => (StatusCode::BAD_REQUEST, error_envelope("10")),
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub hash: i32,
}

/// `DELETE /ovo/keystorage/:key` -- unconditional, always 200.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(q): Query<DeleteQuery>,
) -> Json<OvoResponse<()>> {
    let upd = MetaUpdateObject { key: key.clone(), ..Default::default() };
    let _ = state
        .partitioner
        .route_mutation(q.hash, OpCode::Delete, CommandPayload::Object(upd), || {
            state.collection.delete(&key);
            Ok(())
        });
    Json(OvoResponse::ok(None))
}

/// `GET /ovo/keystorage/:key/getandremove` -- 200/kv, 403/102 on miss.
///
/// Atomic read+remove is always serviced locally: the partitioner's
/// forward path is for reads that never touch local state, and this
/// operation needs to observe-and-mutate in one step, so a non-owner
/// simply reports the entry absent here (it was never local to begin
/// with).
pub async fn get_and_remove_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(q): Query<HashQuery>,
) -> (StatusCode, Json<OvoResponse<OvoKvResponse>>) {
    match state.collection.get_and_remove(&key) {
        Some(obj) => {
            let upd = MetaUpdateObject { key: key.clone(), ..Default::default() };
            let classification = state.partitioner.classify(q.hash);
            for twin in &classification.twins {
                state.outbound.enqueue(
                    twin.clone(),
                    ovo_core::Command::new(OpCode::Delete, CommandPayload::Object(upd.clone())),
                );
            }
            (StatusCode::OK, Json(OvoResponse::ok(Some(OvoKvResponse::from(obj)))))
        }
        None => (StatusCode::FORBIDDEN, error_envelope("102")),
    }
}

/// `POST /ovo/keystorage/:key/updatevalueifequal` -- CAS value, 403/103 on
/// hash mismatch.
pub async fn update_value_if_equal_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<OvoKvUpdateRequest>,
) -> (StatusCode, Json<OvoResponse<()>>) {
    let hash = req.hash;
    let mut upd: MetaUpdateObject = req.into();
    upd.key = key;

    let result = state.partitioner.route_mutation(hash, OpCode::UpdateValue, CommandPayload::Object(upd.clone()), {
        let collection = state.collection.clone();
        let upd = upd.clone();
        move || collection.update_value_if_equal(&upd)
    });

    match result {
        Ok(()) => (StatusCode::OK, Json(OvoResponse::ok(None))),
        Err(OvoError::NoOwner) => (StatusCode::SERVICE_UNAVAILABLE, error_envelope("106")),
        Err(_) => (StatusCode::FORBIDDEN, error_envelope("103")),
    }
}

/// `POST /ovo/keystorage/:key/updatekeyvalueifequal` -- CAS rename+value,
/// 403/104 on hash mismatch or rename conflict.
pub async fn update_key_value_if_equal_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<OvoKvUpdateRequest>,
) -> (StatusCode, Json<OvoResponse<()>>) {
    let hash = req.hash;
    let mut upd: MetaUpdateObject = req.into();
    upd.key = key;

    let result = state.partitioner.route_mutation(hash, OpCode::UpdateKeyValue, CommandPayload::Object(upd.clone()), {
        let collection = state.collection.clone();
        let upd = upd.clone();
        move || collection.update_kv_if_equal(&upd)
    });

    match result {
        Ok(()) => (StatusCode::OK, Json(OvoResponse::ok(None))),
        Err(OvoError::NoOwner) => (StatusCode::SERVICE_UNAVAILABLE, error_envelope("106")),
        Err(_) => (StatusCode::FORBIDDEN, error_envelope("104")),
    }
}

/// `POST /ovo/keystorage/:key/updatekey` -- unconditional rename, 403/105
/// if the source key does not exist.
pub async fn update_key_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<OvoKvUpdateRequest>,
) -> (StatusCode, Json<OvoResponse<()>>) {
    let hash = req.hash;
    let mut upd: MetaUpdateObject = req.into();
    upd.key = key;

    let result = state.partitioner.route_mutation(hash, OpCode::UpdateKey, CommandPayload::Object(upd.clone()), {
        let collection = state.collection.clone();
        let upd = upd.clone();
        move || collection.update_key(&upd)
    });

    match result {
        Ok(()) => (StatusCode::OK, Json(OvoResponse::ok(None))),
        Err(OvoError::NoOwner) => (StatusCode::SERVICE_UNAVAILABLE, error_envelope("106")),
        Err(_) => (StatusCode::FORBIDDEN, error_envelope("105")),
    }
}

/// `POST /ovo/keystorage/counter/increment` -- atomic add, routed through
/// the partitioner like any other mutation: applied locally and replicated
/// (as a `SetCounter` of the post-increment value, not `increment` itself --
/// a retried `increment` would double-count while a retried `SetCounter` is
/// a no-op) when the current node owns the hash, or forwarded synchronously
/// to the owner otherwise, since the caller needs the actual post-increment
/// value back and a fire-and-forget enqueue can't provide that.
pub async fn increment_handler(
    State(state): State<AppState>,
    Json(delta): Json<MetaCounter>,
) -> (StatusCode, Json<OvoResponse<MetaCounter>>) {
    let classification = state.partitioner.classify(delta.hash);

    if classification.current_is_owner {
        let updated = state.collection.increment(&delta);
        let cmd = ovo_core::Command::new(OpCode::SetCounter, CommandPayload::Counter(updated.clone()));
        for twin in &classification.twins {
            state.outbound.enqueue(twin.clone(), cmd.clone());
        }
        for stepbrother in &classification.stepbrothers {
            state.outbound.enqueue(stepbrother.clone(), cmd.clone().with_backup());
        }
        return (StatusCode::OK, Json(OvoResponse::ok(Some(updated))));
    }

    match classification.forward_owner {
        Some(owner) => match state.peer_client.forward_increment(&owner, delta).await {
            Ok(updated) => (StatusCode::OK, Json(OvoResponse::ok(Some(updated)))),
            Err(_) => (StatusCode::SERVICE_UNAVAILABLE, error_envelope("106")),
        },
        None => (StatusCode::SERVICE_UNAVAILABLE, error_envelope("106")),
    }
}

/// `GET /ovo/keystorage/counter/:key` -- 200/counter, 404/101 on miss.
///
/// Always serviced locally, unlike `get_handler`: there is no read-only
/// counter RPC to forward through (`forward_increment` is a mutation --
/// reusing it with a zero delta would materialize an absent counter on the
/// peer as a false zero-value hit).
pub async fn get_counter_handler(State(state): State<AppState>, Path(key): Path<String>) -> (StatusCode, Json<OvoResponse<MetaCounter>>) {
    match state.collection.get_counter(&key) {
        Some(c) => (StatusCode::OK, Json(OvoResponse::ok(Some(c)))),
        None => (StatusCode::NOT_FOUND, error_envelope("101")),
    }
}

/// `DELETE /ovo/keystorage/counter/:key` -- unconditional, always 200.
pub async fn delete_counter_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(q): Query<HashQuery>,
) -> Json<OvoResponse<()>> {
    let hash = q.hash;
    let c = MetaCounter { key: key.clone(), collection: String::new(), hash, ttl: 0, value: 0, creation_date: 0 };
    let _ = state.partitioner.route_mutation(hash, OpCode::DeleteCounter, CommandPayload::Counter(c), || {
        state.collection.delete_counter(&key);
        Ok(())
    });
    Json(OvoResponse::ok(None))
}
