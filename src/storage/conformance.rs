//! Conformance checks shared by every backend's own test module,
//! implementing the universal invariants (§8 scenarios S1-S4, repeat-delete)
//! against an already-constructed store so each backend only owns its own
//! fixture setup (a tempdir, an in-memory connection, ...).
#![cfg(test)]

use crate::context::EngramContext;
use crate::models::{AccessLevel, MemoryRecord};
use crate::query::LtmQuery;
use crate::storage::errors::StorageError;
use crate::storage::traits::LtmStore;
use std::collections::HashSet;

/// S1: a context scoped to one entity never sees another entity's records.
pub async fn isolation(store: &dyn LtmStore) {
    let ctx_a = EngramContext::for_entity("A");
    let ctx_b = EngramContext::for_entity("B");

    let id_a = store.store(&ctx_a, MemoryRecord::builder("alpha").build()).await.unwrap();
    let id_b = store.store(&ctx_b, MemoryRecord::builder("beta").build()).await.unwrap();

    let cross = store.retrieve(&ctx_a, &LtmQuery::new().with_id(id_b)).await.unwrap();
    assert!(cross.is_empty(), "entity A must not see entity B's record");

    let own = store.retrieve(&ctx_a, &LtmQuery::new()).await.unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].id, id_a);
}

/// S2: a `PrivateToUser` record is visible only to its owning user.
pub async fn privacy(store: &dyn LtmStore) {
    let owner = EngramContext::for_user("E", "u1");
    let other = EngramContext::for_user("E", "u2");

    let id_private = store
        .store(&owner, MemoryRecord::builder("p").access_level(AccessLevel::PrivateToUser).build())
        .await
        .unwrap();
    let id_shared =
        store.store(&EngramContext::for_entity("E"), MemoryRecord::builder("s").build()).await.unwrap();

    let as_other = store.retrieve(&other, &LtmQuery::new()).await.unwrap();
    assert_eq!(as_other.len(), 1);
    assert_eq!(as_other[0].id, id_shared);

    let as_owner = store.retrieve(&owner, &LtmQuery::new()).await.unwrap();
    let ids: HashSet<_> = as_owner.iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&id_private));
    assert!(ids.contains(&id_shared));
}

/// S3: updating a record advances `updated_at` and leaves `created_at` fixed.
pub async fn update_preserves_created_at(store: &dyn LtmStore) {
    let ctx = EngramContext::for_entity("E");
    let id = store.store(&ctx, MemoryRecord::builder("v0").build()).await.unwrap();
    let created_at = store.retrieve(&ctx, &LtmQuery::new().with_id(id.clone())).await.unwrap()[0].created_at;

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    store.update(&ctx, MemoryRecord::builder("v1").id(id.clone()).build()).await.unwrap();

    let after = store.retrieve(&ctx, &LtmQuery::new().with_id(id)).await.unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].created_at, created_at);
    assert!(after[0].updated_at > created_at);
    assert_eq!(after[0].content, "v1");
}

/// S4: text search matches case-insensitively and only the matching record.
pub async fn text_search(store: &dyn LtmStore) {
    let ctx = EngramContext::for_entity("E");
    store.store(&ctx, MemoryRecord::builder("Apple fruit").build()).await.unwrap();
    let id_banana = store.store(&ctx, MemoryRecord::builder("Banana yellow").build()).await.unwrap();
    store.store(&ctx, MemoryRecord::builder("Cherry red").build()).await.unwrap();

    let found = store.retrieve(&ctx, &LtmQuery::new().with_text("banana")).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, id_banana);
}

/// Deletion idempotence is unified: a repeat delete is always `NotFound`.
pub async fn repeat_delete_is_not_found(store: &dyn LtmStore) {
    let ctx = EngramContext::for_entity("E");
    let id = store.store(&ctx, MemoryRecord::builder("x").build()).await.unwrap();
    store.delete(&ctx, &id).await.unwrap();
    let err = store.delete(&ctx, &id).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}
