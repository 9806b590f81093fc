//! Optimistic mutations with rollback.

use std::future::Future;

use serde_json::{Map, Value};

use super::{MutationCache, QueryKey};
use crate::api::ApiResult;

/// Apply `apply` to the cached value of `key`, run `request`, and reconcile.
///
/// On success the key is invalidated so the next read refetches server state.
/// On failure the cache is rolled back before the error is returned: the
/// snapshot is restored verbatim when the entry still holds this mutation's
/// write, otherwise `revert(current, snapshot)` undoes only this mutation so
/// concurrent writes to sibling items survive.
///
/// With no cached value the cache is left alone and only the request runs.
pub async fn optimistic_update<C, A, V, F, Fut, R>(
    cache: &C,
    key: &QueryKey,
    apply: A,
    revert: V,
    request: F,
) -> ApiResult<R>
where
    C: MutationCache + ?Sized,
    A: FnOnce(&Value) -> Value,
    V: FnOnce(&Value, &Value) -> Value,
    F: FnOnce() -> Fut,
    Fut: Future<Output = ApiResult<R>>,
{
    cache.cancel_queries(key);
    let snapshot = cache.snapshot(key);
    let written = snapshot.as_ref().map(|previous| {
        let next = apply(previous);
        cache.write(key, next.clone());
        next
    });

    match request().await {
        Ok(result) => {
            cache.invalidate(key);
            Ok(result)
        }
        Err(error) => {
            if let (Some(snapshot), Some(written)) = (snapshot, written) {
                rollback(cache, key, snapshot, &written, revert);
            }
            tracing::warn!("Rolled back optimistic update of '{}': {}", key, error);
            Err(error)
        }
    }
}

fn rollback<C, V>(cache: &C, key: &QueryKey, snapshot: Value, written: &Value, revert: V)
where
    C: MutationCache + ?Sized,
    V: FnOnce(&Value, &Value) -> Value,
{
    match cache.snapshot(key) {
        Some(current) if &current == written => cache.restore(key, Some(snapshot)),
        Some(current) => cache.write(key, revert(&current, &snapshot)),
        None => {}
    }
}

/// Shallow-merge the non-null fields of `patch` into the array element whose
/// `id` equals `id`. Every other element is cloned untouched.
pub fn patch_entry(collection: &Value, id: &Value, patch: &Value) -> Value {
    let Value::Array(items) = collection else {
        return collection.clone();
    };
    let fields = patch.as_object().cloned().unwrap_or_default();

    Value::Array(
        items
            .iter()
            .map(|item| match item {
                Value::Object(object) if object.get("id") == Some(id) => {
                    Value::Object(merge_fields(object, &fields))
                }
                other => other.clone(),
            })
            .collect(),
    )
}

/// `collection` without the element whose `id` equals `id`.
pub fn remove_entry(collection: &Value, id: &Value) -> Value {
    let Value::Array(items) = collection else {
        return collection.clone();
    };
    Value::Array(
        items
            .iter()
            .filter(|item| item.get("id") != Some(id))
            .cloned()
            .collect(),
    )
}

/// Put the `snapshot` version of element `id` back into `current`, keeping
/// every other element of `current` as it is.
///
/// The element is replaced in place if present, re-inserted at its old
/// position if it was removed, and dropped if it did not exist before.
pub fn restore_entry(current: &Value, snapshot: &Value, id: &Value) -> Value {
    let (Value::Array(items), Value::Array(previous)) = (current, snapshot) else {
        return snapshot.clone();
    };
    let original = previous
        .iter()
        .position(|item| item.get("id") == Some(id))
        .map(|index| (index, &previous[index]));

    let mut restored: Vec<Value> = Vec::with_capacity(items.len() + 1);
    let mut replaced = false;
    for item in items {
        if item.get("id") == Some(id) {
            if let Some((_, original)) = original {
                restored.push(original.clone());
                replaced = true;
            }
        } else {
            restored.push(item.clone());
        }
    }

    if let Some((index, original)) = original.filter(|_| !replaced) {
        restored.insert(index.min(restored.len()), original.clone());
    }
    Value::Array(restored)
}

fn merge_fields(object: &Map<String, Value>, fields: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = object.clone();
    for (name, value) in fields {
        if !value.is_null() {
            merged.insert(name.clone(), value.clone());
        }
    }
    merged
}
