// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use dashmap::DashMap;

/// Keyed, concurrency-safe storage backing every admission component.
///
/// Each method acts on a single key atomically: concurrent callers touching the
/// same key are serialized, callers touching different keys do not contend on a
/// global lock.
pub trait StateStore<V>: Send + Sync {
    /// Get-or-insert the record for `key`, then mutate it under the key's lock.
    fn update<R>(&self, key: &str, init: impl FnOnce() -> V, f: impl FnOnce(&mut V) -> R) -> R;

    /// Mutate the record for `key` only if it already exists.
    fn modify<R>(&self, key: &str, f: impl FnOnce(&mut V) -> R) -> Option<R>;

    /// Read the record for `key` without creating it.
    fn read<R>(&self, key: &str, f: impl FnOnce(&V) -> R) -> Option<R>;

    fn remove(&self, key: &str) -> Option<V>;

    /// Remove the record only if `predicate` still holds while the key is locked.
    fn remove_if(&self, key: &str, predicate: impl FnOnce(&V) -> bool) -> Option<V>;

    /// Keep only records for which `keep` returns true.
    fn retain(&self, keep: impl FnMut(&str, &mut V) -> bool);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process store on a lock-striped [`DashMap`].
#[derive(Debug)]
pub struct MemoryStore<V> {
    map: DashMap<String, V>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self { map: DashMap::new() }
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Send + Sync> StateStore<V> for MemoryStore<V> {
    fn update<R>(&self, key: &str, init: impl FnOnce() -> V, f: impl FnOnce(&mut V) -> R) -> R {
        // Fast path avoids allocating the key for records that already exist
        if let Some(mut existing) = self.map.get_mut(key) {
            return f(existing.value_mut());
        }
        let mut entry = self.map.entry(key.to_owned()).or_insert_with(init);
        f(entry.value_mut())
    }

    fn modify<R>(&self, key: &str, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        self.map.get_mut(key).map(|mut entry| f(entry.value_mut()))
    }

    fn read<R>(&self, key: &str, f: impl FnOnce(&V) -> R) -> Option<R> {
        self.map.get(key).map(|entry| f(entry.value()))
    }

    fn remove(&self, key: &str) -> Option<V> {
        self.map.remove(key).map(|(_, value)| value)
    }

    fn remove_if(&self, key: &str, predicate: impl FnOnce(&V) -> bool) -> Option<V> {
        self.map
            .remove_if(key, |_, value| predicate(value))
            .map(|(_, value)| value)
    }

    fn retain(&self, mut keep: impl FnMut(&str, &mut V) -> bool) {
        self.map.retain(|key, value| keep(key, value));
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}
