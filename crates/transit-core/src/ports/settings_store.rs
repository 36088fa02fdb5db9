//! Settings store port.
//!
//! The transfer manager reads seeding and mobile-data policy on demand and
//! subscribes to changes so engine tunables are pushed as soon as they are
//! written.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;

use crate::settings::{SettingKey, SettingValue};

/// Capacity of the change-notification channel.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Typed preference storage with change notifications.
pub trait SettingsStorePort: Send + Sync {
    /// Current value of `key` (its default when unset).
    fn get(&self, key: SettingKey) -> SettingValue;

    /// Subscribe to keys as they change.
    fn subscribe(&self) -> broadcast::Receiver<SettingKey>;

    /// Current value of a flag; falls back to the key's default on a type mismatch.
    fn get_bool(&self, key: SettingKey) -> bool {
        self.get(key)
            .as_bool()
            .or_else(|| key.default_value().as_bool())
            .unwrap_or(false)
    }

    /// Current value of a numeric tunable; falls back to the key's default on a type mismatch.
    fn get_i64(&self, key: SettingKey) -> i64 {
        self.get(key)
            .as_i64()
            .or_else(|| key.default_value().as_i64())
            .unwrap_or(0)
    }
}

/// Process-local settings store.
#[derive(Debug)]
pub struct InMemorySettingsStore {
    values: RwLock<HashMap<SettingKey, SettingValue>>,
    changes: broadcast::Sender<SettingKey>,
}

impl InMemorySettingsStore {
    /// Create an empty store (every key reads as its default).
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Store `value` under `key` and notify subscribers.
    pub fn set(&self, key: SettingKey, value: SettingValue) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
        // No subscribers is fine.
        let _ = self.changes.send(key);
    }

    /// Store a flag.
    pub fn set_bool(&self, key: SettingKey, value: bool) {
        self.set(key, SettingValue::Bool(value));
    }

    /// Store a numeric tunable.
    pub fn set_i64(&self, key: SettingKey, value: i64) {
        self.set(key, SettingValue::Int(value));
    }
}

impl Default for InMemorySettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStorePort for InMemorySettingsStore {
    fn get(&self, key: SettingKey) -> SettingValue {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .copied()
            .unwrap_or_else(|| key.default_value())
    }

    fn subscribe(&self) -> broadcast::Receiver<SettingKey> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_keys_read_defaults() {
        let store = InMemorySettingsStore::new();
        assert!(store.get_bool(SettingKey::SeedFinishedTorrents));
        assert!(!store.get_bool(SettingKey::UseMobileData));
        assert_eq!(store.get_i64(SettingKey::MaxDownloads), 0);
    }

    #[test]
    fn type_mismatch_falls_back_to_default() {
        let store = InMemorySettingsStore::new();
        store.set_i64(SettingKey::SeedFinishedTorrents, 3);
        assert!(store.get_bool(SettingKey::SeedFinishedTorrents));
    }

    #[tokio::test]
    async fn writes_are_broadcast() {
        let store = InMemorySettingsStore::new();
        let mut rx = store.subscribe();

        store.set_i64(SettingKey::MaxUploadSpeed, 1024);

        assert_eq!(rx.recv().await.unwrap(), SettingKey::MaxUploadSpeed);
        assert_eq!(store.get_i64(SettingKey::MaxUploadSpeed), 1024);
    }
}
