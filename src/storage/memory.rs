use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::{entry_size, StorageBackend, StorageError};

/// In-memory storage with an optional byte capacity.
///
/// Cloning shares the underlying entries, so a test can keep a handle while
/// the draft store owns another.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
    /// Maximum total bytes (keys + values); `None` is unbounded
    capacity: Option<usize>,
    /// Whether the store answers at all
    available: Arc<Mutex<bool>>,
    /// Keys written through `set`, in order
    write_log: Arc<Mutex<Vec<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(BTreeMap::new())),
            capacity: None,
            available: Arc::new(Mutex::new(true)),
            write_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new()
        }
    }

    /// A store whose every operation fails
    pub fn unavailable() -> Self {
        let storage = Self::new();
        storage.set_available(false);
        storage
    }

    pub fn set_available(&self, available: bool) {
        *self
            .available
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = available;
    }

    /// Write a raw value without quota checks or logging
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.lock_entries()
            .insert(key.to_string(), value.to_string());
    }

    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.lock_entries().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys written through `set`, in order
    pub fn writes(&self) -> Vec<String> {
        self.write_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn used_bytes(&self) -> usize {
        self.lock_entries()
            .iter()
            .map(|(k, v)| entry_size(k, v))
            .sum()
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if *self
            .available
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
        {
            Ok(())
        } else {
            Err(StorageError::Unavailable("memory storage disabled".to_string()))
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_available()?;
        Ok(self.lock_entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_available()?;

        let mut entries = self.lock_entries();
        if let Some(capacity) = self.capacity {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| entry_size(k, v))
                .sum();
            let needed = used + entry_size(key, value);
            if needed > capacity {
                return Err(StorageError::QuotaExceeded { needed, capacity });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        self.write_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_available()?;
        self.lock_entries().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.check_available()?;
        Ok(self.lock_entries().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let storage = MemoryStorage::new();
        storage.set("a", "1").unwrap();
        storage.set("b", "2").unwrap();

        assert_eq!(storage.get("a").unwrap(), Some("1".to_string()));
        assert_eq!(storage.get("missing").unwrap(), None);
        assert_eq!(storage.keys().unwrap(), vec!["a", "b"]);

        storage.remove("a").unwrap();
        assert_eq!(storage.get("a").unwrap(), None);
        assert_eq!(storage.writes(), vec!["a", "b"]);
    }

    #[test]
    fn test_capacity_is_enforced() {
        let storage = MemoryStorage::with_capacity(10);
        storage.set("key", "12345").unwrap();

        let err = storage.set("other", "123456").unwrap_err();
        assert!(err.is_quota_exceeded());

        // Replacing an entry only counts the new value
        storage.set("key", "1234567").unwrap();
        assert_eq!(storage.used_bytes(), 10);
    }

    #[test]
    fn test_unavailable_fails_everything() {
        let storage = MemoryStorage::unavailable();
        assert!(matches!(storage.get("a"), Err(StorageError::Unavailable(_))));
        assert!(matches!(storage.set("a", "1"), Err(StorageError::Unavailable(_))));
        assert!(matches!(storage.keys(), Err(StorageError::Unavailable(_))));

        storage.set_available(true);
        assert!(storage.set("a", "1").is_ok());
    }

    #[test]
    fn test_clones_share_entries() {
        let storage = MemoryStorage::new();
        let handle = storage.clone();
        storage.set("a", "1").unwrap();
        assert_eq!(handle.get_raw("a"), Some("1".to_string()));
    }
}
