use std::time::Duration;

use chrono::{DateTime, Utc};

/// Value read back from a [`KeyValueStore`] with its expiry, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Key-value store injected into orchestration code in place of process-wide maps.
/// Expired entries must read as absent.
pub trait KeyValueStore: Send + Sync {
    fn get_with_ttl(&self, key: &str) -> Result<Option<StoredValue>, StoreError>;

    fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), StoreError>;

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.get_with_ttl(key)?.map(|stored| stored.value))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("key-value store unavailable: {0}")]
    Unavailable(String),
}
