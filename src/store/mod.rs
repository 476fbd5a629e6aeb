//! Authoritative record stores
//!
//! The read path falls back to a `RecordStore` on every cache miss. Lookups
//! are single-key; a missing key is `NotFound`, anything else that goes wrong
//! is `BackendUnavailable`.

mod memory;

pub use memory::MemoryStore;

use crate::error::HerdResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Abstract backing store interface
#[async_trait]
pub trait RecordStore<R>: Send + Sync {
    /// Look up the record stored under `key`
    async fn lookup(&self, key: &str) -> HerdResult<R>;

    /// Get the human-readable backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Customer status record served by the HTTP surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub status: String,
}

impl Customer {
    pub fn new(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customer_json_shape() {
        let customer = Customer::new("abc", "active");
        let json = serde_json::to_string(&customer).unwrap();
        assert_eq!(json, r#"{"id":"abc","status":"active"}"#);

        let back: Customer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, customer);
    }
}
