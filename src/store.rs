//! Property store contract the polling engine publishes into

use async_trait::async_trait;

use crate::error::Result;

/// Definition of one published path
#[derive(Debug, Clone, PartialEq)]
pub struct PathSpec {
    pub path: String,
    /// `Null` until the first successful cycle for measured values
    pub initial: serde_json::Value,
    pub writable: bool,
}

impl PathSpec {
    pub fn writable(path: &str, initial: serde_json::Value) -> Self {
        Self {
            path: path.to_string(),
            initial,
            writable: true,
        }
    }

    pub fn read_only(path: &str, initial: serde_json::Value) -> Self {
        Self {
            path: path.to_string(),
            initial,
            writable: false,
        }
    }
}

/// Keyed store of named bus properties with a fixed path set
#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// Current value of `path`, if registered
    fn get(&self, path: &str) -> Option<serde_json::Value>;

    /// Apply every update or none of them. Unknown paths fail the whole batch.
    async fn publish(&self, updates: Vec<(String, serde_json::Value)>) -> Result<()>;

    /// Single-path convenience over [`PropertyStore::publish`]
    async fn set(&self, path: &str, value: serde_json::Value) -> Result<()> {
        self.publish(vec![(path.to_string(), value)]).await
    }
}
