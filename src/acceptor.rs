//! Decision hook for writes initiated by other D-Bus clients
//!
//! Every writable path shares one acceptor. The default [`AcceptAll`] applies
//! whatever value arrives, with no type or range checks. That matches how
//! Venus OS tools poke at `/Ac/MaxPower` or `/Position`, but it means a
//! client can store a string in a numeric path.

use crate::logging::{StructuredLogger, get_logger};

/// Decides whether an external write to a writable path is applied
pub trait ChangeAcceptor: Send + Sync {
    /// Return `true` to store `new_value` as-is, `false` to refuse it
    fn accept(&self, path: &str, new_value: &serde_json::Value) -> bool;
}

/// Accepts every write and logs the transition
pub struct AcceptAll {
    logger: StructuredLogger,
}

impl AcceptAll {
    pub fn new() -> Self {
        Self {
            logger: get_logger("acceptor"),
        }
    }
}

impl Default for AcceptAll {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeAcceptor for AcceptAll {
    fn accept(&self, path: &str, new_value: &serde_json::Value) -> bool {
        self.logger
            .debug(&format!("Path {} updated to {}", path, new_value));
        true
    }
}

impl<F> ChangeAcceptor for F
where
    F: Fn(&str, &serde_json::Value) -> bool + Send + Sync,
{
    fn accept(&self, path: &str, new_value: &serde_json::Value) -> bool {
        self(path, new_value)
    }
}
