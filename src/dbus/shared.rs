use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use zbus::Connection;
use zbus::zvariant::OwnedObjectPath;

use crate::acceptor::ChangeAcceptor;

/// Path table shared by the service and every exported BusItem
pub struct DbusSharedState {
    pub(crate) paths: HashMap<String, serde_json::Value>,
    pub(crate) writable: HashSet<String>,
    pub(crate) acceptor: Arc<dyn ChangeAcceptor>,
    pub(crate) connection: Option<Connection>,
    pub(crate) root_path: OwnedObjectPath,
}

impl DbusSharedState {
    pub fn new(acceptor: Arc<dyn ChangeAcceptor>, root_path: OwnedObjectPath) -> Self {
        Self {
            paths: HashMap::new(),
            writable: HashSet::new(),
            acceptor,
            connection: None,
            root_path,
        }
    }
}

/// Lock the shared state, recovering the data if a holder panicked
pub(crate) fn lock_shared(shared: &Mutex<DbusSharedState>) -> MutexGuard<'_, DbusSharedState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
