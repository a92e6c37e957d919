use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use zbus::zvariant::OwnedObjectPath;
use zbus::{Connection, Result as ZbusResult, names::WellKnownName};

use crate::acceptor::ChangeAcceptor;
use crate::error::{BridgeError, Result};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::store::{PathSpec, PropertyStore};

use super::items::{BusItem, apply_external_write, emit_value_changes};
use super::root::{RootBus, TreeNode};
use super::shared::{DbusSharedState, lock_shared};

/// VeDbus-compatible service exporting a fixed set of paths.
///
/// Paths are registered before [`DbusService::start`]; afterwards the path set
/// is frozen. Without a connection the service still works as an in-memory
/// property store, which is what the tests rely on.
pub struct DbusService {
    logger: StructuredLogger,
    service_name: String,
    pub(crate) shared: Arc<Mutex<DbusSharedState>>,
    root_path: OwnedObjectPath,
}

impl DbusService {
    pub fn new(
        service_name: &str,
        device_instance: u32,
        acceptor: Arc<dyn ChangeAcceptor>,
    ) -> Result<Self> {
        let logger = get_logger_with_context(
            LogContext::new("dbus").with_device_instance(device_instance),
        );
        logger.info("Initializing D-Bus service (zbus)");
        let root_path = OwnedObjectPath::try_from("/")
            .map_err(|e| BridgeError::dbus(format!("Invalid object path: {}", e)))?;
        Ok(Self {
            logger,
            service_name: service_name.to_string(),
            shared: Arc::new(Mutex::new(DbusSharedState::new(acceptor, root_path.clone()))),
            root_path,
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn is_connected(&self) -> bool {
        lock_shared(&self.shared).connection.is_some()
    }

    /// Add paths with their initial values. Only allowed before `start`;
    /// a rejected batch adds nothing.
    pub fn register_paths(&mut self, specs: &[PathSpec]) -> Result<()> {
        if self.is_connected() {
            return Err(BridgeError::dbus(
                "Path set is fixed once the service is started",
            ));
        }
        let mut shared = lock_shared(&self.shared);
        let mut seen = BTreeSet::new();
        for spec in specs {
            if !spec.path.starts_with('/') || spec.path.len() < 2 {
                return Err(BridgeError::validation(
                    "path",
                    "D-Bus paths must start with '/' and name an item",
                ));
            }
            if shared.paths.contains_key(&spec.path) || !seen.insert(spec.path.as_str()) {
                return Err(BridgeError::dbus(format!(
                    "Path '{}' registered twice",
                    spec.path
                )));
            }
        }
        // Nothing is added unless every spec is valid
        for spec in specs {
            shared.paths.insert(spec.path.clone(), spec.initial.clone());
            if spec.writable {
                shared.writable.insert(spec.path.clone());
            }
        }
        Ok(())
    }

    /// Connect to the bus, export every registered path, then claim the name
    pub async fn start(&mut self) -> Result<()> {
        let connection = match Connection::system().await {
            Ok(c) => {
                self.logger.info("Connected to D-Bus: system bus");
                c
            }
            Err(e_sys) => match Connection::session().await {
                Ok(c) => {
                    self.logger.warn(&format!(
                        "System bus unavailable ({}); using session bus",
                        e_sys
                    ));
                    c
                }
                Err(e_sess) => {
                    return Err(BridgeError::dbus(format!(
                        "DBus connect failed: system={} session={}",
                        e_sys, e_sess
                    )));
                }
            },
        };

        self.export_objects(&connection).await?;
        self.request_name(&connection)
            .await
            .map_err(|e| BridgeError::dbus(format!("RequestName failed: {}", e)))?;

        lock_shared(&self.shared).connection = Some(connection);
        self.logger
            .info(&format!("D-Bus service started: {}", self.service_name));
        Ok(())
    }

    /// Release the bus name. Values stay readable through [`PropertyStore::get`].
    pub async fn stop(&self) -> Result<()> {
        self.logger.info("Stopping D-Bus service");
        let connection = lock_shared(&self.shared).connection.take();
        if let Some(conn) = connection {
            let name = WellKnownName::try_from(self.service_name.as_str())
                .map_err(|e| BridgeError::dbus(format!("Invalid service name: {}", e)))?;
            if let Err(e) = conn.release_name(name).await {
                self.logger
                    .warn(&format!("Failed to release {}: {}", self.service_name, e));
            }
        }
        Ok(())
    }

    /// Apply a write as if it came from another bus client
    pub async fn write_external(&self, path: &str, value: serde_json::Value) -> Result<()> {
        apply_external_write(&self.shared, path, value).await
    }

    async fn export_objects(&self, connection: &Connection) -> Result<()> {
        let leaves: Vec<String> = lock_shared(&self.shared).paths.keys().cloned().collect();

        // Every proper prefix of a leaf becomes a TreeNode
        let mut nodes: BTreeSet<String> = BTreeSet::new();
        for leaf in &leaves {
            let segments: Vec<&str> = leaf.split('/').filter(|s| !s.is_empty()).collect();
            for i in 1..segments.len() {
                nodes.insert(format!("/{}", segments[..i].join("/")));
            }
        }

        let object_server = connection.object_server();
        object_server
            .at(
                &self.root_path,
                RootBus {
                    shared: Arc::clone(&self.shared),
                },
            )
            .await
            .map_err(|e| BridgeError::dbus(format!("Register root BusItem failed: {}", e)))?;

        for node in nodes {
            let obj_path = Self::object_path(&node)?;
            object_server
                .at(&obj_path, TreeNode::new(node.clone(), Arc::clone(&self.shared)))
                .await
                .map_err(|e| {
                    BridgeError::dbus(format!("Register TreeNode failed for {}: {}", node, e))
                })?;
        }

        for leaf in leaves {
            let obj_path = Self::object_path(&leaf)?;
            object_server
                .at(&obj_path, BusItem::new(leaf.clone(), Arc::clone(&self.shared)))
                .await
                .map_err(|e| {
                    BridgeError::dbus(format!("Register BusItem failed for {}: {}", leaf, e))
                })?;
        }
        Ok(())
    }

    fn object_path(path: &str) -> Result<OwnedObjectPath> {
        OwnedObjectPath::try_from(path)
            .map_err(|e| BridgeError::dbus(format!("Invalid object path '{}': {}", path, e)))
    }

    async fn request_name(&self, connection: &Connection) -> ZbusResult<()> {
        use zbus::fdo::{DBusProxy, RequestNameFlags};
        let proxy = DBusProxy::new(connection).await?;
        let name = WellKnownName::try_from(self.service_name.as_str())?;
        let _ = proxy
            .request_name(name, RequestNameFlags::ReplaceExisting.into())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PropertyStore for DbusService {
    fn get(&self, path: &str) -> Option<serde_json::Value> {
        lock_shared(&self.shared).paths.get(path).cloned()
    }

    async fn publish(&self, updates: Vec<(String, serde_json::Value)>) -> Result<()> {
        let (connection, changed) = {
            let mut shared = lock_shared(&self.shared);
            if let Some((path, _)) = updates
                .iter()
                .find(|(path, _)| !shared.paths.contains_key(path))
            {
                return Err(BridgeError::dbus(format!(
                    "Unknown path '{}'; nothing published",
                    path
                )));
            }
            let mut changed = Vec::with_capacity(updates.len());
            for (path, value) in updates {
                if shared.paths.get(&path) != Some(&value) {
                    shared.paths.insert(path.clone(), value.clone());
                    changed.push((path, value));
                }
            }
            (shared.connection.clone(), changed)
        };

        if let Some(conn) = connection
            && !changed.is_empty()
        {
            emit_value_changes(&conn, &self.root_path, &changed).await;
        }
        Ok(())
    }
}
