use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use zbus::Connection;
use zbus::object_server::SignalEmitter;
use zbus::zvariant::{OwnedObjectPath, OwnedValue};

use super::root::RootBus;
use super::shared::{DbusSharedState, lock_shared};
use super::util::{format_text_value, owned_value_to_serde, serde_to_owned_value, text_owned_value};
use crate::error::{BridgeError, Result};

/// VeDbus-style BusItem implementing com.victronenergy.BusItem
pub struct BusItem {
    pub(crate) path: String,
    pub(crate) shared: Arc<Mutex<DbusSharedState>>,
}

impl BusItem {
    pub fn new(path: String, shared: Arc<Mutex<DbusSharedState>>) -> Self {
        Self { path, shared }
    }
}

/// Apply a write coming from another bus client.
///
/// Read-only paths are refused without consulting the acceptor. The acceptor
/// runs without the state lock held; an accepted value is stored unchanged.
pub(crate) async fn apply_external_write(
    shared: &Arc<Mutex<DbusSharedState>>,
    path: &str,
    new_value: serde_json::Value,
) -> Result<()> {
    let acceptor = {
        let state = lock_shared(shared);
        if !state.writable.contains(path) {
            return Err(BridgeError::WriteRejected {
                path: path.to_string(),
            });
        }
        Arc::clone(&state.acceptor)
    };

    if !acceptor.accept(path, &new_value) {
        return Err(BridgeError::WriteRejected {
            path: path.to_string(),
        });
    }

    let (connection, root_path) = {
        let mut state = lock_shared(shared);
        state.paths.insert(path.to_string(), new_value.clone());
        (state.connection.clone(), state.root_path.clone())
    };

    if let Some(conn) = connection {
        emit_value_changes(&conn, &root_path, &[(path.to_string(), new_value)]).await;
    }
    Ok(())
}

/// Emit PropertiesChanged on each item and one ItemsChanged on the root
pub(crate) async fn emit_value_changes(
    conn: &Connection,
    root_path: &OwnedObjectPath,
    changes: &[(String, serde_json::Value)],
) {
    for (path, value) in changes {
        if let Ok(obj_path) = OwnedObjectPath::try_from(path.as_str())
            && let Ok(item_ctx) = SignalEmitter::new(conn, obj_path)
        {
            let mut item_changes: HashMap<&str, OwnedValue> = HashMap::new();
            item_changes.insert("Value", serde_to_owned_value(value));
            item_changes.insert("Text", text_owned_value(value));
            let _ = BusItem::properties_changed(&item_ctx, item_changes).await;
        }
    }

    if let Ok(root_ctx) = SignalEmitter::new(conn, root_path.clone()) {
        let mut outer: HashMap<&str, HashMap<&str, OwnedValue>> = HashMap::new();
        for (path, value) in changes {
            let mut inner: HashMap<&str, OwnedValue> = HashMap::new();
            inner.insert("Value", serde_to_owned_value(value));
            inner.insert("Text", text_owned_value(value));
            outer.insert(path.as_str(), inner);
        }
        let _ = RootBus::items_changed(&root_ctx, outer).await;
    }
}

#[zbus::interface(name = "com.victronenergy.BusItem")]
impl BusItem {
    #[zbus(name = "GetValue")]
    async fn get_value(&self) -> OwnedValue {
        let val = {
            let shared = lock_shared(&self.shared);
            shared
                .paths
                .get(&self.path)
                .cloned()
                .unwrap_or(serde_json::Value::Null)
        };
        serde_to_owned_value(&val)
    }

    /// 0 when applied, 1 when the path is read-only or the write was refused
    #[zbus(name = "SetValue")]
    async fn set_value(&self, value: OwnedValue) -> i32 {
        let new_value = owned_value_to_serde(&value);
        match apply_external_write(&self.shared, &self.path, new_value).await {
            Ok(()) => 0,
            Err(_) => 1,
        }
    }

    #[zbus(name = "GetText")]
    async fn get_text(&self) -> String {
        let val = {
            let shared = lock_shared(&self.shared);
            shared
                .paths
                .get(&self.path)
                .cloned()
                .unwrap_or(serde_json::Value::Null)
        };
        format_text_value(&val)
    }

    #[zbus(signal)]
    pub async fn properties_changed(
        ctxt: &SignalEmitter<'_>,
        changes: HashMap<&str, OwnedValue>,
    ) -> zbus::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acceptor::{AcceptAll, ChangeAcceptor};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use zbus::zvariant::Value;

    struct CountingAcceptor {
        calls: AtomicUsize,
        allow: bool,
    }

    impl ChangeAcceptor for CountingAcceptor {
        fn accept(&self, _path: &str, _new_value: &serde_json::Value) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.allow
        }
    }

    fn shared_with(acceptor: Arc<dyn ChangeAcceptor>) -> Arc<Mutex<DbusSharedState>> {
        let root = OwnedObjectPath::try_from("/").unwrap();
        let shared = Arc::new(Mutex::new(DbusSharedState::new(acceptor, root)));
        {
            let mut s = shared.lock().unwrap();
            s.paths
                .insert("/Ac/MaxPower".to_string(), serde_json::json!(4350));
            s.writable.insert("/Ac/MaxPower".to_string());
            s.paths
                .insert("/ProductName".to_string(), serde_json::json!("Enphase"));
        }
        shared
    }

    #[tokio::test]
    async fn writable_path_accepts_and_stores_exact_value() {
        let shared = shared_with(Arc::new(AcceptAll::new()));
        let item = BusItem::new("/Ac/MaxPower".to_string(), shared.clone());

        let rc = item.set_value(OwnedValue::from(5000i64)).await;
        assert_eq!(rc, 0);
        assert_eq!(
            shared.lock().unwrap().paths.get("/Ac/MaxPower"),
            Some(&serde_json::json!(5000))
        );

        // No coercion: a string is stored as a string
        let rc = item
            .set_value(OwnedValue::try_from(Value::from("lots")).unwrap())
            .await;
        assert_eq!(rc, 0);
        assert_eq!(item.get_text().await, "lots");
    }

    #[tokio::test]
    async fn read_only_path_never_consults_acceptor() {
        let acceptor = Arc::new(CountingAcceptor {
            calls: AtomicUsize::new(0),
            allow: true,
        });
        let shared = shared_with(acceptor.clone());
        let item = BusItem::new("/ProductName".to_string(), shared.clone());

        let rc = item
            .set_value(OwnedValue::try_from(Value::from("Other")).unwrap())
            .await;
        assert_eq!(rc, 1);
        assert_eq!(acceptor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            shared.lock().unwrap().paths.get("/ProductName"),
            Some(&serde_json::json!("Enphase"))
        );
    }

    #[tokio::test]
    async fn refused_write_leaves_value_unchanged() {
        let acceptor = Arc::new(CountingAcceptor {
            calls: AtomicUsize::new(0),
            allow: false,
        });
        let shared = shared_with(acceptor.clone());

        let err = apply_external_write(&shared, "/Ac/MaxPower", serde_json::json!(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::WriteRejected { .. }));
        assert_eq!(acceptor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            shared.lock().unwrap().paths.get("/Ac/MaxPower"),
            Some(&serde_json::json!(4350))
        );
    }

    #[tokio::test]
    async fn get_value_of_unset_path_is_invalid() {
        let shared = shared_with(Arc::new(AcceptAll::new()));
        shared
            .lock()
            .unwrap()
            .paths
            .insert("/Ac/Power".to_string(), serde_json::Value::Null);
        let item = BusItem::new("/Ac/Power".to_string(), shared);
        let ov = item.get_value().await;
        assert_eq!(owned_value_to_serde(&ov), serde_json::Value::Null);
        assert_eq!(item.get_text().await, "---");
    }

    #[tokio::test]
    async fn client_written_int32_and_array_read_back_with_their_type() {
        let shared = shared_with(Arc::new(AcceptAll::new()));
        let item = BusItem::new("/Ac/MaxPower".to_string(), shared.clone());

        assert_eq!(item.set_value(OwnedValue::from(5000i32)).await, 0);
        assert_eq!(
            shared.lock().unwrap().paths.get("/Ac/MaxPower"),
            Some(&serde_json::json!(5000))
        );
        assert_eq!(item.get_value().await.value_signature(), "i");

        let pair = OwnedValue::try_from(Value::from(vec![1i32, 2])).unwrap();
        assert_eq!(item.set_value(pair).await, 0);
        assert_eq!(
            shared.lock().unwrap().paths.get("/Ac/MaxPower"),
            Some(&serde_json::json!([1, 2]))
        );
        let read = item.get_value().await;
        assert_eq!(read.value_signature(), "ai");
        assert_eq!(owned_value_to_serde(&read), serde_json::json!([1, 2]));
    }
}
