//! A [`Backend`] over a local store file, standing in for the remote
//! configuration store.
//!
//! Objects are kept in wire form under `/servers/<id>`. Like the real thing,
//! the store fills in server-side defaults on create and never answers with
//! sensitive attributes.

pub mod event_log;

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use extserver_core::{
    AttributeOperation, ConnectorRecord, Identifier, WireOperation, WireOperationKind,
};
use extserver_resource::{defaults::apply_defaults, registry, Backend, BackendError};
use json_patch::{AddOperation, Patch, PatchOperation, RemoveOperation, ReplaceOperation};
use serde_json::{Map, Value};

use event_log::{StoreEvent, StoreHandle};

pub struct LocalStore {
    path: PathBuf,
    handle: Mutex<StoreHandle>,
}

impl LocalStore {
    /// Open the store file at `path`, creating it if it doesn't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<LocalStore> {
        let path = path.as_ref().to_path_buf();
        let handle = if path.exists() {
            event_log::load(&path)?;
            StoreHandle::open(&path, false)?
        } else {
            tracing::info!(path = %path.display(), "creating store file");
            StoreHandle::open(&path, true)?
        };
        Ok(LocalStore {
            path,
            handle: Mutex::new(handle),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored objects by identifier, in wire form, and the event count.
    fn servers(&self) -> Result<(Map<String, Value>, u64)> {
        let (mut store, count) = event_log::load(&self.path)?;
        match store.get_mut("servers").map(Value::take) {
            Some(Value::Object(servers)) => Ok((servers, count)),
            _ => Err(anyhow!("{}: servers is not an object", self.path.display())),
        }
    }

    /// Identifiers of all stored objects.
    pub fn identifiers(&self) -> Result<Vec<Identifier>> {
        let (servers, _) = self.servers()?;
        servers
            .keys()
            .map(|k| Identifier::new(k.as_str()).map_err(Into::into))
            .collect()
    }

    /// Load the stored objects, let `change` decide on one patch, and append
    /// it. The handle stays locked throughout, so every event gets the index
    /// right after the last one.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut Map<String, Value>) -> Result<(&'static str, PatchOperation, T), BackendError>,
    ) -> Result<T, BackendError> {
        let mut handle = self
            .handle
            .lock()
            .map_err(|_| anyhow!("store handle lock poisoned"))?;
        let (mut servers, count) = self.servers()?;
        let (event, operation, answer) = change(&mut servers)?;
        handle.append(&[&StoreEvent::new(count, event, Patch(vec![operation]))])?;
        Ok(answer)
    }

    /// What a read answers: the object without its secrets.
    fn answer(object: &Map<String, Value>) -> Result<ConnectorRecord> {
        let mut record = ConnectorRecord::from_wire(object).context("Stored object is invalid")?;
        for name in registry::sensitive_attributes(record.variant) {
            record.remove(name);
        }
        Ok(record)
    }
}

/// JSON pointer to a stored object. Identifiers may contain `/` and `~`.
fn server_path(identifier: &Identifier) -> String {
    format!(
        "/servers/{}",
        identifier.as_str().replace('~', "~0").replace('/', "~1")
    )
}

fn as_object(identifier: &Identifier, value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(object) => Ok(object),
        _ => Err(anyhow!("stored object '{}' is not a JSON object", identifier)),
    }
}

fn elements(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(elements)) => elements.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(v) => vec![v.clone()],
    }
}

/// Apply one wire operation to a stored object.
fn apply_operation(object: &mut Map<String, Value>, operation: &WireOperation) {
    let name = operation.attribute.clone();
    match (operation.operation, &operation.value) {
        (WireOperationKind::Replace, Some(value)) => {
            object.insert(name, value.clone());
        }
        (WireOperationKind::Replace, None) | (WireOperationKind::Remove, None) => {
            object.remove(&name);
        }
        (WireOperationKind::Add, value) => {
            let mut current = elements(object.get(&name));
            for e in elements(value.as_ref()) {
                if !current.contains(&e) {
                    current.push(e);
                }
            }
            object.insert(name, Value::Array(current));
        }
        (WireOperationKind::Remove, Some(value)) => {
            let removed = elements(Some(value));
            let current: Vec<Value> = elements(object.get(&name))
                .into_iter()
                .filter(|e| !removed.contains(e))
                .collect();
            object.insert(name, Value::Array(current));
        }
    }
}

fn not_found(identifier: &Identifier) -> BackendError {
    BackendError::NotFound(identifier.clone())
}

#[async_trait]
impl Backend for LocalStore {
    async fn create(&self, record: &ConnectorRecord) -> Result<ConnectorRecord, BackendError> {
        self.mutate(|servers| {
            if servers.contains_key(record.identifier.as_str()) {
                return Err(anyhow!("external server '{}' already exists", record.identifier).into());
            }
            let object = apply_defaults(record).to_wire();
            let path = server_path(&record.identifier);
            let add = PatchOperation::Add(AddOperation {
                path: path.parse().map_err(|e| anyhow!("invalid store path {}: {}", path, e))?,
                value: Value::Object(object.clone()),
            });
            Ok(("create", add, Self::answer(&object)?))
        })
    }

    async fn read(&self, identifier: &Identifier) -> Result<ConnectorRecord, BackendError> {
        let (mut servers, _) = self.servers()?;
        let object = servers
            .remove(identifier.as_str())
            .ok_or_else(|| not_found(identifier))?;
        Ok(Self::answer(&as_object(identifier, object)?)?)
    }

    async fn update(
        &self,
        identifier: &Identifier,
        operations: &[AttributeOperation],
    ) -> Result<ConnectorRecord, BackendError> {
        self.mutate(|servers| {
            let object = servers
                .remove(identifier.as_str())
                .ok_or_else(|| not_found(identifier))?;
            let mut object = as_object(identifier, object)?;
            for operation in operations {
                apply_operation(&mut object, &operation.to_wire());
            }
            // Validate before persisting
            let answer = Self::answer(&object)?;
            let path = server_path(identifier);
            let replace = PatchOperation::Replace(ReplaceOperation {
                path: path.parse().map_err(|e| anyhow!("invalid store path {}: {}", path, e))?,
                value: Value::Object(object),
            });
            Ok(("update", replace, answer))
        })
    }

    async fn delete(&self, identifier: &Identifier) -> Result<(), BackendError> {
        self.mutate(|servers| {
            if !servers.contains_key(identifier.as_str()) {
                return Err(not_found(identifier));
            }
            let path = server_path(identifier);
            let remove = PatchOperation::Remove(RemoveOperation {
                path: path.parse().map_err(|e| anyhow!("invalid store path {}: {}", path, e))?,
            });
            Ok(("delete", remove, ()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extserver_core::{AttributeValue, Variant};
    use extserver_resource::{Mode, Reconciler};

    fn id(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    fn store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path().join("store.json")).unwrap();
        (dir, store)
    }

    fn vault() -> ConnectorRecord {
        ConnectorRecord::new(id("vault/prod"), Variant::Vault)
            .with("vault_server_base_uri", AttributeValue::set(["https://a"]))
            .with("vault_authentication_method", AttributeValue::string("token"))
            .with("trust_store_pin", AttributeValue::string("1234"))
    }

    #[tokio::test]
    async fn test_create_read_never_returns_secrets() {
        let (_dir, store) = store();
        let created = store.create(&vault()).await.unwrap();
        assert!(created.get("trust_store_pin").is_absent());
        let read = store.read(&id("vault/prod")).await.unwrap();
        assert_eq!(read, created);
        assert_eq!(read.get("vault_server_base_uri"), &AttributeValue::set(["https://a"]));
        // but it is stored
        let (servers, _) = store.servers().unwrap();
        assert_eq!(servers["vault/prod"]["trust-store-pin"], "1234");
    }

    #[tokio::test]
    async fn test_create_fills_defaults() {
        let (_dir, store) = store();
        let syslog = ConnectorRecord::new(id("logs"), Variant::Syslog)
            .with("server_host_name", AttributeValue::string("logs.example.com"));
        let created = store.create(&syslog).await.unwrap();
        assert_eq!(created.get("server_port"), &AttributeValue::Integer(514));
        assert_eq!(created.get("transport_mechanism"), &AttributeValue::string("udp"));
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let (_dir, store) = store();
        store.create(&vault()).await.unwrap();
        assert!(matches!(
            store.create(&vault()).await,
            Err(BackendError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_not_found() {
        let (_dir, store) = store();
        let missing = id("missing");
        assert!(matches!(store.read(&missing).await, Err(BackendError::NotFound(_))));
        assert!(matches!(store.update(&missing, &[]).await, Err(BackendError::NotFound(_))));
        assert!(matches!(store.delete(&missing).await, Err(BackendError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_operations() {
        let (_dir, store) = store();
        store.create(&vault()).await.unwrap();
        let updated = store
            .update(
                &id("vault/prod"),
                &[
                    AttributeOperation::add_elements("vault_server_base_uri", AttributeValue::set(["https://b"])),
                    AttributeOperation::remove_elements("vault_server_base_uri", AttributeValue::set(["https://a"])),
                    AttributeOperation::replace("trust_store_type", AttributeValue::string("JKS")),
                    AttributeOperation::replace("trust_store_pin", AttributeValue::Absent),
                ],
            )
            .await
            .unwrap();
        assert_eq!(updated.get("vault_server_base_uri"), &AttributeValue::set(["https://b"]));
        assert_eq!(updated.get("trust_store_type"), &AttributeValue::string("JKS"));
        let (servers, _) = store.servers().unwrap();
        assert!(servers["vault/prod"].get("trust-store-pin").is_none());
    }

    #[tokio::test]
    async fn test_delete_and_identifiers() {
        let (_dir, store) = store();
        store.create(&vault()).await.unwrap();
        assert_eq!(store.identifiers().unwrap(), vec![id("vault/prod")]);
        store.delete(&id("vault/prod")).await.unwrap();
        assert_eq!(store.identifiers().unwrap(), Vec::<Identifier>::new());
    }

    #[tokio::test]
    async fn test_reopen_keeps_objects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        LocalStore::open(&path).unwrap().create(&vault()).await.unwrap();
        let reopened = LocalStore::open(&path).unwrap();
        assert!(reopened.read(&id("vault/prod")).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mutations_append_in_sequence() {
        let (_dir, store) = store();
        let store = std::sync::Arc::new(store);
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let syslog = ConnectorRecord::new(id(&format!("logs-{}", i)), Variant::Syslog)
                        .with("server_host_name", AttributeValue::string("logs.example.com"));
                    store.create(&syslog).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(store.identifiers().unwrap().len(), 8);
        // the init event plus one per create, each at the next index
        let file = std::fs::File::open(store.path()).unwrap();
        let indexes: Vec<u64> = event_log::StoreEventStream::open_from_reader(file)
            .unwrap()
            .map(|event| event.unwrap().index)
            .collect();
        assert_eq!(indexes, (0..9).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_reconciler_round_trip() {
        let (_dir, store) = store();
        let r = Reconciler::new(&store, Mode::Managed, "10.1".parse().unwrap());
        let created = r.create(&vault()).await.unwrap();
        let plan = vault().with("trust_store_type", AttributeValue::string("PKCS12"));
        let updated = r.update(&plan, &created.state).await.unwrap();
        assert_eq!(updated.operations.len(), 1);
        let again = r.update(&plan, &updated.state).await.unwrap();
        assert_eq!(again.operations, vec![]);
        r.delete(&again.state).await.unwrap();
        assert_eq!(store.identifiers().unwrap(), Vec::<Identifier>::new());
    }
}
