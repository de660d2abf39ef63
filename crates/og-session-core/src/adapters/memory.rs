//! In-memory replicated store.
//!
//! Databases live for the lifetime of the store, so closing and reopening a
//! database sees the same entries. Every write is recorded as a log entry
//! `{hash, payload: {op, key, value}}` and emitted as a `write` event.

use crate::domain::{AccessList, IteratorOptions, PutRequest};
use crate::ports::{
    AccessController, Appendable, Counting, DocFilter, Iterable, Queryable, Readable, Removable,
    ReplicatedStore, StoreError, StoreHandle, Valued, Writable,
};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use og_bus::{DbEvent, EventEmitter};
use og_types::{DbAddress, DbKind, DbOptions};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DEFAULT_IDENTITY: &str = "memory-identity";
const DEFAULT_INDEX_FIELD: &str = "_id";

/// Which access controller opened databases get.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ControllerKind {
    /// Immutable writer array exposed as a field. Grants are refused.
    #[default]
    Ipfs,
    /// Mutable writer set exposed through `get("write")`.
    OrbitDb,
}

#[derive(Default)]
struct DbState {
    log: Vec<Value>,
    index: BTreeMap<String, Value>,
    counter: u64,
}

struct MemoryDb {
    kind: DbKind,
    data: RwLock<DbState>,
    writers: RwLock<BTreeSet<String>>,
}

/// In-memory [`ReplicatedStore`] with failure injection for tests.
pub struct InMemoryStore {
    identity: String,
    controller: ControllerKind,
    databases: DashMap<String, Arc<MemoryDb>>,
    aliases: DashMap<String, String>,
    open_calls: AtomicUsize,
    close_calls: Arc<AtomicUsize>,
    open_delay: Mutex<Duration>,
    load_delay: Mutex<Duration>,
    open_failure: Mutex<Option<String>>,
    fail_loads: AtomicBool,
}

impl InMemoryStore {
    /// Empty store with the default identity.
    pub fn new() -> Self {
        Self::with_identity(DEFAULT_IDENTITY)
    }

    /// Empty store for `identity`.
    pub fn with_identity(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            controller: ControllerKind::default(),
            databases: DashMap::new(),
            aliases: DashMap::new(),
            open_calls: AtomicUsize::new(0),
            close_calls: Arc::new(AtomicUsize::new(0)),
            open_delay: Mutex::new(Duration::ZERO),
            load_delay: Mutex::new(Duration::ZERO),
            open_failure: Mutex::new(None),
            fail_loads: AtomicBool::new(false),
        }
    }

    /// Use `controller` for databases opened from now on.
    pub fn with_controller(mut self, controller: ControllerKind) -> Self {
        self.controller = controller;
        self
    }

    /// Make `alias` open the same database as `target`.
    pub fn alias(&self, alias: impl Into<String>, target: impl Into<String>) {
        self.aliases.insert(alias.into(), target.into());
    }

    /// Delay every open by `delay`.
    pub fn set_open_delay(&self, delay: Duration) {
        *self.open_delay.lock() = delay;
    }

    /// Delay the initial load of handles opened from now on.
    pub fn set_load_delay(&self, delay: Duration) {
        *self.load_delay.lock() = delay;
    }

    /// Fail every open with `reason` until cleared with `None`.
    pub fn fail_opens(&self, reason: Option<&str>) {
        *self.open_failure.lock() = reason.map(str::to_string);
    }

    /// Fail every load.
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Number of `open` calls, including failed ones.
    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    /// Number of handles closed.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Address a database named `name` of `kind` gets on this store.
    pub fn address_for(&self, name: &str, kind: &DbKind) -> DbAddress {
        let digest = Sha256::digest(format!("{}/{}/{}", self.identity, kind, name));
        DbAddress::new(format!("zdpu{}", &hex::encode(digest)[..44]), name)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplicatedStore for InMemoryStore {
    async fn open(
        &self,
        name: &str,
        kind: &DbKind,
        options: &DbOptions,
    ) -> Result<Arc<dyn StoreHandle>, StoreError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.open_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.open_failure.lock().clone() {
            return Err(StoreError::Open(reason));
        }

        let target = self
            .aliases
            .get(name)
            .map(|target| target.value().clone())
            .unwrap_or_else(|| name.to_string());
        let (address, by_address) = match target.parse::<DbAddress>() {
            Ok(address) => (address, true),
            Err(_) => (self.address_for(&target, kind), false),
        };
        let id = address.to_string();

        let db = match self.databases.entry(id.clone()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                if !by_address && options.create != Some(true) {
                    return Err(StoreError::Open(format!("database '{target}' does not exist")));
                }
                let db = Arc::new(MemoryDb {
                    kind: kind.clone(),
                    data: RwLock::new(DbState::default()),
                    writers: RwLock::new(BTreeSet::from([self.identity.clone()])),
                });
                Arc::clone(entry.insert(db).value())
            }
        };

        debug!(db = %address, "Opened in-memory database");
        Ok(Arc::new(MemoryHandle {
            name: address.path.clone(),
            uid: hex::encode(&Sha256::digest(id.as_bytes())[..8]),
            id,
            kind: db.kind.clone(),
            address,
            options: options.clone(),
            access: MemoryAccess {
                controller: self.controller,
                db: Arc::clone(&db),
            },
            db,
            events: EventEmitter::new(),
            fail_load: self.fail_loads.load(Ordering::SeqCst),
            load_delay: *self.load_delay.lock(),
            closed: AtomicBool::new(false),
            close_calls: Arc::clone(&self.close_calls),
        }))
    }

    fn identity(&self) -> String {
        self.identity.clone()
    }
}

/// Access controller over a database's writer set.
pub struct MemoryAccess {
    controller: ControllerKind,
    db: Arc<MemoryDb>,
}

#[async_trait]
impl AccessController for MemoryAccess {
    fn controller_type(&self) -> Option<&str> {
        Some(match self.controller {
            ControllerKind::Ipfs => "ipfs",
            ControllerKind::OrbitDb => "orbitdb",
        })
    }

    fn write_field(&self) -> Option<AccessList> {
        match self.controller {
            ControllerKind::Ipfs => Some(AccessList::Array(
                self.db.writers.read().iter().cloned().collect(),
            )),
            ControllerKind::OrbitDb => None,
        }
    }

    fn get(&self, role: &str) -> Option<AccessList> {
        match (self.controller, role) {
            (ControllerKind::OrbitDb, "write") => {
                Some(AccessList::Set(self.db.writers.read().clone()))
            }
            _ => None,
        }
    }

    async fn grant(&self, role: &str, id: &str) -> Result<bool, StoreError> {
        match (self.controller, role) {
            (ControllerKind::OrbitDb, "write") => {
                self.db.writers.write().insert(id.to_string());
                Ok(true)
            }
            (ControllerKind::OrbitDb, other) => {
                Err(StoreError::Operation(format!("unknown role '{other}'")))
            }
            (ControllerKind::Ipfs, _) => Ok(false),
        }
    }
}

/// Handle on one in-memory database.
pub struct MemoryHandle {
    name: String,
    id: String,
    uid: String,
    address: DbAddress,
    kind: DbKind,
    options: DbOptions,
    db: Arc<MemoryDb>,
    access: MemoryAccess,
    events: EventEmitter<DbEvent>,
    fail_load: bool,
    load_delay: Duration,
    closed: AtomicBool,
    close_calls: Arc<AtomicUsize>,
}

fn entry_hash(id: &str, seq: usize, payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    hasher.update(seq.to_le_bytes());
    hasher.update(payload.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

fn payload_value(entry: &Value) -> Value {
    entry
        .pointer("/payload/value")
        .cloned()
        .unwrap_or(Value::Null)
}

impl MemoryHandle {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Operation(format!(
                "database '{}' is closed",
                self.name
            )));
        }
        Ok(())
    }

    fn is(&self, kinds: &[DbKind]) -> bool {
        kinds.contains(&self.kind)
    }

    /// Append an entry, update the index with `apply`, emit `write`.
    fn commit(
        &self,
        op: &str,
        key: Option<&str>,
        value: Value,
        apply: impl FnOnce(&mut DbState, &str, &Value),
    ) -> Result<String, StoreError> {
        self.ensure_open()?;
        let payload = json!({ "op": op, "key": key, "value": value });
        let (hash, entry) = {
            let mut data = self.db.data.write();
            let hash = entry_hash(&self.id, data.log.len(), &payload);
            let entry = json!({ "hash": hash, "payload": payload });
            data.log.push(entry.clone());
            apply(&mut *data, hash.as_str(), &entry);
            (hash, entry)
        };
        self.events.emit(DbEvent::Write {
            address: self.address.clone(),
            hash: hash.clone(),
            entry,
        });
        Ok(hash)
    }

    fn index_field(&self) -> &str {
        self.options.index_by.as_deref().unwrap_or(DEFAULT_INDEX_FIELD)
    }

    fn live_entries(&self) -> Vec<Value> {
        let data = self.db.data.read();
        data.log
            .iter()
            .filter(|entry| {
                entry
                    .get("hash")
                    .and_then(Value::as_str)
                    .is_some_and(|hash| data.index.contains_key(hash))
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl StoreHandle for MemoryHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn address(&self) -> &DbAddress {
        &self.address
    }

    fn kind(&self) -> &DbKind {
        &self.kind
    }

    fn options(&self) -> &DbOptions {
        &self.options
    }

    fn uid(&self) -> String {
        self.uid.clone()
    }

    fn index(&self) -> Value {
        match self.kind {
            DbKind::Keyvalue | DbKind::Docstore => {
                Value::Object(self.db.data.read().index.clone().into_iter().collect())
            }
            DbKind::Log | DbKind::Feed => Value::Array(self.live_entries()),
            DbKind::Set => Value::Array(self.db.data.read().index.values().cloned().collect()),
            DbKind::Counter => json!(self.db.data.read().counter),
            DbKind::Custom(_) => Value::Null,
        }
    }

    fn index_len(&self) -> usize {
        let data = self.db.data.read();
        match self.kind {
            DbKind::Counter => data.log.len(),
            DbKind::Custom(_) => 0,
            _ => data.index.len(),
        }
    }

    fn heads(&self) -> Vec<String> {
        self.db
            .data
            .read()
            .log
            .last()
            .and_then(|entry| entry.get("hash"))
            .and_then(Value::as_str)
            .map(|hash| vec![hash.to_string()])
            .unwrap_or_default()
    }

    fn all(&self) -> Value {
        match self.kind {
            DbKind::Docstore => Value::Array(self.db.data.read().index.values().cloned().collect()),
            _ => self.index(),
        }
    }

    fn access(&self) -> &dyn AccessController {
        &self.access
    }

    fn events(&self) -> &EventEmitter<DbEvent> {
        &self.events
    }

    async fn load(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        if self.fail_load {
            return Err(StoreError::Load(format!("cannot load '{}'", self.name)));
        }
        let heads = self.heads();
        self.events.emit(DbEvent::Load {
            address: self.address.clone(),
            heads: heads.clone(),
        });
        self.events.emit(DbEvent::Ready {
            address: self.address.clone(),
            heads,
        });
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.events.emit(DbEvent::Closed {
            address: self.address.clone(),
        });
        Ok(())
    }

    fn writable(&self) -> Option<&dyn Writable> {
        self.is(&[DbKind::Keyvalue, DbKind::Docstore])
            .then_some(self as &dyn Writable)
    }

    fn appendable(&self) -> Option<&dyn Appendable> {
        self.is(&[DbKind::Log, DbKind::Feed, DbKind::Set])
            .then_some(self as &dyn Appendable)
    }

    fn counting(&self) -> Option<&dyn Counting> {
        self.is(&[DbKind::Counter]).then_some(self as &dyn Counting)
    }

    fn readable(&self) -> Option<&dyn Readable> {
        self.is(&[DbKind::Keyvalue, DbKind::Docstore, DbKind::Log, DbKind::Feed])
            .then_some(self as &dyn Readable)
    }

    fn iterable(&self) -> Option<&dyn Iterable> {
        self.is(&[DbKind::Log, DbKind::Feed])
            .then_some(self as &dyn Iterable)
    }

    fn queryable(&self) -> Option<&dyn Queryable> {
        self.is(&[DbKind::Docstore]).then_some(self as &dyn Queryable)
    }

    fn removable(&self) -> Option<&dyn Removable> {
        self.is(&[DbKind::Keyvalue, DbKind::Docstore, DbKind::Feed])
            .then_some(self as &dyn Removable)
    }

    fn valued(&self) -> Option<&dyn Valued> {
        self.is(&[DbKind::Counter]).then_some(self as &dyn Valued)
    }
}

#[async_trait]
impl Writable for MemoryHandle {
    async fn put(&self, request: PutRequest) -> Result<String, StoreError> {
        let (key, value) = match (request, &self.kind) {
            (PutRequest::Keyed { key, value }, DbKind::Keyvalue) => (key, value),
            (PutRequest::Document(doc), DbKind::Docstore) => {
                let key = match doc.get(self.index_field()) {
                    Some(Value::String(key)) => key.clone(),
                    Some(other) => other.to_string(),
                    None => {
                        return Err(StoreError::Operation(format!(
                            "document is missing field '{}'",
                            self.index_field()
                        )))
                    }
                };
                (key, doc)
            }
            (request, kind) => {
                return Err(StoreError::Operation(format!(
                    "cannot put {request:?} into a {kind} store"
                )))
            }
        };
        let docstore = self.kind == DbKind::Docstore;
        self.commit("PUT", Some(&key), value, |data, _, entry| {
            let stored = if docstore {
                entry.clone()
            } else {
                payload_value(entry)
            };
            data.index.insert(key.clone(), stored);
        })
    }
}

#[async_trait]
impl Appendable for MemoryHandle {
    async fn add(&self, value: Value) -> Result<String, StoreError> {
        let set = self.kind == DbKind::Set;
        self.commit("ADD", None, value, |data, hash, entry| {
            if set {
                let value = payload_value(entry);
                data.index.insert(value.to_string(), value);
            } else {
                data.index.insert(hash.to_string(), entry.clone());
            }
        })
    }
}

#[async_trait]
impl Counting for MemoryHandle {
    async fn inc(&self, amount: u64) -> Result<String, StoreError> {
        let total = self.db.data.read().counter.saturating_add(amount);
        self.commit("COUNTER", None, json!({ "counter": total }), |data, _, _| {
            data.counter = data.counter.saturating_add(amount);
        })
    }
}

impl Readable for MemoryHandle {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.ensure_open()?;
        Ok(self.db.data.read().index.get(key).cloned())
    }
}

impl Iterable for MemoryHandle {
    fn iterator(&self, options: &IteratorOptions) -> Result<Vec<Value>, StoreError> {
        self.ensure_open()?;
        let mut entries = self.live_entries();
        if let Some(limit) = options.limit.filter(|limit| *limit >= 0) {
            let skip = entries.len().saturating_sub(limit as usize);
            entries.drain(..skip);
        }
        if options.reverse {
            entries.reverse();
        }
        Ok(entries)
    }
}

impl Queryable for MemoryHandle {
    fn query(&self, filter: DocFilter<'_>) -> Result<Vec<Value>, StoreError> {
        self.ensure_open()?;
        Ok(self
            .db
            .data
            .read()
            .index
            .values()
            .map(payload_value)
            .filter(|doc| filter(doc))
            .collect())
    }
}

#[async_trait]
impl Removable for MemoryHandle {
    async fn remove(&self, key: &str) -> Result<String, StoreError> {
        if self.kind != DbKind::Keyvalue && !self.db.data.read().index.contains_key(key) {
            return Err(StoreError::Operation(format!("no entry with key '{key}'")));
        }
        self.commit("DEL", Some(key), Value::Null, |data, _, _| {
            data.index.remove(key);
        })
    }
}

impl Valued for MemoryHandle {
    fn value(&self) -> Value {
        json!(self.db.data.read().counter)
    }
}
