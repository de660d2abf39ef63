//! # Database Handle Cache
//!
//! Open database handles shared across requests.
//!
//! Handles are found by name, canonical id or `root/path`. Opening goes
//! through a per-key async mutex so concurrent requests for the same key
//! open the database once; different keys never wait on each other.
//! Once the store names the canonical id, the open also claims that id
//! until the handle is registered, so two keys reaching one database
//! still end with a single cached handle.
//!
//! Manager events are emitted as a database opens:
//! `open` (store opened) → `load` (initial load starting) → `ready`
//! (loaded and registered).

use crate::domain::{GatewayError, OpenParams};
use crate::ports::{ReplicatedStore, StoreHandle};
use crate::service::peer_directory::PeerDirectory;
use dashmap::DashMap;
use og_bus::{DbEvent, EventEmitter, ManagerEvent};
use og_telemetry::{log_event, metric_inc, COMPONENT_ERRORS, DBS_OPEN, DB_OPENS, OPEN_FAILURES};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

const COMPONENT: &str = "handle_cache";

type OpenLocks = DashMap<String, Arc<Mutex<()>>>;

/// Holds the open lock for one key. Dropping it releases the lock and
/// removes the map entry once nobody else is waiting on it.
struct OpenSlot<'a> {
    locks: &'a OpenLocks,
    key: &'a str,
    guard: Option<OwnedMutexGuard<()>>,
    lock: Option<Arc<Mutex<()>>>,
}

impl<'a> OpenSlot<'a> {
    async fn acquire(locks: &'a OpenLocks, key: &'a str) -> OpenSlot<'a> {
        let lock = locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let mut slot = OpenSlot {
            locks,
            key,
            guard: None,
            lock: Some(Arc::clone(&lock)),
        };
        slot.guard = Some(lock.lock_owned().await);
        slot
    }
}

impl Drop for OpenSlot<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.lock.take();
        self.locks
            .remove_if(self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Cache of open database handles.
pub struct DatabaseHandleCache {
    store: Arc<dyn ReplicatedStore>,
    directory: Arc<PeerDirectory>,
    /// Canonical name → handle.
    handles: DashMap<String, Arc<dyn StoreHandle>>,
    open_locks: OpenLocks,
    /// Canonical id → lock held from open to registration.
    id_locks: OpenLocks,
    events: EventEmitter<ManagerEvent>,
}

impl DatabaseHandleCache {
    /// Create an empty cache over a store.
    pub fn new(store: Arc<dyn ReplicatedStore>, directory: Arc<PeerDirectory>) -> Self {
        Self {
            store,
            directory,
            handles: DashMap::new(),
            open_locks: DashMap::new(),
            id_locks: DashMap::new(),
            events: EventEmitter::new(),
        }
    }

    /// Manager-scoped events.
    pub fn events(&self) -> &EventEmitter<ManagerEvent> {
        &self.events
    }

    /// Identity id of the local node.
    pub fn identity(&self) -> String {
        self.store.identity()
    }

    /// Find a cached handle by name, canonical id or `root/path`.
    pub fn find(&self, key: &str) -> Option<Arc<dyn StoreHandle>> {
        if let Some(handle) = self.handles.get(key) {
            return Some(Arc::clone(handle.value()));
        }
        self.handles
            .iter()
            .find(|entry| entry.id() == key || entry.address().compound_key() == key)
            .map(|entry| Arc::clone(entry.value()))
    }

    fn find_by_id(&self, id: &str) -> Option<Arc<dyn StoreHandle>> {
        self.handles
            .iter()
            .find(|entry| entry.id() == id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Return the cached handle for `key`, opening and loading it first if
    /// needed.
    ///
    /// Concurrent calls for the same key share one open. A database reached
    /// under two different keys is still cached once; the later open is
    /// closed and the cached handle returned.
    pub async fn get(
        &self,
        key: &str,
        params: &OpenParams,
    ) -> Result<Arc<dyn StoreHandle>, GatewayError> {
        if let Some(handle) = self.find(key) {
            return Ok(handle);
        }

        let _slot = OpenSlot::acquire(&self.open_locks, key).await;
        if let Some(handle) = self.find(key) {
            debug!(db = key, "Database opened by a concurrent request");
            return Ok(handle);
        }

        self.open_and_register(key, params).await.map_err(|e| {
            metric_inc!(COMPONENT_ERRORS, &[COMPONENT, e.kind_label()]);
            e
        })
    }

    async fn open_and_register(
        &self,
        key: &str,
        params: &OpenParams,
    ) -> Result<Arc<dyn StoreHandle>, GatewayError> {
        let kind = params.kind.clone().unwrap_or_default();
        log_event!(info, COMPONENT, "Opening database", db = key, kind = %kind);

        let handle = self
            .store
            .open(key, &kind, &params.options)
            .await
            .map_err(|e| {
                metric_inc!(OPEN_FAILURES);
                warn!(db = key, error = %e, "Database open failed");
                GatewayError::OpenFailure {
                    name: key.to_string(),
                    reason: e.to_string(),
                }
            })?;
        metric_inc!(DB_OPENS);
        self.events.emit(ManagerEvent::Open {
            address: handle.address().clone(),
        });

        let id = handle.id().to_string();
        let _claim = OpenSlot::acquire(&self.id_locks, &id).await;
        if let Some(existing) = self.find_by_id(&id) {
            debug!(db = key, id = handle.id(), "Database already cached under another key");
            if let Err(e) = handle.close().await {
                warn!(db = key, error = %e, "Failed to close duplicate handle");
            }
            return Ok(existing);
        }

        debug!(db = key, "Loading database");
        self.events.emit(ManagerEvent::Load {
            address: handle.address().clone(),
        });
        if let Err(e) = handle.load().await {
            metric_inc!(OPEN_FAILURES);
            warn!(db = key, error = %e, "Database load failed");
            if let Err(close_err) = handle.close().await {
                debug!(db = key, error = %close_err, "Close after failed load also failed");
            }
            return Err(GatewayError::OpenFailure {
                name: key.to_string(),
                reason: e.to_string(),
            });
        }

        self.handles
            .insert(handle.name().to_string(), Arc::clone(&handle));
        DBS_OPEN.set(self.handles.len() as i64);
        self.observe_peers(&handle);

        self.events.emit(ManagerEvent::Ready {
            address: handle.address().clone(),
            heads: handle.heads(),
        });
        log_event!(info, COMPONENT, "Finished loading database", db = handle.name());
        Ok(handle)
    }

    /// Feed `peer` events of a database into the directory until it closes.
    fn observe_peers(&self, handle: &Arc<dyn StoreHandle>) {
        let mut listener = handle.events().listen();
        let directory = Arc::clone(&self.directory);
        let db_id = handle.id().to_string();
        tokio::spawn(async move {
            while let Some(event) = listener.recv().await {
                match event {
                    DbEvent::Peer { peer } => {
                        debug!(db = %db_id, peer = %peer.id, "Observed replicating peer");
                        directory.associate(&db_id, &peer.id);
                        directory.put(peer);
                    }
                    DbEvent::Closed { .. } => break,
                    _ => {}
                }
            }
        });
    }

    /// Close and forget a database. Returns false if no handle matched.
    ///
    /// The handle leaves the cache before it is closed, so a later `get`
    /// opens it afresh.
    pub async fn remove(&self, key: &str) -> Result<bool, GatewayError> {
        let Some(handle) = self.find(key) else {
            debug!(db = key, "Remove of unknown database ignored");
            return Ok(false);
        };
        self.handles
            .remove_if(handle.name(), |_, cached| Arc::ptr_eq(cached, &handle));
        DBS_OPEN.set(self.handles.len() as i64);

        let closed = handle.close().await;
        self.directory.detach(handle.id());
        closed.map_err(|e| GatewayError::StoreFailure(e.to_string()))?;
        log_event!(info, COMPONENT, "Unloaded database", db = handle.name());
        Ok(true)
    }

    /// Close every cached database. Failures are logged and skipped.
    pub async fn close_all(&self) -> usize {
        let mut closed = 0;
        for handle in self.handles() {
            match self.remove(handle.id()).await {
                Ok(true) => closed += 1,
                Ok(false) => {}
                Err(e) => warn!(db = handle.name(), error = %e, "Failed to close database"),
            }
        }
        closed
    }

    /// Every cached handle, ordered by name.
    pub fn handles(&self) -> Vec<Arc<dyn StoreHandle>> {
        let mut handles: Vec<_> = self
            .handles
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        handles.sort_by(|a, b| a.name().cmp(b.name()));
        handles
    }

    /// Number of cached handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Keys with an open in progress or waiting.
    pub fn pending_opens(&self) -> usize {
        self.open_locks.len()
    }
}
