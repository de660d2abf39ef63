//! # Database Facade
//!
//! The surface the routing layer calls. Resolves keys through the handle
//! cache, checks capabilities, and builds the info / access projections.

use crate::domain::{
    AccessList, Capability, ClientError, DbInfo, GatewayError, IteratorOptions, OpenParams,
    PutRequest, QuerySpec, SearchDetails, SearchOptions, SearchTicket,
};
use crate::ports::{
    DatabaseApi, EventStreamApi, PeerDiscoveryApi, StoreHandle, StreamSink,
};
use crate::service::announcer::Announcer;
use crate::service::event_bridge::{EventBridge, Registration};
use crate::service::handle_cache::DatabaseHandleCache;
use crate::service::search_coordinator::{PeerSearchCoordinator, SearchSubject};
use async_trait::async_trait;
use og_types::PeerRecord;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Operations a handle supports, probed in projection order.
pub fn capabilities(handle: &dyn StoreHandle) -> Vec<Capability> {
    Capability::ALL
        .into_iter()
        .filter(|capability| match capability {
            Capability::Add => handle.appendable().is_some(),
            Capability::Get => handle.readable().is_some(),
            Capability::Inc => handle.counting().is_some(),
            Capability::Iterator => handle.iterable().is_some(),
            Capability::Put => handle.writable().is_some(),
            Capability::Query => handle.queryable().is_some(),
            Capability::Remove => handle.removable().is_some(),
            Capability::Value => handle.valued().is_some(),
        })
        .collect()
}

/// Unwrap log entries to their payload values. Anything that is not an
/// entry passes through unchanged.
pub fn unpack(contents: Value) -> Value {
    match contents {
        Value::Array(items) => Value::Array(items.into_iter().map(unpack_entry).collect()),
        other => unpack_entry(other),
    }
}

fn unpack_entry(entry: Value) -> Value {
    match entry {
        Value::Object(mut map) if map.contains_key("payload") => map
            .remove("payload")
            .and_then(|payload| payload.get("value").cloned())
            .unwrap_or(Value::Null),
        other => other,
    }
}

fn unsupported(handle: &dyn StoreHandle, capability: Capability) -> GatewayError {
    GatewayError::Unsupported {
        operation: capability.to_string(),
        kind: handle.kind().to_string(),
    }
}

fn store_failure(error: impl std::fmt::Display) -> GatewayError {
    GatewayError::StoreFailure(error.to_string())
}

/// Facade over the cache, coordinator, bridge and announcer.
pub struct DbFacade {
    cache: Arc<DatabaseHandleCache>,
    coordinator: Arc<PeerSearchCoordinator>,
    bridge: EventBridge,
    announcer: Arc<Announcer>,
    api_debug: bool,
}

impl DbFacade {
    /// Create a facade.
    pub fn new(
        cache: Arc<DatabaseHandleCache>,
        coordinator: Arc<PeerSearchCoordinator>,
        bridge: EventBridge,
        announcer: Arc<Announcer>,
        api_debug: bool,
    ) -> Self {
        Self {
            cache,
            coordinator,
            bridge,
            announcer,
            api_debug,
        }
    }

    /// Cached handle for `key`.
    pub fn handle(&self, key: &str) -> Result<Arc<dyn StoreHandle>, GatewayError> {
        self.cache
            .find(key)
            .ok_or_else(|| GatewayError::NotFound(key.to_string()))
    }

    /// Client error for `error`, with detail only in debug mode.
    pub fn client_error(&self, error: &GatewayError) -> ClientError {
        error.to_client_error(self.api_debug)
    }

    /// Info projection of one handle.
    pub fn info_of(&self, handle: &dyn StoreHandle) -> DbInfo {
        let write = AccessList::resolve(handle.access());
        let peers = self.coordinator.directory().peers_for(handle.id());
        DbInfo {
            address: handle.address().to_string(),
            dbname: handle.name().to_string(),
            id: handle.id().to_string(),
            options: handle.options().clone(),
            can_append: write.permits(&self.cache.identity()),
            write,
            kind: handle.kind().to_string(),
            uid: handle.uid(),
            index_length: handle.index_len(),
            access_controller_type: handle
                .access()
                .controller_type()
                .unwrap_or("custom")
                .to_string(),
            peer_count: peers.len(),
            peers,
            capabilities: capabilities(handle),
        }
    }
}

#[async_trait]
impl DatabaseApi for DbFacade {
    async fn open(&self, name: &str, params: &OpenParams) -> Result<DbInfo, GatewayError> {
        let handle = self.cache.get(name, params).await?;
        Ok(self.info_of(handle.as_ref()))
    }

    async fn close(&self, key: &str) -> Result<(), GatewayError> {
        self.cache.remove(key).await.map(|_| ())
    }

    fn list(&self) -> BTreeMap<String, DbInfo> {
        self.cache
            .handles()
            .into_iter()
            .map(|handle| (handle.name().to_string(), self.info_of(handle.as_ref())))
            .collect()
    }

    fn info(&self, key: &str) -> Option<DbInfo> {
        self.cache.find(key).map(|handle| self.info_of(handle.as_ref()))
    }

    async fn put(&self, key: &str, payload: Value) -> Result<String, GatewayError> {
        let handle = self.handle(key)?;
        let writer = handle
            .writable()
            .ok_or_else(|| unsupported(handle.as_ref(), Capability::Put))?;
        let request = PutRequest::from_payload(handle.kind(), payload)?;
        writer.put(request).await.map_err(store_failure)
    }

    async fn add(&self, key: &str, value: Value) -> Result<String, GatewayError> {
        let handle = self.handle(key)?;
        let log = handle
            .appendable()
            .ok_or_else(|| unsupported(handle.as_ref(), Capability::Add))?;
        log.add(value).await.map_err(store_failure)
    }

    async fn inc(&self, key: &str, amount: u64) -> Result<String, GatewayError> {
        let handle = self.handle(key)?;
        let counter = handle
            .counting()
            .ok_or_else(|| unsupported(handle.as_ref(), Capability::Inc))?;
        counter.inc(amount).await.map_err(store_failure)
    }

    async fn remove_entry(&self, key: &str, item: &str) -> Result<String, GatewayError> {
        let handle = self.handle(key)?;
        let store = handle
            .removable()
            .ok_or_else(|| unsupported(handle.as_ref(), Capability::Remove))?;
        store.remove(item).await.map_err(store_failure)
    }

    fn get_entry(&self, key: &str, item: &str) -> Result<Value, GatewayError> {
        self.get_raw(key, item).map(unpack)
    }

    fn get_raw(&self, key: &str, item: &str) -> Result<Value, GatewayError> {
        let handle = self.handle(key)?;
        let reader = handle
            .readable()
            .ok_or_else(|| unsupported(handle.as_ref(), Capability::Get))?;
        Ok(reader.get(item).map_err(store_failure)?.unwrap_or(Value::Null))
    }

    fn iterator(&self, key: &str, options: &IteratorOptions) -> Result<Vec<Value>, GatewayError> {
        Ok(self
            .raw_iterator(key, options)?
            .into_iter()
            .map(unpack_entry)
            .collect())
    }

    fn raw_iterator(
        &self,
        key: &str,
        options: &IteratorOptions,
    ) -> Result<Vec<Value>, GatewayError> {
        let handle = self.handle(key)?;
        let log = handle
            .iterable()
            .ok_or_else(|| unsupported(handle.as_ref(), Capability::Iterator))?;
        log.iterator(options).map_err(store_failure)
    }

    fn all(&self, key: &str) -> Result<Value, GatewayError> {
        Ok(unpack(self.handle(key)?.all()))
    }

    fn index(&self, key: &str) -> Result<Value, GatewayError> {
        Ok(self.handle(key)?.index())
    }

    fn value(&self, key: &str) -> Result<Value, GatewayError> {
        let handle = self.handle(key)?;
        handle
            .valued()
            .map(|counter| counter.value())
            .ok_or_else(|| unsupported(handle.as_ref(), Capability::Value))
    }

    fn query(&self, key: &str, spec: &QuerySpec) -> Result<Vec<Value>, GatewayError> {
        let handle = self.handle(key)?;
        let docs = handle
            .queryable()
            .ok_or_else(|| unsupported(handle.as_ref(), Capability::Query))?;
        let predicate = spec.predicate()?;
        debug!(db = key, field = predicate.field(), comparator = ?predicate.comparator(), "Running query");
        let filter = move |doc: &Value| predicate.matches(doc);
        docs.query(&filter).map_err(store_failure)
    }

    fn write_list(&self, key: &str) -> Result<AccessList, GatewayError> {
        Ok(AccessList::resolve(self.handle(key)?.access()))
    }

    async fn grant_write(&self, key: &str, id: &str) -> Result<(), GatewayError> {
        let handle = self.handle(key)?;
        match handle.access().grant("write", id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(GatewayError::AccessGrantUnsupported),
            Err(e) => Err(store_failure(e)),
        }
    }

    fn identity(&self) -> String {
        self.cache.identity()
    }
}

#[async_trait]
impl PeerDiscoveryApi for DbFacade {
    async fn find_db_peers(
        &self,
        key: &str,
        options: SearchOptions,
    ) -> Result<SearchTicket, GatewayError> {
        let handle = self.handle(key)?;
        let subject = SearchSubject::Database {
            id: handle.id().to_string(),
            address: handle.address().clone(),
            events: handle.events().clone(),
        };
        Ok(self.coordinator.find_peers_for_subject(subject, options).ticket)
    }

    fn db_peers(&self, key: &str) -> Result<Vec<PeerRecord>, GatewayError> {
        let handle = self.handle(key)?;
        Ok(self.coordinator.directory().peers_for(handle.id()))
    }

    fn find_peer(&self, peer_id: &str) -> SearchTicket {
        self.coordinator.find_peer(peer_id).ticket
    }

    async fn resolve_address(&self, peer_id: &str) -> Result<PeerRecord, GatewayError> {
        self.coordinator.resolve_address(peer_id).await
    }

    fn list_active_searches(&self) -> Vec<SearchDetails> {
        self.coordinator.list_active_searches()
    }

    fn all_peers(&self) -> Vec<PeerRecord> {
        self.coordinator.directory().all()
    }

    async fn ping_peer(&self, peer_id: &str) -> Result<u64, GatewayError> {
        self.coordinator
            .network()
            .ping(peer_id)
            .await
            .map_err(|e| GatewayError::DiscoveryFailure {
                subject: peer_id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn connect_peer(&self, peer_id: &str) -> Result<PeerRecord, GatewayError> {
        let record = self.coordinator.resolve_address(peer_id).await?;
        let network = self.coordinator.network();
        let mut last_error = None;
        for addr in &record.multiaddrs {
            match network.connect(addr).await {
                Ok(()) => {
                    debug!(peer = peer_id, addr = %addr, "Connected to peer");
                    return Ok(record);
                }
                Err(e) => {
                    warn!(peer = peer_id, addr = %addr, error = %e, "Dial failed");
                    last_error = Some(e);
                }
            }
        }
        Err(GatewayError::DiscoveryFailure {
            subject: peer_id.to_string(),
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no addresses".to_string()),
        })
    }

    async fn announce(&self, key: &str) -> Result<(), GatewayError> {
        let handle = self.handle(key)?;
        self.announcer.announce_db(handle.as_ref()).await
    }
}

#[async_trait]
impl EventStreamApi for DbFacade {
    async fn subscribe_db(
        &self,
        key: &str,
        names: &str,
        sink: StreamSink,
    ) -> Result<Registration, GatewayError> {
        let handle = self.handle(key)?;
        self.bridge.register(handle.events(), names, sink).await
    }

    async fn subscribe_manager(
        &self,
        names: &str,
        sink: StreamSink,
    ) -> Result<Registration, GatewayError> {
        self.bridge.register(self.cache.events(), names, sink).await
    }
}
