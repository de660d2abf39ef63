//! # Gateway
//!
//! Composition root. Wires the cache, directory, search coordinator,
//! event bridge and announcer over one store and one network.

use crate::config::GatewayConfig;
use crate::ports::{DhtNetwork, ReplicatedStore, StreamSink, TimeSource};
use crate::service::announcer::Announcer;
use crate::service::event_bridge::EventBridge;
use crate::service::facade::DbFacade;
use crate::service::handle_cache::DatabaseHandleCache;
use crate::service::peer_directory::PeerDirectory;
use crate::service::search_coordinator::PeerSearchCoordinator;
use og_bus::StreamEvent;
use og_telemetry::log_event;
use std::sync::Arc;
use tokio::sync::mpsc;

const COMPONENT: &str = "gateway";

/// Session core of one gateway process.
pub struct Gateway {
    config: GatewayConfig,
    cache: Arc<DatabaseHandleCache>,
    coordinator: Arc<PeerSearchCoordinator>,
    announcer: Arc<Announcer>,
    facade: Arc<DbFacade>,
}

impl Gateway {
    /// Build the service graph. Background tasks start with
    /// [`Gateway::start`].
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn ReplicatedStore>,
        network: Arc<dyn DhtNetwork>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        let directory = Arc::new(PeerDirectory::new());
        let cache = Arc::new(DatabaseHandleCache::new(store, Arc::clone(&directory)));
        let coordinator = Arc::new(PeerSearchCoordinator::new(
            Arc::clone(&network),
            directory,
            time,
        ));
        let announcer = Arc::new(Announcer::new(Arc::clone(&cache), network, &config));
        let facade = Arc::new(DbFacade::new(
            Arc::clone(&cache),
            Arc::clone(&coordinator),
            EventBridge::new(config.keep_alive_interval()),
            Arc::clone(&announcer),
            config.api_debug,
        ));

        Self {
            config,
            cache,
            coordinator,
            announcer,
            facade,
        }
    }

    /// Start the announcer.
    pub fn start(&self) {
        self.announcer.start();
        log_event!(
            info,
            COMPONENT,
            "Gateway started",
            mode = ?self.config.ipfs_mode,
            periodic_announce = self.announcer.is_periodic()
        );
    }

    /// Stop background tasks and close every open database. Returns the
    /// number of databases closed.
    pub async fn shutdown(&self) -> usize {
        self.announcer.stop();
        let closed = self.cache.close_all().await;
        log_event!(info, COMPONENT, "Gateway stopped", closed = closed);
        closed
    }

    /// Channel for one client event stream, buffering
    /// `sink_capacity` frames.
    pub fn client_stream(&self) -> (StreamSink, mpsc::Receiver<StreamEvent>) {
        mpsc::channel(self.config.sink_capacity.max(1))
    }

    /// The facade handed to the routing layer.
    pub fn facade(&self) -> &Arc<DbFacade> {
        &self.facade
    }

    /// Handle cache.
    pub fn cache(&self) -> &Arc<DatabaseHandleCache> {
        &self.cache
    }

    /// Peer search coordinator.
    pub fn coordinator(&self) -> &Arc<PeerSearchCoordinator> {
        &self.coordinator
    }

    /// Peer directory.
    pub fn directory(&self) -> &Arc<PeerDirectory> {
        self.coordinator.directory()
    }

    /// Announcer.
    pub fn announcer(&self) -> &Arc<Announcer> {
        &self.announcer
    }

    /// Active configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}
