//! # Announcer
//!
//! Publishes database roots to the DHT as provider records. Each database
//! is announced once when it becomes ready, and optionally again on a
//! fixed interval.

use crate::config::GatewayConfig;
use crate::domain::GatewayError;
use crate::ports::{DhtNetwork, StoreHandle};
use crate::service::handle_cache::DatabaseHandleCache;
use og_bus::{ManagerEvent, ManagerEventName};
use og_telemetry::{log_event, metric_inc, COMPONENT_ERRORS};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

const COMPONENT: &str = "announcer";

/// Outcome of one announce pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnounceReport {
    /// Databases announced.
    pub announced: usize,
    /// Databases whose announce failed.
    pub failed: usize,
}

/// DHT announcer for open databases.
pub struct Announcer {
    cache: Arc<DatabaseHandleCache>,
    network: Arc<dyn DhtNetwork>,
    interval: Duration,
    periodic: bool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Announcer {
    /// Create an announcer. Nothing runs until [`Announcer::start`].
    pub fn new(
        cache: Arc<DatabaseHandleCache>,
        network: Arc<dyn DhtNetwork>,
        config: &GatewayConfig,
    ) -> Self {
        Self {
            cache,
            network,
            interval: config.announce_interval(),
            periodic: config.periodic_announce(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Whether the periodic pass is enabled.
    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    /// Whether background tasks are running.
    pub fn is_running(&self) -> bool {
        self.tasks.lock().iter().any(|task| !task.is_finished())
    }

    /// Provide one database's root.
    pub async fn announce_db(&self, handle: &dyn StoreHandle) -> Result<(), GatewayError> {
        let root = &handle.address().root;
        self.network.provide(root).await.map_err(|e| {
            metric_inc!(COMPONENT_ERRORS, &[COMPONENT, "provide"]);
            GatewayError::DiscoveryFailure {
                subject: root.clone(),
                reason: e.to_string(),
            }
        })?;
        debug!(db = handle.name(), root = %root, "Announced database");
        Ok(())
    }

    /// Announce every open database. Failures are logged and skipped.
    pub async fn announce_all(&self) -> AnnounceReport {
        let mut report = AnnounceReport::default();
        for handle in self.cache.handles() {
            match self.announce_db(handle.as_ref()).await {
                Ok(()) => report.announced += 1,
                Err(e) => {
                    warn!(db = handle.name(), error = %e, "Announce failed");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Spawn the announce-on-ready listener and, if enabled, the periodic
    /// pass. Calling it again while running does nothing.
    pub fn start(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock();
        if tasks.iter().any(|task| !task.is_finished()) {
            return;
        }
        tasks.clear();

        let mut ready = self.cache.events().listen_for(ManagerEventName::Ready);
        let network = Arc::clone(&self.network);
        tasks.push(tokio::spawn(async move {
            while let Some(event) = ready.recv().await {
                let ManagerEvent::Ready { address, .. } = event else {
                    continue;
                };
                if let Err(e) = network.provide(&address.root).await {
                    debug!(root = %address.root, error = %e, "Announce on ready failed");
                }
            }
        }));

        if self.periodic {
            let weak = Arc::downgrade(self);
            tasks.push(tokio::spawn(periodic_pass(weak, self.interval)));
            log_event!(
                info,
                COMPONENT,
                "Periodic announce started",
                interval_ms = self.interval.as_millis() as u64
            );
        }
    }

    /// Abort background tasks.
    pub fn stop(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

impl Drop for Announcer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn periodic_pass(announcer: Weak<Announcer>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        ticker.tick().await;
        let Some(announcer) = announcer.upgrade() else {
            break;
        };
        let report = announcer.announce_all().await;
        info!(
            announced = report.announced,
            failed = report.failed,
            "Announce pass complete"
        );
    }
}
