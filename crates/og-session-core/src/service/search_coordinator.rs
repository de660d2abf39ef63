//! # Peer Search Coordinator
//!
//! Single-flight peer discovery. At most one search runs per subject key
//! (a database id or a peer id); later requests attach to it and receive
//! the same result.
//!
//! A search runs on its own task, so callers that stop waiting do not
//! abort it. When it settles the in-flight entry is removed first, then
//! the result is delivered, so a failed search can be retried at once.

use crate::domain::{GatewayError, SearchDetails, SearchOptions, SearchTicket, SubjectKind};
use crate::ports::{DhtNetwork, NetworkError, TimeSource};
use crate::service::peer_directory::PeerDirectory;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{self, BoxFuture, FutureExt, Shared};
use og_bus::{DbEvent, EventEmitter};
use og_telemetry::{log_event, metric_inc, COMPONENT_ERRORS, PEER_SEARCHES, SEARCHES_IN_FLIGHT};
use og_types::{DbAddress, PeerRecord};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info};

const COMPONENT: &str = "search_coordinator";

/// Settled result of a search.
pub type SearchResult = Result<Vec<PeerRecord>, GatewayError>;

type SharedSearch = Shared<BoxFuture<'static, SearchResult>>;

struct InFlightSearch {
    details: SearchDetails,
    result: SharedSearch,
}

/// What to search for.
#[derive(Clone)]
pub enum SearchSubject {
    /// Providers of an open database.
    Database {
        /// Canonical id, used as the subject key.
        id: String,
        /// Address; the root is looked up.
        address: DbAddress,
        /// Emitter receiving `peers.found` and `search.complete`.
        events: EventEmitter<DbEvent>,
    },
    /// Addresses of one peer.
    Peer {
        /// Peer id, used as the subject key.
        peer_id: String,
    },
}

impl SearchSubject {
    /// Key in the in-flight table.
    pub fn key(&self) -> &str {
        match self {
            Self::Database { id, .. } => id,
            Self::Peer { peer_id } => peer_id,
        }
    }

    /// Kind label.
    pub fn kind(&self) -> SubjectKind {
        match self {
            Self::Database { .. } => SubjectKind::Db,
            Self::Peer { .. } => SubjectKind::Peer,
        }
    }
}

/// A search this caller started or joined.
pub struct PendingSearch {
    /// Whether the caller started it, and its details.
    pub ticket: SearchTicket,
    result: SharedSearch,
}

impl PendingSearch {
    /// Wait for the search to settle.
    pub async fn outcome(self) -> SearchResult {
        self.result.await
    }
}

/// Removes a search from the in-flight table when dropped, including when
/// the search task unwinds.
struct InFlightGuard {
    in_flight: Arc<DashMap<String, InFlightSearch>>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
        SEARCHES_IN_FLIGHT.dec();
    }
}

/// Coordinates peer searches.
pub struct PeerSearchCoordinator {
    network: Arc<dyn DhtNetwork>,
    directory: Arc<PeerDirectory>,
    time: Arc<dyn TimeSource>,
    in_flight: Arc<DashMap<String, InFlightSearch>>,
}

impl PeerSearchCoordinator {
    /// Create a coordinator.
    pub fn new(
        network: Arc<dyn DhtNetwork>,
        directory: Arc<PeerDirectory>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            network,
            directory,
            time,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Peer directory fed by this coordinator.
    pub fn directory(&self) -> &Arc<PeerDirectory> {
        &self.directory
    }

    /// Network the coordinator searches.
    pub fn network(&self) -> &Arc<dyn DhtNetwork> {
        &self.network
    }

    /// Start a search for `subject`, or attach to the one in flight.
    ///
    /// Must be called from within a tokio runtime.
    pub fn find_peers_for_subject(
        &self,
        subject: SearchSubject,
        options: SearchOptions,
    ) -> PendingSearch {
        let key = subject.key().to_string();
        let kind = subject.kind();

        let (details, result, tx) = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(existing) => {
                metric_inc!(PEER_SEARCHES, &[kind.as_str(), "joined"]);
                debug!(subject = %key, "Joined search in flight");
                return PendingSearch {
                    ticket: SearchTicket {
                        is_new: false,
                        details: existing.get().details.clone(),
                    },
                    result: existing.get().result.clone(),
                };
            }
            Entry::Vacant(slot) => {
                let details = SearchDetails {
                    search_id: key.clone(),
                    started: self.time.now(),
                    options: options.clone(),
                };
                let (tx, rx) = oneshot::channel::<SearchResult>();
                let subject_key = key.clone();
                let result = async move {
                    rx.await.unwrap_or_else(|_| {
                        Err(GatewayError::DiscoveryFailure {
                            subject: subject_key,
                            reason: "search task ended without a result".to_string(),
                        })
                    })
                }
                .boxed()
                .shared();
                slot.insert(InFlightSearch {
                    details: details.clone(),
                    result: result.clone(),
                });
                (details, result, tx)
            }
        };

        metric_inc!(PEER_SEARCHES, &[kind.as_str(), "started"]);
        SEARCHES_IN_FLIGHT.inc();

        let search = self.run(subject, options);
        let guard = InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            key,
        };
        tokio::spawn(async move {
            let outcome = search.await;
            drop(guard);
            let label = if outcome.is_ok() { "found" } else { "failed" };
            metric_inc!(PEER_SEARCHES, &[kind.as_str(), label]);
            // Nobody may be waiting any more.
            let _ = tx.send(outcome);
        });

        PendingSearch {
            ticket: SearchTicket {
                is_new: true,
                details,
            },
            result,
        }
    }

    fn run(&self, subject: SearchSubject, options: SearchOptions) -> BoxFuture<'static, SearchResult> {
        let network = Arc::clone(&self.network);
        let directory = Arc::clone(&self.directory);
        match subject {
            SearchSubject::Database {
                id,
                address,
                events,
            } => async move {
                log_event!(info, COMPONENT, "Finding peers", db = %id);
                match network.find_providers(&address.root, &options).await {
                    Ok(peers) => {
                        directory.put_for_db(&id, &peers);
                        events.emit(DbEvent::PeersFound {
                            peers: peers.clone(),
                        });
                        events.emit(DbEvent::SearchComplete {
                            address,
                            peers: peers.clone(),
                        });
                        info!(db = %id, found = peers.len(), "Finished finding peers");
                        Ok(peers)
                    }
                    Err(e) => Err(discovery_failure(&id, &e)),
                }
            }
            .boxed(),
            SearchSubject::Peer { peer_id } => async move {
                log_event!(info, COMPONENT, "Resolving addresses", peer = %peer_id);
                match race_address(Arc::clone(&network), peer_id.clone()).await {
                    Ok(record) => {
                        directory.put(record.clone());
                        Ok(vec![record])
                    }
                    Err(e) => Err(discovery_failure(&peer_id, &e)),
                }
            }
            .boxed(),
        }
    }

    /// Start or join an address lookup for `peer_id`.
    pub fn find_peer(&self, peer_id: &str) -> PendingSearch {
        self.find_peers_for_subject(
            SearchSubject::Peer {
                peer_id: peer_id.to_string(),
            },
            SearchOptions::default(),
        )
    }

    /// Resolve a peer's addresses.
    ///
    /// Races the local connection table against a DHT lookup; the first
    /// to succeed wins and the other is left to finish unobserved.
    pub async fn resolve_address(&self, peer_id: &str) -> Result<PeerRecord, GatewayError> {
        let peers = self.find_peer(peer_id).outcome().await?;
        peers
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::DiscoveryFailure {
                subject: peer_id.to_string(),
                reason: "no addresses".to_string(),
            })
    }

    /// Searches currently in flight, oldest first.
    pub fn list_active_searches(&self) -> Vec<SearchDetails> {
        let mut searches: Vec<_> = self
            .in_flight
            .iter()
            .map(|entry| entry.details.clone())
            .collect();
        searches.sort_by(|a, b| {
            a.started
                .cmp(&b.started)
                .then_with(|| a.search_id.cmp(&b.search_id))
        });
        searches
    }

    /// Details of one in-flight search.
    pub fn search_details(&self, key: &str) -> Option<SearchDetails> {
        self.in_flight.get(key).map(|entry| entry.details.clone())
    }
}

fn discovery_failure(subject: &str, error: &NetworkError) -> GatewayError {
    info!(subject, error = %error, "Peer search failed");
    metric_inc!(COMPONENT_ERRORS, &[COMPONENT, "discovery_failure"]);
    GatewayError::DiscoveryFailure {
        subject: subject.to_string(),
        reason: error.to_string(),
    }
}

/// Look the peer up in the connection table.
async fn probe_swarm(network: &dyn DhtNetwork, peer_id: &str) -> Result<PeerRecord, NetworkError> {
    let connected = network.swarm_peers().await?;
    connected
        .into_iter()
        .find(|swarm| peer_id.contains(swarm.peer_id.as_str()))
        .map(|swarm| PeerRecord::new(peer_id, vec![swarm.addr]))
        .ok_or_else(|| NetworkError::NotConnected(peer_id.to_string()))
}

/// Run the swarm probe and the DHT lookup on separate tasks and take the
/// first success. The losing task is detached, not aborted.
async fn race_address(network: Arc<dyn DhtNetwork>, peer_id: String) -> Result<PeerRecord, NetworkError> {
    let probe = {
        let network = Arc::clone(&network);
        let peer_id = peer_id.clone();
        tokio::spawn(async move { probe_swarm(network.as_ref(), &peer_id).await })
    };
    let lookup = tokio::spawn(async move { network.find_peer(&peer_id).await });

    let branches = [probe, lookup].map(|task| {
        async move {
            task.await
                .unwrap_or_else(|e| Err(NetworkError::Other(e.to_string())))
        }
        .boxed()
    });
    let (record, _losers) = future::select_ok(branches).await?;
    Ok(record)
}
