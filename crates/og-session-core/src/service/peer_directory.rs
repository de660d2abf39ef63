//! # Peer Directory
//!
//! Known peers and their addresses, plus which peers replicate which
//! database. The per-database lists hold peer ids only; the records live
//! in one table.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use og_telemetry::PEERS_KNOWN;
use og_types::PeerRecord;
use std::collections::BTreeSet;
use tracing::debug;

/// Directory of known peers.
#[derive(Default)]
pub struct PeerDirectory {
    peers: DashMap<String, PeerRecord>,
    db_peers: DashMap<String, BTreeSet<String>>,
}

impl PeerDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or merge a peer. Returns true if anything changed.
    ///
    /// Stored addresses are kept sorted, so the final record does not depend
    /// on which discovery result arrived first.
    pub fn put(&self, mut record: PeerRecord) -> bool {
        record.normalize_addrs();
        let changed = match self.peers.entry(record.id.clone()) {
            Entry::Occupied(mut existing) => existing.get_mut().merge_addrs(&record),
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        };
        PEERS_KNOWN.set(self.peers.len() as i64);
        changed
    }

    /// Insert every record and associate each with `db_id`.
    pub fn put_for_db(&self, db_id: &str, records: &[PeerRecord]) {
        for record in records {
            self.put(record.clone());
            self.associate(db_id, &record.id);
        }
    }

    /// Record that `peer_id` replicates `db_id`.
    pub fn associate(&self, db_id: &str, peer_id: &str) {
        self.db_peers
            .entry(db_id.to_string())
            .or_default()
            .insert(peer_id.to_string());
    }

    /// Look up one peer.
    pub fn get(&self, id: &str) -> Option<PeerRecord> {
        self.peers.get(id).map(|r| r.clone())
    }

    /// Every known peer, ordered by id.
    pub fn all(&self) -> Vec<PeerRecord> {
        let mut peers: Vec<_> = self.peers.iter().map(|r| r.value().clone()).collect();
        peers.sort_by(|a, b| a.id.cmp(&b.id));
        peers
    }

    /// Peers associated with a database, ordered by id.
    pub fn peers_for(&self, db_id: &str) -> Vec<PeerRecord> {
        let Some(ids) = self.db_peers.get(db_id).map(|ids| ids.clone()) else {
            return Vec::new();
        };
        ids.iter().filter_map(|id| self.get(id)).collect()
    }

    /// Drop the association list of a database. Peer records stay.
    pub fn detach(&self, db_id: &str) {
        if self.db_peers.remove(db_id).is_some() {
            debug!(db = db_id, "Detached database from peer directory");
        }
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// True if no peers are known.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
