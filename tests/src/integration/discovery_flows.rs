//! # Discovery Flows
//!
//! Provider searches, address resolution and announcing.
//!
//! ## Properties
//!
//! 1. N concurrent searches for one subject make one network lookup and
//!    all callers see the same result.
//! 2. Exactly one of two simultaneous callers gets `isNew = true`.
//! 3. A failed search leaves nothing in flight.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{create, Harness, START_MILLIS};
    use og_session_core::{
        DatabaseApi, GatewayConfig, GatewayError, InMemoryStore, PeerDiscoveryApi,
        SearchOptions, SearchSubject,
    };
    use og_types::{DbAddress, DbKind, PeerRecord, SwarmPeer};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    fn provider(id: &str) -> PeerRecord {
        PeerRecord::new(id, vec![format!("/ip4/192.168.1.5/tcp/4001/p2p/{id}")])
    }

    // =========================================================================
    // SINGLE-FLIGHT SEARCHES
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_simultaneous_searches_one_lookup() {
        let harness = Arc::new(Harness::new());
        let info = harness
            .gateway
            .facade()
            .open("shared", &create(DbKind::Keyvalue))
            .await
            .unwrap();
        let root = harness.gateway.facade().handle("shared").unwrap().address().root.clone();
        harness.dht.set_providers(&root, vec![provider("QmA"), provider("QmB")]);
        harness.dht.set_providers_delay(Duration::from_millis(100));

        let searches: Vec<_> = (0..2)
            .map(|_| {
                let harness = Arc::clone(&harness);
                tokio::spawn(async move {
                    harness
                        .gateway
                        .facade()
                        .find_db_peers("shared", SearchOptions::default())
                        .await
                        .unwrap()
                })
            })
            .collect();
        let mut fresh = Vec::new();
        for search in searches {
            fresh.push(search.await.unwrap().is_new);
        }
        fresh.sort();
        assert_eq!(fresh, vec![false, true]);

        timeout(Duration::from_secs(2), async {
            while harness.gateway.facade().db_peers("shared").unwrap().len() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(harness.dht.find_providers_calls(), 1);
        assert_eq!(harness.gateway.facade().info(&info.id).unwrap().peer_count, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_waiters_see_same_result() {
        let harness = Harness::new();
        harness.dht.set_providers("dbRootX", vec![provider("QmA")]);
        harness.dht.set_providers_delay(Duration::from_millis(50));
        let events = og_bus::EventEmitter::new();
        let coordinator = harness.gateway.coordinator();

        let pending: Vec<_> = (0..10)
            .map(|_| {
                coordinator.find_peers_for_subject(
                    SearchSubject::Database {
                        id: "dbRootX".into(),
                        address: DbAddress::new("dbRootX", "x"),
                        events: events.clone(),
                    },
                    SearchOptions::default(),
                )
            })
            .collect();
        assert_eq!(pending.iter().filter(|p| p.ticket.is_new).count(), 1);

        let outcomes =
            futures::future::join_all(pending.into_iter().map(|p| p.outcome())).await;
        for outcome in &outcomes {
            assert_eq!(outcome.as_ref().unwrap(), &vec![provider("QmA")]);
        }
        assert_eq!(harness.dht.find_providers_calls(), 1);
    }

    #[tokio::test]
    async fn test_active_searches_listed_while_pending() {
        let harness = Harness::new();
        harness.dht.set_find_peer_delay(Duration::from_millis(200));
        harness.dht.set_swarm_delay(Duration::from_millis(200));
        let facade = harness.gateway.facade();

        let ticket = facade.find_peer("QmSlow");
        assert!(ticket.is_new);
        assert_eq!(ticket.details.started.as_millis(), START_MILLIS);

        harness.clock.advance(5);
        let second = facade.find_peer("QmOther");
        let active = facade.list_active_searches();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].search_id, "QmSlow");
        assert_eq!(active[1].started.as_millis(), START_MILLIS + 5);

        let again = facade.find_peer("QmSlow");
        assert!(!again.is_new);
    }

    #[tokio::test]
    async fn test_failed_search_is_retryable() {
        let harness = Harness::new();
        let facade = harness.gateway.facade();
        facade.open("db", &create(DbKind::Log)).await.unwrap();
        harness.dht.fail_find_providers(Some("dht offline"));

        let coordinator = harness.gateway.coordinator();
        let handle = facade.handle("db").unwrap();
        let subject = SearchSubject::Database {
            id: handle.id().to_string(),
            address: handle.address().clone(),
            events: handle.events().clone(),
        };
        let err = coordinator
            .find_peers_for_subject(subject.clone(), SearchOptions::default())
            .outcome()
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::DiscoveryFailure { .. }));
        assert!(facade.list_active_searches().is_empty());

        harness.dht.fail_find_providers(None);
        let retry = coordinator.find_peers_for_subject(subject, SearchOptions::default());
        assert!(retry.ticket.is_new);
        assert!(retry.outcome().await.is_ok());
    }

    #[tokio::test]
    async fn test_max_providers_passed_through() {
        let harness = Harness::new();
        let facade = harness.gateway.facade();
        facade.open("db", &create(DbKind::Keyvalue)).await.unwrap();
        let root = facade.handle("db").unwrap().address().root.clone();
        harness
            .dht
            .set_providers(&root, vec![provider("QmA"), provider("QmB"), provider("QmC")]);

        let options = SearchOptions {
            max_providers: Some(1),
            ..Default::default()
        };
        let subject = {
            let handle = facade.handle("db").unwrap();
            SearchSubject::Database {
                id: handle.id().to_string(),
                address: handle.address().clone(),
                events: handle.events().clone(),
            }
        };
        let peers = harness
            .gateway
            .coordinator()
            .find_peers_for_subject(subject, options)
            .outcome()
            .await
            .unwrap();
        assert_eq!(peers.len(), 1);
    }

    // =========================================================================
    // ADDRESS RESOLUTION
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_connected_peer_resolves_from_swarm() {
        let harness = Harness::new();
        harness.dht.add_swarm_peer(SwarmPeer {
            peer_id: "QmNear".into(),
            addr: "/ip4/127.0.0.1/tcp/4002".into(),
        });
        harness.dht.set_find_peer_delay(Duration::from_secs(60));

        let record = timeout(
            Duration::from_secs(5),
            harness.gateway.facade().resolve_address("QmNear"),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(record.multiaddrs, vec!["/ip4/127.0.0.1/tcp/4002".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_peer_fails() {
        let harness = Harness::new();
        let facade = harness.gateway.facade();

        let err = facade.resolve_address("QmNobody").await.unwrap_err();
        assert_eq!(facade.client_error(&err).status, 502);
        assert!(facade.connect_peer("QmNobody").await.is_err());
        assert!(facade.ping_peer("QmNobody").await.is_err());
    }

    #[tokio::test]
    async fn test_connect_and_ping() {
        let harness = Harness::new();
        harness.dht.add_peer(provider("QmFar"));
        harness
            .dht
            .add_reachable("/ip4/192.168.1.5/tcp/4001/p2p/QmFar");
        harness.dht.set_latency("QmFar", 42);
        let facade = harness.gateway.facade();

        let record = facade.connect_peer("QmFar").await.unwrap();
        assert_eq!(record, provider("QmFar"));
        assert_eq!(facade.ping_peer("QmFar").await.unwrap(), 42);
        assert_eq!(facade.all_peers(), vec![provider("QmFar")]);
    }

    // =========================================================================
    // ANNOUNCING
    // =========================================================================

    #[tokio::test]
    async fn test_open_announces_root() {
        let harness = Harness::new();
        harness.gateway.start();
        let facade = harness.gateway.facade();
        facade.open("public", &create(DbKind::Keyvalue)).await.unwrap();
        let root = facade.handle("public").unwrap().address().root.clone();

        timeout(Duration::from_secs(1), async {
            while !harness.dht.provided().contains(&root) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        harness.gateway.shutdown().await;
    }

    #[tokio::test]
    async fn test_periodic_announce_respects_mode() {
        let disabled = GatewayConfig {
            announce_dbs: true,
            dht_enabled: false,
            ..GatewayConfig::for_testing()
        };
        let harness = Harness::with(InMemoryStore::new(), disabled);
        assert!(!harness.gateway.announcer().is_periodic());

        let enabled = GatewayConfig {
            announce_dbs: true,
            ..GatewayConfig::for_testing()
        };
        let harness = Harness::with(InMemoryStore::new(), enabled);
        assert!(harness.gateway.announcer().is_periodic());
        harness
            .gateway
            .facade()
            .open("a", &create(DbKind::Keyvalue))
            .await
            .unwrap();
        harness.gateway.start();

        timeout(Duration::from_secs(2), async {
            while harness.dht.provide_calls() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        harness.gateway.shutdown().await;
    }
}
