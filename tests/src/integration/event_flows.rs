//! # Event Flows
//!
//! Client event streams over database and manager emitters.
//!
//! ## Properties
//!
//! 1. Unknown event names never register anything.
//! 2. Teardown happens once per subscription no matter how many signal
//!    paths fire.
//! 3. Closing a database ends every stream subscribed to it.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{create, Harness};
    use og_bus::StreamEvent;
    use og_session_core::{
        DatabaseApi, EventStreamApi, GatewayError, SubscriptionState,
    };
    use og_types::DbKind;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    async fn next(rx: &mut mpsc::Receiver<StreamEvent>) -> StreamEvent {
        loop {
            let frame = timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("frame in time")
                .expect("stream open");
            if !frame.is_keep_alive() {
                return frame;
            }
        }
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    #[tokio::test]
    async fn test_unknown_names_never_register() {
        let harness = Harness::new();
        let facade = harness.gateway.facade();
        facade.open("kv", &create(DbKind::Keyvalue)).await.unwrap();
        let mut listener = facade.handle("kv").unwrap().events().listen();
        let listeners_before = facade.handle("kv").unwrap().events().listener_count();

        for names in ["bogus", "write,bogus", "peers.found", "", "Write"] {
            let (tx, mut rx) = mpsc::channel(8);
            let err = facade.subscribe_db("kv", names, tx).await.err().unwrap();
            assert!(matches!(err, GatewayError::InvalidEvent(_)), "{names}");
            assert!(rx.recv().await.is_none(), "no frame for {names}");
        }
        assert_eq!(
            facade.handle("kv").unwrap().events().listener_count(),
            listeners_before
        );
        assert!(listener.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_event_detail_is_debug_gated() {
        let debug = Harness::new();
        let (tx, _rx) = mpsc::channel(8);
        let err = debug
            .gateway
            .facade()
            .subscribe_manager("nope", tx)
            .await
            .err()
            .unwrap();
        assert!(debug.gateway.facade().client_error(&err).message.contains("nope"));

        let quiet = Harness::with(
            og_session_core::InMemoryStore::new(),
            og_session_core::GatewayConfig {
                api_debug: false,
                ..og_session_core::GatewayConfig::for_testing()
            },
        );
        let client = quiet.gateway.facade().client_error(&err);
        assert_eq!(client.status, 400);
        assert!(!client.message.contains("nope"));
    }

    #[tokio::test]
    async fn test_write_frames_forwarded() {
        let harness = Harness::new();
        let facade = harness.gateway.facade();
        facade.open("log", &create(DbKind::Log)).await.unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let registration = facade.subscribe_db("log", " write ", tx).await.unwrap();

        let registered = next(&mut rx).await;
        assert_eq!(registered.event, "registered");
        assert_eq!(registered.data, Some(json!({"events": ["write"]})));

        let hash = facade.add("log", json!({"msg": "hi"})).await.unwrap();
        let frame = next(&mut rx).await;
        assert_eq!(frame.event, "write");
        assert_eq!(frame.data.unwrap()["hash"], json!(hash));

        assert!(registration
            .subscriptions()
            .iter()
            .all(|sub| sub.state() == SubscriptionState::Active));
        assert!(registration.disconnect());
        registration.closed().await;
    }

    // =========================================================================
    // SCENARIO: write,closed then close
    // =========================================================================

    #[tokio::test]
    async fn test_close_fires_closed_once_and_tears_down() {
        let harness = Harness::new();
        let facade = harness.gateway.facade();
        facade.open("notes", &create(DbKind::Keyvalue)).await.unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let registration = facade
            .subscribe_db("notes", "write,closed", tx)
            .await
            .unwrap();
        assert_eq!(next(&mut rx).await.event, "registered");

        facade.close("notes").await.unwrap();
        timeout(Duration::from_secs(2), registration.closed())
            .await
            .unwrap();

        let mut closed_frames = 0;
        while let Ok(frame) = rx.try_recv() {
            if frame.event == "closed" {
                closed_frames += 1;
            }
        }
        assert_eq!(closed_frames, 1);
        assert!(registration.is_torn_down());
        assert_eq!(registration.teardown_count(), 2);

        registration.disconnect();
        registration.disconnect();
        assert_eq!(registration.teardown_count(), 2);
        assert!(registration
            .subscriptions()
            .iter()
            .all(|sub| sub.state() == SubscriptionState::TornDown));
    }

    // =========================================================================
    // IDEMPOTENT TEARDOWN
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_disconnect_tears_down_once() {
        let harness = Harness::new();
        let facade = harness.gateway.facade();
        facade.open("kv", &create(DbKind::Keyvalue)).await.unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let registration = Arc::new(
            facade
                .subscribe_db("kv", "write,replicated,peer", tx)
                .await
                .unwrap(),
        );
        assert_eq!(next(&mut rx).await.event, "registered");

        let signals: Vec<_> = (0..4)
            .map(|_| {
                let registration = Arc::clone(&registration);
                tokio::spawn(async move { registration.disconnect() })
            })
            .collect();
        drop(rx);

        let mut fired = 0;
        for signal in signals {
            if signal.await.unwrap() {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);

        timeout(Duration::from_secs(2), registration.closed())
            .await
            .unwrap();
        assert_eq!(registration.teardown_count(), 3);
    }

    #[tokio::test]
    async fn test_dropped_client_detaches_listeners() {
        let harness = Harness::new();
        let facade = harness.gateway.facade();
        facade.open("kv", &create(DbKind::Keyvalue)).await.unwrap();
        let events = facade.handle("kv").unwrap().events().clone();
        let baseline = events.listener_count();

        let (tx, rx) = mpsc::channel(16);
        let registration = facade.subscribe_db("kv", "write", tx).await.unwrap();
        assert_eq!(events.listener_count(), baseline + 1);

        drop(rx);
        timeout(Duration::from_secs(2), registration.closed())
            .await
            .unwrap();
        assert_eq!(events.listener_count(), baseline);
    }

    // =========================================================================
    // KEEP-ALIVE AND MANAGER STREAMS
    // =========================================================================

    #[tokio::test]
    async fn test_idle_stream_gets_keep_alives() {
        let harness = Harness::new();
        let facade = harness.gateway.facade();
        facade.open("kv", &create(DbKind::Keyvalue)).await.unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let _registration = facade.subscribe_db("kv", "replicated", tx).await.unwrap();

        rx.recv().await.unwrap();
        let frame = timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(frame.is_keep_alive());
    }

    #[tokio::test]
    async fn test_manager_stream_reports_open_sequence() {
        let harness = Harness::new();
        let facade = harness.gateway.facade();
        let (tx, mut rx) = mpsc::channel(16);
        let registration = facade
            .subscribe_manager("open,load,ready", tx)
            .await
            .unwrap();
        assert_eq!(next(&mut rx).await.event, "registered");

        facade.open("kv", &create(DbKind::Keyvalue)).await.unwrap();
        let mut names = Vec::new();
        for _ in 0..3 {
            names.push(next(&mut rx).await.event);
        }
        names.sort();
        assert_eq!(names, vec!["orbitdb.load", "orbitdb.open", "orbitdb.ready"]);
        registration.disconnect();
    }
}
