//! # Handle Flows
//!
//! Opening, sharing and closing database handles through the facade.
//!
//! ## Properties
//!
//! 1. N concurrent opens of a new key call the store once and resolve to
//!    the same handle.
//! 2. Close followed by open performs a fresh open.
//! 3. A database reached by two keys is cached once.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{create, Harness};
    use og_session_core::{DatabaseApi, GatewayError, OpenParams, StoreHandle};
    use og_types::DbKind;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    // =========================================================================
    // SINGLE-FLIGHT OPENS
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_opens_share_one_handle() {
        let harness = Arc::new(Harness::new());
        harness.store.set_open_delay(Duration::from_millis(40));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let harness = Arc::clone(&harness);
                tokio::spawn(async move {
                    harness
                        .gateway
                        .cache()
                        .get("notes", &create(DbKind::Keyvalue))
                        .await
                        .map_err(|e| e.to_string())
                })
            })
            .collect();

        let mut handles: Vec<Arc<dyn StoreHandle>> = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap().unwrap());
        }

        assert_eq!(harness.store.open_calls(), 1);
        assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
        assert_eq!(harness.gateway.cache().pending_opens(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_facade_opens_project_same_id() {
        let harness = Arc::new(Harness::new());
        harness.store.set_open_delay(Duration::from_millis(20));

        let a = {
            let harness = Arc::clone(&harness);
            tokio::spawn(async move {
                harness
                    .gateway
                    .facade()
                    .open("notes", &create(DbKind::Keyvalue))
                    .await
            })
        };
        let b = {
            let harness = Arc::clone(&harness);
            tokio::spawn(async move {
                harness
                    .gateway
                    .facade()
                    .open("notes", &create(DbKind::Keyvalue))
                    .await
            })
        };

        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());
        assert_eq!(a.id, b.id);
        assert_eq!(harness.store.open_calls(), 1);
    }

    // =========================================================================
    // SCENARIO: keyvalue put / get
    // =========================================================================

    #[tokio::test]
    async fn test_notes_put_then_get() -> anyhow::Result<()> {
        let harness = Harness::new();
        let facade = harness.gateway.facade();
        facade.open("notes", &create(DbKind::Keyvalue)).await?;

        let hash = facade.put("notes", json!({"key": "a", "value": "1"})).await?;
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(facade.get_entry("notes", "a")?, json!("1"));
        Ok(())
    }

    // =========================================================================
    // CLOSE / REOPEN
    // =========================================================================

    #[tokio::test]
    async fn test_close_then_open_reopens() -> anyhow::Result<()> {
        let harness = Harness::new();
        let facade = harness.gateway.facade();
        let params = create(DbKind::Log);

        let first = facade.open("journal", &params).await?;
        facade.add("journal", json!("entry")).await?;
        facade.close("journal").await?;
        assert!(facade.info("journal").is_none());

        let second = facade.open("journal", &params).await?;
        assert_eq!(harness.store.open_calls(), 2);
        assert_eq!(first.id, second.id);
        assert_eq!(second.index_length, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_close_accepts_id_and_compound_key() -> anyhow::Result<()> {
        let harness = Harness::new();
        let facade = harness.gateway.facade();
        let info = facade.open("a", &create(DbKind::Keyvalue)).await?;
        facade.close(&info.id).await?;
        assert!(harness.gateway.cache().is_empty());

        facade.open("b", &create(DbKind::Keyvalue)).await?;
        let compound = facade.handle("b")?.address().compound_key();
        facade.close(&compound).await?;
        assert!(harness.gateway.cache().is_empty());
        assert_eq!(harness.store.close_calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_alias_dedupes_by_canonical_id() -> anyhow::Result<()> {
        let harness = Harness::new();
        let facade = harness.gateway.facade();
        let original = facade.open("primary", &create(DbKind::Keyvalue)).await?;
        harness.store.alias("secondary", "primary");

        let aliased = facade.open("secondary", &OpenParams::default()).await?;
        assert_eq!(aliased.id, original.id);
        assert_eq!(aliased.dbname, "primary");
        assert_eq!(facade.list().len(), 1);
        assert_eq!(harness.store.close_calls(), 1);
        Ok(())
    }

    // =========================================================================
    // FAILURES
    // =========================================================================

    #[tokio::test]
    async fn test_open_without_create_fails_and_clears() {
        let harness = Harness::new();
        let facade = harness.gateway.facade();

        let err = facade
            .open("ghost", &OpenParams::of_kind(DbKind::Keyvalue))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::OpenFailure { .. }));
        assert_eq!(facade.client_error(&err).status, 500);
        assert_eq!(harness.gateway.cache().pending_opens(), 0);

        assert!(facade
            .open("ghost", &create(DbKind::Keyvalue))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_operations_on_unknown_db_are_not_found() {
        let harness = Harness::new();
        let facade = harness.gateway.facade();

        let err = facade.put("nope", json!({"a": 1})).await.unwrap_err();
        assert_eq!(err, GatewayError::NotFound("nope".into()));
        assert_eq!(facade.client_error(&err).status, 404);
    }

    #[tokio::test]
    async fn test_shutdown_closes_all() {
        let harness = Harness::new();
        harness.gateway.start();
        let facade = harness.gateway.facade();
        for name in ["a", "b", "c"] {
            facade.open(name, &create(DbKind::Counter)).await.unwrap();
        }

        assert_eq!(harness.gateway.shutdown().await, 3);
        assert!(facade.list().is_empty());
    }
}
