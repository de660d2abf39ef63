//! # Access Flows
//!
//! Write-list resolution and `canAppend`.
//!
//! ## Properties
//!
//! 1. `canAppend` is true iff the local identity is in the write list,
//!    whichever of the keyed, set or array forms the controller exposes.
//! 2. The write list is resolved from the first source the controller
//!    offers: direct field, `get("write")`, creation options.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{create, Harness};
    use async_trait::async_trait;
    use og_session_core::{
        AccessController, AccessList, ControllerKind, DatabaseApi, GatewayConfig, GatewayError,
        InMemoryStore, ReplicatedStore, StoreError, StoreHandle,
    };
    use og_types::{DbKind, DbOptions};
    use serde_json::json;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Arc;

    /// Store that opens real databases but reports another identity.
    struct ForeignIdentity(InMemoryStore);

    #[async_trait]
    impl ReplicatedStore for ForeignIdentity {
        async fn open(
            &self,
            name: &str,
            kind: &DbKind,
            options: &DbOptions,
        ) -> Result<Arc<dyn StoreHandle>, StoreError> {
            self.0.open(name, kind, options).await
        }

        fn identity(&self) -> String {
            "stranger".to_string()
        }
    }

    /// Controller exposing its list through one chosen source.
    struct Shaped {
        field: Option<AccessList>,
        role: Option<AccessList>,
        options: Option<AccessList>,
    }

    #[async_trait]
    impl AccessController for Shaped {
        fn controller_type(&self) -> Option<&str> {
            None
        }

        fn write_field(&self) -> Option<AccessList> {
            self.field.clone()
        }

        fn get(&self, role: &str) -> Option<AccessList> {
            (role == "write").then(|| self.role.clone()).flatten()
        }

        fn options_write(&self) -> Option<AccessList> {
            self.options.clone()
        }

        async fn grant(&self, _role: &str, _id: &str) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    fn keyed(ids: &[&str]) -> AccessList {
        AccessList::Keyed(
            ids.iter()
                .map(|id| (id.to_string(), json!({"grantedAt": 0})))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    fn set(ids: &[&str]) -> AccessList {
        AccessList::Set(ids.iter().map(|id| id.to_string()).collect::<BTreeSet<_>>())
    }

    fn array(ids: &[&str]) -> AccessList {
        AccessList::Array(ids.iter().map(|id| id.to_string()).collect())
    }

    // =========================================================================
    // MEMBERSHIP
    // =========================================================================

    #[test]
    fn test_membership_across_representations() {
        for list in [keyed(&["me"]), set(&["me"]), array(&["me"])] {
            assert!(list.permits("me"), "{list:?}");
            assert!(!list.permits("you"), "{list:?}");
        }
        assert!(!AccessList::Unavailable.permits("me"));
        assert!(array(&["*"]).is_open());
    }

    #[test]
    fn test_resolution_order() {
        let all = Shaped {
            field: Some(array(&["field"])),
            role: Some(set(&["role"])),
            options: Some(keyed(&["options"])),
        };
        assert!(AccessList::resolve(&all).permits("field"));

        let no_field = Shaped {
            field: None,
            role: Some(set(&["role"])),
            options: Some(keyed(&["options"])),
        };
        assert!(AccessList::resolve(&no_field).permits("role"));

        let options_only = Shaped {
            field: None,
            role: None,
            options: Some(keyed(&["options"])),
        };
        assert!(AccessList::resolve(&options_only).permits("options"));

        let nothing = Shaped {
            field: None,
            role: None,
            options: None,
        };
        assert_eq!(AccessList::resolve(&nothing), AccessList::Unavailable);
    }

    // =========================================================================
    // canAppend THROUGH THE FACADE
    // =========================================================================

    #[tokio::test]
    async fn test_can_append_for_local_identity() {
        for controller in [ControllerKind::Ipfs, ControllerKind::OrbitDb] {
            let store = InMemoryStore::with_identity("me").with_controller(controller);
            let harness = Harness::with(store, GatewayConfig::for_testing());
            let info = harness
                .gateway
                .facade()
                .open("kv", &create(DbKind::Keyvalue))
                .await
                .unwrap();
            assert!(info.can_append, "{controller:?}");
            assert_eq!(harness.gateway.facade().identity(), "me");
        }
    }

    #[tokio::test]
    async fn test_can_append_false_for_foreign_identity() {
        let store = Arc::new(ForeignIdentity(InMemoryStore::with_identity("me")));
        let gateway = og_session_core::Gateway::new(
            GatewayConfig::for_testing(),
            store,
            Arc::new(og_session_core::MockDht::new()),
            Arc::new(og_session_core::SystemTimeSource),
        );
        let info = gateway
            .facade()
            .open("kv", &create(DbKind::Keyvalue))
            .await
            .unwrap();
        assert!(!info.can_append);
        assert!(info.write.permits("me"));
    }

    #[tokio::test]
    async fn test_grant_makes_identity_writer() {
        let store = InMemoryStore::with_identity("me").with_controller(ControllerKind::OrbitDb);
        let harness = Harness::with(store, GatewayConfig::for_testing());
        let facade = harness.gateway.facade();
        facade.open("kv", &create(DbKind::Keyvalue)).await.unwrap();

        assert!(!facade.write_list("kv").unwrap().permits("friend"));
        facade.grant_write("kv", "friend").await.unwrap();
        assert!(facade.write_list("kv").unwrap().permits("friend"));
    }

    #[tokio::test]
    async fn test_immutable_controller_refuses_grant() {
        let harness = Harness::new();
        let facade = harness.gateway.facade();
        facade.open("kv", &create(DbKind::Keyvalue)).await.unwrap();

        let err = facade.grant_write("kv", "friend").await.unwrap_err();
        assert_eq!(err, GatewayError::AccessGrantUnsupported);
        assert_eq!(facade.client_error(&err).status, 501);
    }

    #[tokio::test]
    async fn test_write_list_serializes_by_shape() {
        let harness = Harness::new();
        let facade = harness.gateway.facade();
        let info = facade.open("kv", &create(DbKind::Keyvalue)).await.unwrap();

        let body = serde_json::to_value(&info).unwrap();
        assert_eq!(body["canAppend"], json!(true));
        assert_eq!(body["accessControllerType"], json!("ipfs"));
        assert!(body["write"].is_array());
        assert_eq!(body["type"], json!("keyvalue"));
    }
}
