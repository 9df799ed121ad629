//! Creates a logical-replication subscription (SPEC_FULL.md §4): the one
//! creator whose target relation is cluster-wide rather than per-database
//! (spec §4.3 `is_shared_relation`), so it must open its
//! [`crate::access::CatalogAccessor`] handle without a database-scoped lock
//! tag. Grounded on the teacher's `catalog/mod.rs` single-row creators,
//! generalized onto the shared-catalog case spec §9 calls out as needing a
//! worked example.

use crate::access::CatalogAccessor;
use crate::classify::is_shared_relation;
use crate::depend::{DependencyKind, DependencyRecorder};
use crate::error::CatalogError;
use crate::event_trigger::EventTriggerCore;
use crate::lock::LockMode;
use crate::object::ObjectAddress;
use crate::oid::{IdAllocator, Oid, OidIndexProbe};
use crate::session::TransactionId;
use crate::store::Relation;
use std::sync::Arc;

/// Class OID of `pg_subscription`; present in
/// [`crate::classify::SHARED_RELATION_OIDS`] — a subscription is
/// cluster-wide metadata, not per-database.
pub const SUBSCRIPTION_CLASS_OID: Oid = Oid(6_100);

#[derive(Debug, Clone)]
pub struct SubscriptionSpec {
    pub name: String,
    pub owner: ObjectAddress,
    pub connection_string: String,
    pub publications: Vec<String>,
}

pub struct SubscriptionMgr;

impl SubscriptionMgr {
    /// The lock mode a subscription creation needs on `pg_subscription`
    /// itself: `ShareRowExclusive`, since two sessions concurrently creating
    /// distinct subscriptions must still serialize on the shared catalog
    /// (unlike per-database creators, which only need `RowExclusive`
    /// because no other database's session can contend).
    pub const LOCK_MODE: LockMode = LockMode::ShareRowExclusive;

    pub fn create(
        spec: &SubscriptionSpec,
        id_allocator: &IdAllocator,
        subscription_oid_index: &impl OidIndexProbe,
        subscription_catalog: &Arc<Relation>,
        xid: TransactionId,
        depend: &mut DependencyRecorder,
        events: &mut EventTriggerCore,
    ) -> Result<Oid, CatalogError> {
        debug_assert!(
            is_shared_relation(SUBSCRIPTION_CLASS_OID),
            "pg_subscription must be classified as a shared relation"
        );

        if spec.name.is_empty() {
            return Err(CatalogError::SyntaxError("subscription must be named".to_string()));
        }
        if spec.connection_string.trim().is_empty() {
            return Err(CatalogError::SyntaxError(
                "subscription requires a non-empty connection string".to_string(),
            ));
        }
        if spec.publications.is_empty() {
            return Err(CatalogError::InvalidFunctionDefinition(
                "subscription must subscribe to at least one publication".to_string(),
            ));
        }

        let subscription_oid = id_allocator.new_oid_for(subscription_oid_index);
        let address = ObjectAddress::whole(SUBSCRIPTION_CLASS_OID, subscription_oid);

        let handle = CatalogAccessor::open(subscription_catalog.clone(), Self::LOCK_MODE);
        let tuple = CatalogAccessor::form_tuple(vec![
            serde_json::json!(spec.name),
            serde_json::json!(spec.connection_string),
            serde_json::json!(spec.publications),
        ]);
        CatalogAccessor::insert(&handle, Some(subscription_oid), tuple, xid);
        CatalogAccessor::close(handle, true);

        depend.record_on_owner(address, spec.owner);
        depend.record(address, spec.owner, DependencyKind::Normal);

        events.collect_simple("CREATE SUBSCRIPTION", vec![address], false);

        Ok(subscription_oid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysFree;
    impl OidIndexProbe for AlwaysFree {
        fn probe(&self, _oid: Oid) -> bool {
            false
        }
    }

    fn subscription_catalog() -> Arc<Relation> {
        Arc::new(Relation::new(SUBSCRIPTION_CLASS_OID, SubscriptionMgr::LOCK_MODE, Some(0)))
    }

    #[test]
    fn target_relation_is_classified_shared() {
        assert!(is_shared_relation(SUBSCRIPTION_CLASS_OID));
    }

    #[test]
    fn rejects_subscription_with_no_publications() {
        let id_allocator = IdAllocator::default();
        let mut depend = DependencyRecorder::new();
        let mut events = EventTriggerCore::new(true);
        events.begin_query();
        let spec = SubscriptionSpec {
            name: "sub1".to_string(),
            owner: ObjectAddress::whole(Oid(1260), Oid(10)),
            connection_string: "host=replica".to_string(),
            publications: vec![],
        };
        let result = SubscriptionMgr::create(&spec, &id_allocator, &AlwaysFree, &subscription_catalog(), 1, &mut depend, &mut events);
        assert!(result.is_err());
    }

    #[test]
    fn valid_subscription_records_owner() {
        let id_allocator = IdAllocator::default();
        let mut depend = DependencyRecorder::new();
        let mut events = EventTriggerCore::new(true);
        events.begin_query();
        let owner = ObjectAddress::whole(Oid(1260), Oid(10));
        let spec = SubscriptionSpec {
            name: "sub1".to_string(),
            owner,
            connection_string: "host=replica".to_string(),
            publications: vec!["pub1".to_string()],
        };
        let oid = SubscriptionMgr::create(&spec, &id_allocator, &AlwaysFree, &subscription_catalog(), 1, &mut depend, &mut events).unwrap();
        let address = ObjectAddress::whole(SUBSCRIPTION_CLASS_OID, oid);
        assert_eq!(depend.owner_of(address), Some(owner));
    }
}
