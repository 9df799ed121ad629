//! Creates and appends to large objects (SPEC_FULL.md §4, supplementing
//! spec.md's object creators with the one catalog kind spec §4.3 singles out
//! by name as a pinned-range exception). Grounded on the teacher's
//! `catalog/mod.rs` "one typed row, one OID" shape and on
//! [`crate::classify::LARGE_OBJECT_METADATA_OID`], the exact OID this module
//! must allocate into.

use crate::access::CatalogAccessor;
use crate::classify::{is_pinned, LARGE_OBJECT_METADATA_OID};
use crate::depend::DependencyRecorder;
use crate::error::CatalogError;
use crate::event_trigger::EventTriggerCore;
use crate::lock::LockMode;
use crate::object::ObjectAddress;
use crate::oid::{IdAllocator, Oid, OidIndexProbe};
use crate::session::TransactionId;
use crate::store::Relation;
use std::sync::Arc;

/// Class OID of `pg_largeobject_metadata` (spec §4.3 pinned exception).
pub const LARGE_OBJECT_METADATA_CLASS_OID: Oid = Oid(LARGE_OBJECT_METADATA_OID);
/// Class OID of the chunk-storage relation backing every large object.
pub const LARGE_OBJECT_DATA_CLASS_OID: Oid = Oid(2_614);

pub const LARGE_OBJECT_CHUNK_SIZE: usize = 2_048;

pub struct LargeObjectMgr;

impl LargeObjectMgr {
    /// Allocates a new large object's OID (from the same pinned-exception
    /// namespace the classifier reserves for it), writes its metadata row
    /// and first chunk, records the owner dependency, and posts a
    /// post-create event.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        owner: ObjectAddress,
        first_chunk: &[u8],
        id_allocator: &IdAllocator,
        lo_oid_index: &impl OidIndexProbe,
        metadata_catalog: &Arc<Relation>,
        data_catalog: &Arc<Relation>,
        xid: TransactionId,
        depend: &mut DependencyRecorder,
        events: &mut EventTriggerCore,
    ) -> Oid {
        let lo_oid = id_allocator.new_oid_for(lo_oid_index);
        debug_assert!(
            !is_pinned(LARGE_OBJECT_METADATA_CLASS_OID, lo_oid) || lo_oid.0 == LARGE_OBJECT_METADATA_OID,
            "large object OIDs fall in the classifier's named pinned exception, not the pinned range proper"
        );

        let address = ObjectAddress::whole(LARGE_OBJECT_METADATA_CLASS_OID, lo_oid);

        let metadata_handle = CatalogAccessor::open(metadata_catalog.clone(), LockMode::RowExclusive);
        let metadata_tuple = CatalogAccessor::form_tuple(vec![serde_json::json!(lo_oid.0)]);
        CatalogAccessor::insert(&metadata_handle, Some(lo_oid), metadata_tuple, xid);
        CatalogAccessor::close(metadata_handle, true);

        depend.record_on_owner(address, owner);

        Self::append(lo_oid, first_chunk, data_catalog, 0, xid);

        events.collect_simple("CREATE LARGE OBJECT", vec![address], false);

        lo_oid
    }

    /// Appends `data` as however many `LARGE_OBJECT_CHUNK_SIZE`-byte chunks
    /// it takes, writing each one into `data_catalog` starting at
    /// `start_page`, and returns the number of chunks written.
    pub fn append(lo_oid: Oid, data: &[u8], data_catalog: &Arc<Relation>, start_page: i32, xid: TransactionId) -> usize {
        let handle = CatalogAccessor::open(data_catalog.clone(), LockMode::RowExclusive);
        let mut written = 0;
        for (i, chunk) in data.chunks(LARGE_OBJECT_CHUNK_SIZE).enumerate() {
            let page = start_page + i as i32;
            let tuple = CatalogAccessor::form_tuple(vec![
                serde_json::json!(lo_oid.0),
                serde_json::json!(page),
                serde_json::json!(chunk),
            ]);
            CatalogAccessor::insert(&handle, None, tuple, xid);
            written += 1;
        }
        CatalogAccessor::close(handle, true);
        written
    }
}
