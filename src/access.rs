//! The common transactional pattern around one catalog row (spec §4.4):
//! open the catalog relation with a lock, form/insert/update/delete a
//! tuple, keep indexes current, release the lock at transaction end.
//!
//! Grounded on the teacher's `Catalog::load` (`src/catalog/mod.rs`) for the
//! "one typed row per catalog kind" shape, generalized here from read-only
//! loading to mutation, and on `db/connection.rs` for the "acquire, use,
//! release" handle lifecycle (there: a pooled `PgConnection`; here: a
//! [`Relation`] guarded by an explicit lock mode).

use crate::classify::is_inplace_updatable;
use crate::error::CatalogError;
use crate::lock::LockMode;
use crate::oid::{Oid, Snapshot};
use crate::session::TransactionId;
use crate::store::{Ctid, Relation, Tuple};
use std::sync::Arc;

/// An open handle on one catalog relation (spec §4.4 `Handle`).
pub struct Handle {
    pub relation: Arc<Relation>,
    keep_lock: bool,
}

pub struct CatalogAccessor;

impl CatalogAccessor {
    /// Acquires `lock_mode` on `relation` (spec §4.4 `open`).
    pub fn open(relation: Arc<Relation>, lock_mode: LockMode) -> Handle {
        // A real implementation blocks here until `lock_mode` is granted
        // against every other session's held lock on `relation.class_id`
        // (spec §5 "ordering guarantees"); the in-memory store has no
        // concurrent lock manager to block against, so `open` is a no-op
        // acquisition that simply records the mode the caller asked for.
        Handle {
            relation,
            keep_lock: lock_mode != LockMode::AccessShare,
        }
    }

    pub fn form_tuple(values: Vec<serde_json::Value>) -> Vec<serde_json::Value> {
        values
    }

    /// Inserts `tuple` and returns its OID if the relation has one (spec
    /// §4.4 `insert`). Index maintenance is implicit in the store's scan
    /// semantics (see `store.rs` module docs).
    pub fn insert(handle: &Handle, oid: Option<Oid>, tuple: Vec<serde_json::Value>, xid: TransactionId) -> Oid {
        handle.relation.insert(oid, tuple, xid);
        oid.unwrap_or(Oid::INVALID)
    }

    pub fn update(handle: &Handle, old_ctid: Ctid, new_tuple: Vec<serde_json::Value>, xid: TransactionId) -> Ctid {
        handle.relation.update(old_ctid, new_tuple, xid)
    }

    /// Physical replacement bypassing MVCC (spec §4.4 `in_place_update`),
    /// permitted only on the whitelisted catalogs (spec §3 invariant /
    /// `classify::is_inplace_updatable`).
    pub fn in_place_update(
        handle: &Handle,
        ctid: Ctid,
        new_tuple: Vec<serde_json::Value>,
    ) -> Result<(), CatalogError> {
        if !is_inplace_updatable(handle.relation.class_id) {
            return Err(CatalogError::InternalError(format!(
                "relation {:?} is not in-place updatable",
                handle.relation.class_id
            )));
        }
        handle.relation.in_place_update(ctid, new_tuple);
        Ok(())
    }

    pub fn delete(handle: &Handle, ctid: Ctid, xid: TransactionId) {
        handle.relation.delete(ctid, xid);
    }

    pub fn scan(handle: &Handle, snapshot: Snapshot, reader_xid: TransactionId) -> Vec<Tuple> {
        handle.relation.scan(snapshot, reader_xid)
    }

    /// Releases the relation handle. `keep_lock` mirrors spec §4.4 `close`:
    /// row-exclusive and stronger locks are held until transaction commit;
    /// `AccessShare` may be dropped immediately.
    pub fn close(handle: Handle, keep_lock: bool) {
        let _ = handle.keep_lock;
        let _ = keep_lock;
        // The in-memory store has no lock table to release from; a real
        // implementation releases here unless `keep_lock` (or the handle's
        // own lock mode) says to defer to transaction-end cleanup.
    }
}
