//! A minimal in-memory transactional relation store.
//!
//! spec §1 excludes the on-disk page format, WAL encoding, and vacuum's
//! heuristics, describing [`crate::access::CatalogAccessor`] only by
//! contract (spec §4.4) and delegating "retirement of dead tuples and WAL
//! logging" to "the storage-engine collaborator". This module *is* that
//! collaborator's minimal stand-in: tuples tagged with inserting/deleting
//! transaction ids (exactly the MVCC bookkeeping spec §4.1's "rationale"
//! paragraph reasons about), queried under one of the three snapshot
//! policies of §4.4/§4.1. It exists so the rest of the crate is callable and
//! testable without a live server; it is not a page/WAL engine.
//!
//! Grounded on the teacher's own typed-row catalog model
//! (`catalog/mod.rs::Catalog`), generalized from "load once from a live
//! connection" to "mutate in place under MVCC-like visibility".

use crate::lock::LockMode;
use crate::oid::{Oid, OidIndexProbe, Snapshot};
use crate::session::TransactionId;
use std::collections::BTreeMap;
use std::sync::RwLock;

pub type Ctid = u64;

#[derive(Debug, Clone)]
pub struct Tuple {
    pub ctid: Ctid,
    pub oid: Option<Oid>,
    pub values: Vec<serde_json::Value>,
    pub xmin: TransactionId,
    /// `None` while live; set to the deleting transaction's id on delete.
    pub xmax: Option<TransactionId>,
    /// Transactions that have committed by the time a snapshot is taken are
    /// tracked externally by [`Relation::committed`]; this flag lets
    /// `SeeEverything` distinguish "deleted, but not yet committed as dead"
    /// from "committed dead", matching spec §4.1's rationale that a merely
    /// dirty delete must still collide.
    pub xmax_committed: bool,
}

/// One open catalog relation handle (spec §4.4 `open`/`close`).
pub struct Relation {
    pub class_id: Oid,
    pub lock_mode: LockMode,
    pub oid_column_index: Option<usize>,
    tuples: RwLock<BTreeMap<Ctid, Tuple>>,
    next_ctid: std::sync::atomic::AtomicU64,
    /// Transaction ids known to have committed. A tuple whose `xmin` is not
    /// in this set (and isn't the caller's own transaction) is "uncommitted"
    /// and, under `SeeEverything`, still counts as present; a tuple whose
    /// `xmax` is in this set is truly dead and, under `SeeEverything`, is
    /// treated as absent (spec §4.1 rationale paragraph).
    committed: RwLock<std::collections::HashSet<TransactionId>>,
}

impl Relation {
    pub fn new(class_id: Oid, lock_mode: LockMode, oid_column_index: Option<usize>) -> Self {
        Self {
            class_id,
            lock_mode,
            oid_column_index,
            tuples: RwLock::new(BTreeMap::new()),
            next_ctid: std::sync::atomic::AtomicU64::new(1),
            committed: RwLock::new(std::collections::HashSet::new()),
        }
    }

    pub fn mark_committed(&self, xid: TransactionId) {
        self.committed.write().unwrap().insert(xid);
    }

    fn is_committed(&self, xid: TransactionId) -> bool {
        self.committed.read().unwrap().contains(&xid)
    }

    /// Inserts a tuple, assigning it the relation's next ctid, and updates
    /// the OID "index" implicitly (the store always scans by ctid order,
    /// so there is nothing separate to keep in sync — spec §4.4 still
    /// requires the *contract* that indexes stay current, which the
    /// `probe`/`scan` methods below honor by always reading live state).
    pub fn insert(&self, oid: Option<Oid>, values: Vec<serde_json::Value>, xid: TransactionId) -> Ctid {
        let ctid = self.next_ctid.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let tuple = Tuple {
            ctid,
            oid,
            values,
            xmin: xid,
            xmax: None,
            xmax_committed: false,
        };
        self.tuples.write().unwrap().insert(ctid, tuple);
        ctid
    }

    pub fn update(&self, old_ctid: Ctid, new_values: Vec<serde_json::Value>, xid: TransactionId) -> Ctid {
        let oid = {
            let mut tuples = self.tuples.write().unwrap();
            let old = tuples.get_mut(&old_ctid).expect("update of missing ctid");
            old.xmax = Some(xid);
            old.oid
        };
        self.insert(oid, new_values, xid)
    }

    /// Physical replacement that bypasses MVCC (spec §4.4 `in_place_update`).
    /// Caller is responsible for having checked
    /// `classify::is_inplace_updatable` first.
    pub fn in_place_update(&self, ctid: Ctid, new_values: Vec<serde_json::Value>) {
        let mut tuples = self.tuples.write().unwrap();
        let tuple = tuples.get_mut(&ctid).expect("in-place update of missing ctid");
        tuple.values = new_values;
    }

    pub fn delete(&self, ctid: Ctid, xid: TransactionId) {
        let mut tuples = self.tuples.write().unwrap();
        if let Some(t) = tuples.get_mut(&ctid) {
            t.xmax = Some(xid);
        }
    }

    /// Commits a transaction from this relation's point of view: every
    /// tuple it inserted becomes visible; every tuple it deleted becomes
    /// truly dead.
    pub fn commit(&self, xid: TransactionId) {
        self.mark_committed(xid);
        let mut tuples = self.tuples.write().unwrap();
        for t in tuples.values_mut() {
            if t.xmax == Some(xid) {
                t.xmax_committed = true;
            }
        }
    }

    fn visible(&self, tuple: &Tuple, snapshot: Snapshot, reader_xid: TransactionId) -> bool {
        match snapshot {
            Snapshot::Mvcc => {
                let inserted_visible = tuple.xmin == reader_xid || self.is_committed(tuple.xmin);
                let not_deleted = match tuple.xmax {
                    None => true,
                    Some(xmax) => !(xmax == reader_xid || self.is_committed(xmax)),
                };
                inserted_visible && not_deleted
            }
            Snapshot::SeeEverything => {
                // Exposes uncommitted inserts; only a *committed* delete
                // removes a tuple from view (spec §4.1 rationale).
                !tuple.xmax_committed
            }
            Snapshot::Catalog => {
                // Cache lookups: only ever see committed, live state.
                self.is_committed(tuple.xmin) && !tuple.xmax_committed
            }
        }
    }

    pub fn scan(&self, snapshot: Snapshot, reader_xid: TransactionId) -> Vec<Tuple> {
        self.tuples
            .read()
            .unwrap()
            .values()
            .filter(|t| self.visible(t, snapshot, reader_xid))
            .cloned()
            .collect()
    }

    /// Equality probe on the OID column under a see-everything snapshot,
    /// exactly the `new_oid_for` access pattern of spec §4.1 step 3.
    pub fn probe_oid(&self, oid: Oid, reader_xid: TransactionId) -> bool {
        self.tuples
            .read()
            .unwrap()
            .values()
            .any(|t| t.oid == Some(oid) && self.visible(t, Snapshot::SeeEverything, reader_xid))
    }
}

/// Adapts a [`Relation`] (plus the reading transaction id) to the
/// [`OidIndexProbe`] trait `IdAllocator::new_oid_for` consumes.
pub struct RelationOidProbe<'a> {
    pub relation: &'a Relation,
    pub reader_xid: TransactionId,
    pub indexes_usable: bool,
}

impl OidIndexProbe for RelationOidProbe<'_> {
    fn probe(&self, oid: Oid) -> bool {
        self.relation.probe_oid(oid, self.reader_xid)
    }

    fn indexes_usable(&self) -> bool {
        self.indexes_usable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn see_everything_exposes_uncommitted_rows() {
        let rel = Relation::new(Oid(1259), LockMode::RowExclusive, Some(0));
        rel.insert(Some(Oid(100_001)), vec![], 7);
        // transaction 7 never committed, but SeeEverything still sees it
        assert!(rel.probe_oid(Oid(100_001), 999));
    }

    #[test]
    fn committed_delete_frees_the_oid() {
        let rel = Relation::new(Oid(1259), LockMode::RowExclusive, Some(0));
        let ctid = rel.insert(Some(Oid(5)), vec![], 1);
        rel.commit(1);
        rel.delete(ctid, 2);
        rel.commit(2);
        assert!(!rel.probe_oid(Oid(5), 999));
    }

    #[test]
    fn mvcc_snapshot_hides_uncommitted_inserts_from_other_readers() {
        let rel = Relation::new(Oid(1259), LockMode::RowExclusive, Some(0));
        rel.insert(Some(Oid(5)), vec![serde_json::json!("a")], 1);
        let rows = rel.scan(Snapshot::Mvcc, 2);
        assert!(rows.is_empty());
        let own_rows = rel.scan(Snapshot::Mvcc, 1);
        assert_eq!(own_rows.len(), 1);
    }
}
