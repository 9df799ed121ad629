//! Process-wide monotonic OID counter plus per-relation uniqueness probing
//! (spec §4.1). This is the leaf of the dependency graph in spec §2's
//! component table: every other component eventually calls into here.

use std::sync::atomic::{AtomicU32, Ordering};
use tracing::warn;

/// Values below this are reserved for initdb-assigned objects (spec §3).
pub const FIRST_NORMAL_OBJECT_ID: u32 = 16_384;

/// Values below this identify pinned system objects (spec §3, invariant 1).
pub const FIRST_UNPINNED_OBJECT_ID: u32 = 12_000;

/// Every initdb-generated OID is below this (spec §3, invariant 1).
pub const FIRST_GENBKI_OBJECT_ID: u32 = 10_000;

pub const INVALID_OID: u32 = 0;

/// A 32-bit object identifier, unique within a class (spec Glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Oid(pub u32);

impl Oid {
    pub const INVALID: Oid = Oid(INVALID_OID);

    pub const fn is_valid(self) -> bool {
        self.0 != INVALID_OID
    }

    pub const fn is_pinned_range(self) -> bool {
        self.0 < FIRST_UNPINNED_OBJECT_ID
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A visibility policy for probing an OID-unique index (spec §4.1, §4.4).
///
/// `SeeEverything` is the policy `new_oid_for` uses: it exposes uncommitted
/// and recently-deleted rows so two concurrent inserters never pick the same
/// OID, but treats truly dead rows as free so a wraparound eventually
/// reclaims them. `Mvcc` and `Catalog` are the other two policies named by
/// §4.4, used by ordinary reads and cache lookups respectively; they are not
/// used by the allocator itself but are modeled here since §4.1's rationale
/// section explicitly rules them out by contrast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Snapshot {
    Mvcc,
    SeeEverything,
    Catalog,
}

/// Something `new_oid_for` can probe for an existing row keyed on `oid`.
/// Implemented by the in-memory relation store (`crate::store`); kept as a
/// trait so the allocator has no dependency on the storage representation,
/// matching the "encapsulate behind a narrow interface" guidance of §9.
pub trait OidIndexProbe {
    /// Is there a tuple whose OID column equals `oid`, visible under a
    /// see-everything snapshot? Relies on the OID-index invariant (spec §3,
    /// invariant 3): the index's first key is the OID column.
    fn probe(&self, oid: Oid) -> bool;

    /// True once bootstrap has populated enough indexes to probe; while
    /// false, `new_oid_for` degrades to `next_oid()` (spec §4.1 step 2).
    fn indexes_usable(&self) -> bool {
        true
    }
}

const RETRY_LOG_START: u64 = 1_000_000;
const RETRY_LOG_CAP: u64 = 128_000_000;

/// Process-wide monotonic OID generator (spec §4.1, §5 "Shared resources").
/// The counter is an `AtomicU32`; a single instance is meant to be shared
/// across every session in the process, the way `next_oid()` shares one
/// global counter across all backends.
pub struct IdAllocator {
    counter: AtomicU32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new(FIRST_NORMAL_OBJECT_ID)
    }
}

impl IdAllocator {
    pub const fn new(start: u32) -> Self {
        Self {
            counter: AtomicU32::new(start),
        }
    }

    /// Returns the next raw counter value, skipping the reserved low range
    /// on wraparound (spec §4.1, §8 boundary behavior). Never returns
    /// `Oid::INVALID`.
    pub fn next_oid(&self) -> Oid {
        loop {
            let prev = self.counter.fetch_add(1, Ordering::Relaxed);
            let candidate = prev.wrapping_add(1);
            if candidate >= FIRST_UNPINNED_OBJECT_ID && candidate != INVALID_OID {
                return Oid(candidate);
            }
            // Wrapped into the reserved range (or hit 0 exactly): force the
            // counter past it and retry. `compare_exchange` avoids two
            // concurrent wrap-arounds stomping on each other.
            let _ = self.counter.compare_exchange(
                candidate,
                FIRST_UNPINNED_OBJECT_ID,
                Ordering::Relaxed,
                Ordering::Relaxed,
            );
        }
    }

    /// Finds an OID not present in `relation` according to its OID index
    /// (spec §4.1 algorithm). `relation` must be a system relation; the
    /// caller is expected to have asserted that before calling (spec §4.1
    /// step 1 / Failure clause) since this function has no way to tell a
    /// user relation from a system one.
    pub fn new_oid_for(&self, relation: &impl OidIndexProbe) -> Oid {
        if !relation.indexes_usable() {
            return self.next_oid();
        }

        let mut retries: u64 = 0;
        let mut next_log_at = RETRY_LOG_START;
        let mut logged = false;

        loop {
            let candidate = self.next_oid();
            if !relation.probe(candidate) {
                if logged {
                    warn!(retries, "GetNewOidWithIndex: succeeded after retries");
                }
                return candidate;
            }

            retries += 1;
            if retries == next_log_at {
                warn!(retries, "GetNewOidWithIndex: OID collision retries climbing");
                logged = true;
                next_log_at = (next_log_at * 2).min(RETRY_LOG_CAP);
                if next_log_at == RETRY_LOG_CAP {
                    // from here on, log every RETRY_LOG_CAP retries (spec §4.1 step 4)
                }
            } else if logged && retries % RETRY_LOG_CAP == 0 {
                warn!(retries, "GetNewOidWithIndex: still retrying");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;

    struct FakeRelation {
        taken: RefCell<HashSet<u32>>,
        usable: bool,
    }

    impl OidIndexProbe for FakeRelation {
        fn probe(&self, oid: Oid) -> bool {
            self.taken.borrow().contains(&oid.0)
        }

        fn indexes_usable(&self) -> bool {
            self.usable
        }
    }

    #[test]
    fn next_oid_never_returns_invalid_or_pinned() {
        let alloc = IdAllocator::new(u32::MAX - 3);
        for _ in 0..10 {
            let oid = alloc.next_oid();
            assert_ne!(oid.0, INVALID_OID);
            assert!(oid.0 >= FIRST_UNPINNED_OBJECT_ID, "oid {} is pinned", oid.0);
        }
    }

    #[test]
    fn new_oid_for_skips_taken_values() {
        let alloc = IdAllocator::new(FIRST_NORMAL_OBJECT_ID);
        let mut taken = HashSet::new();
        // force the first several candidates to already be in use
        for i in 0..5 {
            taken.insert(FIRST_NORMAL_OBJECT_ID + 1 + i);
        }
        let rel = FakeRelation {
            taken: RefCell::new(taken),
            usable: true,
        };
        let oid = alloc.new_oid_for(&rel);
        assert!(!rel.taken.borrow().contains(&oid.0));
    }

    #[test]
    fn bootstrap_mode_skips_the_probe() {
        let alloc = IdAllocator::new(FIRST_NORMAL_OBJECT_ID);
        let rel = FakeRelation {
            taken: RefCell::new(HashSet::new()),
            usable: false,
        };
        // Even if probe would always say "taken", bootstrap mode never calls it.
        let oid = alloc.new_oid_for(&rel);
        assert!(oid.is_valid());
    }

    #[test]
    fn wraparound_lands_past_the_reserved_range() {
        let alloc = IdAllocator::new(u32::MAX);
        let oid = alloc.next_oid();
        assert!(oid.0 >= FIRST_UNPINNED_OBJECT_ID);
    }
}
