//! Picks a [`RelFileLocator`] whose on-disk path does not already exist
//! (spec §4.2).

use crate::classify::Persistence;
use crate::oid::{IdAllocator, Oid, OidIndexProbe};
use crate::session::SessionContext;
use std::path::PathBuf;

/// Sentinel tablespace OID for the cluster's global (shared-catalog)
/// tablespace (spec §3 `RelFileLocator`).
pub const GLOBAL_TABLESPACE_OID: Oid = Oid(1664);
pub const DEFAULT_TABLESPACE_OID: Oid = Oid(1663);

/// The tuple identifying a relation's on-disk files (spec §3, Glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelFileLocator {
    pub tablespace_oid: Oid,
    pub database_oid: Option<Oid>,
    pub relation_number: Oid,
    pub backend_number: Option<i32>,
}

impl RelFileLocator {
    /// Bit-exact filesystem layout (spec §6).
    pub fn path(&self, data_dir: &std::path::Path) -> PathBuf {
        if self.tablespace_oid == GLOBAL_TABLESPACE_OID {
            data_dir.join("global").join(self.relation_number.to_string())
        } else if self.tablespace_oid == DEFAULT_TABLESPACE_OID {
            data_dir
                .join("base")
                .join(self.database_oid.unwrap_or(Oid::INVALID).to_string())
                .join(self.relation_number.to_string())
        } else {
            data_dir
                .join("pg_tblspc")
                .join(self.tablespace_oid.to_string())
                .join(self.database_oid.unwrap_or(Oid::INVALID).to_string())
                .join(self.relation_number.to_string())
        }
    }
}

/// Something that can say "does this path already exist" and, optionally,
/// "does this relation-number already appear in the class catalog" (spec
/// §4.2 Policy: "if a class catalog was passed... else `next_oid`").
pub trait PathProbe {
    fn exists(&self, path: &std::path::Path) -> bool;
}

pub struct StdFsProbe;

impl PathProbe for StdFsProbe {
    fn exists(&self, path: &std::path::Path) -> bool {
        // A stat error other than "absent" is treated as a collision (spec
        // §4.2 rationale): `Path::try_exists` only distinguishes
        // "confirmed absent" from everything else, which is exactly that
        // policy.
        path.try_exists().unwrap_or(true)
    }
}

pub struct RelFileAllocator<'a> {
    pub data_dir: &'a std::path::Path,
    pub tablespace_oid: Oid,
    pub persistence: Persistence,
}

impl<'a> RelFileAllocator<'a> {
    pub fn new(data_dir: &'a std::path::Path, tablespace_oid: Oid, persistence: Persistence) -> Self {
        Self {
            data_dir,
            tablespace_oid,
            persistence,
        }
    }

    /// Allocates a [`RelFileLocator`] whose path does not collide, calling
    /// `IdAllocator::new_oid_for` for cross-uniqueness against
    /// `class_catalog` when given (used when the relation-file-number and
    /// the OID are the same value), else plain `next_oid` (spec §4.2).
    pub fn allocate(
        &self,
        session: &SessionContext,
        id_allocator: &IdAllocator,
        class_catalog: Option<&impl OidIndexProbe>,
        path_probe: &impl PathProbe,
    ) -> RelFileLocator {
        let backend_number = if matches!(self.persistence, Persistence::Temp) {
            Some(session.backend_id)
        } else {
            None
        };
        let database_oid = if self.tablespace_oid == GLOBAL_TABLESPACE_OID {
            None
        } else {
            Some(session.database_oid)
        };

        loop {
            let relation_number = match class_catalog {
                Some(catalog) => id_allocator.new_oid_for(catalog),
                None => id_allocator.next_oid(),
            };
            let locator = RelFileLocator {
                tablespace_oid: self.tablespace_oid,
                database_oid,
                relation_number,
                backend_number,
            };
            if !path_probe.exists(&locator.path(self.data_dir)) {
                return locator;
            }
            // collision (or unreadable directory): retry with a fresh number
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::path::Path;

    struct FakeFs {
        taken: RefCell<HashSet<PathBuf>>,
    }

    impl PathProbe for FakeFs {
        fn exists(&self, path: &Path) -> bool {
            self.taken.borrow().contains(path)
        }
    }

    #[test]
    fn global_tablespace_has_no_database_oid() {
        let data_dir = PathBuf::from("/var/lib/pg");
        let alloc = RelFileAllocator::new(&data_dir, GLOBAL_TABLESPACE_OID, Persistence::Permanent);
        let session = SessionContext::new(Oid(5), 1, 0);
        let probe = FakeFs {
            taken: RefCell::new(HashSet::new()),
        };
        let id_alloc = IdAllocator::default();
        let locator = alloc.allocate(&session, &id_alloc, Option::<&DummyProbe>::None, &probe);
        assert_eq!(locator.database_oid, None);
        assert_eq!(locator.backend_number, None);
    }

    #[test]
    fn temp_relation_carries_backend_number() {
        let data_dir = PathBuf::from("/var/lib/pg");
        let alloc = RelFileAllocator::new(&data_dir, DEFAULT_TABLESPACE_OID, Persistence::Temp);
        let session = SessionContext::new(Oid(5), 42, 0);
        let probe = FakeFs {
            taken: RefCell::new(HashSet::new()),
        };
        let id_alloc = IdAllocator::default();
        let locator = alloc.allocate(&session, &id_alloc, Option::<&DummyProbe>::None, &probe);
        assert_eq!(locator.backend_number, Some(42));
        assert_eq!(locator.database_oid, Some(Oid(5)));
    }

    #[test]
    fn retries_past_an_existing_path() {
        let data_dir = PathBuf::from("/var/lib/pg");
        let alloc = RelFileAllocator::new(&data_dir, DEFAULT_TABLESPACE_OID, Persistence::Permanent);
        let session = SessionContext::new(Oid(5), 1, 0);
        let id_alloc = IdAllocator::new(100_000);
        // Pre-compute what the first candidate's path would be and mark it taken.
        let first_try_locator = RelFileLocator {
            tablespace_oid: DEFAULT_TABLESPACE_OID,
            database_oid: Some(Oid(5)),
            relation_number: Oid(100_001),
            backend_number: None,
        };
        let mut taken = HashSet::new();
        taken.insert(first_try_locator.path(&data_dir));
        let probe = FakeFs {
            taken: RefCell::new(taken),
        };
        let locator = alloc.allocate(&session, &id_alloc, Option::<&DummyProbe>::None, &probe);
        assert_ne!(locator.relation_number, Oid(100_001));
    }

    struct DummyProbe;
    impl OidIndexProbe for DummyProbe {
        fn probe(&self, _oid: Oid) -> bool {
            false
        }
    }
}
