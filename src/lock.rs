//! Lock modes named by spec §4.4/§5. Only the ordering relevant to the
//! catalog core is modeled: which modes may coexist on the same relation.
//! The storage engine's full lock-mode lattice is out of scope (spec §1).

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockMode {
    /// Readers inspecting a class row via the relation cache (spec §5).
    AccessShare,
    /// Writers of a catalog row (spec §4.4 `open`).
    RowExclusive,
    /// Blocks concurrent creators of the same kind of dependent object
    /// (spec §4.8 step 4: dictionary catalog locked in this mode).
    ShareRowExclusive,
    /// Held by an updater of a class row alongside an exclusive lock on the
    /// relation the row describes (spec §5, "ordering guarantees").
    AccessExclusive,
}

impl LockMode {
    /// Whether two lock modes held concurrently by different sessions on
    /// the same relation are mutually exclusive.
    pub const fn conflicts_with(self, other: LockMode) -> bool {
        use LockMode::*;
        match (self, other) {
            (AccessShare, AccessShare) => false,
            (AccessShare, RowExclusive) | (RowExclusive, AccessShare) => false,
            (RowExclusive, RowExclusive) => false,
            (AccessExclusive, _) | (_, AccessExclusive) => true,
            (ShareRowExclusive, ShareRowExclusive) => true,
            (ShareRowExclusive, RowExclusive) | (RowExclusive, ShareRowExclusive) => true,
            (ShareRowExclusive, AccessShare) | (AccessShare, ShareRowExclusive) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_exclusive_does_not_conflict_with_itself() {
        assert!(!LockMode::RowExclusive.conflicts_with(LockMode::RowExclusive));
    }

    #[test]
    fn share_row_exclusive_excludes_concurrent_writers() {
        assert!(LockMode::ShareRowExclusive.conflicts_with(LockMode::RowExclusive));
        assert!(LockMode::ShareRowExclusive.conflicts_with(LockMode::ShareRowExclusive));
    }

    #[test]
    fn access_exclusive_conflicts_with_everything() {
        for mode in [
            LockMode::AccessShare,
            LockMode::RowExclusive,
            LockMode::ShareRowExclusive,
            LockMode::AccessExclusive,
        ] {
            assert!(LockMode::AccessExclusive.conflicts_with(mode));
        }
    }
}
