//! Boundary scenarios for OID allocation (spec §8, S1).

use catalog_core::oid::{IdAllocator, Oid, OidIndexProbe, FIRST_UNPINNED_OBJECT_ID};
use rstest::rstest;
use std::cell::RefCell;
use std::collections::HashSet;

struct FakeRelation {
    taken: RefCell<HashSet<u32>>,
}

impl OidIndexProbe for FakeRelation {
    fn probe(&self, oid: Oid) -> bool {
        self.taken.borrow().contains(&oid.0)
    }
}

#[rstest]
#[case(u32::MAX)]
#[case(u32::MAX - 1)]
#[case(FIRST_UNPINNED_OBJECT_ID - 1)]
fn next_oid_wraps_past_the_reserved_range_from_any_near_boundary_start(#[case] start: u32) {
    let allocator = IdAllocator::new(start);
    let oid = allocator.next_oid();
    assert!(oid.is_valid());
    assert!(oid.0 >= FIRST_UNPINNED_OBJECT_ID);
}

#[test]
fn new_oid_for_never_returns_a_value_already_present_in_the_relation() {
    let allocator = IdAllocator::new(FIRST_UNPINNED_OBJECT_ID);
    let mut taken = HashSet::new();
    for i in 0..50 {
        taken.insert(FIRST_UNPINNED_OBJECT_ID + i);
    }
    let relation = FakeRelation {
        taken: RefCell::new(taken),
    };
    let oid = allocator.new_oid_for(&relation);
    assert!(!relation.taken.borrow().contains(&oid.0));
}
