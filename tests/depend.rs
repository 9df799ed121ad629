//! Cascading-drop closure and the dependency round-trip property (spec §8,
//! property 5).

use catalog_core::depend::{DependencyKind, DependencyRecorder};
use catalog_core::object::ObjectAddress;
use catalog_core::oid::Oid;

fn addr(class: u32, obj: u32) -> ObjectAddress {
    ObjectAddress::whole(Oid(class), Oid(obj))
}

#[test]
fn dropping_a_table_pulls_in_its_auto_dependent_index_but_not_a_normal_dependent_view() {
    let mut depend = DependencyRecorder::new();
    let table = addr(1259, 100);
    let auto_index = addr(1259, 101);
    let internal_toast = addr(1259, 102);
    let normal_view = addr(1259, 200);

    depend.record(auto_index, table, DependencyKind::Auto);
    depend.record(internal_toast, table, DependencyKind::Internal);
    depend.record(normal_view, table, DependencyKind::Normal);

    let closure = depend.cascade_closure(&[table]);
    assert!(closure.contains(&table));
    assert!(closure.contains(&auto_index));
    assert!(closure.contains(&internal_toast));
    assert!(!closure.contains(&normal_view));
}

#[test]
fn alter_rewrites_a_single_objects_edges_without_disturbing_others() {
    let mut depend = DependencyRecorder::new();
    let view = addr(1259, 300);
    let old_table = addr(1259, 301);
    let new_table = addr(1259, 302);
    let unrelated = addr(1259, 400);

    depend.record(view, old_table, DependencyKind::Normal);
    depend.record(unrelated, old_table, DependencyKind::Normal);

    depend.rewrite(view);
    depend.record(view, new_table, DependencyKind::Normal);

    let view_edges = depend.edges_from(view);
    assert_eq!(view_edges.len(), 1);
    assert_eq!(view_edges[0].referenced, new_table);

    let unrelated_edges = depend.edges_from(unrelated);
    assert_eq!(unrelated_edges.len(), 1);
    assert_eq!(unrelated_edges[0].referenced, old_table);
}
