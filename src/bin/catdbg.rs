//! Smoke-test harness for the catalog core: exercises OID allocation,
//! classification, and dependency recording against nothing but in-process
//! fakes, and prints what happened. Not a command-line interface onto a
//! running server — there is no live catalog for it to talk to — so it
//! takes no arguments and parses none.

use catalog_core::classify::{is_catalog_oid, is_pinned, is_shared_relation};
use catalog_core::depend::{DependencyKind, DependencyRecorder};
use catalog_core::object::ObjectAddress;
use catalog_core::oid::{IdAllocator, Oid, OidIndexProbe};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

struct AlwaysFree;
impl OidIndexProbe for AlwaysFree {
    fn probe(&self, _oid: Oid) -> bool {
        false
    }
}

fn main() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new("info")
    };
    fmt().with_env_filter(filter).with_target(false).init();

    let id_allocator = IdAllocator::default();
    let oid = id_allocator.new_oid_for(&AlwaysFree);
    info!(%oid, "allocated an oid");
    let relation_class = Oid(1259); // pg_class: this oid names a relation
    info!(catalog = is_catalog_oid(oid), pinned = is_pinned(relation_class, oid), "classified the new oid");

    let table = ObjectAddress::whole(relation_class, oid);
    let shared = is_shared_relation(Oid(1260));
    info!(shared, "pg_authid is a shared relation");

    let mut depend = DependencyRecorder::new();
    let index = ObjectAddress::whole(Oid(1259), id_allocator.next_oid());
    depend.record(index, table, DependencyKind::Auto);
    let closure = depend.cascade_closure(&[table]);
    info!(closure_len = closure.len(), "computed a cascade closure for a dropped table");
}
