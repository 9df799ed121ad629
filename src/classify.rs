//! Pure, catalog-free classification predicates (spec §4.3). No function in
//! this module may open a catalog relation — the relation cache and the
//! lock manager depend on that (spec §4.3 "Design contract", invariant 2 of
//! spec §3). Everything here operates only on an OID or a cached
//! [`ClassRow`].

use crate::oid::{Oid, FIRST_GENBKI_OBJECT_ID, FIRST_UNPINNED_OBJECT_ID};

/// Relation persistence (spec §3 `ClassRow`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    Temp,
    Unlogged,
    Permanent,
}

/// The cached row of the class catalog for one relation (spec §3).
#[derive(Debug, Clone, Copy)]
pub struct ClassRow {
    pub oid: Oid,
    pub namespace: Oid,
    pub persistence: Persistence,
    pub shared: bool,
    pub has_oids: bool,
}

/// The three named exceptions to "every catalog-range OID is pinned" (spec
/// §4.3): the public namespace, databases, and large objects. Encoded as a
/// sorted constant array of `(class, oid)` pairs with a binary-search
/// predicate per spec §9's "Hand-maintained shared/pinned sets" note — an
/// OID is only unique within its class, so the exception list has to key on
/// both (two unrelated catalogs can reuse the same numeric OID).
///
/// These are illustrative placeholders for the well-known bootstrap OIDs a
/// real `initdb` assigns; a production build would generate this array from
/// the catalog `.dat` files (spec §4.3, "must be updated alongside the
/// catalog .dat files").
pub const PG_CATALOG_NAMESPACE_OID: Oid = Oid(11);
pub const PG_TOAST_NAMESPACE_OID: Oid = Oid(99);
pub const DATABASE_CATALOG_OID: u32 = 1_262;
pub const NAMESPACE_CATALOG_OID: u32 = 2_615;
pub const TEMPLATE1_DATABASE_OID: u32 = 1;
pub const PUBLIC_NAMESPACE_OID: u32 = 2_200;
pub const LARGE_OBJECT_METADATA_OID: u32 = 2_613;

/// Sorted ascending by `(class, oid)`: required by the `binary_search` in
/// [`is_pinned`].
pub const PINNED_EXCEPTIONS: &[(u32, u32)] = &[
    (DATABASE_CATALOG_OID, TEMPLATE1_DATABASE_OID),
    (LARGE_OBJECT_METADATA_OID, LARGE_OBJECT_METADATA_OID),
    (NAMESPACE_CATALOG_OID, PUBLIC_NAMESPACE_OID),
];

/// The class OIDs of catalogs the source's `IsSharedRelation` hand-enumerates
/// (spec §4.3): authid, auth-members, database, db-role-settings,
/// parameter-acl, replication-origin, shared-depend, shared-description,
/// shared-seclabel, subscription, tablespace — plus every index and toast
/// table/index of each. A regression test (`tests/classify.rs`) cross-checks
/// this against the `shared` flag on every seeded [`ClassRow`]. This array
/// intentionally stops naming individual index and toast OIDs (those are
/// bootstrap-generated and out of this spec's scope per §1); the pg_tablespace
/// unique index OID is kept as a representative "index of a shared catalog"
/// entry since §4.3 requires the set to cover indexes too.
pub const SHARED_RELATION_OIDS: &[u32] = &[
    1260, // pg_authid
    1261, // pg_auth_members
    1262, // pg_database
    2964, // pg_db_role_setting
    6243, // pg_parameter_acl
    6000, // pg_replication_origin
    1214, // pg_shdepend
    2396, // pg_shdescription
    3592, // pg_shseclabel
    6100, // pg_subscription
    1213, // pg_tablespace
    1232, // pg_tablespace_oid_index
];

pub fn is_catalog_oid(oid: Oid) -> bool {
    oid.0 < FIRST_UNPINNED_OBJECT_ID
}

/// Whether `oid`, a member of catalog `class`, is pinned (spec §4.3): every
/// catalog-range OID is pinned unless `(class, oid)` names one of the
/// hand-maintained exceptions. `class` matters because OIDs are only unique
/// within their class — two different catalogs can share a numeric OID, one
/// a genuine exception, the other not.
pub fn is_pinned(class: Oid, oid: Oid) -> bool {
    is_catalog_oid(oid) && PINNED_EXCEPTIONS.binary_search(&(class.0, oid.0)).is_err()
}

pub fn is_initdb_oid(oid: Oid) -> bool {
    oid.0 < FIRST_GENBKI_OBJECT_ID
}

pub fn is_system_namespace(namespace: Oid) -> bool {
    namespace == PG_CATALOG_NAMESPACE_OID
}

pub fn is_toast_namespace(namespace: Oid, session_temp_toast_namespace: Option<Oid>) -> bool {
    namespace == PG_TOAST_NAMESPACE_OID || Some(namespace) == session_temp_toast_namespace
}

pub fn is_system_relation(class: &ClassRow, session_temp_toast_namespace: Option<Oid>) -> bool {
    is_catalog_oid(class.oid) || is_toast_namespace(class.namespace, session_temp_toast_namespace)
}

pub fn is_catalog_relation(class: &ClassRow) -> bool {
    is_catalog_oid(class.oid)
}

pub fn is_shared_relation(oid: Oid) -> bool {
    SHARED_RELATION_OIDS.contains(&oid.0)
}

/// Only the class and database catalogs permit `in_place_update` (spec
/// §4.4, §4.7 login fast path).
pub fn is_inplace_updatable(oid: Oid) -> bool {
    const CLASS_CATALOG_OID: u32 = 1259;
    oid.0 == CLASS_CATALOG_OID || oid.0 == DATABASE_CATALOG_OID
}

pub fn is_reserved_name(name: &str) -> bool {
    name.starts_with("pg_")
}
