//! The dependency edge set that drives cascading drops, owner changes, and
//! extension membership (spec §4.5).
//!
//! Grounded on the teacher's `forward_deps`/`reverse_deps` `BTreeMap`
//! construction in `catalog/mod.rs::Catalog::load` (there: read-only,
//! derived once from a `DependsOn` trait at load time; here: a mutable
//! store that creators write to and ALTER rewrites). The graph-traversal
//! parts (closure under a drop) are generalized onto `petgraph`, which the
//! teacher already depends on for its own migration ordering
//! (`migration_tracking.rs`).

use crate::object::ObjectAddress;
use petgraph::graphmap::DiGraphMap;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// Drop of referenced fails unless CASCADE.
    Normal,
    /// Drop of referenced silently drops dependent.
    Auto,
    /// Dependent is a helper of referenced; cannot be dropped by its own name.
    Internal,
    /// Dependent belongs to an extension; transfers with the extension.
    Extension,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub dependent: ObjectAddress,
    pub referenced: ObjectAddress,
    pub kind: DependencyKind,
}

/// A deduplicating collection of addresses (spec §4.5 `address_set`).
#[derive(Debug, Clone, Default)]
pub struct AddressSet {
    addresses: BTreeSet<ObjectAddress>,
}

impl AddressSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, address: ObjectAddress) -> bool {
        self.addresses.insert(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectAddress> {
        self.addresses.iter()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// The shared owner-dependency relation is modeled separately from the
/// per-database dependency relation (spec §6 "Persisted state layout":
/// "a local one (per-database) and a shared one (cluster-wide, for owner
/// edges)").
#[derive(Debug, Default)]
pub struct DependencyRecorder {
    /// `(dependent, referenced, kind)` deduplicated exactly on that key
    /// (spec §4.5 "Ordering contract").
    edges: HashMap<(ObjectAddress, ObjectAddress, DependencyKindKey), ()>,
    owners: HashMap<ObjectAddress, ObjectAddress>,
}

// `DependencyKind` itself is `Hash`, but naming the key type makes the
// dedup contract explicit at the type level.
type DependencyKindKey = DependencyKind;

impl DependencyRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts one edge (spec §4.5 `record`). Deduplicates on the exact
    /// `(dep, ref, kind)` key so creators may emit edges in any order
    /// without pre-deduplicating (spec §4.5 "Ordering contract").
    pub fn record(&mut self, dependent: ObjectAddress, referenced: ObjectAddress, kind: DependencyKind) {
        self.edges.insert((dependent, referenced, kind), ());
    }

    /// Convenience for owner edges, stored in the shared-depend relation
    /// (spec §4.5 `record_on_owner`).
    pub fn record_on_owner(&mut self, object: ObjectAddress, owner: ObjectAddress) {
        self.owners.insert(object, owner);
    }

    pub fn owner_of(&self, object: ObjectAddress) -> Option<ObjectAddress> {
        self.owners.get(&object).copied()
    }

    /// Batch-insert helper over a deduplicated [`AddressSet`] (spec §4.5
    /// `record_all`).
    pub fn record_all(&mut self, dependent: ObjectAddress, refs: &AddressSet, kind: DependencyKind) {
        for referenced in refs.iter() {
            self.record(dependent, *referenced, kind);
        }
    }

    /// Walks a pre-extracted list of object references from an expression
    /// tree, splitting them by whether they belong to `rel`: references to
    /// columns of `rel` use `self_kind`, everything else uses `other_kind`
    /// (spec §4.5 `record_on_single_rel_expr`, used for CHECK constraints).
    /// The caller supplies the already-extracted reference list since
    /// walking a parsed expression AST is the command layer's concern, not
    /// the catalog core's (spec §1 Non-goals: query planning/execution).
    pub fn record_on_single_rel_expr(
        &mut self,
        dependent: ObjectAddress,
        referenced_objects: impl IntoIterator<Item = ObjectAddress>,
        rel: ObjectAddress,
        self_kind: DependencyKind,
        other_kind: DependencyKind,
    ) {
        for referenced in referenced_objects {
            let kind = if referenced.class_id == rel.class_id && referenced.object_id == rel.object_id {
                self_kind
            } else {
                other_kind
            };
            self.record(dependent, referenced, kind);
        }
    }

    /// Deletes every edge sourced at `dep`, plus its shared-owner edge
    /// (spec §4.5 `rewrite`). Callers re-insert the correct set afterward;
    /// this is the primitive ALTER uses when a reference changes (spec §3
    /// invariant 4: "delete the old edges and insert new ones atomically
    /// with the row update").
    pub fn rewrite(&mut self, dep: ObjectAddress) {
        self.edges.retain(|(dependent, _, _), ()| *dependent != dep);
        self.owners.remove(&dep);
    }

    /// All edges whose source is `dep`.
    pub fn edges_from(&self, dep: ObjectAddress) -> Vec<Edge> {
        self.edges
            .keys()
            .filter(|(dependent, _, _)| *dependent == dep)
            .map(|(dependent, referenced, kind)| Edge {
                dependent: *dependent,
                referenced: *referenced,
                kind: *kind,
            })
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Computes the cascading-drop closure of dropping `roots`: every
    /// object reachable by following `Auto`/`Internal` edges backwards (an
    /// AUTO/INTERNAL dependent is pulled down with its referenced object),
    /// in an order safe to drop (dependents before their referenced
    /// objects). `Normal` edges are not followed — dropping through one
    /// requires CASCADE, which is the command dispatcher's decision, not
    /// this recorder's (spec §4.5 "NORMAL: drop of referenced fails unless
    /// CASCADE").
    pub fn cascade_closure(&self, roots: &[ObjectAddress]) -> Vec<ObjectAddress> {
        let mut graph: DiGraphMap<ObjectAddress, ()> = DiGraphMap::new();
        for (dependent, referenced, kind) in self.edges.keys() {
            if matches!(kind, DependencyKind::Auto | DependencyKind::Internal) {
                graph.add_edge(*referenced, *dependent, ());
            }
        }

        let mut visited = BTreeSet::new();
        let mut order = Vec::new();
        let mut stack: Vec<ObjectAddress> = roots.to_vec();
        for root in roots {
            visited.insert(*root);
        }

        while let Some(node) = stack.pop() {
            order.push(node);
            let neighbors: Vec<ObjectAddress> = graph.neighbors(node).collect();
            for next in neighbors {
                if visited.insert(next) {
                    stack.push(next);
                }
            }
        }

        order
    }
}
