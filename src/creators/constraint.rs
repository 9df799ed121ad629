//! Creates a table constraint (SPEC_FULL.md §4, supplementing spec.md with a
//! second worked creator). Grounded on the teacher's `catalog/constraint.rs`
//! `ConstraintType` enum (Unique/ForeignKey/Check/Exclusion variants) and
//! `Constraint` struct, turned from "describe one read from Postgres" into
//! "validate and create one".

use crate::access::CatalogAccessor;
use crate::depend::{DependencyKind, DependencyRecorder};
use crate::error::CatalogError;
use crate::event_trigger::EventTriggerCore;
use crate::lock::LockMode;
use crate::object::ObjectAddress;
use crate::oid::{IdAllocator, Oid, OidIndexProbe};
use crate::session::TransactionId;
use crate::store::Relation;
use std::sync::Arc;

pub const CONSTRAINT_CLASS_OID: Oid = Oid(2606);
pub const RELATION_CLASS_OID: Oid = Oid(1259);

#[derive(Debug, Clone)]
pub enum ConstraintType {
    Unique {
        columns: Vec<String>,
    },
    ForeignKey {
        columns: Vec<String>,
        referenced_table: Oid,
        referenced_columns: Vec<String>,
        deferrable: bool,
        initially_deferred: bool,
    },
    Check {
        expression: String,
        /// Object references pulled out of `expression` by the command
        /// layer (spec §1 Non-goals: parsing/planning stays out of this
        /// crate, so the already-resolved reference list is handed in).
        referenced_objects: Vec<ObjectAddress>,
    },
    Exclusion {
        elements: Vec<String>,
        operators: Vec<Oid>,
    },
}

#[derive(Debug, Clone)]
pub struct ConstraintSpec {
    pub name: String,
    pub table: Oid,
    pub constraint_type: ConstraintType,
}

pub struct ConstraintCreator;

impl ConstraintCreator {
    /// Validates `spec`, allocates the constraint's OID, records its
    /// dependencies, and posts a post-create event. Returns the new
    /// constraint's OID.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        spec: &ConstraintSpec,
        id_allocator: &IdAllocator,
        constraint_oid_index: &impl OidIndexProbe,
        constraint_catalog: &Arc<Relation>,
        xid: TransactionId,
        depend: &mut DependencyRecorder,
        events: &mut EventTriggerCore,
    ) -> Result<Oid, CatalogError> {
        Self::validate(spec)?;

        let constraint_oid = id_allocator.new_oid_for(constraint_oid_index);
        let handle = CatalogAccessor::open(constraint_catalog.clone(), LockMode::RowExclusive);
        let tuple = CatalogAccessor::form_tuple(vec![serde_json::json!(spec.name), serde_json::json!(spec.table.0)]);
        CatalogAccessor::insert(&handle, Some(constraint_oid), tuple, xid);
        CatalogAccessor::close(handle, true);

        let constraint_address = ObjectAddress::whole(CONSTRAINT_CLASS_OID, constraint_oid);
        let table_address = ObjectAddress::whole(RELATION_CLASS_OID, spec.table);

        // Every constraint depends on the table it's attached to (Internal:
        // it cannot outlive the table, nor be dropped by name alone while
        // the table remains — spec's DependencyKind semantics).
        depend.record(constraint_address, table_address, DependencyKind::Internal);

        match &spec.constraint_type {
            ConstraintType::ForeignKey { referenced_table, .. } => {
                depend.record(
                    constraint_address,
                    ObjectAddress::whole(RELATION_CLASS_OID, *referenced_table),
                    DependencyKind::Normal,
                );
            }
            ConstraintType::Check {
                referenced_objects, ..
            } => {
                depend.record_on_single_rel_expr(
                    constraint_address,
                    referenced_objects.iter().copied(),
                    table_address,
                    DependencyKind::Internal,
                    DependencyKind::Normal,
                );
            }
            ConstraintType::Exclusion { operators, .. } => {
                for op in operators {
                    depend.record(
                        constraint_address,
                        ObjectAddress::whole(Oid(2617), *op), // pg_operator
                        DependencyKind::Normal,
                    );
                }
            }
            ConstraintType::Unique { .. } => {}
        }

        events.collect_simple("ADD CONSTRAINT", vec![constraint_address, table_address], false);

        Ok(constraint_oid)
    }

    fn validate(spec: &ConstraintSpec) -> Result<(), CatalogError> {
        if spec.name.is_empty() {
            return Err(CatalogError::SyntaxError("constraint name must not be empty".to_string()));
        }
        match &spec.constraint_type {
            ConstraintType::Unique { columns } if columns.is_empty() => {
                Err(CatalogError::InvalidFunctionDefinition(
                    "UNIQUE constraint must name at least one column".to_string(),
                ))
            }
            ConstraintType::ForeignKey {
                columns,
                referenced_columns,
                ..
            } if columns.len() != referenced_columns.len() || columns.is_empty() => {
                Err(CatalogError::DatatypeMismatch(
                    "FOREIGN KEY column list must match the referenced column list in length"
                        .to_string(),
                ))
            }
            ConstraintType::Check { expression, .. } if expression.trim().is_empty() => Err(
                CatalogError::SyntaxError("CHECK constraint requires a non-empty expression".to_string()),
            ),
            ConstraintType::Exclusion { elements, operators } if elements.len() != operators.len() => {
                Err(CatalogError::DatatypeMismatch(
                    "EXCLUDE constraint must pair each element with exactly one operator".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}
