//! Creates a user-defined aggregate (spec §4.6) — the worked example
//! because its validation pipeline exercises every collaborator. Grounded
//! on the teacher's `catalog/aggregate.rs` `Aggregate` struct (schema,
//! transition/final/combine function names, state type, initial value),
//! here turned from "fetch an existing one from Postgres" into "validate
//! and create one".

use super::MAX_FUNC_ARGS;
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

pub const FUNCTION_CLASS_OID: Oid = Oid(1255);
pub const AGGREGATE_CLASS_OID: Oid = Oid(2600);

/// Pseudo-type OIDs relevant to the polymorphism rules below. Real
/// bootstrap values; the full pseudo-type catalog is out of this spec's
/// scope (spec §1).
pub const ANY_PSEUDOTYPE: Oid = Oid(2276);
pub const INTERNAL_PSEUDOTYPE: Oid = Oid(2281);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    Normal,
    OrderedSet,
    HypotheticalSet,
}

#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub oid: Oid,
    pub arg_types: Vec<Oid>,
    pub return_type: Oid,
    pub is_strict: bool,
    pub takes_extra_args: bool,
}

/// Looks up an existing function by name and argument types. Implemented
/// by the surrounding function catalog; a trait here so validation doesn't
/// depend on a concrete catalog representation (spec §9's "encapsulate
/// behind a narrow interface").
pub trait FunctionLookup {
    fn find(&self, name: &str, arg_types: &[Oid]) -> Option<FunctionSignature>;
}

pub trait TypeCatalog {
    fn is_polymorphic(&self, ty: Oid) -> bool;
    fn is_binary_coercible(&self, from: Oid, to: Oid) -> bool;
}

pub trait PrivilegeCheck {
    fn has_usage_on_type(&self, ty: Oid) -> bool;
    fn has_execute_on_function(&self, func: Oid) -> bool;
}

#[derive(Debug, Clone)]
pub struct AggregateSpec {
    pub name: String,
    pub namespace: Oid,
    pub kind: AggregateKind,
    pub direct_arg_count: usize,
    pub input_types: Vec<Oid>,
    pub variadic_type: Option<Oid>,
    pub transition_function: String,
    pub final_function: Option<String>,
    pub final_function_extra_args: bool,
    pub moving_transition_function: Option<String>,
    pub moving_inverse_function: Option<String>,
    pub moving_final_function: Option<String>,
    pub sort_operator: Option<Oid>,
    pub transition_type: Oid,
    pub moving_transition_type: Option<Oid>,
    pub initial_value: Option<String>,
    pub moving_initial_value: Option<String>,
    pub return_type: Oid,
}

pub struct AggregateCreator<'a, F, T, P> {
    pub functions: &'a F,
    pub types: &'a T,
    pub privileges: &'a P,
}

impl<'a, F, T, P> AggregateCreator<'a, F, T, P>
where
    F: FunctionLookup,
    T: TypeCatalog,
    P: PrivilegeCheck,
{
    pub fn new(functions: &'a F, types: &'a T, privileges: &'a P) -> Self {
        Self {
            functions,
            types,
            privileges,
        }
    }

    /// Runs every validation rule of spec §4.6, then the side effects in
    /// order, returning the OID of the container function row (spec §4.6
    /// "Return the OID of the container function").
    #[allow(clippy::too_many_arguments)]
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &self,
        spec: &AggregateSpec,
        container_function_oid: impl FnOnce() -> Oid,
        id_allocator: &IdAllocator,
        aggregate_oid_index: &impl OidIndexProbe,
        function_catalog: &Arc<Relation>,
        aggregate_catalog: &Arc<Relation>,
        xid: TransactionId,
        depend: &mut DependencyRecorder,
        events: &mut EventTriggerCore,
    ) -> Result<Oid, CatalogError> {
        self.validate(spec)?;

        // 1. Create the container function row (failures here propagate —
        // name collisions surface directly, spec §4.6 side effects).
        let container_oid = container_function_oid();
        let function_handle = CatalogAccessor::open(function_catalog.clone(), LockMode::RowExclusive);
        let function_tuple = CatalogAccessor::form_tuple(vec![
            serde_json::json!(spec.name),
            serde_json::json!(spec.namespace.0),
            serde_json::json!(spec.return_type.0),
        ]);
        CatalogAccessor::insert(&function_handle, Some(container_oid), function_tuple, xid);
        CatalogAccessor::close(function_handle, true);

        // 2. Insert the aggregate row.
        let aggregate_oid = id_allocator.new_oid_for(aggregate_oid_index);
        let aggregate_handle = CatalogAccessor::open(aggregate_catalog.clone(), LockMode::RowExclusive);
        let aggregate_tuple = CatalogAccessor::form_tuple(vec![
            serde_json::json!(container_oid.0),
            serde_json::json!(spec.transition_function),
            serde_json::json!(spec.transition_type.0),
        ]);
        CatalogAccessor::insert(&aggregate_handle, Some(aggregate_oid), aggregate_tuple, xid);
        CatalogAccessor::close(aggregate_handle, true);

        let aggregate_address = ObjectAddress::whole(AGGREGATE_CLASS_OID, aggregate_oid);
        let container_address = ObjectAddress::whole(FUNCTION_CLASS_OID, container_oid);

        // 3. Record NORMAL dependencies from the container function to the
        // transition function, inverse transition function (if any), both
        // final functions (if any), and the sort operator (if any).
        let transition_fn = self
            .functions
            .find(&spec.transition_function, &self.transition_arg_types(spec))
            .ok_or_else(|| {
                CatalogError::UndefinedObject(format!(
                    "transition function {} not found",
                    spec.transition_function
                ))
            })?;
        depend.record(
            container_address,
            ObjectAddress::whole(FUNCTION_CLASS_OID, transition_fn.oid),
            DependencyKind::Normal,
        );

        if let Some(inverse_name) = &spec.moving_inverse_function
            && let Some(inverse_fn) = self.functions.find(inverse_name, &[])
        {
            depend.record(
                container_address,
                ObjectAddress::whole(FUNCTION_CLASS_OID, inverse_fn.oid),
                DependencyKind::Normal,
            );
        }
        for final_name in spec.final_function.iter().chain(spec.moving_final_function.iter()) {
            if let Some(final_fn) = self.functions.find(final_name, &[]) {
                depend.record(
                    container_address,
                    ObjectAddress::whole(FUNCTION_CLASS_OID, final_fn.oid),
                    DependencyKind::Normal,
                );
            }
        }
        if let Some(sort_op) = spec.sort_operator {
            depend.record(
                container_address,
                ObjectAddress::whole(Oid(2617), sort_op), // pg_operator class oid
                DependencyKind::Normal,
            );
        }

        // 4. Post a post-create object-access event.
        events.collect_simple(
            "CREATE AGGREGATE",
            vec![aggregate_address, container_address],
            false,
        );

        Ok(container_oid)
    }

    fn transition_arg_types(&self, spec: &AggregateSpec) -> Vec<Oid> {
        let mut args = vec![spec.transition_type];
        match spec.kind {
            // Rule 5: for normal aggregates, (transition_type, input_types…)
            AggregateKind::Normal => args.extend(spec.input_types.iter().copied()),
            // For ordered-set aggregates, (transition_type, aggregated_inputs…);
            // direct args are not consumed by the transition function.
            AggregateKind::OrderedSet | AggregateKind::HypotheticalSet => {
                args.extend(spec.input_types.iter().skip(spec.direct_arg_count).copied());
            }
        }
        args
    }

    fn validate(&self, spec: &AggregateSpec) -> Result<(), CatalogError> {
        // Rule 1: at least one transition function; at most MAX_FUNC_ARGS-1 params.
        if spec.transition_function.is_empty() {
            return Err(CatalogError::InvalidFunctionDefinition(
                "aggregate must name a transition function".to_string(),
            ));
        }
        if spec.input_types.len() > MAX_FUNC_ARGS - 1 {
            return Err(CatalogError::InvalidFunctionDefinition(format!(
                "aggregates cannot have more than {} parameters",
                MAX_FUNC_ARGS - 1
            )));
        }

        // Rule 2: if the transition type is polymorphic, at least one input
        // type must be polymorphic too.
        if self.types.is_polymorphic(spec.transition_type)
            && !spec.input_types.iter().any(|t| self.types.is_polymorphic(*t))
        {
            return Err(CatalogError::InvalidFunctionDefinition(
                "aggregate's transition type cannot be polymorphic without a polymorphic input \
                 type, because it cannot be deduced at call time"
                    .to_string(),
            ));
        }

        // Rule 3: variadic ordered-set aggregates must be variadic of ANY.
        if spec.kind == AggregateKind::OrderedSet
            && let Some(variadic) = spec.variadic_type
            && variadic != ANY_PSEUDOTYPE
        {
            return Err(CatalogError::FeatureNotSupported(
                "ordered-set aggregates are not allowed to use normal variadic, only VARIADIC \"any\""
                    .to_string(),
            ));
        }

        // Rule 4: hypothetical-set's last N direct args must match the
        // aggregated args position-wise and type-wise.
        if spec.kind == AggregateKind::HypotheticalSet {
            let aggregated = &spec.input_types[spec.direct_arg_count..];
            let n = aggregated.len();
            if spec.direct_arg_count < n {
                return Err(CatalogError::InvalidFunctionDefinition(
                    "hypothetical-set aggregate must have at least as many direct arguments as \
                     aggregated arguments"
                        .to_string(),
                ));
            }
            let direct_tail = &spec.input_types[spec.direct_arg_count - n..spec.direct_arg_count];
            if direct_tail != aggregated {
                return Err(CatalogError::InvalidFunctionDefinition(
                    "hypothetical-set aggregate's last direct arguments must match the \
                     aggregated arguments"
                        .to_string(),
                ));
            }
        }

        // Rule 5: look up the forward transition function; return type must
        // equal the declared transition type exactly.
        let transition_args = self.transition_arg_types(spec);
        let transition_fn = self.functions.find(&spec.transition_function, &transition_args).ok_or_else(|| {
            CatalogError::UndefinedObject(format!(
                "transition function {} not found for the given signature",
                spec.transition_function
            ))
        })?;
        if transition_fn.return_type != spec.transition_type {
            return Err(CatalogError::DatatypeMismatch(format!(
                "transition function {} must return type {:?} exactly, found {:?}",
                spec.transition_function, spec.transition_type, transition_fn.return_type
            )));
        }

        // Rule 6: if the transition function is strict and no initial value
        // is given, the first input type must be binary-coercible to the
        // transition type.
        if transition_fn.is_strict
            && spec.initial_value.is_none()
            && let Some(first_input) = spec.input_types.first()
            && !self.types.is_binary_coercible(*first_input, spec.transition_type)
        {
            return Err(CatalogError::DatatypeMismatch(
                "strict transition function without an initial value requires the first \
                 aggregated input to be binary-coercible to the transition type"
                    .to_string(),
            ));
        }

        // Rule 7: moving-aggregate forward/inverse must have matching strictness.
        if let Some(inverse_name) = &spec.moving_inverse_function {
            let inverse_fn = self.functions.find(inverse_name, &transition_args).ok_or_else(|| {
                CatalogError::UndefinedObject(format!("inverse transition function {inverse_name} not found"))
            })?;
            if inverse_fn.is_strict != transition_fn.is_strict {
                return Err(CatalogError::InvalidFunctionDefinition(
                    "forward and inverse transition functions must match in strictness".to_string(),
                ));
            }
        }

        // Rule 8: a final function with extra args must not be strict.
        if let Some(final_name) = &spec.final_function
            && spec.final_function_extra_args
            && let Some(final_fn) = self.functions.find(final_name, &[])
            && final_fn.is_strict
        {
            return Err(CatalogError::InvalidFunctionDefinition(
                "a final function declared to take extra arguments must not be strict, since it \
                 will certainly receive nulls"
                    .to_string(),
            ));
        }

        // Rule 9: polymorphic/INTERNAL result type requires a matching argument.
        if (self.types.is_polymorphic(spec.return_type) || spec.return_type == INTERNAL_PSEUDOTYPE)
            && !spec
                .input_types
                .iter()
                .chain(std::iter::once(&spec.transition_type))
                .any(|t| *t == spec.return_type || self.types.is_polymorphic(*t))
        {
            return Err(CatalogError::DatatypeMismatch(
                "aggregate's result type is polymorphic or internal but no argument matches it"
                    .to_string(),
            ));
        }

        // Rule 10: USAGE on every type, EXECUTE on every referenced function.
        for ty in spec.input_types.iter().chain(std::iter::once(&spec.transition_type)) {
            if !self.privileges.has_usage_on_type(*ty) {
                return Err(CatalogError::InsufficientPrivilege(format!(
                    "missing USAGE privilege on type {ty:?}"
                )));
            }
        }
        if !self.privileges.has_execute_on_function(transition_fn.oid) {
            return Err(CatalogError::InsufficientPrivilege(format!(
                "missing EXECUTE privilege on transition function {}",
                spec.transition_function
            )));
        }

        Ok(())
    }
}
