//! Concrete DDL catalog writers (spec §2, 20% share of the component
//! table): each validates its inputs, calls [`crate::oid::IdAllocator`],
//! writes through [`crate::access::CatalogAccessor`], then records
//! dependencies via [`crate::depend::DependencyRecorder`] and posts a
//! post-create event to [`crate::event_trigger::EventTriggerCore`].

pub mod aggregate;
pub mod constraint;
pub mod large_object;
pub mod subscription;
pub mod text_search;
pub mod zstd_dict;

/// Maximum number of arguments any function-like object may declare (spec
/// §4.6, validation rule 1).
pub const MAX_FUNC_ARGS: usize = 100;
