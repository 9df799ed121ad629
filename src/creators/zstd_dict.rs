//! Trains and installs a per-column Zstd compression dictionary (spec §4.8),
//! the worked example the spec singles out for its multi-step locking
//! protocol. Grounded on the teacher's lock-then-mutate shape in
//! `catalog/mod.rs`/`db/connection.rs`, with the sample-collection and
//! dictionary-training steps themselves grounded on the `zstd` crate's
//! `dict` module (an enrichment pulled in from the broader example pack,
//! not the teacher's own dependency list — see DESIGN.md).

use crate::access::CatalogAccessor;
use crate::depend::{DependencyKind, DependencyRecorder};
use crate::error::CatalogError;
use crate::event_trigger::EventTriggerCore;
use crate::lock::LockMode;
use crate::object::ObjectAddress;
use crate::oid::Oid;
use crate::session::TransactionId;
use crate::store::Relation;
use std::collections::HashMap;
use std::sync::Arc;

pub const ZSTD_DICT_CLASS_OID: Oid = Oid(8_004);
pub const RELATION_CLASS_OID: Oid = Oid(1259);

/// Lock held on the target relation while sampling it (spec §4.8 step 1).
pub const TARGET_RELATION_LOCK: LockMode = LockMode::AccessShare;
/// Lock held on the dictionary catalog while allocating a new dictionary id
/// (spec §4.8 step 4; see [`LockMode::ShareRowExclusive`]'s doc comment).
pub const DICTIONARY_CATALOG_LOCK: LockMode = LockMode::ShareRowExclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnCompression {
    Plain,
    Pglz,
    Zstd,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelKind {
    OrdinaryTable,
    Index,
    View,
    MaterializedView,
}

#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub attnum: i16,
    pub type_oid: Oid,
    /// For array columns, training operates on the element type, not the
    /// array type itself (spec §4.8 step 2).
    pub element_type: Option<Oid>,
    pub compression: ColumnCompression,
    /// Per-attribute opt-out of dictionary training (spec §4.8 step 1).
    pub opt_out: bool,
}

/// Looks up a type's dictionary-builder function, if one is registered
/// (spec §4.8 step 2). A type with no builder function cannot be trained.
pub trait BuilderFunctionLookup {
    fn builder_for(&self, type_oid: Oid) -> Option<Oid>;
}

pub const MAX_SAMPLE_ROWS: usize = 30_000;
/// Cap on the total byte size of the sample set handed to the trainer (spec
/// §4.8 step 3, "keep prefix under max allocation").
pub const MAX_SAMPLE_BYTES: usize = 112_640;
pub const MAX_DICTIONARY_BYTES: usize = 112_640;

pub struct ZstdDictBuilder;

impl ZstdDictBuilder {
    /// Validates that `relation`/`column` are eligible for training (spec
    /// §4.8 step 1: must be an ordinary table with Zstd compression chosen
    /// on the column), resolves the effective type to train against
    /// (element type for arrays), and confirms a builder function exists.
    pub fn validate_target(
        rel_kind: RelKind,
        column: &ColumnInfo,
        builders: &impl BuilderFunctionLookup,
    ) -> Result<Oid, CatalogError> {
        if rel_kind != RelKind::OrdinaryTable {
            return Err(CatalogError::FeatureNotSupported(
                "dictionary training is only supported on ordinary tables".to_string(),
            ));
        }
        if column.opt_out {
            return Err(CatalogError::ObjectNotInPrerequisiteState(
                "column has opted out of dictionary training".to_string(),
            ));
        }
        if column.compression != ColumnCompression::Zstd {
            return Err(CatalogError::ObjectNotInPrerequisiteState(
                "column is not configured with Zstd compression".to_string(),
            ));
        }
        let effective_type = column.element_type.unwrap_or(column.type_oid);
        builders.builder_for(effective_type).ok_or_else(|| {
            CatalogError::UndefinedObject(format!(
                "no dictionary builder function registered for type {effective_type:?}"
            ))
        })?;
        Ok(effective_type)
    }

    /// Trains a raw dictionary from `samples` (spec §4.8 step 3). `samples`
    /// is already capped to [`MAX_SAMPLE_ROWS`]/[`MAX_SAMPLE_BYTES`] by the
    /// caller's collection step.
    pub fn train(samples: &[Vec<u8>]) -> Result<Vec<u8>, CatalogError> {
        if samples.is_empty() {
            return Err(CatalogError::ObjectNotInPrerequisiteState(
                "no sample rows available to train a dictionary".to_string(),
            ));
        }
        zstd::dict::from_samples(samples, MAX_DICTIONARY_BYTES)
            .map_err(|e| CatalogError::InternalError(format!("zstd dictionary training failed: {e}")))
    }

    /// Allocates the new dictionary's id by scanning the dictionary catalog
    /// backward under a see-everything-equivalent snapshot and taking
    /// `max_existing + 1` (spec §4.8 step 4) — deliberately not the shared
    /// [`crate::oid::IdAllocator`], since dictionary ids are a small,
    /// per-relation-column sequence rather than a cluster-wide OID.
    pub fn allocate_dictionary_id(existing_ids: &[u32]) -> u32 {
        existing_ids.iter().max().copied().unwrap_or(0) + 1
    }

    /// Re-finalizes the trained dictionary, embedding `dictionary_id` into
    /// its stored representation so a reader can confirm which dictionary a
    /// compressed value was encoded against (spec §4.8 step 5).
    pub fn finalize(dictionary_id: u32, raw_dictionary: Vec<u8>) -> Vec<u8> {
        let mut blob = Vec::with_capacity(4 + raw_dictionary.len());
        blob.extend_from_slice(&dictionary_id.to_le_bytes());
        blob.extend_from_slice(&raw_dictionary);
        blob
    }

    /// Writes the dictionary's catalog row, records its dependency on the
    /// target relation/column, and posts a post-create event (spec §4.8
    /// steps 5-6).
    pub fn record_and_notify(
        dictionary_id: u32,
        relation: Oid,
        dictionary_catalog: &Arc<Relation>,
        xid: TransactionId,
        depend: &mut DependencyRecorder,
        events: &mut EventTriggerCore,
    ) {
        let dict_address = ObjectAddress::whole(ZSTD_DICT_CLASS_OID, Oid(dictionary_id));
        let relation_address = ObjectAddress::whole(RELATION_CLASS_OID, relation);

        let handle = CatalogAccessor::open(dictionary_catalog.clone(), DICTIONARY_CATALOG_LOCK);
        let tuple = CatalogAccessor::form_tuple(vec![serde_json::json!(relation.0)]);
        CatalogAccessor::insert(&handle, Some(Oid(dictionary_id)), tuple, xid);
        CatalogAccessor::close(handle, true);

        depend.record(dict_address, relation_address, DependencyKind::Internal);
        events.collect_simple("CREATE COMPRESSION DICTIONARY", vec![dict_address, relation_address], false);
    }
}

/// Collects the string scalars a JSONB column's values contain, for
/// dictionary training against a JSONB column (spec §4.8 "JSONB sample
/// collection specialization"): walks each value's JSONB tree emitting
/// every string scalar, deduplicates by counting occurrences, then sorts by
/// descending frequency, breaking ties by descending length, and keeps a
/// prefix whose total size stays under `max_bytes`.
pub fn collect_jsonb_string_samples(
    rows: impl IntoIterator<Item = serde_json::Value>,
    max_rows: usize,
    max_bytes: usize,
) -> Vec<Vec<u8>> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in rows.into_iter().take(max_rows) {
        walk_strings(&value, &mut counts);
    }

    let mut entries: Vec<(String, usize)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.len().cmp(&a.0.len())));

    let mut total = 0;
    let mut out = Vec::new();
    for (s, _count) in entries {
        if total + s.len() > max_bytes {
            break;
        }
        total += s.len();
        out.push(s.into_bytes());
    }
    out
}

fn walk_strings(value: &serde_json::Value, counts: &mut HashMap<String, usize>) {
    match value {
        serde_json::Value::String(s) => {
            *counts.entry(s.clone()).or_insert(0) += 1;
        }
        serde_json::Value::Array(items) => {
            for item in items {
                walk_strings(item, counts);
            }
        }
        serde_json::Value::Object(map) => {
            for v in map.values() {
                walk_strings(v, counts);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeBuilders(Vec<Oid>);
    impl BuilderFunctionLookup for FakeBuilders {
        fn builder_for(&self, type_oid: Oid) -> Option<Oid> {
            self.0.iter().find(|t| **t == type_oid).copied()
        }
    }

    #[test]
    fn rejects_non_ordinary_table() {
        let column = ColumnInfo {
            attnum: 1,
            type_oid: Oid(25),
            element_type: None,
            compression: ColumnCompression::Zstd,
            opt_out: false,
        };
        let builders = FakeBuilders(vec![Oid(25)]);
        let result = ZstdDictBuilder::validate_target(RelKind::View, &column, &builders);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_a_column_that_opted_out() {
        let column = ColumnInfo {
            attnum: 1,
            type_oid: Oid(25),
            element_type: None,
            compression: ColumnCompression::Zstd,
            opt_out: true,
        };
        let builders = FakeBuilders(vec![Oid(25)]);
        let result = ZstdDictBuilder::validate_target(RelKind::OrdinaryTable, &column, &builders);
        assert!(result.is_err());
    }

    #[test]
    fn array_column_resolves_element_type() {
        let column = ColumnInfo {
            attnum: 1,
            type_oid: Oid(1009), // text[]
            element_type: Some(Oid(25)),
            compression: ColumnCompression::Zstd,
            opt_out: false,
        };
        let builders = FakeBuilders(vec![Oid(25)]);
        let effective = ZstdDictBuilder::validate_target(RelKind::OrdinaryTable, &column, &builders).unwrap();
        assert_eq!(effective, Oid(25));
    }

    #[test]
    fn allocate_dictionary_id_picks_max_plus_one() {
        assert_eq!(ZstdDictBuilder::allocate_dictionary_id(&[1, 2, 5]), 6);
        assert_eq!(ZstdDictBuilder::allocate_dictionary_id(&[]), 1);
    }

    #[test]
    fn finalize_embeds_the_dictionary_id() {
        let blob = ZstdDictBuilder::finalize(7, vec![9, 9, 9]);
        assert_eq!(&blob[0..4], &7u32.to_le_bytes());
        assert_eq!(&blob[4..], &[9, 9, 9]);
    }

    #[test]
    fn jsonb_samples_are_ranked_by_frequency_then_length() {
        let rows = vec![
            serde_json::json!({"a": "common", "b": "rare_but_long_string"}),
            serde_json::json!({"a": "common", "c": ["common", "x"]}),
        ];
        let samples = collect_jsonb_string_samples(rows, MAX_SAMPLE_ROWS, MAX_SAMPLE_BYTES);
        assert_eq!(samples[0], b"common");
    }

    #[test]
    fn record_and_notify_writes_the_dictionary_row() {
        let dictionary_catalog = Arc::new(Relation::new(ZSTD_DICT_CLASS_OID, DICTIONARY_CATALOG_LOCK, Some(0)));
        let mut depend = DependencyRecorder::new();
        let mut events = EventTriggerCore::new(true);
        events.begin_query();

        ZstdDictBuilder::record_and_notify(1, Oid(20_000), &dictionary_catalog, 1, &mut depend, &mut events);

        let rows = CatalogAccessor::scan(
            &CatalogAccessor::open(dictionary_catalog, LockMode::AccessShare),
            crate::oid::Snapshot::SeeEverything,
            1,
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].oid, Some(Oid(1)));
        assert_eq!(events.collected_commands().len(), 1);
    }

    #[test]
    fn train_rejects_empty_sample_set() {
        let result = ZstdDictBuilder::train(&[]);
        assert!(result.is_err());
    }
}
