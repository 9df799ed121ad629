//! Creates text-search configurations, dictionaries, and parsers
//! (SPEC_FULL.md §4). Grounded on the teacher's `catalog/extension.rs`
//! "named object with a member list" shape and the `AggregateCreator`
//! validate → allocate → write → record → post-event pipeline above, here
//! applied to a simpler object with no polymorphism rules to check.

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

pub const TS_CONFIG_CLASS_OID: Oid = Oid(3602);
pub const TS_PARSER_CLASS_OID: Oid = Oid(3601);
pub const TS_DICT_CLASS_OID: Oid = Oid(3600);
pub const TS_TEMPLATE_CLASS_OID: Oid = Oid(3764);

#[derive(Debug, Clone)]
pub struct TextSearchConfigSpec {
    pub name: String,
    pub parser: Oid,
    /// Dictionaries mapped to each token type the parser can emit; creating
    /// a config depends on all of them (spec's NORMAL dependency rule).
    pub dictionaries: Vec<Oid>,
}

#[derive(Debug, Clone)]
pub struct TextSearchDictionarySpec {
    pub name: String,
    pub template: Oid,
}

pub struct TextSearchMgr;

impl TextSearchMgr {
    #[allow(clippy::too_many_arguments)]
    pub fn create_config(
        spec: &TextSearchConfigSpec,
        id_allocator: &IdAllocator,
        config_oid_index: &impl OidIndexProbe,
        config_catalog: &Arc<Relation>,
        xid: TransactionId,
        depend: &mut DependencyRecorder,
        events: &mut EventTriggerCore,
    ) -> Result<Oid, CatalogError> {
        if spec.name.is_empty() {
            return Err(CatalogError::SyntaxError(
                "text search configuration must be named".to_string(),
            ));
        }

        let config_oid = id_allocator.new_oid_for(config_oid_index);
        let handle = CatalogAccessor::open(config_catalog.clone(), LockMode::RowExclusive);
        let tuple = CatalogAccessor::form_tuple(vec![serde_json::json!(spec.name), serde_json::json!(spec.parser.0)]);
        CatalogAccessor::insert(&handle, Some(config_oid), tuple, xid);
        CatalogAccessor::close(handle, true);

        let config_address = ObjectAddress::whole(TS_CONFIG_CLASS_OID, config_oid);

        depend.record(
            config_address,
            ObjectAddress::whole(TS_PARSER_CLASS_OID, spec.parser),
            DependencyKind::Normal,
        );
        for dict in &spec.dictionaries {
            depend.record(
                config_address,
                ObjectAddress::whole(TS_DICT_CLASS_OID, *dict),
                DependencyKind::Normal,
            );
        }

        events.collect_simple("CREATE TEXT SEARCH CONFIGURATION", vec![config_address], false);

        Ok(config_oid)
    }

    pub fn create_dictionary(
        spec: &TextSearchDictionarySpec,
        id_allocator: &IdAllocator,
        dict_oid_index: &impl OidIndexProbe,
        dict_catalog: &Arc<Relation>,
        xid: TransactionId,
        depend: &mut DependencyRecorder,
        events: &mut EventTriggerCore,
    ) -> Result<Oid, CatalogError> {
        if spec.name.is_empty() {
            return Err(CatalogError::SyntaxError(
                "text search dictionary must be named".to_string(),
            ));
        }

        let dict_oid = id_allocator.new_oid_for(dict_oid_index);
        let handle = CatalogAccessor::open(dict_catalog.clone(), LockMode::RowExclusive);
        let tuple = CatalogAccessor::form_tuple(vec![serde_json::json!(spec.name), serde_json::json!(spec.template.0)]);
        CatalogAccessor::insert(&handle, Some(dict_oid), tuple, xid);
        CatalogAccessor::close(handle, true);

        let dict_address = ObjectAddress::whole(TS_DICT_CLASS_OID, dict_oid);

        depend.record(
            dict_address,
            ObjectAddress::whole(TS_TEMPLATE_CLASS_OID, spec.template),
            DependencyKind::Normal,
        );

        events.collect_simple("CREATE TEXT SEARCH DICTIONARY", vec![dict_address], false);

        Ok(dict_oid)
    }
}
