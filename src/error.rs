//! Typed error kinds for the catalog core (spec §7).
//!
//! Every public entry point returns `Result<T, CatalogError>` so callers can
//! match on kind rather than parse messages. Validation failures before any
//! catalog write are returned directly; failures after a partial write are
//! expected to cause the caller's enclosing transaction to abort.

use crate::object::ObjectAddress;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("object not found: {0}")]
    UndefinedObject(String),

    #[error("{kind} \"{name}\" already exists in namespace {namespace}")]
    DuplicateObject {
        kind: &'static str,
        name: String,
        namespace: u32,
    },

    #[error("permission denied: {0}")]
    InsufficientPrivilege(String),

    #[error("invalid function definition: {0}")]
    InvalidFunctionDefinition(String),

    #[error("datatype mismatch: {0}")]
    DatatypeMismatch(String),

    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),

    #[error("syntax error: {0}")]
    SyntaxError(String),

    #[error("object not in prerequisite state: {0}")]
    ObjectNotInPrerequisiteState(String),

    #[error("query canceled: {0}")]
    QueryCanceled(String),

    #[error("internal catalog invariant violated: {0}")]
    InternalError(String),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

impl CatalogError {
    pub fn undefined(address: ObjectAddress) -> Self {
        CatalogError::UndefinedObject(format!("{address:?}"))
    }
}
