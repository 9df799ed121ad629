//! Per-session state threaded explicitly from the command dispatcher,
//! rather than recovered from thread-locals (spec §9: "For session-local
//! state... use a task-local or explicit context argument").

use crate::oid::Oid;

pub type TransactionId = u64;

/// A session's view of "which database, which backend, which transaction".
/// Carried by value into every call that needs to tell a shared relation
/// from a per-database one, or a temp relation from a permanent one.
#[derive(Debug, Clone, Copy)]
pub struct SessionContext {
    pub database_oid: Oid,
    pub backend_id: i32,
    pub temp_namespace_oid: Option<Oid>,
    pub current_xid: TransactionId,
}

impl SessionContext {
    pub const fn new(database_oid: Oid, backend_id: i32, current_xid: TransactionId) -> Self {
        Self {
            database_oid,
            backend_id,
            temp_namespace_oid: None,
            current_xid,
        }
    }

    pub const fn with_temp_namespace(mut self, namespace_oid: Oid) -> Self {
        self.temp_namespace_oid = Some(namespace_oid);
        self
    }

    pub const fn is_temp(self) -> bool {
        self.temp_namespace_oid.is_some()
    }
}
