//! Per-query event-trigger state stack, command collection, and dispatch
//! (spec §4.7). Grounded on the teacher's own "collect, then format" shape
//! (`diff/*.rs` build typed `MigrationStep`/`*Operation` variants that are
//! rendered later) generalized from "diff result" to "trace of what one DDL
//! statement did", and on the teacher's `catalog/id.rs::DbObjectId`
//! enum-of-kinds style for [`CollectedCommand`].

use crate::object::ObjectAddress;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    DdlCommandStart,
    DdlCommandEnd,
    SqlDrop,
    TableRewrite,
    Login,
}

impl EventName {
    pub const fn as_str(self) -> &'static str {
        match self {
            EventName::DdlCommandStart => "ddl_command_start",
            EventName::DdlCommandEnd => "ddl_command_end",
            EventName::SqlDrop => "sql_drop",
            EventName::TableRewrite => "table_rewrite",
            EventName::Login => "login",
        }
    }
}

/// A structured record of one dropped object (spec §3 `SQLDropObject`).
#[derive(Debug, Clone)]
pub struct SqlDropObject {
    pub address: ObjectAddress,
    pub schema_name: Option<String>,
    pub object_name: Option<String>,
    pub object_identity: String,
    pub object_type: String,
    pub original: bool,
    pub normal: bool,
    pub is_temp: bool,
    pub address_names: Vec<String>,
    pub address_args: Vec<String>,
}

/// Sentinel schema name substituted for a temp object belonging to another
/// session (spec §4.7 "Drop collection policy", S5).
pub const TEMP_SCHEMA_SENTINEL: &str = "pg_temp";

/// One collected command (spec §3 `CollectedCommand`). Shared fields
/// (`parse_tree`, `in_extension`) are lifted out of the variant per spec
/// §9's "variadic `CollectedCommand` payload" note; the parse tree itself is
/// the command dispatcher's concern (spec §1 Non-goals) so it is kept here
/// as an opaque string placeholder rather than a real AST type.
#[derive(Debug, Clone)]
pub struct CollectedCommand {
    pub kind: CollectedCommandKind,
    pub affected: Vec<ObjectAddress>,
    pub parse_tree: String,
    pub in_extension: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectedCommandKind {
    Simple { command_tag: String },
    AlterTable { command_tag: String, subcommands: Vec<String> },
    AlterOpFamily,
    CreateOpClass,
    AlterTsConfig,
    AlterDefaultPrivileges,
    Grant,
}

/// Per-query frame (spec §3 `EventTriggerQueryState`, §4.7 state machine).
/// Stackable so DDL nested inside DDL (e.g. a function body issuing its own
/// DDL) pushes its own frame; `begin_query`/`end_query` are required to
/// balance even under error (spec §3 invariant 5).
#[derive(Debug, Default)]
pub struct QueryFrame {
    pub dropped_objects: Vec<SqlDropObject>,
    pub in_sql_drop: bool,
    pub table_rewrite_oid: Option<crate::oid::Oid>,
    pub inhibit_collection: bool,
    pub collected_commands: Vec<CollectedCommand>,
    in_progress_alter_table: Option<(String, Vec<String>, Vec<ObjectAddress>)>,
}

/// A user-defined trigger function registered for one or more event names
/// (spec §6 "Trigger-function ABI").
#[derive(Debug, Clone)]
pub struct Trigger {
    pub name: String,
    pub event: EventName,
    pub enabled_always: bool,
    pub enabled_replica: bool,
    /// Empty set means "all command tags" (spec §4.7 "Trigger filtering").
    pub tag_filter: HashSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationRole {
    Origin,
    Replica,
    Local,
}

/// The per-session event-trigger engine: frame stack, trigger cache, and
/// login fast-path flag (spec §4.7).
pub struct EventTriggerCore {
    pub event_triggers_enabled: bool,
    frames: Vec<QueryFrame>,
    triggers: Vec<Trigger>,
    login_flag_cache: Option<bool>,
}

impl EventTriggerCore {
    pub fn new(event_triggers_enabled: bool) -> Self {
        Self {
            event_triggers_enabled,
            frames: Vec::new(),
            triggers: Vec::new(),
            login_flag_cache: None,
        }
    }

    pub fn register_trigger(&mut self, trigger: Trigger) {
        self.triggers.push(trigger);
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Pushes a new query frame. Returns `false` (and pushes nothing) when
    /// `event_triggers` is disabled, matching spec §6's "If false, every
    /// hook in §4.7 returns immediately" — there is then nothing to collect
    /// and no frame to balance.
    pub fn begin_query(&mut self) -> bool {
        if !self.event_triggers_enabled {
            return false;
        }
        self.frames.push(QueryFrame::default());
        true
    }

    /// Pops exactly the frame `begin_query` pushed (spec §3 invariant 5).
    /// Called unconditionally by the caller's `finally`/`PG_CATCH`-style
    /// cleanup (spec §7 propagation policy), so it is idempotent-safe to
    /// call when no frame was pushed.
    pub fn end_query(&mut self) -> Option<QueryFrame> {
        self.frames.pop()
    }

    fn current_frame_mut(&mut self) -> Option<&mut QueryFrame> {
        self.frames.last_mut()
    }

    pub fn ddl_command_start(&self) {
        // No-op collection point; fires immediately (spec §4.7).
    }

    pub fn collect_simple(&mut self, command_tag: &str, affected: Vec<ObjectAddress>, in_extension: bool) {
        if !self.event_triggers_enabled {
            return;
        }
        if let Some(frame) = self.current_frame_mut() {
            if frame.inhibit_collection {
                return;
            }
            frame.collected_commands.push(CollectedCommand {
                kind: CollectedCommandKind::Simple {
                    command_tag: command_tag.to_string(),
                },
                affected,
                parse_tree: command_tag.to_string(),
                in_extension,
            });
        }
    }

    pub fn collect_alter_table_start(&mut self, command_tag: &str, affected: Vec<ObjectAddress>) {
        if let Some(frame) = self.current_frame_mut() {
            frame.in_progress_alter_table = Some((command_tag.to_string(), Vec::new(), affected));
        }
    }

    pub fn collect_alter_table_subcmd(&mut self, subcommand: &str) {
        if let Some(frame) = self.current_frame_mut()
            && let Some((_, subs, _)) = frame.in_progress_alter_table.as_mut()
        {
            subs.push(subcommand.to_string());
        }
    }

    pub fn alter_table_end(&mut self, in_extension: bool) {
        if let Some(frame) = self.current_frame_mut()
            && let Some((command_tag, subcommands, affected)) = frame.in_progress_alter_table.take()
        {
            if !frame.inhibit_collection {
                frame.collected_commands.push(CollectedCommand {
                    kind: CollectedCommandKind::AlterTable { command_tag, subcommands },
                    affected,
                    parse_tree: "ALTER TABLE".to_string(),
                    in_extension,
                });
            }
        }
    }

    /// Records one dropped object (spec §4.7 "Drop collection policy").
    /// Temp-schema objects belonging to *other* sessions are filtered out;
    /// objects in the current session's own temp schema keep the sentinel
    /// schema name so the trigger never learns another session's private
    /// schema name (spec S5).
    pub fn collect_drop(
        &mut self,
        address: ObjectAddress,
        schema_name: Option<String>,
        object_name: Option<String>,
        object_identity: String,
        object_type: String,
        original: bool,
        normal: bool,
        is_temp: bool,
        belongs_to_other_session: bool,
    ) {
        if !self.event_triggers_enabled || belongs_to_other_session {
            return;
        }
        let Some(frame) = self.current_frame_mut() else {
            return;
        };
        let schema_name = if is_temp {
            Some(TEMP_SCHEMA_SENTINEL.to_string())
        } else {
            schema_name
        };
        frame.dropped_objects.push(SqlDropObject {
            address,
            schema_name,
            object_name,
            object_identity,
            object_type,
            original,
            normal,
            is_temp,
            address_names: Vec::new(),
            address_args: Vec::new(),
        });
    }

    /// Runs the `sql_drop` hook: sets `in_sql_drop`, invokes matching
    /// triggers, clears the flag on every exit path including panics in
    /// `trigger_runner` (spec §4.7 "PG_TRY/FINALLY resets flag").
    pub fn run_sql_drop(
        &mut self,
        command_tag: &str,
        role: ReplicationRole,
        mut trigger_runner: impl FnMut(&Trigger, &[SqlDropObject]),
    ) {
        if !self.event_triggers_enabled {
            return;
        }
        if let Some(frame) = self.current_frame_mut() {
            frame.in_sql_drop = true;
        }

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let dropped = self
                .frames
                .last()
                .map(|f| f.dropped_objects.clone())
                .unwrap_or_default();
            if !dropped.is_empty() {
                for trigger in self.matching_triggers(EventName::SqlDrop, command_tag, role) {
                    trigger_runner(&trigger, &dropped);
                }
            }
        }));

        if let Some(frame) = self.current_frame_mut() {
            frame.in_sql_drop = false;
        }
        if let Err(payload) = result {
            std::panic::resume_unwind(payload);
        }
    }

    /// Runs the `table_rewrite` hook with the flag-guarded rewrite oid
    /// cleared on every exit path (spec §4.7).
    pub fn run_table_rewrite(
        &mut self,
        table_oid: crate::oid::Oid,
        reason: &str,
        role: ReplicationRole,
        mut trigger_runner: impl FnMut(&Trigger, crate::oid::Oid, &str),
    ) {
        if !self.event_triggers_enabled {
            return;
        }
        if let Some(frame) = self.current_frame_mut() {
            frame.table_rewrite_oid = Some(table_oid);
        }
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            for trigger in self.matching_triggers(EventName::TableRewrite, "", role) {
                trigger_runner(&trigger, table_oid, reason);
            }
        }));
        if let Some(frame) = self.current_frame_mut() {
            frame.table_rewrite_oid = None;
        }
        if let Err(payload) = result {
            std::panic::resume_unwind(payload);
        }
    }

    /// Returns the current frame's collected commands, for a
    /// `ddl_command_end` trigger's set-returning helper (spec §6).
    pub fn collected_commands(&self) -> &[CollectedCommand] {
        self.frames
            .last()
            .map(|f| f.collected_commands.as_slice())
            .unwrap_or(&[])
    }

    pub fn dropped_objects(&self) -> &[SqlDropObject] {
        self.frames
            .last()
            .map(|f| f.dropped_objects.as_slice())
            .unwrap_or(&[])
    }

    /// Trigger filtering (spec §4.7 "Trigger filtering"): enabled-state vs
    /// session-replication role, then command-tag set (empty = all tags).
    pub fn matching_triggers(
        &self,
        event: EventName,
        command_tag: &str,
        role: ReplicationRole,
    ) -> Vec<Trigger> {
        self.triggers
            .iter()
            .filter(|t| t.event == event)
            .filter(|t| match role {
                ReplicationRole::Replica => t.enabled_replica,
                ReplicationRole::Origin | ReplicationRole::Local => t.enabled_always,
            })
            .filter(|t| t.tag_filter.is_empty() || t.tag_filter.contains(command_tag))
            .cloned()
            .collect()
    }

    /// Login fast path (spec §4.7 "Login fast path", §8 property 7): if the
    /// cached login-trigger list is empty, no catalog read happens at all.
    pub fn fire_login(&mut self, database_has_login_event_triggers: bool, mut trigger_runner: impl FnMut(&Trigger)) {
        let login_triggers = self.matching_triggers(EventName::Login, "", ReplicationRole::Origin);
        if login_triggers.is_empty() {
            // No locks, no catalog consult beyond the boolean the caller
            // already has cached from pg_database (spec §4.7, §5 "Shared
            // resources": "pg_database is cached").
            self.login_flag_cache = Some(false);
            return;
        }
        if !database_has_login_event_triggers {
            return;
        }
        for trigger in &login_triggers {
            trigger_runner(trigger);
        }
    }

    /// Attempts to clear a database's login-event flag after its last login
    /// trigger was dropped and a session finds the cached list empty (spec
    /// §4.7). Takes the lock conditionally (non-blocking): `try_lock`
    /// returning `false` means leave the flag set for a later session to
    /// clear.
    pub fn clear_login_flag_if_unused(&self, try_lock: impl FnOnce() -> bool, recheck_empty: impl FnOnce() -> bool) -> bool {
        let login_triggers = self.matching_triggers(EventName::Login, "", ReplicationRole::Origin);
        if !login_triggers.is_empty() {
            return false;
        }
        if !try_lock() {
            return false;
        }
        recheck_empty()
    }
}
