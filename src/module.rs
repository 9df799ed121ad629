//! Creates a namespace and executes a stored sub-command list under a
//! temporarily altered search path and owner identity (spec §2 `ModuleCreator`,
//! a 5% share of the component table). Grounded on the teacher's
//! `commands/init/mod.rs` "run a list of steps, then restore state"
//! shape, generalized from "CLI init wizard" to "create one namespace, run
//! its member commands, restore the caller's identity regardless of
//! outcome".

use crate::error::CatalogError;
use crate::oid::Oid;

#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub role_oid: Oid,
}

/// Saved caller state to restore after running a module's sub-commands.
struct SavedContext {
    search_path: Vec<Oid>,
    current_user: Identity,
}

pub struct ModuleCreator {
    search_path: Vec<Oid>,
    current_user: Identity,
}

impl ModuleCreator {
    pub fn new(initial_search_path: Vec<Oid>, initial_user: Identity) -> Self {
        Self {
            search_path: initial_search_path,
            current_user: initial_user,
        }
    }

    /// Creates `namespace` (as OID `namespace_oid`, owned by `owner`), then
    /// runs every entry of `sub_commands` with the search path restricted to
    /// just that namespace and the current user switched to `owner` — the
    /// way an extension's member objects are created under the extension
    /// owner's identity with the new schema first on the path. The saved
    /// search path and identity are restored on every exit path, including
    /// when a sub-command fails partway through (spec §5 "Scoped
    /// acquisition": released on all exit paths).
    pub fn create_namespace_and_run<E>(
        &mut self,
        namespace_oid: Oid,
        owner: Identity,
        mut sub_commands: impl Iterator<Item = impl FnOnce(&ModuleCreator) -> Result<(), E>>,
    ) -> Result<(), E>
    where
        E: From<CatalogError>,
    {
        let saved = SavedContext {
            search_path: self.search_path.clone(),
            current_user: self.current_user,
        };

        self.search_path = vec![namespace_oid];
        self.current_user = owner;

        let result = (|| {
            for command in sub_commands.by_ref() {
                command(self)?;
            }
            Ok(())
        })();

        self.search_path = saved.search_path;
        self.current_user = saved.current_user;

        result
    }

    pub fn search_path(&self) -> &[Oid] {
        &self.search_path
    }

    pub fn current_user(&self) -> Identity {
        self.current_user
    }
}
