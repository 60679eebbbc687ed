//! Server-side revision index
//!
//! Same `revisions.txt` ledgers and folder tree as the local store, without
//! folder locks: the server serializes writes per request.

use crate::error::{StoreError, StoreResult};
use crate::layout::CacheLayout;
use crate::ledger::{RevisionLedger, RevisionRecord};
use crate::lock::LockManager;
use crate::reference::{PackageRef, RecipeRef};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Revision ledgers and uploaded files of a remote
#[derive(Debug, Clone)]
pub struct RemoteIndex {
    layout: CacheLayout,
    locks: LockManager,
}

impl RemoteIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: CacheLayout::new(root),
            locks: LockManager::no_lock(),
        }
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    fn recipe_ledger(&self, reference: &RecipeRef) -> RevisionLedger {
        RevisionLedger::new(self.layout.recipe_ledger(reference), self.locks.clone())
    }

    fn package_ledger(&self, pref: &PackageRef) -> StoreResult<RevisionLedger> {
        Ok(RevisionLedger::new(
            self.layout.package_ledger(pref)?,
            self.locks.clone(),
        ))
    }

    /// Folder holding the uploaded recipe files of a pinned reference
    pub fn export_folder(&self, reference: &RecipeRef) -> StoreResult<PathBuf> {
        Ok(self.layout.recipe(reference)?.export)
    }

    /// Folder holding the uploaded package files of a pinned package reference
    pub fn package_folder(&self, pref: &PackageRef) -> StoreResult<PathBuf> {
        Ok(self.layout.package(pref)?.package)
    }

    // ---- recipes ----

    /// Record the revision carried by `reference`
    pub fn add_recipe_revision(&self, reference: &RecipeRef) -> StoreResult<RevisionRecord> {
        let rrev = reference.require_revision()?;
        let record = self.recipe_ledger(reference).add_revision(rrev)?;
        info!("Remote: added {}", reference);
        Ok(record)
    }

    pub fn latest_recipe(&self, reference: &RecipeRef) -> StoreResult<Option<RecipeRef>> {
        self.recipe_ledger(reference)
            .latest()?
            .map(|record| reference.with_revision(&record.revision_id))
            .transpose()
    }

    /// Newest first
    pub fn recipe_revisions(&self, reference: &RecipeRef) -> StoreResult<Vec<RevisionRecord>> {
        Ok(self.recipe_ledger(reference).load()?.newest_first())
    }

    /// Drop a recipe revision and everything uploaded under it
    pub fn remove_recipe_revision(&self, reference: &RecipeRef) -> StoreResult<()> {
        let rrev = reference.require_revision()?;
        let recorded = self.recipe_ledger(reference).remove_revision(rrev)?;
        let existed = remove_folder(&self.layout.recipe(reference)?.base)?;
        if !recorded && !existed {
            return Err(StoreError::not_found(reference));
        }
        info!("Remote: removed {}", reference);
        Ok(())
    }

    /// No revision resolves to the latest; an explicit one must be recorded
    pub fn resolve(&self, reference: &RecipeRef) -> StoreResult<RecipeRef> {
        let list = self.recipe_ledger(reference).load()?;
        let record = list
            .resolve(reference.revision())
            .ok_or_else(|| StoreError::not_found(reference))?;
        debug!("Remote: resolved {} to {}", reference, record.revision_id);
        reference.with_revision(&record.revision_id)
    }

    // ---- packages ----

    /// Record the package revision carried by `pref`; needs both revisions
    pub fn add_package_revision(&self, pref: &PackageRef) -> StoreResult<RevisionRecord> {
        self.resolve(pref.recipe())?;
        let prev = pref.require_revision()?;
        let record = self.package_ledger(pref)?.add_revision(prev)?;
        info!("Remote: added {}", pref);
        Ok(record)
    }

    pub fn latest_package(&self, pref: &PackageRef) -> StoreResult<Option<PackageRef>> {
        let pinned = self.pin_recipe(pref)?;
        self.package_ledger(&pinned)?
            .latest()?
            .map(|record| pinned.with_revision(&record.revision_id))
            .transpose()
    }

    /// Newest first
    pub fn package_revisions(&self, pref: &PackageRef) -> StoreResult<Vec<RevisionRecord>> {
        let pinned = self.pin_recipe(pref)?;
        Ok(self.package_ledger(&pinned)?.load()?.newest_first())
    }

    pub fn remove_package_revision(&self, pref: &PackageRef) -> StoreResult<()> {
        let prev = pref.require_revision()?;
        let recorded = self.package_ledger(pref)?.remove_revision(prev)?;
        let existed = remove_folder(&self.layout.package(pref)?.package)?;
        if !recorded && !existed {
            return Err(StoreError::not_found(pref));
        }
        info!("Remote: removed {}", pref);
        Ok(())
    }

    /// Package counterpart of [`RemoteIndex::resolve`]
    pub fn resolve_package(&self, pref: &PackageRef) -> StoreResult<PackageRef> {
        let pinned = self.pin_recipe(pref)?;
        let list = self.package_ledger(&pinned)?.load()?;
        let record = list
            .resolve(pinned.revision())
            .ok_or_else(|| StoreError::not_found(&pinned))?;
        pinned.with_revision(&record.revision_id)
    }

    /// `pref` with its recipe revision resolved
    fn pin_recipe(&self, pref: &PackageRef) -> StoreResult<PackageRef> {
        let recipe = self.resolve(pref.recipe())?;
        pref.with_recipe_revision(recipe.require_revision()?)
    }
}

fn remove_folder(folder: &Path) -> StoreResult<bool> {
    match fs::remove_dir_all(folder) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io(format!("removing {}", folder.display()), e)),
    }
}
