//! Local package cache
//!
//! `LocalCache` ties references, ledgers, layout and locks together. Every
//! entry is a revision folder that is written once under its write lock and
//! read under a read lock afterwards.
//!
//! # Entry States
//!
//! | State | On disk | Reads |
//! |-------|---------|-------|
//! | Absent | no folder, no ledger record | `NotFound` |
//! | Writing | folder + `<entry>.dirty` | `Corrupted` |
//! | Ready | folder + ledger record | allowed |
//!
//! A crash while writing leaves the entry dirty. Nothing repairs it; the
//! revision has to be removed and fetched again.

pub mod dirty;

pub use dirty::{is_dirty, marker_path};

use crate::error::{StoreError, StoreResult};
use crate::layout::{verify_case, CacheLayout, PackageLayout, RecipeLayout};
use crate::ledger::{RevisionLedger, RevisionRecord};
use crate::lock::{LockManager, LockMode};
use crate::reference::{validate, PackageRef, RecipeRef};
use crate::revision::folder_revision;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// The local store of recipes and packages
#[derive(Debug, Clone)]
pub struct LocalCache {
    layout: CacheLayout,
    locks: LockManager,
    case_check: bool,
}

impl LocalCache {
    /// Open (creating if needed) the store rooted at `root`
    pub fn open(root: impl Into<PathBuf>, locks: LockManager, case_check: bool) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| StoreError::io(format!("creating store {}", root.display()), e))?;
        debug!("Opened store at {}", root.display());
        Ok(Self {
            layout: CacheLayout::new(root),
            locks,
            case_check,
        })
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
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

    // ---- resolution ----

    /// Pin `reference` to a revision.
    ///
    /// Without a revision the ledger's latest is used; an explicit revision
    /// must be recorded in the ledger. Either way a miss is `NotFound`.
    pub fn resolve_latest(&self, reference: &RecipeRef) -> StoreResult<RecipeRef> {
        let list = self.recipe_ledger(reference).load()?;
        let record = list
            .resolve(reference.revision())
            .ok_or_else(|| StoreError::not_found(reference))?;
        debug!("Resolved {} to {}", reference, record.revision_id);
        reference.with_revision(&record.revision_id)
    }

    /// Pin both the recipe revision and the package revision of `pref`
    pub fn resolve_latest_package(&self, pref: &PackageRef) -> StoreResult<PackageRef> {
        let recipe = self.resolve_latest(pref.recipe())?;
        let pinned = pref.with_recipe_revision(recipe.require_revision()?)?;
        let list = self.package_ledger(&pinned)?.load()?;
        let record = list
            .resolve(pinned.revision())
            .ok_or_else(|| StoreError::not_found(&pinned))?;
        pinned.with_revision(&record.revision_id)
    }

    // ---- layout ----

    /// Folders of a recipe revision; `reference` must carry its RREV
    pub fn layout_for(&self, reference: &RecipeRef) -> StoreResult<RecipeLayout> {
        let layout = self.layout.recipe(reference)?;
        if self.case_check {
            verify_case(self.layout.root(), &layout.base)?;
        }
        Ok(layout)
    }

    /// Folders of a package revision; `pref` must carry RREV and PREV
    pub fn package_layout_for(&self, pref: &PackageRef) -> StoreResult<PackageLayout> {
        let layout = self.layout.package(pref)?;
        if self.case_check {
            verify_case(self.layout.root(), &layout.base)?;
        }
        Ok(layout)
    }

    // ---- locked access ----

    /// Resolve `reference`, hold its entry in `mode` and run `f`.
    ///
    /// Reading a dirty entry fails with `Corrupted`, also when an
    /// interrupted write never got the revision recorded.
    pub fn with_lock<T>(
        &self,
        reference: &RecipeRef,
        mode: LockMode,
        f: impl FnOnce(&RecipeLayout) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let resolved = match self.resolve_latest(reference) {
            Err(e @ StoreError::NotFound { .. }) if reference.revision().is_some() => {
                dirty::ensure_clean(&self.layout_for(reference)?.base)?;
                return Err(e);
            }
            resolved => resolved?,
        };
        let layout = self.layout_for(&resolved)?;
        let _lock = self.locks.acquire(&layout.base, mode)?;
        if mode == LockMode::Read {
            dirty::ensure_clean(&layout.base)?;
        }
        f(&layout)
    }

    /// Package counterpart of [`LocalCache::with_lock`]
    pub fn with_package_lock<T>(
        &self,
        pref: &PackageRef,
        mode: LockMode,
        f: impl FnOnce(&PackageLayout) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let pinned = pref.revision().is_some() && pref.recipe().revision().is_some();
        let resolved = match self.resolve_latest_package(pref) {
            Err(e @ StoreError::NotFound { .. }) if pinned => {
                dirty::ensure_clean(&self.package_layout_for(pref)?.base)?;
                return Err(e);
            }
            resolved => resolved?,
        };
        let layout = self.package_layout_for(&resolved)?;
        let _lock = self.locks.acquire(&layout.base, mode)?;
        if mode == LockMode::Read {
            dirty::ensure_clean(&layout.base)?;
        }
        f(&layout)
    }

    // ---- creation ----

    /// Register a recipe revision assigned elsewhere and create its folders
    pub fn create_revision(&self, reference: &RecipeRef) -> StoreResult<RecipeLayout> {
        let layout = self.layout_for(reference)?;
        {
            let _lock = self.locks.acquire(&layout.base, LockMode::Write)?;
            create_folders(layout.folders())?;
        }
        self.recipe_ledger(reference)
            .add_revision(reference.require_revision()?)?;
        info!("Created recipe revision {}", reference);
        Ok(layout)
    }

    /// Register a package revision; its recipe revision must already exist
    pub fn create_package_revision(&self, pref: &PackageRef) -> StoreResult<PackageLayout> {
        self.resolve_latest(pref.recipe())?;
        let layout = self.package_layout_for(pref)?;
        {
            let _lock = self.locks.acquire(&layout.base, LockMode::Write)?;
            create_folders([layout.package.as_path(), layout.build.as_path()])?;
        }
        self.package_ledger(pref)?
            .add_revision(pref.require_revision()?)?;
        info!("Created package revision {}", pref);
        Ok(layout)
    }

    /// Copy `staged` into the store as a recipe revision named after its
    /// content. Returns the reference pinned to that revision.
    pub fn export_recipe(&self, reference: &RecipeRef, staged: &Path) -> StoreResult<RecipeRef> {
        let rrev = folder_revision(staged)?;
        let pinned = reference.without_revision().with_revision(&rrev)?;
        let layout = self.layout_for(&pinned)?;
        let ledger = self.recipe_ledger(&pinned);

        {
            let _lock = self.locks.acquire(&layout.base, LockMode::Write)?;
            if is_present(ledger.load()?.find(&rrev).is_some(), &layout.base) {
                debug!("{} already exported, content unchanged", pinned);
            } else {
                dirty::with_dirty_marker(&layout.base, || {
                    reset_folders(layout.folders())?;
                    copy_tree(staged, &layout.export)
                })?;
            }
        }

        ledger.add_revision(&rrev)?;
        info!("Exported {}", pinned);
        Ok(pinned)
    }

    /// Copy `staged` into the store as a package revision named after its
    /// content. A missing recipe revision resolves to the latest one.
    pub fn export_package(&self, pref: &PackageRef, staged: &Path) -> StoreResult<PackageRef> {
        let recipe = self.resolve_latest(pref.recipe())?;
        let rrev = recipe.require_revision()?;
        let prev = folder_revision(staged)?;
        let pinned = pref
            .without_revision()
            .with_recipe_revision(rrev)?
            .with_revision(&prev)?;
        let layout = self.package_layout_for(&pinned)?;
        let ledger = self.package_ledger(&pinned)?;

        {
            let _lock = self.locks.acquire(&layout.base, LockMode::Write)?;
            if is_present(ledger.load()?.find(&prev).is_some(), &layout.base) {
                debug!("{} already exported, content unchanged", pinned);
            } else {
                dirty::with_dirty_marker(&layout.base, || {
                    reset_folders([layout.package.as_path()])?;
                    create_folders([layout.build.as_path()])?;
                    copy_tree(staged, &layout.package)
                })?;
            }
        }

        ledger.add_revision(&prev)?;
        info!("Exported {}", pinned);
        Ok(pinned)
    }

    /// Materialize a recipe revision by running `extract` against its
    /// folders. The entry is dirty until `extract` succeeds, and the revision
    /// is only recorded afterwards.
    ///
    /// Leftovers of an interrupted attempt are discarded first. A recorded,
    /// clean revision is never rewritten; `extract` is skipped for it.
    pub fn extract_recipe(
        &self,
        reference: &RecipeRef,
        extract: impl FnOnce(&RecipeLayout) -> StoreResult<()>,
    ) -> StoreResult<RecipeLayout> {
        let rrev = reference.require_revision()?;
        let layout = self.layout_for(reference)?;
        let ledger = self.recipe_ledger(reference);
        {
            let _lock = self.locks.acquire(&layout.base, LockMode::Write)?;
            if is_present(ledger.load()?.find(rrev).is_some(), &layout.base) {
                debug!("{} already present, nothing to extract", reference);
                return Ok(layout);
            }
            dirty::with_dirty_marker(&layout.base, || {
                reset_folders(layout.folders())?;
                extract(&layout)
            })?;
        }
        ledger.add_revision(rrev)?;
        info!("Extracted {}", reference);
        Ok(layout)
    }

    /// Package counterpart of [`LocalCache::extract_recipe`]
    pub fn extract_package(
        &self,
        pref: &PackageRef,
        extract: impl FnOnce(&PackageLayout) -> StoreResult<()>,
    ) -> StoreResult<PackageLayout> {
        let prev = pref.require_revision()?;
        self.resolve_latest(pref.recipe())?;
        let layout = self.package_layout_for(pref)?;
        let ledger = self.package_ledger(pref)?;
        {
            let _lock = self.locks.acquire(&layout.base, LockMode::Write)?;
            if is_present(ledger.load()?.find(prev).is_some(), &layout.base) {
                debug!("{} already present, nothing to extract", pref);
                return Ok(layout);
            }
            dirty::with_dirty_marker(&layout.base, || {
                reset_folders([layout.package.as_path()])?;
                create_folders([layout.build.as_path()])?;
                extract(&layout)
            })?;
        }
        ledger.add_revision(prev)?;
        info!("Extracted {}", pref);
        Ok(layout)
    }

    /// Whether the recipe revision entry carries a dirty marker
    pub fn is_recipe_dirty(&self, reference: &RecipeRef) -> StoreResult<bool> {
        Ok(is_dirty(&self.layout.recipe(reference)?.base))
    }

    /// Whether the package revision entry carries a dirty marker
    pub fn is_package_dirty(&self, pref: &PackageRef) -> StoreResult<bool> {
        Ok(is_dirty(&self.layout.package(pref)?.base))
    }

    // ---- listing ----

    /// Recipe revisions, newest first
    pub fn list_revisions(&self, reference: &RecipeRef) -> StoreResult<Vec<RevisionRecord>> {
        Ok(self.recipe_ledger(reference).load()?.newest_first())
    }

    /// Package revisions, newest first. Without an RREV the latest recipe
    /// revision is used.
    pub fn list_package_revisions(&self, pref: &PackageRef) -> StoreResult<Vec<RevisionRecord>> {
        let recipe = self.resolve_latest(pref.recipe())?;
        let pinned = pref.with_recipe_revision(recipe.require_revision()?)?;
        Ok(self.package_ledger(&pinned)?.load()?.newest_first())
    }

    /// Latest package revision of every package id under every recipe
    /// revision of `reference` (or only its own RREV, if it has one)
    pub fn list_packages(&self, reference: &RecipeRef) -> StoreResult<Vec<PackageRef>> {
        let rrevs: Vec<String> = match reference.revision() {
            Some(rrev) => vec![rrev.to_string()],
            None => self
                .list_revisions(reference)?
                .into_iter()
                .map(|r| r.revision_id)
                .collect(),
        };

        let mut packages = Vec::new();
        for rrev in rrevs {
            let recipe = reference.without_revision().with_revision(&rrev)?;
            let root = self.layout.packages_root(&recipe)?;
            for package_id in package_ids(&root)? {
                let pref = PackageRef::new(recipe.clone(), &package_id)?;
                if let Some(latest) = self.package_ledger(&pref)?.latest()? {
                    packages.push(pref.with_revision(&latest.revision_id)?);
                }
            }
        }
        Ok(packages)
    }

    /// Whether `pref` was built from a recipe revision other than the latest
    pub fn is_outdated(&self, pref: &PackageRef) -> StoreResult<bool> {
        let rrev = pref.recipe().require_revision()?;
        let latest = self.resolve_latest(&pref.recipe().without_revision())?;
        Ok(latest.revision() != Some(rrev))
    }

    /// Packages of `reference` whose recipe revision is no longer the latest
    pub fn outdated_packages(&self, reference: &RecipeRef) -> StoreResult<Vec<PackageRef>> {
        let latest = self.resolve_latest(&reference.without_revision())?;
        Ok(self
            .list_packages(&reference.without_revision())?
            .into_iter()
            .filter(|p| p.recipe().revision() != latest.revision())
            .collect())
    }

    // ---- removal ----

    /// Delete a recipe revision: its packages, folder, dirty marker and
    /// ledger record. Dirty entries can always be removed.
    ///
    /// Each package revision is removed under its own write lock first, so a
    /// package that is being read keeps the whole removal waiting.
    pub fn remove_revision(&self, reference: &RecipeRef) -> StoreResult<()> {
        let rrev = reference.require_revision()?;
        let layout = self.layout_for(reference)?;
        let ledger = self.recipe_ledger(reference);

        let _lock = self.locks.acquire(&layout.base, LockMode::Write)?;
        self.remove_packages(reference)?;
        let recorded = ledger.remove_revision(rrev)?;
        let existed = remove_folder(&layout.base)?;
        dirty::clear_dirty(&layout.base)?;
        if !recorded && !existed {
            return Err(StoreError::not_found(reference));
        }
        info!("Removed {}", reference);
        Ok(())
    }

    /// Delete a package revision. The package's build and system
    /// requirements folders go with its last revision.
    pub fn remove_package_revision(&self, pref: &PackageRef) -> StoreResult<()> {
        let prev = pref.require_revision()?;
        let layout = self.package_layout_for(pref)?;
        let ledger = self.package_ledger(pref)?;

        let _lock = self.locks.acquire(&layout.base, LockMode::Write)?;
        let recorded = ledger.remove_revision(prev)?;
        let existed = remove_folder(&layout.base)?;
        dirty::clear_dirty(&layout.base)?;
        if !recorded && !existed {
            return Err(StoreError::not_found(pref));
        }
        if ledger.load()?.is_empty() {
            remove_folder(&layout.build)?;
            remove_folder(&layout.system_reqs)?;
        }
        info!("Removed {}", pref);
        Ok(())
    }

    /// Remove every package revision folder found under a recipe revision
    fn remove_packages(&self, reference: &RecipeRef) -> StoreResult<()> {
        let root = self.layout.packages_root(reference)?;
        for package_id in package_ids(&root)? {
            let pref = PackageRef::new(reference.clone(), &package_id)?;
            for prev in revision_folders(&root.join(&package_id))? {
                self.remove_package_revision(&pref.with_revision(&prev)?)?;
            }
        }
        Ok(())
    }

    /// Delete every revision of `reference`; returns how many were removed
    pub fn remove_recipe(&self, reference: &RecipeRef) -> StoreResult<usize> {
        let base = reference.without_revision();
        let revisions = self.list_revisions(&base)?;
        if revisions.is_empty() {
            return Err(StoreError::not_found(&base));
        }
        for record in &revisions {
            self.remove_revision(&base.with_revision(&record.revision_id)?)?;
        }
        self.recipe_ledger(&base).clear()?;
        Ok(revisions.len())
    }
}

fn create_folders<'a>(folders: impl IntoIterator<Item = &'a Path>) -> StoreResult<()> {
    for folder in folders {
        fs::create_dir_all(folder)
            .map_err(|e| StoreError::io(format!("creating {}", folder.display()), e))?;
    }
    Ok(())
}

/// Recreate `folders` empty, dropping anything an earlier write left behind
fn reset_folders<'a>(folders: impl IntoIterator<Item = &'a Path>) -> StoreResult<()> {
    for folder in folders {
        if remove_folder(folder)? {
            debug!("Discarded previous content of {}", folder.display());
        }
        fs::create_dir_all(folder)
            .map_err(|e| StoreError::io(format!("creating {}", folder.display()), e))?;
    }
    Ok(())
}

/// A recorded entry whose folder exists and holds no dirty marker
fn is_present(recorded: bool, base: &Path) -> bool {
    recorded && base.is_dir() && !is_dirty(base)
}

/// Remove `folder` recursively; returns whether it existed
fn remove_folder(folder: &Path) -> StoreResult<bool> {
    match fs::remove_dir_all(folder) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io(format!("removing {}", folder.display()), e)),
    }
}

/// Copy the files under `from` into `to`, keeping relative paths
fn copy_tree(from: &Path, to: &Path) -> StoreResult<()> {
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|e| {
            let context = format!("walking {}", from.display());
            StoreError::io(context, e.into())
        })?;
        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| StoreError::io(format!("creating {}", target.display()), e))?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target).map_err(|e| {
                StoreError::io(format!("copying {}", entry.path().display()), e)
            })?;
        }
    }
    Ok(())
}

/// Revision folders under a package id folder
fn revision_folders(root: &Path) -> StoreResult<Vec<String>> {
    subfolders(root, |name| validate::validate_revision("package_revision", name).is_ok())
}

/// Package id folders under a recipe revision's `package/` folder
fn package_ids(root: &Path) -> StoreResult<Vec<String>> {
    subfolders(root, |name| validate::validate_package_id(name).is_ok())
}

/// Sorted names of the folders under `root` accepted by `keep`
fn subfolders(root: &Path, keep: impl Fn(&str) -> bool) -> StoreResult<Vec<String>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(format!("listing {}", root.display()), e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(format!("listing {}", root.display()), e))?;
        if !entry.path().is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if keep(name) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::LockOptions;
    use std::time::Duration;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> LocalCache {
        let locks = LockManager::new(LockOptions {
            read_delay: Duration::from_millis(1),
            write_delay: Duration::from_millis(1),
            ..Default::default()
        });
        LocalCache::open(dir.path().join("store"), locks, true).unwrap()
    }

    fn staged(dir: &TempDir, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let root = dir.path().join(name);
        for (path, content) in files {
            let path = root.join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        root
    }

    fn recipe(text: &str) -> RecipeRef {
        RecipeRef::parse_partial(text).unwrap()
    }

    #[test]
    fn add_remove_scenario() {
        let dir = TempDir::new().unwrap();
        let cache = store(&dir);
        let lib = recipe("lib/1.0@user/channel");

        cache.create_revision(&lib.with_revision("aaa").unwrap()).unwrap();
        cache.create_revision(&lib.with_revision("bbb").unwrap()).unwrap();
        assert_eq!(cache.resolve_latest(&lib).unwrap().revision(), Some("bbb"));

        cache.remove_revision(&lib.with_revision("bbb").unwrap()).unwrap();
        assert_eq!(cache.resolve_latest(&lib).unwrap().revision(), Some("aaa"));

        cache.remove_revision(&lib.with_revision("aaa").unwrap()).unwrap();
        assert!(matches!(
            cache.resolve_latest(&lib),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn explicit_revision_must_be_recorded() {
        let dir = TempDir::new().unwrap();
        let cache = store(&dir);
        let lib = recipe("lib/1.0");
        cache.create_revision(&lib.with_revision("aaa").unwrap()).unwrap();

        let pinned = lib.with_revision("aaa").unwrap();
        assert_eq!(cache.resolve_latest(&pinned).unwrap(), pinned);

        let err = cache
            .resolve_latest(&lib.with_revision("zzz").unwrap())
            .unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn created_folders_exist() {
        let dir = TempDir::new().unwrap();
        let cache = store(&dir);
        let layout = cache
            .create_revision(&recipe("lib/1.0#aaa"))
            .unwrap();
        for folder in layout.folders() {
            assert!(folder.is_dir(), "{} missing", folder.display());
        }
    }

    #[test]
    fn export_is_content_addressed() {
        let dir = TempDir::new().unwrap();
        let cache = store(&dir);
        let v1 = staged(&dir, "v1", &[("conanfile.py", "one")]);
        let v2 = staged(&dir, "v2", &[("conanfile.py", "two")]);
        let lib = recipe("lib/1.0@user/channel");

        let first = cache.export_recipe(&lib, &v1).unwrap();
        let again = cache.export_recipe(&lib, &v1).unwrap();
        assert_eq!(first, again);

        let second = cache.export_recipe(&lib, &v2).unwrap();
        assert_ne!(first.revision(), second.revision());
        assert_eq!(cache.resolve_latest(&lib).unwrap(), second);

        // re-exporting old content makes it latest again
        cache.export_recipe(&lib, &v1).unwrap();
        assert_eq!(cache.resolve_latest(&lib).unwrap(), first);
        assert_eq!(cache.list_revisions(&lib).unwrap().len(), 2);

        let exported = cache.layout_for(&first).unwrap().export.join("conanfile.py");
        assert_eq!(fs::read_to_string(exported).unwrap(), "one");
    }

    #[test]
    fn read_lock_gives_layout() {
        let dir = TempDir::new().unwrap();
        let cache = store(&dir);
        let src = staged(&dir, "src", &[("conanfile.py", "x")]);
        let lib = recipe("lib/1.0");
        let pinned = cache.export_recipe(&lib, &src).unwrap();

        let content = cache
            .with_lock(&lib, LockMode::Read, |layout| {
                assert_eq!(layout.reference, pinned);
                fs::read_to_string(layout.export.join("conanfile.py"))
                    .map_err(|e| StoreError::io("reading", e))
            })
            .unwrap();
        assert_eq!(content, "x");
    }

    fn connection_reset() -> StoreError {
        StoreError::Fetch {
            url: "https://remote/lib".into(),
            reason: "connection reset".into(),
        }
    }

    fn file_names(folder: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(folder)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn interrupted_extraction_is_corrupted() {
        let dir = TempDir::new().unwrap();
        let cache = store(&dir);
        let lib = recipe("lib/1.0#aaa");

        let result = cache.extract_recipe(&lib, |layout| {
            fs::write(layout.export.join("partial"), "half").unwrap();
            Err(connection_reset())
        });
        assert!(result.is_err());
        assert!(cache.is_recipe_dirty(&lib).unwrap());

        // never recorded, but still reported as corrupted rather than absent
        let read = cache.with_lock(&lib, LockMode::Read, |_| Ok(()));
        assert!(matches!(read, Err(StoreError::Corrupted { .. })));

        // removal still works and clears the marker
        cache.remove_revision(&lib).unwrap();
        assert!(!cache.is_recipe_dirty(&lib).unwrap());
        assert!(matches!(
            cache.with_lock(&lib, LockMode::Read, |_| Ok(())),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn interrupted_package_extraction_is_corrupted() {
        let dir = TempDir::new().unwrap();
        let cache = store(&dir);
        cache.create_revision(&recipe("lib/1.0#aaa")).unwrap();
        let pref = PackageRef::parse_partial("lib/1.0#aaa:pkgid1#p1").unwrap();

        let result = cache.extract_package(&pref, |_| Err(connection_reset()));
        assert!(result.is_err());
        assert!(cache.is_package_dirty(&pref).unwrap());
        assert!(matches!(
            cache.with_package_lock(&pref, LockMode::Read, |_| Ok(())),
            Err(StoreError::Corrupted { .. })
        ));
    }

    #[test]
    fn reextraction_discards_interrupted_content() {
        let dir = TempDir::new().unwrap();
        let cache = store(&dir);
        let lib = recipe("lib/1.0#ccc");

        let crashed = cache.extract_recipe(&lib, |layout| {
            fs::write(layout.export.join("partial_from_crash"), "half").unwrap();
            Err(connection_reset())
        });
        assert!(crashed.is_err());

        let layout = cache
            .extract_recipe(&lib, |layout| {
                fs::write(layout.export.join("conanfile.py"), "remote")
                    .map_err(|e| StoreError::io("writing", e))
            })
            .unwrap();
        assert_eq!(file_names(&layout.export), vec!["conanfile.py"]);
        assert!(!cache.is_recipe_dirty(&lib).unwrap());
        assert_eq!(cache.list_revisions(&lib).unwrap().len(), 1);
    }

    #[test]
    fn present_revision_is_not_extracted_again() {
        let dir = TempDir::new().unwrap();
        let cache = store(&dir);
        let lib = recipe("lib/1.0#ccc");
        cache
            .extract_recipe(&lib, |layout| {
                fs::write(layout.export.join("conanfile.py"), "first")
                    .map_err(|e| StoreError::io("writing", e))
            })
            .unwrap();

        let mut ran = false;
        let layout = cache
            .extract_recipe(&lib, |_| {
                ran = true;
                Ok(())
            })
            .unwrap();
        assert!(!ran);
        assert_eq!(
            fs::read_to_string(layout.export.join("conanfile.py")).unwrap(),
            "first"
        );
        assert_eq!(cache.list_revisions(&lib).unwrap().len(), 1);
    }

    #[test]
    fn successful_extraction_records_revision() {
        let dir = TempDir::new().unwrap();
        let cache = store(&dir);
        let lib = recipe("lib/1.0#ccc");
        cache
            .extract_recipe(&lib, |layout| {
                fs::write(layout.export.join("conanfile.py"), "remote")
                    .map_err(|e| StoreError::io("writing", e))
            })
            .unwrap();
        assert!(!cache.is_recipe_dirty(&lib).unwrap());
        assert_eq!(
            cache.resolve_latest(&lib.without_revision()).unwrap(),
            lib
        );
    }

    #[test]
    fn packages_and_outdated() {
        let dir = TempDir::new().unwrap();
        let cache = store(&dir);
        let lib = recipe("lib/1.0");
        let r1 = cache
            .export_recipe(&lib, &staged(&dir, "r1", &[("conanfile.py", "1")]))
            .unwrap();

        let built = staged(&dir, "bin", &[("lib/liblib.a", "binary")]);
        let pref = PackageRef::new(r1.clone(), "pkgid1").unwrap();
        let p1 = cache.export_package(&pref, &built).unwrap();
        assert_eq!(p1.recipe(), &r1);
        assert!(!cache.is_outdated(&p1).unwrap());
        assert_eq!(cache.list_packages(&lib).unwrap(), vec![p1.clone()]);
        assert_eq!(
            cache.resolve_latest_package(&pref.without_revision()).unwrap(),
            p1
        );

        let r2 = cache
            .export_recipe(&lib, &staged(&dir, "r2", &[("conanfile.py", "2")]))
            .unwrap();
        assert!(cache.is_outdated(&p1).unwrap());
        assert_eq!(cache.outdated_packages(&lib).unwrap(), vec![p1.clone()]);

        // a package for the new recipe revision is not outdated
        let p2 = cache
            .export_package(&PackageRef::new(r2, "pkgid1").unwrap(), &built)
            .unwrap();
        assert!(!cache.is_outdated(&p2).unwrap());
        assert_eq!(cache.list_packages(&lib).unwrap().len(), 2);

        cache.remove_package_revision(&p1).unwrap();
        assert!(cache.outdated_packages(&lib).unwrap().is_empty());
    }

    #[test]
    fn package_needs_known_recipe_revision() {
        let dir = TempDir::new().unwrap();
        let cache = store(&dir);
        let pref = PackageRef::parse("lib/1.0@user/channel#nope:pkgid1#p1").unwrap();
        assert!(matches!(
            cache.create_package_revision(&pref),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn package_revisions_listed_newest_first() {
        let dir = TempDir::new().unwrap();
        let cache = store(&dir);
        cache.create_revision(&recipe("lib/1.0#aaa")).unwrap();
        for prev in ["p1", "p2", "p3"] {
            let pref = PackageRef::parse_partial(&format!("lib/1.0#aaa:pkgid1#{}", prev)).unwrap();
            cache.create_package_revision(&pref).unwrap();
        }

        let listed: Vec<_> = cache
            .list_package_revisions(&PackageRef::parse_partial("lib/1.0:pkgid1").unwrap())
            .unwrap()
            .into_iter()
            .map(|r| r.revision_id)
            .collect();
        assert_eq!(listed, vec!["p3", "p2", "p1"]);
    }

    #[test]
    fn remove_recipe_removes_everything() {
        let dir = TempDir::new().unwrap();
        let cache = store(&dir);
        let lib = recipe("lib/1.0");
        for rrev in ["aaa", "bbb"] {
            cache.create_revision(&lib.with_revision(rrev).unwrap()).unwrap();
        }

        assert_eq!(cache.remove_recipe(&lib).unwrap(), 2);
        assert!(cache.list_revisions(&lib).unwrap().is_empty());
        assert!(!cache.layout().recipe_ledger(&lib).exists());
        assert!(matches!(
            cache.remove_recipe(&lib),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn removing_unknown_revision_is_not_found() {
        let dir = TempDir::new().unwrap();
        let cache = store(&dir);
        assert!(matches!(
            cache.remove_revision(&recipe("lib/1.0#aaa")),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn removing_recipe_revision_waits_for_package_readers() {
        let dir = TempDir::new().unwrap();
        let locks = LockManager::new(LockOptions {
            read_delay: Duration::from_millis(1),
            write_delay: Duration::from_millis(1),
            ..Default::default()
        })
        .with_max_attempts(2);
        let cache = LocalCache::open(dir.path().join("store"), locks, true).unwrap();

        let lib = recipe("lib/1.0#aaa");
        cache.create_revision(&lib).unwrap();
        let pref = PackageRef::parse_partial("lib/1.0#aaa:pkgid1#p1").unwrap();
        cache.create_package_revision(&pref).unwrap();

        cache
            .with_package_lock(&pref, LockMode::Read, |layout| {
                assert!(matches!(
                    cache.remove_revision(&lib),
                    Err(StoreError::LockBusy { .. })
                ));
                assert!(layout.package.is_dir());
                Ok(())
            })
            .unwrap();
        assert!(cache.resolve_latest(&lib).is_ok());

        cache.remove_revision(&lib).unwrap();
        assert!(!cache.layout_for(&lib).unwrap().base.exists());
        assert!(matches!(
            cache.resolve_latest_package(&pref),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn removal_rejects_case_alias() {
        let dir = TempDir::new().unwrap();
        let cache = store(&dir);
        cache.create_revision(&recipe("Lib/1.0#aaa")).unwrap();

        assert!(matches!(
            cache.remove_revision(&recipe("lib/1.0#aaa")),
            Err(StoreError::CaseMismatch { .. })
        ));
        assert!(matches!(
            cache.remove_package_revision(
                &PackageRef::parse_partial("lib/1.0#aaa:pkgid1#p1").unwrap()
            ),
            Err(StoreError::CaseMismatch { .. })
        ));
        assert!(cache.resolve_latest(&recipe("Lib/1.0#aaa")).is_ok());
    }

    #[test]
    fn case_collision_rejected() {
        let dir = TempDir::new().unwrap();
        let cache = store(&dir);
        cache.create_revision(&recipe("Lib/1.0#aaa")).unwrap();
        assert!(matches!(
            cache.create_revision(&recipe("lib/1.0#aaa")),
            Err(StoreError::CaseMismatch { .. })
        ));
    }
}
