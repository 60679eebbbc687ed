//! On-disk layout of recipes and packages
//!
//! Every path is derived from a reference alone, without touching the disk:
//!
//! ```text
//! <root>/<name>/<version>/<user|_>/<channel|_>/
//! ├── revisions.txt                  # recipe ledger
//! └── <rrev>/
//!     ├── export/
//!     ├── export_sources/
//!     ├── source/
//!     ├── system_reqs/               # recipe system requirements
//!     │   └── <package_id>/          # package system requirements
//!     ├── build/<package_id>/
//!     └── package/<package_id>/
//!         ├── revisions.txt          # package ledger
//!         └── <prev>/
//! ```
//!
//! Absent user/channel use the reserved `_` segment so every reference has the
//! same tree depth.

use crate::error::{StoreError, StoreResult};
use crate::reference::{PackageRef, RecipeRef, ANONYMOUS};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Ledger file name used for recipes and packages
pub const LEDGER_FILE: &str = "revisions.txt";

pub const EXPORT_FOLDER: &str = "export";
pub const EXPORT_SOURCES_FOLDER: &str = "export_sources";
pub const SOURCE_FOLDER: &str = "source";
pub const SYSTEM_REQS_FOLDER: &str = "system_reqs";
pub const BUILD_FOLDER: &str = "build";
pub const PACKAGES_FOLDER: &str = "package";

/// Folders of one recipe revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeLayout {
    pub reference: RecipeRef,
    /// The revision folder itself (the cache entry)
    pub base: PathBuf,
    pub export: PathBuf,
    pub export_sources: PathBuf,
    pub source: PathBuf,
    pub system_reqs: PathBuf,
}

impl RecipeLayout {
    /// Folders created when the revision is first assigned
    pub fn folders(&self) -> [&Path; 4] {
        [
            &self.export,
            &self.export_sources,
            &self.source,
            &self.system_reqs,
        ]
    }
}

/// Folders of one package revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageLayout {
    pub reference: PackageRef,
    /// The package revision folder (the cache entry), same as `package`
    pub base: PathBuf,
    pub build: PathBuf,
    pub package: PathBuf,
    pub system_reqs: PathBuf,
}

/// Path construction rooted at a store directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/name/version/user/channel`, revision ignored
    pub fn recipe_base(&self, reference: &RecipeRef) -> PathBuf {
        self.root
            .join(reference.name())
            .join(reference.version())
            .join(reference.user().unwrap_or(ANONYMOUS))
            .join(reference.channel().unwrap_or(ANONYMOUS))
    }

    /// Ledger of every revision of `reference`
    pub fn recipe_ledger(&self, reference: &RecipeRef) -> PathBuf {
        self.recipe_base(reference).join(LEDGER_FILE)
    }

    /// Folders of a recipe revision; `reference` must carry its RREV
    pub fn recipe(&self, reference: &RecipeRef) -> StoreResult<RecipeLayout> {
        let rrev = reference.require_revision()?;
        let base = self.recipe_base(reference).join(rrev);
        Ok(RecipeLayout {
            reference: reference.clone(),
            export: base.join(EXPORT_FOLDER),
            export_sources: base.join(EXPORT_SOURCES_FOLDER),
            source: base.join(SOURCE_FOLDER),
            system_reqs: base.join(SYSTEM_REQS_FOLDER),
            base,
        })
    }

    /// `<rrev>/package`, holding one folder per package id
    pub fn packages_root(&self, reference: &RecipeRef) -> StoreResult<PathBuf> {
        Ok(self.recipe(reference)?.base.join(PACKAGES_FOLDER))
    }

    /// `<rrev>/package/<id>`; the recipe part must carry its RREV
    pub fn package_base(&self, pref: &PackageRef) -> StoreResult<PathBuf> {
        Ok(self.packages_root(pref.recipe())?.join(pref.package_id()))
    }

    /// Ledger of every revision of one package id
    pub fn package_ledger(&self, pref: &PackageRef) -> StoreResult<PathBuf> {
        Ok(self.package_base(pref)?.join(LEDGER_FILE))
    }

    /// Folders of a package revision; needs both RREV and PREV
    pub fn package(&self, pref: &PackageRef) -> StoreResult<PackageLayout> {
        let recipe = self.recipe(pref.recipe())?;
        let prev = pref.require_revision()?;
        let package = recipe
            .base
            .join(PACKAGES_FOLDER)
            .join(pref.package_id())
            .join(prev);
        Ok(PackageLayout {
            reference: pref.clone(),
            base: package.clone(),
            build: recipe.base.join(BUILD_FOLDER).join(pref.package_id()),
            package,
            system_reqs: recipe.system_reqs.join(pref.package_id()),
        })
    }
}

/// Check that every existing folder between `root` and `path` has exactly the
/// requested casing.
///
/// On a case-insensitive filesystem `Zlib/` and `zlib/` are one folder, so a
/// request that only matches case-insensitively would silently alias another
/// reference. Folders that do not exist yet are fine.
pub fn verify_case(root: &Path, path: &Path) -> StoreResult<()> {
    let Ok(relative) = path.strip_prefix(root) else {
        return Ok(());
    };

    let mut current = root.to_path_buf();
    for component in relative.components() {
        let Component::Normal(segment) = component else {
            continue;
        };
        let Some(wanted) = segment.to_str() else {
            return Ok(());
        };

        let entries = match fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(StoreError::io(
                    format!("listing {}", current.display()),
                    e,
                ))
            }
        };

        let mut exact = false;
        let mut folded = None;
        for entry in entries {
            let entry =
                entry.map_err(|e| StoreError::io(format!("listing {}", current.display()), e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name == wanted {
                exact = true;
                break;
            }
            if name.eq_ignore_ascii_case(wanted) {
                folded = Some(name.to_string());
            }
        }

        match (exact, folded) {
            (true, _) => current.push(wanted),
            (false, Some(existing)) => {
                debug!("Case collision under {}: {} vs {}", current.display(), wanted, existing);
                return Err(StoreError::CaseMismatch {
                    requested: current.join(wanted),
                    existing: current.join(existing),
                });
            }
            (false, None) => return Ok(()),
        }
    }
    Ok(())
}
