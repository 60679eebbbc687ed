//! Package references: `<recipe>:package_id[#prev]`

use super::recipe::{split_revision, RecipeRef};
use super::validate::{validate_package_id, validate_revision};
use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identifier of one binary package of a recipe, optionally pinned to a
/// package revision (PREV). The PREV is nested under the recipe's RREV.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageRef {
    recipe: RecipeRef,
    package_id: String,
    revision: Option<String>,
}

impl PackageRef {
    /// Build a package reference for `recipe`
    pub fn new(recipe: RecipeRef, package_id: &str) -> StoreResult<Self> {
        validate_package_id(package_id)?;
        Ok(Self {
            recipe,
            package_id: package_id.to_string(),
            revision: None,
        })
    }

    /// Parse with a recipe part that must carry `@user/channel`
    pub fn parse(text: &str) -> StoreResult<Self> {
        Self::parse_with(text, false)
    }

    /// Parse with a recipe part that may omit `@user/channel`
    pub fn parse_partial(text: &str) -> StoreResult<Self> {
        Self::parse_with(text, true)
    }

    fn parse_with(text: &str, allow_partial: bool) -> StoreResult<Self> {
        let text = text.trim();
        let (recipe_text, package_text) = text
            .split_once(':')
            .ok_or_else(|| StoreError::malformed(text, "missing ':package_id'"))?;

        if package_text.contains(':') {
            return Err(StoreError::malformed(text, "more than one ':'"));
        }

        let recipe = if allow_partial {
            RecipeRef::parse_partial(recipe_text)?
        } else {
            RecipeRef::parse(recipe_text)?
        };

        let (package_id, revision) = split_revision(package_text)?;
        if package_id.is_empty() {
            return Err(StoreError::malformed(text, "empty package id"));
        }
        validate_package_id(package_id)?;
        if let Some(revision) = revision {
            validate_revision("package_revision", revision)?;
        }

        Ok(Self {
            recipe,
            package_id: package_id.to_string(),
            revision: revision.map(str::to_string),
        })
    }

    pub fn recipe(&self) -> &RecipeRef {
        &self.recipe
    }

    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    /// Copy pinned to package revision `revision`
    pub fn with_revision(&self, revision: &str) -> StoreResult<Self> {
        validate_revision("package_revision", revision)?;
        Ok(Self {
            revision: Some(revision.to_string()),
            ..self.clone()
        })
    }

    /// Copy with the package revision dropped (recipe revision kept)
    pub fn without_revision(&self) -> Self {
        Self {
            revision: None,
            ..self.clone()
        }
    }

    /// Copy whose recipe part is pinned to `rrev`
    pub fn with_recipe_revision(&self, rrev: &str) -> StoreResult<Self> {
        Ok(Self {
            recipe: self.recipe.with_revision(rrev)?,
            ..self.clone()
        })
    }

    /// Package revision or a `MissingRevision` error
    pub fn require_revision(&self) -> StoreResult<&str> {
        self.revision().ok_or_else(|| StoreError::MissingRevision {
            reference: self.to_string(),
        })
    }

    /// Canonical text, optionally including both revisions
    pub fn render(&self, with_revisions: bool) -> String {
        let mut out = format!("{}:{}", self.recipe.render(with_revisions), self.package_id);
        if with_revisions {
            if let Some(revision) = &self.revision {
                out.push('#');
                out.push_str(revision);
            }
        }
        out
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(true))
    }
}

impl FromStr for PackageRef {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for PackageRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PackageRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse_partial(&text).map_err(serde::de::Error::custom)
    }
}
