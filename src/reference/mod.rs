//! Reference model for recipes and packages
//!
//! A recipe reference names `name/version@user/channel` and may be pinned to a
//! recipe revision (RREV) with `#rrev`. A package reference appends
//! `:package_id` and may be pinned to a package revision (PREV) with `#prev`.
//!
//! ```text
//! zlib/1.2.13@conan/stable#f3a5...:5ab84d...#0ba3...
//! └─ name/version@user/channel#rrev:package_id#prev
//! ```

pub mod package;
pub mod recipe;
pub mod validate;

pub use package::PackageRef;
pub use recipe::RecipeRef;

use crate::error::StoreResult;
use std::fmt;

/// Reserved segment standing in for an absent user or channel, both in text
/// (`lib/1.0@_/_`) and on disk. Too short to be a valid user or channel.
pub const ANONYMOUS: &str = "_";

/// Either kind of reference, as typed by a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyRef {
    Recipe(RecipeRef),
    Package(PackageRef),
}

impl AnyRef {
    /// Parse a recipe or package reference, allowing partial recipe parts
    pub fn parse(text: &str) -> StoreResult<Self> {
        if text.contains(':') {
            PackageRef::parse_partial(text).map(Self::Package)
        } else {
            RecipeRef::parse_partial(text).map(Self::Recipe)
        }
    }

    /// The recipe part of either kind
    pub fn recipe(&self) -> &RecipeRef {
        match self {
            Self::Recipe(r) => r,
            Self::Package(p) => p.recipe(),
        }
    }
}

impl fmt::Display for AnyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recipe(r) => r.fmt(f),
            Self::Package(p) => p.fmt(f),
        }
    }
}

/// Canonical form of a recipe or package reference text
pub fn normalize(text: &str) -> StoreResult<String> {
    AnyRef::parse(text).map(|r| r.to_string())
}
