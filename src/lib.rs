//! pkgstore - local package cache for C/C++ dependencies
//!
//! Stores recipe and package revisions on disk, keeps a ledger of revisions
//! per reference and coordinates concurrent access between independent
//! processes through file-based reader/writer locks.

pub mod cache;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod layout;
pub mod ledger;
pub mod lock;
pub mod reference;
pub mod remote;
pub mod revision;
pub mod ui;

pub use cache::LocalCache;
pub use error::{StoreError, StoreResult};
pub use reference::{AnyRef, PackageRef, RecipeRef};
