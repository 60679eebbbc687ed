//! Field grammar shared by recipe and package references

use crate::error::{StoreError, StoreResult};

/// Longest accepted name, version, user, channel or revision
pub const MAX_CHARS: usize = 51;

/// Shortest accepted name, version, user or channel
pub const MIN_CHARS: usize = 2;

/// Longest accepted package id
pub const MAX_PACKAGE_ID_CHARS: usize = 128;

/// Wildcard accepted in place of any name-like field
pub const WILDCARD: &str = "*";

fn invalid(field: &'static str, value: &str, reason: impl Into<String>) -> StoreError {
    StoreError::InvalidName {
        field,
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Validate a name-like field: name, user or channel (version adds ranges)
pub fn validate_name(field: &'static str, value: &str) -> StoreResult<()> {
    if value == WILDCARD {
        return Ok(());
    }

    let len = value.chars().count();
    if !(MIN_CHARS..=MAX_CHARS).contains(&len) {
        return Err(invalid(
            field,
            value,
            format!("must be between {} and {} characters", MIN_CHARS, MAX_CHARS),
        ));
    }

    let mut chars = value.chars();
    if let Some(first) = chars.next() {
        if !(first.is_ascii_alphanumeric() || first == '_') {
            return Err(invalid(
                field,
                value,
                "must start with a letter, digit or underscore",
            ));
        }
    }

    let allowed = |c: &char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '+' | '-');
    if let Some(bad) = chars.find(|c| !allowed(c)) {
        return Err(invalid(
            field,
            value,
            format!("character '{}' is not allowed", bad),
        ));
    }

    Ok(())
}

/// Validate a version, which may also be a bracketed range expression
pub fn validate_version(value: &str) -> StoreResult<()> {
    if is_version_range(value) {
        return Ok(());
    }
    validate_name("version", value)
}

/// Whether the version is a `[...]` range expression
pub fn is_version_range(value: &str) -> bool {
    value.len() > 2 && value.starts_with('[') && value.ends_with(']')
}

/// Validate a recipe or package revision token
pub fn validate_revision(field: &'static str, value: &str) -> StoreResult<()> {
    let len = value.chars().count();
    if len == 0 || len > MAX_CHARS {
        return Err(invalid(
            field,
            value,
            format!("must be between 1 and {} characters", MAX_CHARS),
        ));
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid(field, value, "must be alphanumeric"));
    }
    Ok(())
}

/// Validate an opaque package id
pub fn validate_package_id(value: &str) -> StoreResult<()> {
    let len = value.chars().count();
    if len == 0 || len > MAX_PACKAGE_ID_CHARS {
        return Err(invalid(
            "package_id",
            value,
            format!("must be between 1 and {} characters", MAX_PACKAGE_ID_CHARS),
        ));
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid("package_id", value, "must be alphanumeric"));
    }
    Ok(())
}
