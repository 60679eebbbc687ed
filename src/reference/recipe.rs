//! Recipe references: `name/version[@user/channel][#revision]`

use super::validate::{validate_name, validate_revision, validate_version};
use super::ANONYMOUS;
use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identifier of a recipe, optionally pinned to a recipe revision (RREV)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecipeRef {
    name: String,
    version: String,
    user: Option<String>,
    channel: Option<String>,
    revision: Option<String>,
}

impl RecipeRef {
    /// Build and validate a reference from its parts.
    ///
    /// `user` and `channel` must be both present or both absent.
    pub fn new(
        name: &str,
        version: &str,
        user: Option<&str>,
        channel: Option<&str>,
    ) -> StoreResult<Self> {
        let reference = Self {
            name: name.to_string(),
            version: version.to_string(),
            user: user.map(str::to_string),
            channel: channel.map(str::to_string),
            revision: None,
        };
        if reference.user.is_some() != reference.channel.is_some() {
            return Err(StoreError::malformed(
                reference.to_string(),
                "user and channel must be given together",
            ));
        }
        reference.validate()?;
        Ok(reference)
    }

    /// Parse a reference that must carry `@user/channel` (`@_/_` or a bare
    /// `@` for anonymous ones).
    pub fn parse(text: &str) -> StoreResult<Self> {
        Self::parse_with(text, false)
    }

    /// Parse a reference that may omit `@user/channel` entirely.
    pub fn parse_partial(text: &str) -> StoreResult<Self> {
        Self::parse_with(text, true)
    }

    fn parse_with(text: &str, allow_partial: bool) -> StoreResult<Self> {
        let text = text.trim();
        if text.contains(':') {
            return Err(StoreError::malformed(
                text,
                "package references are not recipe references",
            ));
        }

        let (body, revision) = split_revision(text)?;

        let (name_version, user_channel) = match body.split_once('@') {
            Some((left, right)) => (left, Some(right)),
            None => (body, None),
        };

        let (name, version) = match name_version.split('/').collect::<Vec<_>>().as_slice() {
            [name, version] if !name.is_empty() && !version.is_empty() => (*name, *version),
            _ => return Err(StoreError::malformed(text, "expected name/version")),
        };

        let (user, channel) = match user_channel {
            None if allow_partial => (None, None),
            None => return Err(StoreError::malformed(text, "missing @user/channel")),
            Some("") => (None, None),
            Some(right) => match right.split('/').collect::<Vec<_>>().as_slice() {
                [user, channel] if !user.is_empty() && !channel.is_empty() => {
                    anonymous_pair(text, user, channel)?
                }
                _ => return Err(StoreError::malformed(text, "expected @user/channel")),
            },
        };

        let reference = Self {
            name: name.to_string(),
            version: version.to_string(),
            user,
            channel,
            revision: revision.map(str::to_string),
        };
        reference.validate()?;
        Ok(reference)
    }

    /// Check every field against the reference grammar
    pub fn validate(&self) -> StoreResult<()> {
        validate_name("name", &self.name)?;
        validate_version(&self.version)?;
        if let Some(user) = &self.user {
            validate_name("user", user)?;
        }
        if let Some(channel) = &self.channel {
            validate_name("channel", channel)?;
        }
        if let Some(revision) = &self.revision {
            validate_revision("revision", revision)?;
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    /// Whether the reference has no user/channel
    pub fn is_anonymous(&self) -> bool {
        self.user.is_none()
    }

    /// Copy of this reference pinned to `revision`
    pub fn with_revision(&self, revision: &str) -> StoreResult<Self> {
        validate_revision("revision", revision)?;
        Ok(Self {
            revision: Some(revision.to_string()),
            ..self.clone()
        })
    }

    /// Copy of this reference with the revision dropped
    pub fn without_revision(&self) -> Self {
        Self {
            revision: None,
            ..self.clone()
        }
    }

    /// Revision or a `MissingRevision` error
    pub fn require_revision(&self) -> StoreResult<&str> {
        self.revision().ok_or_else(|| StoreError::MissingRevision {
            reference: self.to_string(),
        })
    }

    /// Canonical text, optionally including the revision
    pub fn render(&self, with_revision: bool) -> String {
        let mut out = format!("{}/{}", self.name, self.version);
        if let (Some(user), Some(channel)) = (&self.user, &self.channel) {
            out.push('@');
            out.push_str(user);
            out.push('/');
            out.push_str(channel);
        }
        if with_revision {
            if let Some(revision) = &self.revision {
                out.push('#');
                out.push_str(revision);
            }
        }
        out
    }
}

/// Split off a single trailing `#revision`
pub(crate) fn split_revision(text: &str) -> StoreResult<(&str, Option<&str>)> {
    match text.split('#').collect::<Vec<_>>().as_slice() {
        [body] => Ok((body, None)),
        [body, revision] if !revision.is_empty() => Ok((body, Some(revision))),
        [_, _] => Err(StoreError::malformed(text, "empty revision after '#'")),
        _ => Err(StoreError::malformed(text, "more than one '#'")),
    }
}

fn anonymous_pair(
    text: &str,
    user: &str,
    channel: &str,
) -> StoreResult<(Option<String>, Option<String>)> {
    match (user == ANONYMOUS, channel == ANONYMOUS) {
        (true, true) => Ok((None, None)),
        (false, false) => Ok((Some(user.to_string()), Some(channel.to_string()))),
        _ => Err(StoreError::malformed(
            text,
            "user and channel must both be '_' or both be set",
        )),
    }
}

impl fmt::Display for RecipeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(true))
    }
}

impl FromStr for RecipeRef {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for RecipeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecipeRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse_partial(&text).map_err(serde::de::Error::custom)
    }
}
