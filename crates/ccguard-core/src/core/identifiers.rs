// crates/ccguard-core/src/core/identifiers.rs
// ============================================================================
// Module: ccguard Identifiers
// Description: Opaque identifiers for repositories, commits, branches, subtypes.
// Purpose: Provide strongly typed, serializable keys with stable string forms.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Stored references are keyed by `(repository, commit, subtype)`. Commit,
//! branch, and subtype identifiers are opaque wrappers. Repository identities
//! are validated on construction because backends embed them in table names
//! and hash keys.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Subtype used when the caller does not name one.
pub const DEFAULT_SUBTYPE: &str = "default";
/// Maximum length of a repository identity.
pub const MAX_REPOSITORY_ID_LENGTH: usize = 128;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identifier validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Identifier was empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),
    /// Identifier contained characters outside the allowed set.
    #[error("{kind} contains invalid characters: {value}")]
    InvalidCharacters {
        /// Identifier kind label.
        kind: &'static str,
        /// Offending value.
        value: String,
    },
    /// Identifier exceeded its length limit.
    #[error("{0} exceeds length limit")]
    TooLong(&'static str),
}

// ============================================================================
// SECTION: Repository Identity
// ============================================================================

/// Stable identity of a repository, derived from its root commit.
///
/// # Invariants
/// - Non-empty, at most [`MAX_REPOSITORY_ID_LENGTH`] bytes.
/// - Only ASCII alphanumerics and `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryId(String);

impl RepositoryId {
    /// Validates and wraps a repository identity.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the value is empty, too long, or
    /// contains characters other than ASCII alphanumerics and `_`.
    pub fn parse(value: impl Into<String>) -> Result<Self, IdentifierError> {
        let value = value.into();
        if value.is_empty() {
            return Err(IdentifierError::Empty("repository id"));
        }
        if value.len() > MAX_REPOSITORY_ID_LENGTH {
            return Err(IdentifierError::TooLong("repository id"));
        }
        if !value.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
            return Err(IdentifierError::InvalidCharacters {
                kind: "repository id",
                value,
            });
        }
        Ok(Self(value))
    }

    /// Derives the identity from a root commit and an optional suffix token.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the combined identity is invalid.
    pub fn from_root_commit(
        root: &CommitId,
        suffix: Option<&str>,
    ) -> Result<Self, IdentifierError> {
        match suffix {
            Some(token) if !token.is_empty() => Self::parse(format!("{}_{token}", root.as_str())),
            _ => Self::parse(root.as_str()),
        }
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for RepositoryId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RepositoryId> for String {
    fn from(value: RepositoryId) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Commit Identifier
// ============================================================================

/// Version-control commit hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    /// Creates a new commit identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the identifier is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the first seven characters, for display.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(.. 7).unwrap_or(&self.0)
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for CommitId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CommitId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Subtype
// ============================================================================

/// Secondary key separating measurements of one commit (unit, integration).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subtype(String);

impl Subtype {
    /// Creates a subtype; empty values collapse to the default subtype.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() { Self::default() } else { Self(value) }
    }

    /// Resolves an optional subtype to a concrete one.
    #[must_use]
    pub fn or_default(value: Option<&str>) -> Self {
        value.map_or_else(Self::default, Self::new)
    }

    /// Returns the subtype as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the default subtype.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_SUBTYPE
    }
}

impl Default for Subtype {
    fn default() -> Self {
        Self(DEFAULT_SUBTYPE.to_string())
    }
}

impl fmt::Display for Subtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Subtype {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Branch Name
// ============================================================================

/// Branch name recorded alongside a reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchName(String);

impl BranchName {
    /// Creates a branch name, trimming surrounding whitespace.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().trim().to_string())
    }

    /// Returns the branch name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for BranchName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
