//! Identifier types
//!
//! - **DocId**: validated document identifier (ordinary, `_design/`, `_local/`)
//! - **Revision**: opaque revision token assigned by the server
//! - **DatabaseName**: validated database name
//!
//! ## Validation
//!
//! Document ids must be non-empty and may only start with `_` when they use
//! one of the `_design/` or `_local/` prefixes. The server reserves every
//! other underscore-prefixed name for its own endpoints.
//!
//! Database names must start with a lowercase letter and contain only
//! lowercase letters, digits and `_$()+-/`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of design documents
pub const DESIGN_PREFIX: &str = "_design/";

/// Prefix of local (non-replicated) documents
pub const LOCAL_PREFIX: &str = "_local/";

/// Server endpoints that can never be used as document ids
pub const SPECIAL_DOC_NAMES: &[&str] = &[
    "_all_docs",
    "_design",
    "_changes",
    "_compact",
    "_view_cleanup",
    "_temp_view",
    "_ensure_full_commit",
    "_bulk_docs",
    "_purge",
    "_missing_revs",
    "_revs_diff",
    "_revs_limit",
    "_security",
    "_local",
];

// =============================================================================
// DocId
// =============================================================================

/// Document identifier, unique within a database
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocId(String);

impl DocId {
    /// Create a new DocId, validating the input
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidId` for empty ids, special endpoint names and
    /// underscore-prefixed ids outside `_design/` and `_local/`.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(DocId(id))
    }

    /// Build a `_local/<name>` id
    pub fn local(name: &str) -> Result<Self> {
        let name = name.strip_prefix(LOCAL_PREFIX).unwrap_or(name);
        Self::new(format!("{}{}", LOCAL_PREFIX, name))
    }

    /// Build a `_design/<name>` id
    pub fn design(name: &str) -> Result<Self> {
        let name = name.strip_prefix(DESIGN_PREFIX).unwrap_or(name);
        Self::new(format!("{}{}", DESIGN_PREFIX, name))
    }

    /// Validate a document id
    pub fn validate(id: &str) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidId {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        if id.is_empty() {
            return Err(invalid("id cannot be empty"));
        }
        if SPECIAL_DOC_NAMES.contains(&id) {
            return Err(invalid("id names a reserved server endpoint"));
        }
        if let Some(rest) = id
            .strip_prefix(DESIGN_PREFIX)
            .or_else(|| id.strip_prefix(LOCAL_PREFIX))
        {
            if rest.is_empty() {
                return Err(invalid("prefixed id needs a name after the prefix"));
            }
            return Ok(());
        }
        if id.starts_with('_') {
            return Err(invalid(
                "only _design/ and _local/ ids may start with an underscore",
            ));
        }
        Ok(())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this is a `_local/` document
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_PREFIX)
    }

    /// Check if this is a `_design/` document
    pub fn is_design(&self) -> bool {
        self.0.starts_with(DESIGN_PREFIX)
    }

    /// URL path segments addressing this document below its database
    ///
    /// Prefixed ids keep their prefix as a separate, unescaped segment.
    pub fn path_segments(&self) -> Vec<String> {
        for prefix in [DESIGN_PREFIX, LOCAL_PREFIX] {
            if let Some(rest) = self.0.strip_prefix(prefix) {
                return vec![prefix.trim_end_matches('/').to_string(), rest.to_string()];
            }
        }
        vec![self.0.clone()]
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        DocId::new(value)
    }
}

impl TryFrom<&str> for DocId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        DocId::new(value)
    }
}

impl From<DocId> for String {
    fn from(id: DocId) -> String {
        id.0
    }
}

impl AsRef<str> for DocId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Revision
// =============================================================================

/// Opaque revision token (`<generation>-<hash>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    /// Wrap a server-provided token
    pub fn new(rev: impl Into<String>) -> Self {
        Revision(rev.into())
    }

    /// Get the token as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric generation prefix, if the token has the usual shape
    pub fn generation(&self) -> Option<u64> {
        self.0.split_once('-').and_then(|(gen, _)| gen.parse().ok())
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Revision {
    fn from(value: &str) -> Self {
        Revision(value.to_string())
    }
}

impl From<String> for Revision {
    fn from(value: String) -> Self {
        Revision(value)
    }
}

// =============================================================================
// DatabaseName
// =============================================================================

/// Validated database name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatabaseName(String);

impl DatabaseName {
    /// Create a new DatabaseName, validating the input
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(DatabaseName(name))
    }

    /// Validate a database name
    pub fn validate(name: &str) -> Result<()> {
        let invalid = |reason: String| Error::InvalidDatabaseName {
            name: name.to_string(),
            reason,
        };

        let mut chars = name.chars();
        match chars.next() {
            None => return Err(invalid("name cannot be empty".to_string())),
            Some(c) if !c.is_ascii_lowercase() => {
                return Err(invalid(format!(
                    "name must start with a lowercase letter, found '{}'",
                    c
                )))
            }
            Some(_) => {}
        }
        for (position, c) in name.char_indices().skip(1) {
            let allowed = c.is_ascii_lowercase() || c.is_ascii_digit() || "_$()+-/".contains(c);
            if !allowed {
                return Err(invalid(format!(
                    "invalid character '{}' at position {}",
                    c, position
                )));
            }
        }
        Ok(())
    }

    /// Get the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatabaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DatabaseName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        DatabaseName::new(value)
    }
}

impl From<DatabaseName> for String {
    fn from(name: DatabaseName) -> String {
        name.0
    }
}
