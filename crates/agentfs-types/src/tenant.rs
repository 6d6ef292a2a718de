//! Tenant keys.
//!
//! Every filesystem instance belongs to exactly one tenant. The default
//! (unscoped) tenant is its own variant rather than a magic string, so no
//! caller-supplied id can ever alias it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AgentFsError, Result};

/// Identifies the owner of an isolated filesystem namespace.
///
/// Tenant ids are compared by exact value: `"User-1"` and `"user-1"` are
/// different tenants, and so are `"a"` and `" a"`. Forming keys consistently
/// is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "RawTenantKey")]
pub enum TenantKey {
    /// The reserved, unscoped tenant.
    Default,
    /// A caller-supplied tenant id (e.g. a user id). Never empty.
    Tenant(String),
}

impl TenantKey {
    /// Build a named tenant key.
    ///
    /// Returns `InvalidTenantKey` for the empty string.
    pub fn tenant(id: impl Into<String>) -> Result<Self> {
        let key = TenantKey::Tenant(id.into());
        key.validate()?;
        Ok(key)
    }

    /// Check a key built directly from the variants.
    ///
    /// Returns `InvalidTenantKey` for a named tenant with an empty id.
    pub fn validate(&self) -> Result<()> {
        match self {
            TenantKey::Tenant(id) if id.is_empty() => Err(AgentFsError::InvalidTenantKey {
                key: id.clone(),
                reason: "tenant id must not be empty".to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Returns true for the reserved default tenant.
    pub fn is_default(&self) -> bool {
        matches!(self, TenantKey::Default)
    }

    /// The caller-supplied id, or `None` for the default tenant.
    pub fn id(&self) -> Option<&str> {
        match self {
            TenantKey::Default => None,
            TenantKey::Tenant(id) => Some(id),
        }
    }
}

/// Wire form of [`TenantKey`], checked before it becomes one.
#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawTenantKey {
    Default,
    Tenant(String),
}

impl TryFrom<RawTenantKey> for TenantKey {
    type Error = AgentFsError;

    fn try_from(raw: RawTenantKey) -> Result<Self> {
        match raw {
            RawTenantKey::Default => Ok(TenantKey::Default),
            RawTenantKey::Tenant(id) => TenantKey::tenant(id),
        }
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantKey::Default => f.write_str("<default>"),
            TenantKey::Tenant(id) => f.write_str(id),
        }
    }
}

impl FromStr for TenantKey {
    type Err = AgentFsError;

    /// Parses a named tenant. The default tenant has no string spelling.
    fn from_str(s: &str) -> Result<Self> {
        TenantKey::tenant(s)
    }
}
