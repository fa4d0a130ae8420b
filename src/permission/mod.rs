//! Permission identifiers, callers, and the field-level permission resolver.
//!
//! Identifiers follow `<namespace>.<action>_<type>` for type-level grants and
//! `<namespace>.<action>_<type>__<field>` for field-level grants. Semantics
//! are all-or-nothing: a request is granted only when every required
//! identifier is held, and a denial reports the exact identifiers missing.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Requirement computation against a caller.
pub mod resolve;

/// Per-type permission identifier tables.
pub mod table;

pub use resolve::{resolve, Resolution};
pub use table::PermissionTable;

/// Action a permission identifier grants.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Read records or fields.
    View,
    /// Create records.
    Add,
    /// Update records.
    Change,
    /// Delete records.
    Delete,
    /// Hide records from non-privileged readers.
    Suppress,
}

impl Action {
    /// Every action, in table order.
    pub const ALL: [Action; 5] = [
        Action::View,
        Action::Add,
        Action::Change,
        Action::Delete,
        Action::Suppress,
    ];

    /// Lower-case identifier fragment.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Add => "add",
            Action::Change => "change",
            Action::Delete => "delete",
            Action::Suppress => "suppress",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == raw)
            .ok_or_else(|| format!("unknown action '{raw}'"))
    }
}

/// Caller/session collaborator: answers "does this caller hold P".
pub trait PermissionHolder {
    /// Stable identifier used in logs.
    fn caller_id(&self) -> &str;

    /// Whether the caller holds a single permission identifier.
    fn has_perm(&self, perm: &str) -> bool;

    /// Whether the caller holds every identifier in `perms`.
    fn has_perms(&self, perms: &BTreeSet<String>) -> bool {
        perms.iter().all(|perm| self.has_perm(perm))
    }
}

/// Simple caller backed by an explicit permission set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Caller identifier.
    pub id: String,
    /// Superusers implicitly hold every permission.
    #[serde(default)]
    pub superuser: bool,
    /// Granted permission identifiers.
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl Caller {
    /// Caller with no permissions.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Caller holding every permission.
    pub fn superuser(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            superuser: true,
            permissions: BTreeSet::new(),
        }
    }

    /// Adds one permission identifier.
    pub fn grant(mut self, perm: impl Into<String>) -> Self {
        self.permissions.insert(perm.into());
        self
    }

    /// Adds several permission identifiers.
    pub fn grant_all<I, S>(mut self, perms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions.extend(perms.into_iter().map(Into::into));
        self
    }

    /// Removes a permission identifier.
    pub fn revoke(mut self, perm: &str) -> Self {
        self.permissions.remove(perm);
        self
    }
}

impl PermissionHolder for Caller {
    fn caller_id(&self) -> &str {
        &self.id
    }

    fn has_perm(&self, perm: &str) -> bool {
        self.superuser || self.permissions.contains(perm)
    }
}
