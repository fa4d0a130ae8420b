use std::collections::BTreeSet;

use super::{Action, PermissionHolder};
use crate::schema::CompiledType;

/// Outcome of a permission resolution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Caller holds every required identifier.
    pub granted: bool,
    /// Every identifier the request needs.
    pub required: BTreeSet<String>,
    /// Required identifiers the caller does not hold; empty when granted.
    pub missing: BTreeSet<String>,
    /// Requested fields that are not declared or not viewable.
    pub unknown: BTreeSet<String>,
}

/// Computes the identifiers `action` over `requested` fields needs and
/// compares them with what `caller` holds.
///
/// Unknown fields never contribute a requirement; they are reported in
/// [`Resolution::unknown`] so the caller can raise an unknown-field error
/// independently of any denial.
pub fn resolve<'a, I>(
    caller: &dyn PermissionHolder,
    compiled: &CompiledType,
    action: Action,
    default_perms: &[String],
    requested: I,
) -> Resolution
where
    I: IntoIterator<Item = &'a str>,
{
    let mut required: BTreeSet<String> = default_perms.iter().cloned().collect();
    required.insert(compiled.permissions.type_permission(action).to_owned());

    let mut unknown = BTreeSet::new();
    for field in requested {
        let perm = compiled
            .is_viewable(field)
            .then(|| compiled.permissions.field_permission(field, action))
            .flatten();
        match perm {
            Some(perm) => {
                required.insert(perm.to_owned());
            }
            None => {
                unknown.insert(field.to_owned());
            }
        }
    }

    let granted = caller.has_perms(&required);
    let missing = if granted {
        BTreeSet::new()
    } else {
        required
            .iter()
            .filter(|perm| !caller.has_perm(perm))
            .cloned()
            .collect()
    };
    Resolution {
        granted,
        required,
        missing,
        unknown,
    }
}
