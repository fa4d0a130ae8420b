use rustc_hash::FxHashMap;

use super::Action;
use crate::schema::{FieldOwnership, SchemaProvider, TypeDescriptor};

type PerAction = [String; 5];

/// Type-level identifier, e.g. `project.view_sample`.
pub fn type_permission_id(namespace: &str, type_name: &str, action: Action) -> String {
    format!("{namespace}.{action}_{type_name}")
}

/// Field-level identifier, e.g. `project.view_sample__age`.
pub fn field_permission_id(
    namespace: &str,
    type_name: &str,
    action: Action,
    field: &str,
) -> String {
    format!("{namespace}.{action}_{type_name}__{field}")
}

/// Permission identifiers for one record type, compiled once from schema
/// metadata so request handling never formats strings.
#[derive(Clone, Debug)]
pub struct PermissionTable {
    type_perms: PerAction,
    fields: FxHashMap<String, PerAction>,
}

impl PermissionTable {
    /// Compiles identifiers for `desc`; every field-level identifier is
    /// scoped to the field's owning type, not to `desc` itself.
    pub fn compile(
        schema: &dyn SchemaProvider,
        desc: &TypeDescriptor,
        ownership: &FieldOwnership,
    ) -> Self {
        let type_perms =
            per_action(|action| type_permission_id(&desc.namespace, &desc.name, action));
        let mut fields = FxHashMap::default();
        for (field, owned) in ownership.iter() {
            let Some(owner) = schema.descriptor(owned.owner) else {
                continue;
            };
            fields.insert(
                field.to_owned(),
                per_action(|action| {
                    field_permission_id(&owner.namespace, &owner.name, action, field)
                }),
            );
        }
        Self { type_perms, fields }
    }

    /// Type-level identifier for `action`.
    pub fn type_permission(&self, action: Action) -> &str {
        &self.type_perms[action.index()]
    }

    /// Field-level identifier for `action`; `None` for unknown fields.
    pub fn field_permission(&self, field: &str, action: Action) -> Option<&str> {
        self.fields
            .get(field)
            .map(|perms| perms[action.index()].as_str())
    }

    /// Every identifier a full grant for `action` would include.
    pub fn all_for(&self, action: Action) -> Vec<&str> {
        let mut perms: Vec<&str> = self
            .fields
            .values()
            .map(|perms| perms[action.index()].as_str())
            .collect();
        perms.sort_unstable();
        perms.insert(0, self.type_permission(action));
        perms
    }
}

fn per_action(build: impl FnMut(Action) -> String) -> PerAction {
    Action::ALL.map(build)
}
