use std::collections::BTreeMap;

use super::{FieldDef, SchemaProvider};
use crate::types::TypeId;

/// Declaration that won ownership of a field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedField {
    /// Most specific type declaring the field.
    pub owner: TypeId,
    /// The winning declaration.
    pub def: FieldDef,
}

/// Mapping from field name to the most specific declaring type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldOwnership {
    fields: BTreeMap<String, OwnedField>,
}

impl FieldOwnership {
    /// Walks the chain of `id` from the root ancestor down, letting each
    /// redeclaration overwrite the previous owner.
    pub fn resolve(schema: &dyn SchemaProvider, id: TypeId) -> Self {
        let mut fields = BTreeMap::new();
        for ty in schema.chain(id) {
            let Some(desc) = schema.descriptor(ty) else {
                continue;
            };
            for def in &desc.fields {
                fields.insert(
                    def.name.clone(),
                    OwnedField {
                        owner: ty,
                        def: def.clone(),
                    },
                );
            }
        }
        Self { fields }
    }

    /// Owning declaration for `field`; `None` means unknown.
    pub fn get(&self, field: &str) -> Option<&OwnedField> {
        self.fields.get(field)
    }

    /// Owning type for `field`.
    pub fn owner(&self, field: &str) -> Option<TypeId> {
        self.fields.get(field).map(|owned| owned.owner)
    }

    /// Iterates `(field, declaration)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OwnedField)> {
        self.fields.iter().map(|(name, owned)| (name.as_str(), owned))
    }

    /// Number of resolved fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` when the chain declares no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
