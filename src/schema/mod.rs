//! Record-type descriptors and the schema provider consumed by the gate.
//!
//! Types live in an arena and point at their parent by [`TypeId`], so an
//! inheritance chain is a walk over indices rather than a class hierarchy.

use std::collections::BTreeSet;
use std::fmt;

use crate::types::TypeId;

/// Field ownership resolution over an inheritance chain.
pub mod ownership;

/// Process-wide cache of compiled record types.
pub mod registry;

pub use ownership::FieldOwnership;
pub use registry::{CompiledType, Registry};

/// Declared kind of a field; drives value coercion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text.
    Text,
    /// Signed integer.
    Integer,
    /// Floating point number.
    Float,
    /// Calendar date (`YYYY-MM-DD`).
    Date,
    /// Calendar month (`YYYY-MM`).
    YearMonth,
    /// One of a fixed set of text values.
    Choice(Vec<String>),
    /// `true` / `false`.
    Boolean,
}

impl FieldKind {
    /// Whether range-style lookups (`gt`, `range`, ...) make sense.
    pub fn is_ordered(&self) -> bool {
        !matches!(self, FieldKind::Boolean | FieldKind::Choice(_))
    }

    /// Whether substring lookups make sense.
    pub fn is_textual(&self) -> bool {
        matches!(self, FieldKind::Text | FieldKind::Choice(_))
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Text => write!(f, "text"),
            FieldKind::Integer => write!(f, "integer"),
            FieldKind::Float => write!(f, "number"),
            FieldKind::Date => write!(f, "date"),
            FieldKind::YearMonth => write!(f, "year-month"),
            FieldKind::Choice(_) => write!(f, "choice"),
            FieldKind::Boolean => write!(f, "boolean"),
        }
    }
}

/// A field declared directly on a type (not inherited).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name as exposed to clients.
    pub name: String,
    /// Declared kind.
    pub kind: FieldKind,
    /// Whether null is an acceptable value.
    pub nullable: bool,
}

impl FieldDef {
    /// Non-nullable field of the given kind.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
        }
    }

    /// Marks the field nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Schema-level description of one record type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Arena index of this type.
    pub id: TypeId,
    /// Permission namespace (`project` in `project.view_sample`).
    pub namespace: String,
    /// Lower-case type name (`sample` in `project.view_sample`).
    pub name: String,
    /// Parent type, if any.
    pub parent: Option<TypeId>,
    /// Fields declared on this type only.
    pub fields: Vec<FieldDef>,
    /// Restricts the viewable set; `None` means every resolved field.
    pub viewable: Option<BTreeSet<String>>,
}

impl TypeDescriptor {
    /// Looks up a field declared directly on this type.
    pub fn declared(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Schema collaborator: declared fields, inheritance chain, viewable set.
pub trait SchemaProvider {
    /// Returns the descriptor for `id`.
    fn descriptor(&self, id: TypeId) -> Option<&TypeDescriptor>;

    /// Resolves a type by its name.
    fn type_by_name(&self, name: &str) -> Option<TypeId>;

    /// Ancestor chain ending at `id`, most general ancestor first.
    fn chain(&self, id: TypeId) -> Vec<TypeId> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            // Guards against a cyclic parent pointer.
            if chain.contains(&current) {
                break;
            }
            chain.push(current);
            cursor = self.descriptor(current).and_then(|desc| desc.parent);
        }
        chain.reverse();
        chain
    }

    /// Fields a caller may see on `id`; `None` when unrestricted.
    fn viewable_fields(&self, id: TypeId) -> Option<&BTreeSet<String>> {
        self.descriptor(id).and_then(|desc| desc.viewable.as_ref())
    }
}

/// In-memory arena of type descriptors.
#[derive(Clone, Debug, Default)]
pub struct SchemaArena {
    types: Vec<TypeDescriptor>,
}

impl SchemaArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a root type.
    pub fn define(
        &mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        fields: Vec<FieldDef>,
    ) -> TypeId {
        self.push(namespace.into(), name.into(), None, fields)
    }

    /// Registers a type that inherits from `parent`.
    pub fn derive(
        &mut self,
        parent: TypeId,
        namespace: impl Into<String>,
        name: impl Into<String>,
        fields: Vec<FieldDef>,
    ) -> TypeId {
        self.push(namespace.into(), name.into(), Some(parent), fields)
    }

    /// Restricts which resolved fields of `id` are viewable.
    pub fn restrict_viewable<I, S>(&mut self, id: TypeId, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(desc) = self.types.get_mut(id.0 as usize) {
            desc.viewable = Some(fields.into_iter().map(Into::into).collect());
        }
    }

    /// Mutable access for schema changes; callers must invalidate any
    /// [`Registry`] entry compiled from the old descriptor.
    pub fn descriptor_mut(&mut self, id: TypeId) -> Option<&mut TypeDescriptor> {
        self.types.get_mut(id.0 as usize)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` when no type is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn push(
        &mut self,
        namespace: String,
        name: String,
        parent: Option<TypeId>,
        fields: Vec<FieldDef>,
    ) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeDescriptor {
            id,
            namespace,
            name,
            parent,
            fields,
            viewable: None,
        });
        id
    }
}

impl SchemaProvider for SchemaArena {
    fn descriptor(&self, id: TypeId) -> Option<&TypeDescriptor> {
        self.types.get(id.0 as usize)
    }

    fn type_by_name(&self, name: &str) -> Option<TypeId> {
        // Later registrations shadow earlier ones with the same name.
        self.types
            .iter()
            .rev()
            .find(|desc| desc.name == name)
            .map(|desc| desc.id)
    }
}
