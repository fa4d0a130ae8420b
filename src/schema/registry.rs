use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use super::{FieldDef, FieldOwnership, SchemaProvider, TypeDescriptor};
use crate::permission::PermissionTable;
use crate::types::TypeId;

/// Everything the gate needs about a record type, computed once.
#[derive(Clone, Debug)]
pub struct CompiledType {
    /// Descriptor snapshot taken at compile time.
    pub descriptor: TypeDescriptor,
    /// Ancestor chain, root first; used for invalidation.
    pub chain: Vec<TypeId>,
    /// Field → owning type.
    pub ownership: FieldOwnership,
    /// Permission identifiers per action.
    pub permissions: PermissionTable,
    viewable: Option<BTreeSet<String>>,
}

impl CompiledType {
    /// Resolves ownership and permission identifiers for `id`.
    pub fn compile(schema: &dyn SchemaProvider, id: TypeId) -> Option<Self> {
        let descriptor = schema.descriptor(id)?.clone();
        let ownership = FieldOwnership::resolve(schema, id);
        let permissions = PermissionTable::compile(schema, &descriptor, &ownership);
        Some(Self {
            chain: schema.chain(id),
            viewable: schema.viewable_fields(id).cloned(),
            descriptor,
            ownership,
            permissions,
        })
    }

    /// Type name, e.g. `sample`.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Whether `field` is declared somewhere in the chain.
    pub fn is_declared(&self, field: &str) -> bool {
        self.ownership.get(field).is_some()
    }

    /// Whether `field` is declared and exposed to callers.
    pub fn is_viewable(&self, field: &str) -> bool {
        self.is_declared(field)
            && self
                .viewable
                .as_ref()
                .map_or(true, |viewable| viewable.contains(field))
    }

    /// Winning declaration for a viewable field.
    pub fn field(&self, field: &str) -> Option<&FieldDef> {
        if !self.is_viewable(field) {
            return None;
        }
        self.ownership.get(field).map(|owned| &owned.def)
    }
}

/// Read-mostly cache of [`CompiledType`] entries shared across requests.
///
/// Entries are immutable once inserted; readers clone the `Arc` and release
/// the lock before doing any work.
#[derive(Debug, Default)]
pub struct Registry {
    cache: RwLock<Cache>,
}

#[derive(Debug, Default)]
struct Cache {
    entries: FxHashMap<TypeId, Arc<CompiledType>>,
    /// Bumped by every invalidation; a compile that started under an older
    /// generation is returned but not cached.
    generation: u64,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached entry for `id`, compiling it on first use.
    pub fn get_or_compile(
        &self,
        schema: &dyn SchemaProvider,
        id: TypeId,
    ) -> Option<Arc<CompiledType>> {
        let generation = {
            let guard = self.cache.read();
            if let Some(hit) = guard.entries.get(&id) {
                return Some(Arc::clone(hit));
            }
            guard.generation
        };
        let compiled = Arc::new(CompiledType::compile(schema, id)?);
        debug!(
            type_name = compiled.name(),
            fields = compiled.ownership.len(),
            "registry.compile"
        );
        Some(self.publish(id, compiled, generation))
    }

    fn publish(
        &self,
        id: TypeId,
        compiled: Arc<CompiledType>,
        generation: u64,
    ) -> Arc<CompiledType> {
        let mut guard = self.cache.write();
        if guard.generation != generation {
            debug!(type_name = compiled.name(), "registry.compile.stale");
            return compiled;
        }
        // Another thread may have compiled the same type meanwhile.
        Arc::clone(guard.entries.entry(id).or_insert(compiled))
    }

    /// Drops `id` and every cached type that inherits from it.
    pub fn invalidate(&self, id: TypeId) {
        let mut guard = self.cache.write();
        guard.generation += 1;
        let before = guard.entries.len();
        guard.entries.retain(|_, compiled| !compiled.chain.contains(&id));
        debug!(
            type_id = id.0,
            dropped = before - guard.entries.len(),
            "registry.invalidate"
        );
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        let mut guard = self.cache.write();
        guard.generation += 1;
        guard.entries.clear();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.cache.read().entries.len()
    }

    /// Returns `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.cache.read().entries.is_empty()
    }

    #[cfg(test)]
    fn generation(&self) -> u64 {
        self.cache.read().generation
    }
}
