//! In-memory module cache
//!
//! The single source of truth for invocation: a concurrency-safe mapping
//! from module identifier to the currently loaded unit. Entries are replaced
//! atomically per key, so readers never observe a partially updated entry
//! and distinct modules never contend on a shared lock.

use std::sync::Arc;

use dashmap::DashMap;

use crate::compiler::ReferenceBinary;
use crate::ident::ModuleId;
use crate::unit::CompiledUnit;

#[derive(Debug, Default)]
pub struct ModuleCache {
    units: DashMap<ModuleId, Arc<dyn CompiledUnit>>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self {
            units: DashMap::new(),
        }
    }

    pub fn get(&self, id: &ModuleId) -> Option<Arc<dyn CompiledUnit>> {
        self.units.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Insert or overwrite the unit for its module. Last writer wins.
    pub fn insert(&self, unit: Arc<dyn CompiledUnit>) {
        self.units.insert(unit.module().clone(), unit);
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.units.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Sorted snapshot of the cached module set.
    pub fn module_ids(&self) -> Vec<ModuleId> {
        let mut ids: Vec<ModuleId> = self.units.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// The cached units rendered as compiler references, so modules can see
    /// each other's binaries.
    pub fn reference_binaries(&self) -> Vec<ReferenceBinary> {
        let mut refs: Vec<ReferenceBinary> = self
            .units
            .iter()
            .map(|e| ReferenceBinary {
                name: e.key().to_string(),
                bytes: e.value().bytes().to_vec().into(),
            })
            .collect();
        refs.sort_by(|a, b| a.name.cmp(&b.name));
        refs
    }
}
