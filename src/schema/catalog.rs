//! # Mapping Catalog
//!
//! Per-connection memo of built `TableMapping`s, keyed by record `TypeId`.
//! The first request for a type decides its `CreateFlags`; later requests
//! with different flags receive the cached mapping unchanged.

use std::any::TypeId;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;

use super::mapping::{CreateFlags, TableMapping};
use super::table::Record;
use crate::error::Result;

#[derive(Default)]
pub struct MappingCatalog {
    mappings: Mutex<HashMap<TypeId, Arc<TableMapping>>>,
}

impl MappingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_mapping<T: Record>(&self, flags: CreateFlags) -> Result<Arc<TableMapping>> {
        let key = TypeId::of::<T>();
        if let Some(mapping) = self.mappings.lock().get(&key) {
            return Ok(Arc::clone(mapping));
        }

        // Built outside the lock: describe() is user code.
        let built = Arc::new(TableMapping::build::<T>(flags)?);
        let mut mappings = self.mappings.lock();
        Ok(Arc::clone(mappings.entry(key).or_insert(built)))
    }

    pub fn get(&self, record_type: TypeId) -> Option<Arc<TableMapping>> {
        self.mappings.lock().get(&record_type).cloned()
    }

    pub fn mappings(&self) -> Vec<Arc<TableMapping>> {
        self.mappings.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.mappings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.mappings.lock().clear();
    }
}

impl std::fmt::Debug for MappingCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingCatalog")
            .field("mappings", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, TableDef};

    #[derive(Debug, Default)]
    struct Widget {
        id: i64,
    }

    impl Record for Widget {
        fn describe() -> TableDef<Self> {
            TableDef::<Self>::new("Widget").field(ColumnDef::new("Id"), |w| &w.id, |w| &mut w.id)
        }
    }

    #[test]
    fn mapping_is_memoized_per_type() {
        let catalog = MappingCatalog::new();

        let first = catalog.get_mapping::<Widget>(CreateFlags::NONE).unwrap();
        let second = catalog.get_mapping::<Widget>(CreateFlags::NONE).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn first_flags_win() {
        let catalog = MappingCatalog::new();

        let plain = catalog.get_mapping::<Widget>(CreateFlags::NONE).unwrap();
        let implicit = catalog.get_mapping::<Widget>(CreateFlags::ALL_IMPLICIT).unwrap();

        assert!(Arc::ptr_eq(&plain, &implicit));
        assert!(implicit.pk().is_none(), "cached mapping keeps the first flags");
    }
}
