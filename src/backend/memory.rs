//! In-memory backend, mostly useful in tests.

use std::collections::HashMap;

use super::{Backend, BackendType, Item};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    items: HashMap<String, Item>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Memory
    }

    fn get(&mut self, key: &str) -> Result<Item> {
        self.items
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found(key))
    }

    fn set(&mut self, item: &Item) -> Result<()> {
        self.items.insert(item.key.clone(), item.clone());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.items.remove(key);
        Ok(())
    }

    fn keys(&mut self) -> Result<Vec<String>> {
        Ok(self.items.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_removes_items() {
        let mut k = MemoryBackend::new();
        k.set(&Item::new("a", "1")).unwrap();
        assert_eq!(k.get("a").unwrap().data, b"1");

        k.remove("a").unwrap();
        assert!(matches!(k.get("a"), Err(Error::NotFound { .. })));
        k.remove("a").unwrap();
    }

    #[test]
    fn metadata_is_unsupported() {
        let mut k = MemoryBackend::new();
        assert!(matches!(
            k.get_metadata("a"),
            Err(Error::Unsupported(BackendType::Memory))
        ));
    }
}
