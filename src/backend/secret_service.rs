//! Secret Service (D-Bus) backend
//!
//! Items live in the default collection, tagged with `service` and `key`
//! attributes so that several keyrings can share one collection.

use super::{Backend, BackendType, Item};
use crate::config::Config;
use crate::error::{Error, Result};
use secret_service::EncryptionType;
use secret_service::blocking::{Collection, SecretService};
use std::collections::HashMap;

pub struct SecretServiceBackend {
    ss: SecretService<'static>,
    service: String,
}

impl SecretServiceBackend {
    pub fn open(cfg: &Config) -> Result<Self> {
        let service = if cfg.libsecret_collection_name.is_empty() {
            cfg.service_name.clone()
        } else {
            cfg.libsecret_collection_name.clone()
        };
        if service.is_empty() {
            return Err(Error::Configuration(
                "no service name provided for secret-service keyring".to_string(),
            ));
        }
        let ss = SecretService::connect(EncryptionType::Dh)
            .map_err(|e| Error::Backend(format!("SecretService connect failed: {e}")))?;
        Ok(Self { ss, service })
    }

    fn get_collection(&self) -> Result<Collection<'_>> {
        let collection = self
            .ss
            .get_default_collection()
            .map_err(|e| Error::Backend(format!("SecretService default collection failed: {e}")))?;
        if collection.is_locked().map_err(backend_err)? {
            collection.unlock().map_err(backend_err)?;
        }
        Ok(collection)
    }

    fn attributes<'a>(&'a self, key: &'a str) -> HashMap<&'a str, &'a str> {
        lookup_attributes(&self.service, key)
    }
}

/// Attributes that identify one item; searches use exactly these.
fn lookup_attributes<'a>(service: &'a str, key: &'a str) -> HashMap<&'a str, &'a str> {
    HashMap::from([("service", service), ("key", key)])
}

/// Attributes written with an item: the lookup set plus display metadata.
fn item_attributes<'a>(service: &'a str, item: &'a Item) -> HashMap<&'a str, &'a str> {
    let mut attributes = lookup_attributes(service, &item.key);
    attributes.insert("description", &item.description);
    attributes
}

fn backend_err(e: secret_service::Error) -> Error {
    Error::Backend(e.to_string())
}

impl Backend for SecretServiceBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::SecretService
    }

    fn get(&mut self, key: &str) -> Result<Item> {
        let collection = self.get_collection()?;
        let items = collection
            .search_items(self.attributes(key))
            .map_err(backend_err)?;
        let Some(found) = items.first() else {
            return Err(Error::not_found(key));
        };
        let attrs = found.get_attributes().map_err(backend_err)?;
        Ok(Item {
            key: key.to_string(),
            data: found.get_secret().map_err(backend_err)?,
            label: found.get_label().map_err(backend_err)?,
            description: attrs.get("description").cloned().unwrap_or_default(),
            ..Default::default()
        })
    }

    fn set(&mut self, item: &Item) -> Result<()> {
        let collection = self.get_collection()?;
        let label = if item.label.is_empty() {
            item.key.as_str()
        } else {
            item.label.as_str()
        };
        tracing::debug!(key = %item.key, service = %self.service, "storing item in secret service");

        // `replace` only matches identical attribute sets, so a changed
        // description would leave the old item behind.
        let existing = collection
            .search_items(self.attributes(&item.key))
            .map_err(backend_err)?;
        for stale in existing {
            stale.delete().map_err(backend_err)?;
        }

        collection
            .create_item(
                label,
                item_attributes(&self.service, item),
                &item.data,
                true,
                "application/octet-stream",
            )
            .map_err(backend_err)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let collection = self.get_collection()?;
        let items = collection
            .search_items(self.attributes(key))
            .map_err(backend_err)?;
        if items.is_empty() {
            return Err(Error::not_found(key));
        }
        for item in items {
            item.delete().map_err(backend_err)?;
        }
        Ok(())
    }

    fn keys(&mut self) -> Result<Vec<String>> {
        let collection = self.get_collection()?;
        let items = collection
            .search_items(HashMap::from([("service", self.service.as_str())]))
            .map_err(backend_err)?;

        let mut keys = Vec::with_capacity(items.len());
        for item in items {
            let attrs = item.get_attributes().map_err(backend_err)?;
            if let Some(key) = attrs.get("key") {
                keys.push(key.clone());
            }
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}
