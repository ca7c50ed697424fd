use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifier of a credential storage service.
///
/// Variants are declared in priority order, so `Ord` places OS-specific
/// stores before the generic ones and the encrypted file store last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BackendType {
    // Windows
    WinCred,
    // macOS
    Keychain,
    // Linux
    SecretService,
    KWallet,
    KeyCtl,
    // General
    Pass,
    Passage,
    LastPass,
    OnePassword,
    File,
    Memory,
}

impl BackendType {
    pub const ALL: [BackendType; 11] = [
        BackendType::WinCred,
        BackendType::Keychain,
        BackendType::SecretService,
        BackendType::KWallet,
        BackendType::KeyCtl,
        BackendType::Pass,
        BackendType::Passage,
        BackendType::LastPass,
        BackendType::OnePassword,
        BackendType::File,
        BackendType::Memory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::WinCred => "wincred",
            BackendType::Keychain => "keychain",
            BackendType::SecretService => "secret-service",
            BackendType::KWallet => "kwallet",
            BackendType::KeyCtl => "keyctl",
            BackendType::Pass => "pass",
            BackendType::Passage => "passage",
            BackendType::LastPass => "lastpass",
            BackendType::OnePassword => "op",
            BackendType::File => "file",
            BackendType::Memory => "memory",
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        BackendType::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| Error::Configuration(format!("unknown keyring backend {s:?}")))
    }
}

/// A secret stored on the keyring.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub key: String,
    #[serde(with = "base64_data")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,

    // Passed through untouched for the macOS keychain.
    #[serde(default)]
    pub keychain_not_trust_application: bool,
    #[serde(default)]
    pub keychain_not_synchronizable: bool,
}

impl Item {
    pub fn new(key: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            data: data.into(),
            ..Default::default()
        }
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("key", &self.key)
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .field("label", &self.label)
            .field("description", &self.description)
            .field(
                "keychain_not_trust_application",
                &self.keychain_not_trust_application,
            )
            .field(
                "keychain_not_synchronizable",
                &self.keychain_not_synchronizable,
            )
            .finish()
    }
}

/// Storage-level facts about an item, available without decrypting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Present only for backends that keep display metadata in the clear.
    pub item: Option<Item>,
    pub modification_time: SystemTime,
}

/// Uniform interface over the underlying credential stores.
pub trait Backend {
    fn backend_type(&self) -> BackendType;

    /// Returns the item matching `key`, or `Error::NotFound`.
    fn get(&mut self, key: &str) -> Result<Item>;

    /// Stores `item`, replacing any previous item with the same key.
    fn set(&mut self, item: &Item) -> Result<()>;

    /// Removes the item with matching key.
    fn remove(&mut self, key: &str) -> Result<()>;

    /// Lists all keys stored on the keyring, in no particular order.
    fn keys(&mut self) -> Result<Vec<String>>;

    fn get_metadata(&mut self, _key: &str) -> Result<Metadata> {
        Err(Error::Unsupported(self.backend_type()))
    }
}

mod base64_data {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

pub mod file;
pub mod layout;
pub mod memory;

#[cfg(feature = "secret-service-backend")]
pub mod secret_service;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_round_trip() {
        for backend in BackendType::ALL {
            assert_eq!(backend.as_str().parse::<BackendType>().unwrap(), backend);
        }
    }

    #[test]
    fn unknown_backend_name_is_configuration_error() {
        let err = "gnome-keyring".parse::<BackendType>().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "{err}");
    }

    #[test]
    fn priority_puts_file_after_platform_stores() {
        assert!(BackendType::WinCred < BackendType::SecretService);
        assert!(BackendType::SecretService < BackendType::Pass);
        assert!(BackendType::Pass < BackendType::File);
        let mut sorted = BackendType::ALL;
        sorted.sort();
        assert_eq!(sorted, BackendType::ALL);
    }

    #[test]
    fn items_compare_every_field() {
        let item = Item {
            key: "key".into(),
            data: b"data".to_vec(),
            label: "label".into(),
            description: "description".into(),
            keychain_not_trust_application: false,
            keychain_not_synchronizable: false,
        };
        assert_eq!(item, item.clone());

        let mut other = item.clone();
        other.key = "something else".into();
        assert_ne!(item, other);

        let mut other = item.clone();
        other.data = b"something else".to_vec();
        assert_ne!(item, other);

        let mut other = item.clone();
        other.label = "something else".into();
        assert_ne!(item, other);

        let mut other = item.clone();
        other.description = "something else".into();
        assert_ne!(item, other);

        let mut other = item.clone();
        other.keychain_not_trust_application = true;
        assert_ne!(item, other);

        let mut other = item.clone();
        other.keychain_not_synchronizable = true;
        assert_ne!(item, other);
    }

    #[test]
    fn debug_output_hides_data() {
        let item = Item::new("llamas", "llamas are great");
        let rendered = format!("{item:?}");
        assert!(rendered.contains("llamas"));
        assert!(!rendered.contains("are great"));
    }

    #[test]
    fn item_json_encodes_data_as_base64() {
        let item = Item::new("k", vec![0u8, 255, 10]);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["data"], "AP8K");
        let back: Item = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }
}
