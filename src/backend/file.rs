//! Encrypted file backend
//!
//! Stores one age-encrypted file per item in a configured directory. Each
//! file is sealed with a passphrase recipient (scrypt), so the passphrase is
//! the only key material; it is asked for once per handle, on first use.
//!
//! Filenames are derived from item keys by [`escape_filename`], and the whole
//! item, label and description included, lives inside the ciphertext.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use age::secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::layout::{escape_filename, is_canonical_filename, resolve_dir, unescape_filename};
use super::{Backend, BackendType, Item, Metadata};
use crate::config::{Config, PromptFn};
use crate::error::{Error, Result};

/// Plaintext sealed inside every item file.
#[derive(Serialize, Deserialize)]
struct Envelope {
    /// Advisory only; never used for expiry or ordering.
    created: String,
    item: Item,
}

enum LockState {
    Locked,
    Unlocked(SecretString),
}

pub struct FileBackend {
    dir: PathBuf,
    password_func: PromptFn,
    state: LockState,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>, password_func: PromptFn) -> Self {
        Self {
            dir: dir.into(),
            password_func,
            state: LockState::Locked,
        }
    }

    /// Opener used by the registry.
    pub fn open(cfg: &Config) -> Result<Self> {
        if cfg.file_dir.as_os_str().is_empty() {
            return Err(Error::Configuration(
                "no directory provided for file keyring".to_string(),
            ));
        }
        let password_func = cfg.file_password_func.clone().ok_or_else(|| {
            Error::Configuration("no password function provided for file keyring".to_string())
        })?;
        Ok(Self::new(cfg.file_dir.clone(), password_func))
    }

    pub fn is_unlocked(&self) -> bool {
        matches!(self.state, LockState::Unlocked(_))
    }

    /// Prompts for the passphrase unless one is already cached.
    fn unlock(&mut self, dir: &Path) -> Result<Zeroizing<String>> {
        let passphrase = match &self.state {
            LockState::Unlocked(passphrase) => passphrase.expose_secret().to_owned(),
            LockState::Locked => {
                tracing::debug!(dir = %dir.display(), "unlocking file keyring");
                let passphrase = (self.password_func)(&format!(
                    "Enter passphrase to unlock {}",
                    dir.display()
                ))?;
                self.state = LockState::Unlocked(SecretString::from(passphrase.clone()));
                passphrase
            }
        };
        Ok(Zeroizing::new(passphrase))
    }

    fn item_path(&self, key: &str) -> Result<(PathBuf, PathBuf)> {
        if key.is_empty() {
            return Err(Error::Configuration("item key must not be empty".to_string()));
        }
        let dir = resolve_dir(&self.dir)?;
        let path = dir.join(escape_filename(key));
        Ok((dir, path))
    }
}

impl Backend for FileBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::File
    }

    fn get(&mut self, key: &str) -> Result<Item> {
        let (dir, path) = self.item_path(key)?;
        let ciphertext = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::not_found(key)),
            Err(e) => return Err(Error::io(format!("failed to read {}", path.display()), e)),
        };
        tracing::debug!(key, "reading item from file keyring");

        let passphrase = self.unlock(&dir)?;
        let plaintext = open_envelope(&ciphertext, &passphrase).map_err(|reason| Error::Crypto {
            key: key.to_string(),
            reason,
        })?;
        let envelope: Envelope =
            serde_json::from_slice(plaintext.as_slice()).map_err(|e| Error::Crypto {
                key: key.to_string(),
                reason: format!("malformed item payload: {e}"),
            })?;
        Ok(envelope.item)
    }

    fn get_metadata(&mut self, key: &str) -> Result<Metadata> {
        let (_, path) = self.item_path(key)?;
        let stat = match fs::metadata(&path) {
            Ok(stat) => stat,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::not_found(key)),
            Err(e) => return Err(Error::io(format!("failed to stat {}", path.display()), e)),
        };
        let modification_time = stat
            .modified()
            .map_err(|e| Error::io(format!("failed to stat {}", path.display()), e))?;

        // Everything else is inside the ciphertext.
        Ok(Metadata {
            item: None,
            modification_time,
        })
    }

    fn set(&mut self, item: &Item) -> Result<()> {
        let (dir, path) = self.item_path(&item.key)?;

        let envelope = Envelope {
            created: chrono::Local::now().to_rfc3339(),
            item: item.clone(),
        };
        // Wrap in Zeroizing so the serialized secret is wiped from memory on drop.
        let plaintext = Zeroizing::new(serde_json::to_vec(&envelope)?);

        let passphrase = self.unlock(&dir)?;
        let sealed = seal_envelope(&plaintext, &passphrase).map_err(|e| Error::Crypto {
            key: item.key.clone(),
            reason: e.to_string(),
        })?;

        tracing::debug!(key = %item.key, dir = %dir.display(), "writing item to file keyring");
        write_private(&dir, &path, &sealed)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let (_, path) = self.item_path(key)?;
        tracing::debug!(key, "removing item from file keyring");
        // A missing file surfaces as an I/O error rather than `NotFound`.
        fs::remove_file(&path)
            .map_err(|e| Error::io(format!("failed to remove {}", path.display()), e))
    }

    fn keys(&mut self) -> Result<Vec<String>> {
        let dir = resolve_dir(&self.dir)?;
        let entries = fs::read_dir(&dir)
            .map_err(|e| Error::io(format!("failed to list {}", dir.display()), e))?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| Error::io(format!("failed to list {}", dir.display()), e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            // Escaped keys never start with a dot; these are temp files in flight.
            if name.starts_with('.') {
                continue;
            }
            // No key maps to this name, so `get` could never reach it.
            if !is_canonical_filename(&name) {
                tracing::debug!(file = %name, "skipping file with no matching key");
                continue;
            }
            keys.push(unescape_filename(&name));
        }
        Ok(keys)
    }
}

fn seal_envelope(plaintext: &[u8], passphrase: &str) -> io::Result<Vec<u8>> {
    let encryptor =
        age::Encryptor::with_user_passphrase(SecretString::from(passphrase.to_owned()));

    let mut sealed = vec![];
    let mut writer = encryptor.wrap_output(&mut sealed)?;
    writer.write_all(plaintext)?;
    writer.finish()?;
    Ok(sealed)
}

fn open_envelope(
    ciphertext: &[u8],
    passphrase: &str,
) -> std::result::Result<Zeroizing<Vec<u8>>, String> {
    let decryptor =
        age::Decryptor::new(ciphertext).map_err(|e| format!("invalid envelope: {e}"))?;
    let identity = age::scrypt::Identity::new(SecretString::from(passphrase.to_owned()));

    let mut reader = decryptor
        .decrypt(std::iter::once(&identity as &dyn age::Identity))
        .map_err(|e| e.to_string())?;

    // Wrap in Zeroizing so the plaintext is wiped from memory on drop.
    let mut plaintext = Zeroizing::new(vec![]);
    reader
        .read_to_end(&mut plaintext)
        .map_err(|e| format!("failed to read decrypted data: {e}"))?;
    Ok(plaintext)
}

/// Writes `contents` to `path` through a temp file in `dir`, so readers never
/// observe a partial item. tempfile creates the file with O_EXCL and mode 0600
/// on Unix, and the rename keeps those permissions.
fn write_private(dir: &Path, path: &Path, contents: &[u8]) -> Result<()> {
    let mut temp_file = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| Error::io(format!("failed to create temp file in {}", dir.display()), e))?;
    temp_file
        .write_all(contents)
        .map_err(|e| Error::io("failed to write temp file", e))?;
    temp_file
        .flush()
        .map_err(|e| Error::io("failed to flush temp file", e))?;
    temp_file
        .persist(path)
        .map_err(|e| Error::io(format!("failed to persist {}", path.display()), e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::fixed_string_prompt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn backend(dir: &Path, passphrase: &str) -> FileBackend {
        FileBackend::new(dir, fixed_string_prompt(passphrase))
    }

    #[test]
    fn set_when_empty_then_get() {
        let tmp = tempfile::tempdir().unwrap();
        let mut k = backend(tmp.path(), "no more secrets");
        let item = Item::new("llamas", "llamas are great");

        k.set(&item).unwrap();
        let found = k.get("llamas").unwrap();
        assert_eq!(found.data, b"llamas are great");
        assert_eq!(found.key, "llamas");
    }

    #[test]
    fn keys_with_slashes_stay_inside_the_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let mut k = backend(tmp.path(), "no more secrets");
        let key = "https://aws-sso-portal.awsapps.com/start";

        k.set(&Item::new(key, key)).unwrap();
        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![escape_filename(key)]);
        assert_eq!(k.keys().unwrap(), vec![key.to_string()]);

        k.remove(key).unwrap();
        assert!(k.keys().unwrap().is_empty());
    }

    #[test]
    fn prompts_once_per_handle() {
        let tmp = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let prompt: PromptFn = Arc::new(move |text: &str| -> Result<String> {
            assert!(text.starts_with("Enter passphrase to unlock"));
            counter.fetch_add(1, Ordering::SeqCst);
            Ok("p".to_string())
        });
        let mut k = FileBackend::new(tmp.path(), prompt);
        assert!(!k.is_unlocked());

        k.set(&Item::new("a", "1")).unwrap();
        k.get("a").unwrap();
        assert!(k.is_unlocked());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_key_does_not_prompt() {
        let tmp = tempfile::tempdir().unwrap();
        let prompt: PromptFn = Arc::new(|_: &str| -> Result<String> { panic!("prompted for a missing key") });
        let mut k = FileBackend::new(tmp.path(), prompt);

        assert!(matches!(k.get("nope"), Err(Error::NotFound { .. })));
        assert!(matches!(k.get_metadata("nope"), Err(Error::NotFound { .. })));
        assert!(!k.is_unlocked());
    }

    #[test]
    fn prompt_failure_is_surfaced() {
        let tmp = tempfile::tempdir().unwrap();
        let prompt: PromptFn =
            Arc::new(|_: &str| -> Result<String> { Err(Error::Configuration("prompt cancelled".into())) });
        let mut k = FileBackend::new(tmp.path(), prompt);

        let err = k.set(&Item::new("a", "1")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "{err}");
        assert!(!k.is_unlocked());
        assert!(k.keys().unwrap().is_empty());
    }

    #[test]
    fn empty_key_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut k = backend(tmp.path(), "p");
        let err = k.set(&Item::new("", "x")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "{err}");
    }

    #[test]
    fn corrupted_file_is_a_crypto_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("broken"), b"not an age file").unwrap();
        let mut k = backend(tmp.path(), "p");

        assert_eq!(k.keys().unwrap(), vec!["broken".to_string()]);
        let err = k.get("broken").unwrap_err();
        assert!(matches!(err, Error::Crypto { .. }), "{err}");
    }

    #[test]
    fn foreign_files_listed_as_keys_are_reachable() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a%2fb"), b"not an age file").unwrap();
        fs::write(tmp.path().join("%41"), b"not an age file").unwrap();
        let mut k = backend(tmp.path(), "p");

        let keys = k.keys().unwrap();
        assert_eq!(keys, vec!["a%2fb".to_string()]);
        for key in keys {
            let err = k.get(&key).unwrap_err();
            assert!(matches!(err, Error::Crypto { .. }), "{err}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn item_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let mut k = backend(tmp.path(), "p");
        k.set(&Item::new("a", "1")).unwrap();

        let mode = fs::metadata(tmp.path().join("a"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn open_requires_dir_and_prompt() {
        let err = FileBackend::open(&Config::new().with_file_password_func(fixed_string_prompt("p")))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Configuration(_)));

        let err = FileBackend::open(&Config::new().with_file_dir("/tmp/keyring"))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
