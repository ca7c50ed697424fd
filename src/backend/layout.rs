//! Directory resolution and key-to-filename mapping for the file backend.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Expands a leading `~` path component to the current user's home directory.
///
/// Only `~` as a whole component is expanded: `~/secrets` is, `~secrets` is not.
pub fn expand_tilde(dir: &Path) -> Result<PathBuf> {
    expand_tilde_in(dir, dirs::home_dir().as_deref())
}

fn expand_tilde_in(dir: &Path, home: Option<&Path>) -> Result<PathBuf> {
    let Ok(rest) = dir.strip_prefix("~") else {
        return Ok(dir.to_path_buf());
    };
    let home = home
        .ok_or_else(|| Error::Configuration("could not determine home directory".to_string()))?;
    let expanded = home.join(rest);
    tracing::debug!(dir = %expanded.display(), "expanded file dir");
    Ok(expanded)
}

/// Turns the configured directory into an existing absolute directory,
/// creating it (owner-only) when missing.
pub fn resolve_dir(configured: &Path) -> Result<PathBuf> {
    if configured.as_os_str().is_empty() {
        return Err(Error::Configuration(
            "no directory provided for file keyring".to_string(),
        ));
    }

    let dir = expand_tilde(configured)?;
    let dir = std::path::absolute(&dir)
        .map_err(|e| Error::io(format!("failed to resolve {}", dir.display()), e))?;

    match fs::metadata(&dir) {
        Ok(meta) if meta.is_dir() => Ok(dir),
        Ok(_) => Err(Error::Configuration(format!(
            "{} is a file, not a directory",
            dir.display()
        ))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            create_private_dir(&dir)
                .map_err(|e| Error::io(format!("failed to create {}", dir.display()), e))?;
            tracing::debug!(dir = %dir.display(), "created file keyring dir");
            Ok(dir)
        }
        Err(e) => Err(Error::io(format!("failed to stat {}", dir.display()), e)),
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

const ESCAPE: u8 = b'%';

fn needs_escape(byte: u8, position: usize) -> bool {
    match byte {
        b'/' | b'\\' => true,
        // reserved on Windows filesystems
        b':' | b'*' | b'?' | b'"' | b'<' | b'>' | b'|' => true,
        // keeps `.` and `..` out of reach, and hides nothing behind a dotfile
        b'.' => position == 0,
        _ => byte.is_ascii_control(),
    }
}

/// Maps an item key to a filename that is safe to join onto the store dir.
///
/// The result never contains a path separator and never starts with `.`.
/// A `%` is only escaped when it would otherwise read as an escape sequence.
pub fn escape_filename(key: &str) -> String {
    let bytes = key.as_bytes();
    let mut out = String::with_capacity(key.len());
    for (position, ch) in key.char_indices() {
        let escape = ch.is_ascii()
            && match ch as u8 {
                ESCAPE => decode_escape(&bytes[position + 1..]).is_some(),
                byte => needs_escape(byte, position),
            };
        if escape {
            out.push_str(&format!("%{:02X}", ch as u8));
        } else {
            out.push(ch);
        }
    }
    out
}

/// Reverses [`escape_filename`].
///
/// Only the uppercase `%XX` form decodes; anything else is kept literally.
pub fn unescape_filename(name: &str) -> String {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == ESCAPE
            && let Some(decoded) = decode_escape(&bytes[i + 1..])
        {
            out.push(decoded);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// True when `name` is exactly what [`escape_filename`] produces for some key.
pub fn is_canonical_filename(name: &str) -> bool {
    escape_filename(&unescape_filename(name)) == name
}

/// Decodes the two uppercase hex digits at the start of `rest`.
fn decode_escape(rest: &[u8]) -> Option<u8> {
    fn nibble(digit: u8) -> Option<u8> {
        match digit {
            b'0'..=b'9' => Some(digit - b'0'),
            b'A'..=b'F' => Some(digit - b'A' + 10),
            _ => None,
        }
    }
    match rest {
        [high, low, ..] => Some(nibble(*high)? << 4 | nibble(*low)?),
        _ => None,
    }
}
