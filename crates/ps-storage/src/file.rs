//! Durable `localStorage` kept as one record file per origin.
//!
//! Each line is `hex(key) TAB hex(value)`, so neither keys nor JSON values
//! need escaping.

use crate::StorageArea;
use ps_core::ShellError;
use ps_core::ShellResult;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;

/// Overrides the directory partitions are stored under.
pub const STORAGE_DIR_ENV: &str = "PWA_SHELL_STORAGE_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Storage for `origin` under `root/partitions/`.
    pub fn new(root: impl Into<PathBuf>, origin: &str) -> Self {
        let root = root.into();
        Self {
            path: root
                .join("partitions")
                .join(format!("{}.kv", partition_name(origin))),
        }
    }

    /// Like [`FileStorage::new`] with the root taken from
    /// `PWA_SHELL_STORAGE_DIR`, falling back to the system temp directory.
    pub fn from_env(origin: &str) -> Self {
        let root = std::env::var_os(STORAGE_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("pwa-shell"));
        Self::new(root, origin)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> ShellResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|error| {
            ShellError::new(
                "storage.partition_read_failed",
                format!("failed to read `{}`: {error}", self.path.display()),
            )
        })?;

        let mut records = BTreeMap::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once('\t') else {
                return Err(ShellError::new(
                    "storage.partition_format_invalid",
                    format!("malformed record on line {} of `{}`", number + 1, self.path.display()),
                ));
            };
            records.insert(from_hex(key)?, from_hex(value)?);
        }
        Ok(records)
    }

    fn store(&self, records: &BTreeMap<String, String>) -> ShellResult<()> {
        if records.is_empty() {
            if self.path.exists() {
                fs::remove_file(&self.path).map_err(|error| {
                    ShellError::new(
                        "storage.partition_remove_failed",
                        format!("failed to remove `{}`: {error}", self.path.display()),
                    )
                })?;
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|error| {
                ShellError::new(
                    "storage.partition_dir_create_failed",
                    format!("failed to create `{}`: {error}", parent.display()),
                )
            })?;
        }

        let mut encoded = String::new();
        for (key, value) in records {
            encoded.push_str(&to_hex(key));
            encoded.push('\t');
            encoded.push_str(&to_hex(value));
            encoded.push('\n');
        }

        debug!(path = %self.path.display(), records = records.len(), "writing storage partition");
        fs::write(&self.path, encoded).map_err(|error| {
            ShellError::new(
                "storage.partition_write_failed",
                format!("failed to write `{}`: {error}", self.path.display()),
            )
        })
    }
}

impl StorageArea for FileStorage {
    fn get_item(&self, key: &str) -> ShellResult<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> ShellResult<()> {
        let mut records = self.load()?;
        records.insert(key.to_owned(), value.to_owned());
        self.store(&records)
    }

    fn remove_item(&self, key: &str) -> ShellResult<()> {
        let mut records = self.load()?;
        if records.remove(key).is_some() {
            self.store(&records)?;
        }
        Ok(())
    }
}

fn partition_name(origin: &str) -> String {
    let name: String = origin
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|ch| match ch {
            'a'..='z' | '0'..='9' | '.' | '-' | '_' => ch,
            _ => '_',
        })
        .collect();

    if name.is_empty() { "unknown".to_owned() } else { name }
}

fn to_hex(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 2);
    for byte in value.bytes() {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn from_hex(field: &str) -> ShellResult<String> {
    if field.len() % 2 != 0 || !field.is_ascii() {
        return Err(ShellError::new(
            "storage.partition_hex_invalid",
            "hex field must be ASCII with an even length",
        ));
    }

    let bytes = (0..field.len())
        .step_by(2)
        .map(|index| {
            u8::from_str_radix(&field[index..index + 2], 16).map_err(|_| {
                ShellError::new(
                    "storage.partition_hex_invalid",
                    format!("invalid hex pair `{}`", &field[index..index + 2]),
                )
            })
        })
        .collect::<ShellResult<Vec<u8>>>()?;

    String::from_utf8(bytes).map_err(|error| {
        ShellError::new(
            "storage.partition_utf8_invalid",
            format!("record is not valid UTF-8: {error}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::FileStorage;
    use super::from_hex;
    use super::to_hex;
    use crate::StorageArea;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_root() -> std::path::PathBuf {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|value| value.as_nanos())
            .unwrap_or_default();
        std::env::temp_dir().join(format!("pwa-shell-storage-test-{stamp}"))
    }

    #[test]
    fn values_survive_a_new_handle() {
        let root = temp_root();
        let storage = FileStorage::new(&root, "https://shop.example");
        assert!(storage.set_item("pwaLocalState", "{\"cart\":{\"count\":2}}").is_ok());

        let reopened = FileStorage::new(&root, "https://shop.example");
        assert_eq!(
            reopened.get_item("pwaLocalState"),
            Ok(Some("{\"cart\":{\"count\":2}}".to_owned()))
        );

        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn removing_last_key_deletes_partition_file() {
        let root = temp_root();
        let storage = FileStorage::new(&root, "shop.example");
        assert!(storage.set_item("k", "v").is_ok());
        assert!(storage.path().exists());

        assert!(storage.remove_item("k").is_ok());
        assert!(!storage.path().exists());
        assert_eq!(storage.get_item("k"), Ok(None));

        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn origins_are_sanitized_into_file_names() {
        let storage = FileStorage::new("/tmp/root", "https://Shop.Example:8443");
        assert!(storage.path().ends_with("partitions/https___shop.example_8443.kv"));
    }

    #[test]
    fn hex_fields_reject_garbage() {
        assert_eq!(from_hex(&to_hex("caf\u{e9} \t")), Ok("caf\u{e9} \t".to_owned()));
        assert!(from_hex("abc").is_err());
        assert!(from_hex("zz").is_err());
    }
}
