use crate::StorageArea;
use ps_core::ShellError;
use ps_core::ShellResult;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

/// In-memory storage area. Clones share the same entries, which is how tests
/// simulate a fresh session reading what a previous one wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
    quota_bytes: Option<usize>,
    disabled: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the total size of keys plus values, like a browser's 5 MB quota.
    pub fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    /// Models storage disabled by the user agent: every write fails.
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl StorageArea for MemoryStorage {
    fn get_item(&self, key: &str) -> ShellResult<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> ShellResult<()> {
        if self.disabled {
            return Err(ShellError::new(
                "storage.disabled",
                "storage is disabled for this session",
            ));
        }

        let mut entries = self.entries();
        if let Some(quota) = self.quota_bytes {
            let used: usize = entries
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(existing, stored)| existing.len() + stored.len())
                .sum();
            let needed = used + key.len() + value.len();
            if needed > quota {
                return Err(ShellError::new(
                    "storage.quota_exceeded",
                    format!("writing `{key}` needs {needed} bytes, quota is {quota}"),
                ));
            }
        }

        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> ShellResult<()> {
        self.entries().remove(key);
        Ok(())
    }
}
