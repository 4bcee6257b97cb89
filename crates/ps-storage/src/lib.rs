//! Web Storage model for the shell: session/local areas, JSON state blobs
//! and the recursive merge used when state is rehydrated.

mod file;
mod json;
mod memory;

use ps_core::ShellResult;

pub use file::FileStorage;
pub use file::STORAGE_DIR_ENV;
pub use json::merge_recursive;
pub use json::read_blob;
pub use json::write_blob;
pub use json::StateBlob;
pub use memory::MemoryStorage;

/// The two Web Storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StorageKind {
    Session,
    Local,
}

impl StorageKind {
    pub const ALL: [StorageKind; 2] = [StorageKind::Session, StorageKind::Local];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Local => "local",
        }
    }
}

/// String key/value area with `sessionStorage`/`localStorage` semantics.
pub trait StorageArea {
    fn get_item(&self, key: &str) -> ShellResult<Option<String>>;

    /// May fail with `storage.quota_exceeded` or when storage is disabled.
    fn set_item(&self, key: &str, value: &str) -> ShellResult<()>;

    fn remove_item(&self, key: &str) -> ShellResult<()>;
}

impl<S: StorageArea + ?Sized> StorageArea for Box<S> {
    fn get_item(&self, key: &str) -> ShellResult<Option<String>> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> ShellResult<()> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> ShellResult<()> {
        (**self).remove_item(key)
    }
}
