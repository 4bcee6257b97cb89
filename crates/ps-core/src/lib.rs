//! Shared primitives used across the PWA shell crates.

use core::fmt;

mod environment;
mod error;
pub mod time;

pub use environment::Environment;
pub use error::NavigationError;
pub use error::NavigationResult;

/// Result alias used by the lower layers of the workspace.
pub type ShellResult<T> = Result<T, ShellError>;

/// Error carrying a stable dotted code plus a human readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellError {
    pub code: &'static str,
    pub message: String,
}

impl ShellError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ShellError {}

#[cfg(test)]
mod tests {
    use super::ShellError;

    #[test]
    fn display_includes_code_and_message() {
        let error = ShellError::new("storage.quota_exceeded", "blob is 9000 bytes");
        assert_eq!(
            error.to_string(),
            "storage.quota_exceeded: blob is 9000 bytes"
        );
    }
}
