//! Navigation failure taxonomy.

use crate::ShellError;
use thiserror::Error;

pub type NavigationResult<T> = Result<T, NavigationError>;

/// Everything that can stop a single pass through the navigation pipeline.
///
/// `RedirectRequested` and `DocumentNotBuilt` are control-flow signals that the
/// router may consume before a failure becomes terminal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("`{url}` answered with non-HTML content type `{content_type}`")]
    NotHtml { url: String, content_type: String },

    #[error("`{url}` is not built yet (HTTP 202)")]
    DocumentNotBuilt { url: String },

    #[error("`{url}` answered with HTTP {status}")]
    Fetch { url: String, status: u16 },

    #[error("transport failure for `{url}`: {message}")]
    Transport { url: String, message: String },

    #[error("`{url}` is missing the AMP root marker")]
    InvalidDocument { url: String },

    #[error("document asked to be replaced by `{target}`")]
    RedirectRequested { target: String },

    #[error("gave up on `{url}` after {attempts} redirects")]
    RedirectLoop { url: String, attempts: usize },

    #[error("`{url}` is already displayed")]
    SameUrlNoop { url: String },

    #[error("{stage} hook failed: {message}")]
    Hook { stage: &'static str, message: String },

    #[error(transparent)]
    Platform(#[from] ShellError),
}

impl NavigationError {
    /// Stable identifier for logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl { .. } => "nav.invalid_url",
            Self::NotHtml { .. } => "nav.not_html",
            Self::DocumentNotBuilt { .. } => "nav.document_not_built",
            Self::Fetch { .. } => "nav.fetch_status",
            Self::Transport { .. } => "nav.transport",
            Self::InvalidDocument { .. } => "nav.invalid_document",
            Self::RedirectRequested { .. } => "nav.redirect_requested",
            Self::RedirectLoop { .. } => "nav.redirect_loop",
            Self::SameUrlNoop { .. } => "nav.same_url",
            Self::Hook { .. } => "nav.hook_failed",
            Self::Platform(error) => error.code,
        }
    }

    /// Silent failures are swallowed without a reload or an error log.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::SameUrlNoop { .. })
    }

    pub fn hook(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Hook {
            stage,
            message: message.into(),
        }
    }
}
