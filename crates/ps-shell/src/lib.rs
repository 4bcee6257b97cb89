//! The PWA navigation shell.
//!
//! A [`Pwa`] keeps two document slots inside one shell page. Same-site links
//! are fetched, validated, transformed and swapped into a slot instead of
//! reloading the page; the session history, scroll offsets and persisted
//! amp-state follow along. Anything the shell cannot handle falls back to a
//! full page load.

pub mod amp_state;
pub mod attacher;
pub mod bindings;
pub mod config;
pub mod forms;
pub mod history;
pub mod hooks;
pub mod persistence;
pub mod platform;
pub mod router;
pub mod runtime;
pub mod session;
pub mod slot;
pub mod tasks;

mod pwa;

pub use bindings::BindingMigrator;
pub use config::ShellConfig;
pub use forms::FormRoute;
pub use forms::FormSubmission;
pub use history::HistoryCoordinator;
pub use hooks::NoopHooks;
pub use hooks::PageHooks;
pub use hooks::PostRenderContext;
pub use hooks::RenderContext;
pub use persistence::StatePersistence;
pub use platform::HeadlessPlatform;
pub use platform::Platform;
pub use pwa::Pwa;
pub use router::LoadOutcome;
pub use router::NavState;
pub use router::NavigationCause;
pub use router::NavigationKind;
pub use router::NavigationRequest;
pub use runtime::InMemoryShadowRuntime;
pub use runtime::ShadowHandle;
pub use runtime::ShadowRuntime;
pub use slot::DocumentSlot;
pub use slot::SlotId;
pub use tasks::Deferred;
pub use tasks::ShellTask;
