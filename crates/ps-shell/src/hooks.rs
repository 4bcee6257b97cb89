//! Collaborator hooks around attaching a document.

use crate::slot::SlotId;
use crate::tasks::Deferred;
use ps_core::ShellResult;
use ps_dom::DocumentOps;
use ps_net::ShellUrl;

/// What `before_render` knows about the page being loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContext<'a> {
    pub url: &'a ShellUrl,
    /// Search term carried in the URL, for same-document substitution.
    pub search_term: Option<String>,
    /// Product SKU the page should preselect.
    pub sku_override: Option<String>,
    pub first_load: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRenderContext<'a> {
    pub url: &'a ShellUrl,
    pub slot: SlotId,
    pub first_load: bool,
    pub page_loads: u64,
    /// Deferred user action carried over from a static page, first load only.
    pub interaction: Option<String>,
}

/// Page-specific DOM work. `before_render` runs once per fetched document
/// while it is still detached; `post_render` runs after every settled load.
/// An error from either aborts the navigation.
pub trait PageHooks {
    fn before_render(
        &mut self,
        _document: &mut dyn DocumentOps,
        _context: &RenderContext<'_>,
    ) -> ShellResult<()> {
        Ok(())
    }

    fn post_render(
        &mut self,
        _document: &mut dyn DocumentOps,
        _context: &PostRenderContext<'_>,
        _deferred: &mut Deferred<'_>,
    ) -> ShellResult<()> {
        Ok(())
    }
}

/// Hooks that leave documents untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl PageHooks for NoopHooks {}
