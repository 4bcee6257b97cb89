//! Keeps browser history, `document.referrer` and scroll offsets in step with
//! slot transitions.

use crate::platform::HistoryApi;
use crate::platform::Viewport;
use crate::tasks::ShellTask;
use crate::tasks::TaskQueue;
use std::collections::HashMap;
use tracing::debug;

/// Per-href bookkeeping. The map is never pruned during a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryEntry {
    pub referrer: Option<String>,
    pub scroll_y: Option<f64>,
}

/// What `commit` needs to know about the load that just settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo<'a> {
    pub href: &'a str,
    pub title: &'a str,
    pub first_load: bool,
    /// `location.href` before this navigation.
    pub previous_href: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct HistoryCoordinator {
    entries: HashMap<String, HistoryEntry>,
    pop_in_progress: bool,
}

impl HistoryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, href: &str) -> Option<&HistoryEntry> {
        self.entries.get(href)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pop_in_progress(&self) -> bool {
        self.pop_in_progress
    }

    /// Remembers how far the page being left was scrolled.
    pub fn before_leave(&mut self, current_href: &str, viewport: &dyn Viewport) {
        let scroll_y = viewport.scroll_y();
        debug!(href = current_href, scroll_y, "snapshotting scroll offset");
        self.entries
            .entry(current_href.to_owned())
            .or_default()
            .scroll_y = Some(scroll_y);
    }

    /// Records the referrer for the settled page and pushes a history entry,
    /// except on the first load and for back/forward navigations, where the
    /// browser already moved `location`.
    pub fn commit(&mut self, info: &CommitInfo<'_>, history: &mut dyn HistoryApi) {
        if std::mem::take(&mut self.pop_in_progress) {
            debug!(href = info.href, "history pop settled, no push");
            return;
        }

        let referrer = if info.first_load {
            history.document_referrer()
        } else {
            info.previous_href.unwrap_or_default().to_owned()
        };

        history.override_referrer(&referrer);
        self.entries
            .entry(info.href.to_owned())
            .or_default()
            .referrer = Some(referrer);

        if !info.first_load {
            history.push_state(info.href, info.title);
        }
    }

    /// `popstate` listener: the real work waits one tick for `location`.
    pub fn on_pop_state(&self, tasks: &mut TaskQueue) {
        tasks.push(ShellTask::PopState);
    }

    /// Starts handling a pop to `href`: restores its referrer override and
    /// marks the pop so the next `commit` does not push.
    pub fn begin_pop(&mut self, href: &str, history: &mut dyn HistoryApi) {
        if let Some(referrer) = self
            .entries
            .get(href)
            .and_then(|entry| entry.referrer.as_deref())
        {
            history.override_referrer(referrer);
        }
        self.pop_in_progress = true;
    }

    /// Clears a pop flag left behind by a navigation that never committed.
    pub fn cancel_pop(&mut self) {
        self.pop_in_progress = false;
    }

    /// Scrolls back to the offset stored for `href`. Returns whether one was
    /// stored.
    pub fn restore_scroll(&self, href: &str, viewport: &mut dyn Viewport) -> bool {
        match self.entries.get(href).and_then(|entry| entry.scroll_y) {
            Some(scroll_y) => {
                viewport.scroll_to(scroll_y);
                true
            }
            None => false,
        }
    }
}
