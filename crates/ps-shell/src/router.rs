//! Navigation classification and slot selection.

use crate::config::RouteRules;
use crate::slot::DocumentSlot;
use crate::slot::SlotId;
use ps_net::ShellUrl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationCause {
    UserClick,
    HistoryPop,
    Programmatic,
    Redirect,
}

/// How a requested URL gets handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// Another host: leave the shell with a plain page load.
    CrossDomain,
    /// Already shown by a slot that is not on screen: switch, no fetch.
    AlreadyOpenElsewhere(SlotId),
    /// The page on screen, requested again.
    SameUrlNoop,
    /// Only the fragment differs from the page on screen.
    AnchorOnCurrentPage,
    /// Path the SPA does not support.
    NotHandled,
    NormalPage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub url: ShellUrl,
    pub kind: NavigationKind,
    pub cause: NavigationCause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavState {
    #[default]
    Idle,
    Classifying,
    Fetching,
    Transforming,
    Attaching,
    Settled,
    Failed,
}

impl NavState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Classifying => "classifying",
            Self::Fetching => "fetching",
            Self::Transforming => "transforming",
            Self::Attaching => "attaching",
            Self::Settled => "settled",
            Self::Failed => "failed",
        }
    }
}

/// How a `load` ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Settled { slot: SlotId, href: String },
    Anchor { fragment: Option<String> },
    Ignored,
    FullReload { href: String },
}

/// The parts of the session classification looks at.
#[derive(Debug, Clone, Copy)]
pub struct RouteView<'a> {
    /// The page's own location, for the host comparison.
    pub location: Option<&'a ShellUrl>,
    /// The document on screen.
    pub displayed: Option<&'a ShellUrl>,
    pub first_load: bool,
    pub active: Option<SlotId>,
    pub slots: &'a [DocumentSlot],
}

/// Applies the classification rules in order; the first match wins.
pub fn classify(
    url: &ShellUrl,
    cause: NavigationCause,
    view: &RouteView<'_>,
    rules: &RouteRules,
) -> NavigationKind {
    let home = view.location.or(view.displayed);
    if home.is_some_and(|home| !home.same_host(url)) {
        return NavigationKind::CrossDomain;
    }

    if !view.first_load {
        let elsewhere = view
            .slots
            .iter()
            .find(|slot| Some(slot.id()) != view.active && slot.shows(url));
        if let Some(slot) = elsewhere {
            return NavigationKind::AlreadyOpenElsewhere(slot.id());
        }
    }

    if let Some(displayed) = view.displayed {
        if cause != NavigationCause::HistoryPop && url == displayed {
            return NavigationKind::SameUrlNoop;
        }
        if url != displayed && url.same_document(displayed) {
            return NavigationKind::AnchorOnCurrentPage;
        }
    }

    if rules.is_excluded(url.path()) {
        return NavigationKind::NotHandled;
    }

    NavigationKind::NormalPage
}

/// Picks the slot a page lands in. A slot already showing the page wins;
/// otherwise product detail pages get their own slot.
pub fn select_slot(url: &ShellUrl, slots: &[DocumentSlot], rules: &RouteRules) -> SlotId {
    if let Some(slot) = slots.iter().find(|slot| slot.shows(url)) {
        return slot.id();
    }

    if rules.is_product_detail(url.path()) {
        SlotId::ProductDetail
    } else {
        SlotId::Primary
    }
}
