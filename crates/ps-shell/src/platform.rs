//! Browser capabilities the shell drives, split by concern so collaborators
//! only see what they need.

use crate::slot::SlotId;

pub trait HistoryApi {
    fn location_href(&self) -> String;

    fn push_state(&mut self, href: &str, title: &str);

    /// The referrer the browser reported for the page load.
    fn document_referrer(&self) -> String;

    /// Replaces what scripts read as `document.referrer`.
    fn override_referrer(&mut self, referrer: &str);
}

pub trait Viewport {
    fn scroll_y(&self) -> f64;

    fn scroll_to(&mut self, y: f64);

    fn scroll_slot_to_top(&mut self, slot: SlotId);

    fn scroll_to_fragment(&mut self, slot: SlotId, fragment: &str);

    /// Makes `slot` the visible host and hides the others.
    fn show_slot(&mut self, slot: SlotId);
}

pub trait PageReloader {
    /// Leaves the shell with a traditional page load.
    fn full_reload(&mut self, href: &str);
}

pub trait Platform: HistoryApi + Viewport + PageReloader {}

impl<T: HistoryApi + Viewport + PageReloader> Platform for T {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushedState {
    pub href: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScrollEvent {
    Window(f64),
    SlotTop(SlotId),
    Fragment(SlotId, String),
}

/// Platform without a browser: keeps a session history stack and records
/// every side effect for inspection.
#[derive(Debug, Clone)]
pub struct HeadlessPlatform {
    entries: Vec<String>,
    index: usize,
    referrer: String,
    referrer_override: Option<String>,
    scroll_y: f64,
    visible: Option<SlotId>,
    pushes: Vec<PushedState>,
    reloads: Vec<String>,
    scrolls: Vec<ScrollEvent>,
}

impl HeadlessPlatform {
    pub fn new(initial_href: &str, referrer: &str) -> Self {
        Self {
            entries: vec![initial_href.to_owned()],
            index: 0,
            referrer: referrer.to_owned(),
            referrer_override: None,
            scroll_y: 0.0,
            visible: None,
            pushes: Vec::new(),
            reloads: Vec::new(),
            scrolls: Vec::new(),
        }
    }

    /// Moves one entry back, as the back button does before `popstate` fires.
    pub fn go_back(&mut self) -> Option<String> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        self.entries.get(self.index).cloned()
    }

    pub fn go_forward(&mut self) -> Option<String> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        self.entries.get(self.index).cloned()
    }

    /// User scroll, without recording an event.
    pub fn set_scroll_y(&mut self, y: f64) {
        self.scroll_y = y;
    }

    pub fn referrer(&self) -> &str {
        self.referrer_override.as_deref().unwrap_or(&self.referrer)
    }

    pub fn visible_slot(&self) -> Option<SlotId> {
        self.visible
    }

    pub fn history_len(&self) -> usize {
        self.entries.len()
    }

    pub fn pushes(&self) -> &[PushedState] {
        &self.pushes
    }

    pub fn reloads(&self) -> &[String] {
        &self.reloads
    }

    pub fn scrolls(&self) -> &[ScrollEvent] {
        &self.scrolls
    }
}

impl HistoryApi for HeadlessPlatform {
    fn location_href(&self) -> String {
        self.entries.get(self.index).cloned().unwrap_or_default()
    }

    fn push_state(&mut self, href: &str, title: &str) {
        self.entries.truncate(self.index + 1);
        self.entries.push(href.to_owned());
        self.index = self.entries.len() - 1;
        self.pushes.push(PushedState {
            href: href.to_owned(),
            title: title.to_owned(),
        });
    }

    fn document_referrer(&self) -> String {
        self.referrer.clone()
    }

    fn override_referrer(&mut self, referrer: &str) {
        self.referrer_override = Some(referrer.to_owned());
    }
}

impl Viewport for HeadlessPlatform {
    fn scroll_y(&self) -> f64 {
        self.scroll_y
    }

    fn scroll_to(&mut self, y: f64) {
        self.scroll_y = y;
        self.scrolls.push(ScrollEvent::Window(y));
    }

    fn scroll_slot_to_top(&mut self, slot: SlotId) {
        self.scrolls.push(ScrollEvent::SlotTop(slot));
    }

    fn scroll_to_fragment(&mut self, slot: SlotId, fragment: &str) {
        self.scrolls
            .push(ScrollEvent::Fragment(slot, fragment.to_owned()));
    }

    fn show_slot(&mut self, slot: SlotId) {
        self.visible = Some(slot);
    }
}

impl PageReloader for HeadlessPlatform {
    fn full_reload(&mut self, href: &str) {
        self.reloads.push(href.to_owned());
    }
}
