//! Session-wide state: the shell document, its slots and load bookkeeping.

use crate::slot::DocumentSlot;
use crate::slot::SlotId;
use ps_core::ShellError;
use ps_core::ShellResult;
use ps_dom::Document;
use ps_html::HtmlParser;
use ps_net::ShellUrl;

const SHELL_TEMPLATE: &str = r#"<!doctype html>
<html><head><title></title></head><body>
<main id="pwa-shell">
<div id="pwa-host-primary" class="pwa-host" data-slot="primary"></div>
<div id="pwa-host-pdp" class="pwa-host" data-slot="pdp"></div>
</main>
</body></html>"#;

#[derive(Debug, Clone)]
pub struct Session {
    shell: Document,
    slots: [DocumentSlot; 2],
    active: Option<SlotId>,
    current_url: Option<ShellUrl>,
    page_loads: u64,
}

impl Session {
    pub fn new() -> ShellResult<Self> {
        let shell = HtmlParser.parse(SHELL_TEMPLATE);
        let host = |id: SlotId| {
            let element_id = format!("pwa-host-{}", id.as_str());
            shell.element_by_id(&element_id).ok_or_else(|| {
                ShellError::new(
                    "session.host_missing",
                    format!("shell template has no `#{element_id}`"),
                )
            })
        };

        let slots = [
            DocumentSlot::new(SlotId::Primary, host(SlotId::Primary)?),
            DocumentSlot::new(SlotId::ProductDetail, host(SlotId::ProductDetail)?),
        ];

        Ok(Self {
            shell,
            slots,
            active: None,
            current_url: None,
            page_loads: 0,
        })
    }

    /// The outer page the slot hosts live in.
    pub fn shell(&self) -> &Document {
        &self.shell
    }

    pub fn slots(&self) -> &[DocumentSlot] {
        &self.slots
    }

    pub fn slot(&self, id: SlotId) -> &DocumentSlot {
        &self.slots[id.index()]
    }

    pub fn active(&self) -> Option<SlotId> {
        self.active
    }

    pub fn active_slot(&self) -> Option<&DocumentSlot> {
        self.active.map(|id| self.slot(id))
    }

    /// URL of the document on screen, fragment included.
    pub fn current_url(&self) -> Option<&ShellUrl> {
        self.current_url.as_ref()
    }

    pub fn page_loads(&self) -> u64 {
        self.page_loads
    }

    pub fn is_first_load(&self) -> bool {
        self.page_loads == 0
    }

    pub(crate) fn slot_and_shell_mut(&mut self, id: SlotId) -> (&mut DocumentSlot, &mut Document) {
        (&mut self.slots[id.index()], &mut self.shell)
    }

    pub(crate) fn slot_mut(&mut self, id: SlotId) -> &mut DocumentSlot {
        &mut self.slots[id.index()]
    }

    pub(crate) fn settle(&mut self, slot: SlotId, url: ShellUrl) {
        self.active = Some(slot);
        self.current_url = Some(url);
        self.page_loads += 1;
    }

    pub(crate) fn set_current_url(&mut self, url: ShellUrl) {
        self.current_url = Some(url);
    }
}
