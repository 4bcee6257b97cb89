//! Document slots: the fixed host elements documents are shown in.

use crate::runtime::ShadowHandle;
use ps_core::ShellError;
use ps_core::ShellResult;
use ps_dom::NodeId;
use ps_net::ShellUrl;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SlotId {
    Primary,
    ProductDetail,
}

impl SlotId {
    pub const ALL: [SlotId; 2] = [SlotId::Primary, SlotId::ProductDetail];

    /// Slot number used when tagging migrated bindings.
    pub fn index(self) -> usize {
        match self {
            Self::Primary => 0,
            Self::ProductDetail => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::ProductDetail => "pdp",
        }
    }
}

/// What a slot holds while a document is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupant {
    pub handle: ShadowHandle,
    pub href: ShellUrl,
}

/// A host element that shows zero or one attached document. The href and the
/// shadow handle live together in [`Occupant`], so one is never set without
/// the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSlot {
    id: SlotId,
    host: NodeId,
    occupant: Option<Occupant>,
}

impl DocumentSlot {
    pub fn new(id: SlotId, host: NodeId) -> Self {
        Self {
            id,
            host,
            occupant: None,
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    /// Host element in the shell document.
    pub fn host(&self) -> NodeId {
        self.host
    }

    pub(crate) fn set_host(&mut self, host: NodeId) {
        self.host = host;
    }

    pub fn occupant(&self) -> Option<&Occupant> {
        self.occupant.as_ref()
    }

    pub fn href(&self) -> Option<&ShellUrl> {
        self.occupant.as_ref().map(|occupant| &occupant.href)
    }

    pub fn handle(&self) -> Option<ShadowHandle> {
        self.occupant.as_ref().map(|occupant| occupant.handle)
    }

    pub fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }

    /// Whether the slot shows `url`, fragments ignored.
    pub fn shows(&self, url: &ShellUrl) -> bool {
        self.href().is_some_and(|href| href.same_document(url))
    }

    pub(crate) fn occupy(&mut self, occupant: Occupant) -> ShellResult<()> {
        if let Some(current) = &self.occupant {
            return Err(ShellError::new(
                "slot.occupied",
                format!(
                    "slot `{}` still shows `{}`; clear it before attaching",
                    self.id.as_str(),
                    current.href
                ),
            ));
        }
        self.occupant = Some(occupant);
        Ok(())
    }

    pub(crate) fn vacate(&mut self) -> Option<Occupant> {
        self.occupant.take()
    }

    /// Keeps the handle but records a new URL, for in-page anchor moves.
    pub(crate) fn update_href(&mut self, href: ShellUrl) {
        if let Some(occupant) = &mut self.occupant {
            occupant.href = href;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DocumentSlot;
    use super::Occupant;
    use super::SlotId;
    use crate::runtime::ShadowHandle;
    use ps_net::ShellUrl;

    fn url(raw: &str) -> ShellUrl {
        ShellUrl::parse(raw).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn occupied_slot_refuses_second_document() {
        let mut slot = DocumentSlot::new(SlotId::Primary, 3);
        let first = Occupant {
            handle: ShadowHandle::new(1),
            href: url("https://shop.example/a"),
        };
        assert!(slot.occupy(first.clone()).is_ok());

        let second = Occupant {
            handle: ShadowHandle::new(2),
            href: url("https://shop.example/b"),
        };
        match slot.occupy(second) {
            Err(error) => assert_eq!(error.code, "slot.occupied"),
            Ok(()) => panic!("slot accepted a second document"),
        }

        assert_eq!(slot.vacate(), Some(first));
        assert!(slot.is_empty());
        assert!(slot.href().is_none());
    }

    #[test]
    fn shows_ignores_fragment() {
        let mut slot = DocumentSlot::new(SlotId::ProductDetail, 4);
        assert!(slot
            .occupy(Occupant {
                handle: ShadowHandle::new(1),
                href: url("https://shop.example/store/product/widget/123"),
            })
            .is_ok());

        assert!(slot.shows(&url("https://shop.example/store/product/widget/123#reviews")));
        assert!(!slot.shows(&url("https://shop.example/store/product/widget/124")));
        assert_eq!(slot.id().as_str(), "pdp");
        assert_eq!(slot.id().index(), 1);
    }
}
