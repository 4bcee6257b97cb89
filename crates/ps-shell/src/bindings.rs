//! Keeps amp-bind expressions alive across document swaps.
//!
//! The runtime forgets bindings whose elements disappear. Before a document
//! leaves, emptied and hidden copies of its bound elements are captured; the
//! next document carries them in a hidden container.

use crate::slot::SlotId;
use ps_core::ShellError;
use ps_core::ShellResult;
use ps_dom::Document;
use ps_dom::NodeId;
use tracing::debug;

pub const MIGRATE_CONTAINER_CLASS: &str = "ps-bind-migrate";
pub const SOURCE_SLOT_ATTRIBUTE: &str = "data-bind-source-slot";

const BOUND_ATTRIBUTES: [&str; 9] = [
    "[class]",
    "[href]",
    "[src]",
    "[value]",
    "[text]",
    "[hidden]",
    "[disabled]",
    "[checked]",
    "[selected]",
];
const BIND_DATA_PREFIX: &str = "data-amp-bind-";
const BOUND_COMPONENTS: [&str; 3] = ["amp-list", "amp-selector", "amp-carousel"];

/// Single-item mailbox between two adjacent pipeline runs. A second `put`
/// before `take` is an error instead of a silent overwrite.
#[derive(Debug)]
pub struct Handoff<T> {
    slot: Option<T>,
}

impl<T> Default for Handoff<T> {
    fn default() -> Self {
        Self { slot: None }
    }
}

impl<T> Handoff<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, value: T) -> ShellResult<()> {
        if self.slot.is_some() {
            return Err(ShellError::new(
                "handoff.occupied",
                "a previous handoff has not been consumed",
            ));
        }
        self.slot = Some(value);
        Ok(())
    }

    pub fn take(&mut self) -> Option<T> {
        self.slot.take()
    }

    pub fn is_pending(&self) -> bool {
        self.slot.is_some()
    }
}

/// Hidden container of bound-element copies, detached from any page.
#[derive(Debug, Clone)]
pub struct BindingSnapshot {
    fragment: Document,
    container: NodeId,
    source_slot: SlotId,
}

impl BindingSnapshot {
    pub fn source_slot(&self) -> SlotId {
        self.source_slot
    }

    pub fn element_count(&self) -> usize {
        self.fragment.children(self.container).len()
    }
}

#[derive(Debug, Default)]
pub struct BindingMigrator {
    pending: Handoff<BindingSnapshot>,
}

impl BindingMigrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_pending()
    }

    /// Captures bindings of the document in `outgoing_slot` before
    /// `incoming_slot` receives a new one. Returns whether a snapshot is now
    /// pending.
    pub fn capture_outgoing(
        &mut self,
        outgoing_slot: SlotId,
        outgoing: &Document,
        incoming_slot: SlotId,
    ) -> ShellResult<bool> {
        let existing = find_container(outgoing);

        let snapshot = if outgoing_slot == incoming_slot {
            match existing {
                Some(container) => Some(carry_forward(outgoing, container, outgoing_slot)?),
                None => None,
            }
        } else {
            scrape(outgoing, existing, outgoing_slot)?
        };

        let Some(snapshot) = snapshot else {
            return Ok(false);
        };

        debug!(
            from = outgoing_slot.as_str(),
            to = incoming_slot.as_str(),
            elements = snapshot.element_count(),
            "captured bindings"
        );
        self.pending.put(snapshot)?;
        Ok(true)
    }

    /// Appends the pending snapshot to the incoming body. A second call
    /// without a capture in between does nothing.
    pub fn merge_incoming(&mut self, incoming: &mut Document) -> ShellResult<bool> {
        let Some(snapshot) = self.pending.take() else {
            return Ok(false);
        };

        let parent = incoming
            .body()
            .or_else(|| incoming.document_element())
            .unwrap_or_else(|| incoming.root());
        let container = incoming.import_node(&snapshot.fragment, snapshot.container, true)?;
        incoming.append_child(parent, container)?;
        Ok(true)
    }

    /// Drops a snapshot whose navigation failed.
    pub fn discard(&mut self) -> Option<BindingSnapshot> {
        self.pending.take()
    }
}

fn find_container(document: &Document) -> Option<NodeId> {
    document.find_first(document.root(), |doc, node| {
        doc.attribute(node, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|class| class == MIGRATE_CONTAINER_CLASS))
    })
}

fn carry_forward(outgoing: &Document, container: NodeId, source: SlotId) -> ShellResult<BindingSnapshot> {
    let mut fragment = Document::new();
    let copy = fragment.import_node(outgoing, container, true)?;
    let root = fragment.root();
    fragment.append_child(root, copy)?;

    Ok(BindingSnapshot {
        fragment,
        container: copy,
        source_slot: source,
    })
}

fn scrape(outgoing: &Document, existing: Option<NodeId>, source: SlotId) -> ShellResult<Option<BindingSnapshot>> {
    let Some(body) = outgoing.body() else {
        return Ok(None);
    };

    let bound = outgoing.find_all(body, |doc, node| {
        is_bound(doc, node) && existing.is_none_or(|container| !is_within(doc, node, container))
    });
    if bound.is_empty() {
        return Ok(None);
    }

    let mut fragment = Document::new();
    let container = fragment.create_element("div");
    fragment.set_attribute(container, "class", MIGRATE_CONTAINER_CLASS)?;
    fragment.set_attribute(container, SOURCE_SLOT_ATTRIBUTE, &source.index().to_string())?;
    fragment.set_attribute(container, "hidden", "")?;
    let root = fragment.root();
    fragment.append_child(root, container)?;

    for node in bound {
        let copy = fragment.import_node(outgoing, node, false)?;
        fragment.set_attribute(copy, "hidden", "")?;
        fragment.append_child(container, copy)?;
    }

    Ok(Some(BindingSnapshot {
        fragment,
        container,
        source_slot: source,
    }))
}

fn is_bound(document: &Document, node: NodeId) -> bool {
    let Some(element) = document.element(node) else {
        return false;
    };

    BOUND_COMPONENTS.contains(&element.tag.as_str())
        || element.attributes.iter().any(|attribute| {
            BOUND_ATTRIBUTES.contains(&attribute.name.as_str())
                || attribute.name.starts_with(BIND_DATA_PREFIX)
        })
}

fn is_within(document: &Document, node: NodeId, ancestor: NodeId) -> bool {
    let mut cursor = Some(node);
    while let Some(current) = cursor {
        if current == ancestor {
            return true;
        }
        cursor = document.parent(current);
    }
    false
}
