//! Attaching documents to slots and clearing them again.

use crate::platform::Viewport;
use crate::runtime::ShadowHandle;
use crate::runtime::ShadowRuntime;
use crate::slot::DocumentSlot;
use crate::slot::Occupant;
use ps_core::ShellError;
use ps_core::ShellResult;
use ps_dom::Document;
use ps_net::ShellUrl;
use tracing::debug;
use tracing::warn;

/// Closes the slot's document and swaps the host element for a fresh one,
/// since a host can only ever carry one shadow root. The placeholder keeps
/// `id`, `class` and `data-*` attributes. Close failures are logged and
/// ignored.
pub fn clear(
    slot: &mut DocumentSlot,
    shell: &mut Document,
    runtime: &mut dyn ShadowRuntime,
    viewport: &mut dyn Viewport,
) -> ShellResult<()> {
    if let Some(occupant) = slot.vacate() {
        if let Err(error) = runtime.close(occupant.handle) {
            warn!(slot = slot.id().as_str(), %error, "shadow document close failed, continuing");
        }
    }

    let old_host = slot.host();
    let tag = shell.tag_name(old_host).unwrap_or("div").to_owned();
    let kept: Vec<(String, String)> = shell
        .attributes(old_host)
        .iter()
        .filter(|attribute| is_kept_attribute(&attribute.name))
        .map(|attribute| (attribute.name.clone(), attribute.value.clone()))
        .collect();

    let placeholder = shell.create_element(&tag);
    for (name, value) in &kept {
        shell.set_attribute(placeholder, name, value)?;
    }
    shell.replace_node(old_host, placeholder)?;
    slot.set_host(placeholder);

    debug!(slot = slot.id().as_str(), host = placeholder, "slot cleared");
    viewport.scroll_slot_to_top(slot.id());
    Ok(())
}

/// Attaches `document` to an empty slot and records its href.
pub fn attach(
    slot: &mut DocumentSlot,
    runtime: &mut dyn ShadowRuntime,
    document: Document,
    href: &ShellUrl,
) -> ShellResult<ShadowHandle> {
    if let Some(current) = slot.href() {
        return Err(ShellError::new(
            "slot.occupied",
            format!(
                "slot `{}` still shows `{current}`; clear it before attaching",
                slot.id().as_str()
            ),
        ));
    }

    let handle = runtime.attach_shadow_doc(slot.host(), document, href)?;
    slot.occupy(Occupant {
        handle,
        href: href.clone(),
    })?;
    debug!(slot = slot.id().as_str(), href = %href, "document attached");
    Ok(handle)
}

fn is_kept_attribute(name: &str) -> bool {
    name == "id" || name == "class" || name.starts_with("data-")
}
