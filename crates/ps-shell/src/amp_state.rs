//! `<amp-state id="name"><script type="application/json">` blocks.

use ps_core::ShellError;
use ps_core::ShellResult;
use ps_dom::Document;
use ps_dom::NodeId;
use ps_storage::merge_recursive;
use serde_json::Value;
use std::collections::BTreeMap;

const JSON_SCRIPT_TYPE: &str = "application/json";

pub fn find_amp_state(document: &Document, name: &str) -> Option<NodeId> {
    document.find_first(document.root(), |doc, node| {
        doc.tag_name(node) == Some("amp-state") && doc.attribute(node, "id") == Some(name)
    })
}

/// Every named amp-state with parseable JSON.
pub fn read_amp_states(document: &Document) -> BTreeMap<String, Value> {
    let states = document.find_all(document.root(), |doc, node| {
        doc.tag_name(node) == Some("amp-state") && doc.has_attribute(node, "id")
    });

    states
        .into_iter()
        .filter_map(|node| {
            let name = document.attribute(node, "id")?.to_owned();
            let value = state_value(document, node)?;
            Some((name, value))
        })
        .collect()
}

pub fn read_amp_state(document: &Document, name: &str) -> Option<Value> {
    find_amp_state(document, name).and_then(|node| state_value(document, node))
}

/// Merges `overlay` into the named state, creating the element in the body
/// when the page does not declare it.
pub fn merge_amp_state(document: &mut Document, name: &str, overlay: &Value) -> ShellResult<()> {
    let node = match find_amp_state(document, name) {
        Some(node) => node,
        None => create_amp_state(document, name)?,
    };

    let mut value = state_value(document, node).unwrap_or(Value::Null);
    merge_recursive(&mut value, overlay);

    let script = json_script(document, node)?;
    let encoded = encode_script_json(&value).map_err(|error| {
        ShellError::new(
            "amp_state.encode_failed",
            format!("failed to encode amp-state `{name}`: {error}"),
        )
    })?;
    document.set_text_content(script, &encoded)
}

/// JSON for a raw-text `<script>` body, with every `<` written as `\u003c`.
fn encode_script_json(value: &Value) -> serde_json::Result<String> {
    serde_json::to_string(value).map(|json| json.replace('<', "\\u003c"))
}

fn state_value(document: &Document, state: NodeId) -> Option<Value> {
    let script = document
        .children(state)
        .iter()
        .copied()
        .find(|child| is_json_script(document, *child))?;
    serde_json::from_str(document.text_content(script).trim()).ok()
}

fn create_amp_state(document: &mut Document, name: &str) -> ShellResult<NodeId> {
    let parent = document
        .body()
        .or_else(|| document.document_element())
        .unwrap_or_else(|| document.root());

    let state = document.create_element("amp-state");
    document.set_attribute(state, "id", name)?;
    document.append_child(parent, state)?;
    Ok(state)
}

fn json_script(document: &mut Document, state: NodeId) -> ShellResult<NodeId> {
    let existing = document
        .children(state)
        .iter()
        .copied()
        .find(|child| is_json_script(document, *child));
    if let Some(script) = existing {
        return Ok(script);
    }

    let script = document.create_element("script");
    document.set_attribute(script, "type", JSON_SCRIPT_TYPE)?;
    document.append_child(state, script)?;
    Ok(script)
}

fn is_json_script(document: &Document, node: NodeId) -> bool {
    document.tag_name(node) == Some("script")
        && document
            .attribute(node, "type")
            .is_some_and(|kind| kind.eq_ignore_ascii_case(JSON_SCRIPT_TYPE))
}
