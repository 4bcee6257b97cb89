use crate::is_void_element;
use ps_dom::Document;
use ps_dom::NodeId;
use ps_dom::NodeKind;

const RAW_TEXT_PARENTS: &[&str] = &["script", "style"];

/// Serializes the whole document, including a doctype when it has an `<html>` root.
pub fn to_html(doc: &Document) -> String {
    let mut out = String::new();
    let has_html_root = doc
        .document_element()
        .and_then(|node| doc.tag_name(node))
        .is_some_and(|tag| tag == "html");
    if has_html_root {
        out.push_str("<!doctype html>");
    }
    for child in doc.children(doc.root()) {
        write_node(doc, *child, &mut out);
    }
    out
}

/// Outer HTML of a single node.
pub fn serialize_node(doc: &Document, node: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, node, &mut out);
    out
}

fn write_node(doc: &Document, node: NodeId, out: &mut String) {
    match doc.kind(node) {
        Some(NodeKind::Document) => {
            for child in doc.children(node) {
                write_node(doc, *child, out);
            }
        }
        Some(NodeKind::Element(element)) => {
            out.push('<');
            out.push_str(&element.tag);
            for attribute in &element.attributes {
                out.push(' ');
                out.push_str(&attribute.name);
                if !attribute.value.is_empty() {
                    out.push_str("=\"");
                    out.push_str(&escape(&attribute.value, true));
                    out.push('"');
                }
            }
            out.push('>');

            if is_void_element(&element.tag) {
                return;
            }

            let raw = RAW_TEXT_PARENTS.contains(&element.tag.as_str());
            for child in doc.children(node) {
                match doc.kind(*child) {
                    Some(NodeKind::Text(text)) if raw => out.push_str(text),
                    _ => write_node(doc, *child, out),
                }
            }

            out.push_str("</");
            out.push_str(&element.tag);
            out.push('>');
        }
        Some(NodeKind::Text(text)) => out.push_str(&escape(text, false)),
        Some(NodeKind::Comment(text)) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        None => {}
    }
}

fn escape(input: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            other => out.push(other),
        }
    }
    out
}
