//! HTML text to detached `ps_dom::Document` and back.
//!
//! The parser is forgiving rather than standards-complete: unknown end tags are
//! ignored, mismatched ones close everything up to the matching open element,
//! and raw-text elements (`script`, `style`, `title`, `textarea`) are read
//! verbatim.

mod entities;
mod serialize;

pub use serialize::serialize_node;
pub use serialize::to_html;

use ps_dom::Document;
use ps_dom::NodeId;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "title", "textarea"];

/// Parses raw HTML into a DOM document.
#[derive(Debug, Default)]
pub struct HtmlParser;

impl HtmlParser {
    pub fn parse(&self, input: &str) -> Document {
        let mut builder = TreeBuilder::new();
        builder.run(input);
        builder.doc
    }
}

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

struct TreeBuilder {
    doc: Document,
    open: Vec<NodeId>,
}

impl TreeBuilder {
    fn new() -> Self {
        let doc = Document::new();
        let root = doc.root();
        Self {
            doc,
            open: vec![root],
        }
    }

    fn current(&self) -> NodeId {
        self.open.last().copied().unwrap_or_else(|| self.doc.root())
    }

    fn append(&mut self, node: NodeId) {
        let parent = self.current();
        if let Err(error) = self.doc.append_child(parent, node) {
            debug_assert!(false, "tree builder append failed: {error}");
        }
    }

    fn run(&mut self, input: &str) {
        let bytes = input.as_bytes();
        let mut idx = 0_usize;

        while idx < bytes.len() {
            if bytes[idx] != b'<' {
                let next = find_byte(bytes, idx, b'<').unwrap_or(bytes.len());
                self.text(&input[idx..next]);
                idx = next;
                continue;
            }

            if starts_with(bytes, idx, b"<!--") {
                let end = find_subslice(bytes, idx.saturating_add(4), b"-->");
                let body_end = end.unwrap_or(bytes.len());
                let comment = self.doc.create_comment(&input[idx + 4..body_end.max(idx + 4)]);
                self.append(comment);
                idx = end.map(|end| end.saturating_add(3)).unwrap_or(bytes.len());
                continue;
            }

            if starts_with(bytes, idx, b"<!") || starts_with(bytes, idx, b"<?") {
                idx = skip_to_gt(bytes, idx.saturating_add(2));
                continue;
            }

            let Some((tag, next_idx)) = parse_tag(input, idx) else {
                self.text("<");
                idx = idx.saturating_add(1);
                continue;
            };

            if tag.is_end {
                self.close(&tag.name);
                idx = next_idx;
                continue;
            }

            let element = self.doc.create_element(&tag.name);
            for (name, value) in &tag.attributes {
                if let Err(error) = self.doc.set_attribute(element, name, value) {
                    debug_assert!(false, "attribute `{name}` rejected: {error}");
                }
            }
            self.append(element);

            if tag.self_closing || is_void_element(&tag.name) {
                idx = next_idx;
                continue;
            }

            if RAW_TEXT_ELEMENTS.contains(&tag.name.as_str()) {
                let (raw, after) = read_raw_text_until_end_tag(input, next_idx, &tag.name);
                if !raw.is_empty() {
                    let decoded = if tag.name == "title" || tag.name == "textarea" {
                        entities::decode(raw)
                    } else {
                        raw.to_owned()
                    };
                    let text = self.doc.create_text(&decoded);
                    if let Err(error) = self.doc.append_child(element, text) {
                        debug_assert!(false, "raw text append failed: {error}");
                    }
                }
                idx = after;
                continue;
            }

            self.open.push(element);
            idx = next_idx;
        }
    }

    fn text(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        if self.open.len() == 1 && raw.trim().is_empty() {
            return;
        }
        let text = self.doc.create_text(&entities::decode(raw));
        self.append(text);
    }

    fn close(&mut self, name: &str) {
        let Some(position) = self
            .open
            .iter()
            .rposition(|node| self.doc.tag_name(*node) == Some(name))
        else {
            return;
        };
        self.open.truncate(position);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedTag {
    name: String,
    is_end: bool,
    self_closing: bool,
    attributes: Vec<(String, String)>,
}

fn parse_tag(input: &str, start: usize) -> Option<(ParsedTag, usize)> {
    let bytes = input.as_bytes();
    if bytes.get(start).copied() != Some(b'<') {
        return None;
    }

    let mut idx = start.saturating_add(1);
    let mut is_end = false;
    if bytes.get(idx).copied() == Some(b'/') {
        is_end = true;
        idx = idx.saturating_add(1);
    }

    let name_start = idx;
    while idx < bytes.len() && is_tag_name_char(bytes[idx]) {
        idx = idx.saturating_add(1);
    }

    if idx == name_start || !bytes[name_start].is_ascii_alphabetic() {
        return None;
    }

    let name = input[name_start..idx].to_ascii_lowercase();
    let mut attributes = Vec::new();

    loop {
        idx = skip_spaces(bytes, idx);
        match bytes.get(idx).copied() {
            None => return None,
            Some(b'>') => {
                return Some((
                    ParsedTag {
                        name,
                        is_end,
                        self_closing: false,
                        attributes,
                    },
                    idx.saturating_add(1),
                ));
            }
            Some(b'/') => {
                let after = skip_spaces(bytes, idx.saturating_add(1));
                if bytes.get(after).copied() == Some(b'>') {
                    return Some((
                        ParsedTag {
                            name,
                            is_end,
                            self_closing: true,
                            attributes,
                        },
                        after.saturating_add(1),
                    ));
                }
                idx = idx.saturating_add(1);
            }
            Some(_) => {
                let (attribute, next) = parse_attribute(input, idx)?;
                if let Some(attribute) = attribute.filter(|_| !is_end) {
                    attributes.push(attribute);
                }
                idx = next;
            }
        }
    }
}

fn parse_attribute(input: &str, start: usize) -> Option<(Option<(String, String)>, usize)> {
    let bytes = input.as_bytes();
    let mut idx = start;
    while idx < bytes.len() && !is_attribute_name_terminator(bytes[idx]) {
        idx = idx.saturating_add(1);
    }

    if idx == start {
        // Stray `=` or quote: skip it so the tag loop makes progress.
        return Some((None, start.saturating_add(1)));
    }

    let name = input[start..idx].to_ascii_lowercase();
    idx = skip_spaces(bytes, idx);
    if bytes.get(idx).copied() != Some(b'=') {
        return Some((Some((name, String::new())), idx));
    }

    idx = skip_spaces(bytes, idx.saturating_add(1));
    let (raw_value, next) = match bytes.get(idx).copied() {
        Some(quote @ (b'"' | b'\'')) => {
            let value_start = idx.saturating_add(1);
            let value_end = find_byte(bytes, value_start, quote)?;
            (&input[value_start..value_end], value_end.saturating_add(1))
        }
        Some(_) => {
            let value_start = idx;
            while idx < bytes.len() && !bytes[idx].is_ascii_whitespace() && bytes[idx] != b'>' {
                idx = idx.saturating_add(1);
            }
            (&input[value_start..idx], idx)
        }
        None => return None,
    };

    Some((Some((name, entities::decode(raw_value))), next))
}

fn read_raw_text_until_end_tag<'a>(
    input: &'a str,
    start: usize,
    tag_name: &str,
) -> (&'a str, usize) {
    let bytes = input.as_bytes();
    let tag_bytes = tag_name.as_bytes();
    let mut idx = start;

    while idx < bytes.len() {
        if bytes[idx] == b'<'
            && bytes.get(idx.saturating_add(1)).copied() == Some(b'/')
            && starts_with_ignore_ascii_case(bytes, idx.saturating_add(2), tag_bytes)
            && tag_name_boundary(bytes, idx.saturating_add(2 + tag_bytes.len()))
        {
            let end = skip_to_gt(bytes, idx.saturating_add(2));
            return (&input[start..idx], end);
        }

        idx = idx.saturating_add(1);
    }

    (&input[start..], bytes.len())
}

fn is_attribute_name_terminator(byte: u8) -> bool {
    byte.is_ascii_whitespace() || matches!(byte, b'=' | b'>' | b'/' | b'"' | b'\'')
}

fn skip_to_gt(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() {
        if bytes[idx] == b'>' {
            return idx.saturating_add(1);
        }
        idx = idx.saturating_add(1);
    }

    bytes.len()
}

fn tag_name_boundary(bytes: &[u8], idx: usize) -> bool {
    match bytes.get(idx).copied() {
        None => true,
        Some(byte) => byte.is_ascii_whitespace() || byte == b'>' || byte == b'/',
    }
}

fn skip_spaces(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
        idx = idx.saturating_add(1);
    }
    idx
}

fn is_tag_name_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b':')
}

fn starts_with(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    let end = idx.saturating_add(pattern.len());
    end <= bytes.len() && bytes[idx..end] == *pattern
}

fn starts_with_ignore_ascii_case(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    let end = idx.saturating_add(pattern.len());
    if end > bytes.len() {
        return false;
    }

    bytes[idx..end]
        .iter()
        .zip(pattern.iter())
        .all(|(left, right)| left.eq_ignore_ascii_case(right))
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }

    bytes[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

fn find_byte(bytes: &[u8], from: usize, byte: u8) -> Option<usize> {
    bytes
        .get(from..)?
        .iter()
        .position(|candidate| *candidate == byte)
        .map(|offset| from + offset)
}
