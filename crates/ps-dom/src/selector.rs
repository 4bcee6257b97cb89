//! Compound selectors (`tag#id.class[attr=value]`, comma separated).
//!
//! Combinators are not supported; callers walk the tree themselves when they
//! need ancestry.

use crate::Document;
use crate::NodeId;
use ps_core::ShellError;
use ps_core::ShellResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<Compound>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeTest>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeTest {
    name: String,
    value: Option<String>,
}

impl Selector {
    pub fn parse(input: &str) -> ShellResult<Self> {
        let mut alternatives = Vec::new();
        for part in split_top_level(input) {
            let part = part.trim();
            if part.is_empty() {
                return Err(invalid(input, "empty selector"));
            }
            alternatives.push(parse_compound(part).map_err(|reason| invalid(input, &reason))?);
        }

        if alternatives.is_empty() {
            return Err(invalid(input, "empty selector"));
        }

        Ok(Self { alternatives })
    }

    /// Selector matching any element carrying `name`.
    pub fn has_attribute(name: &str) -> Self {
        Self {
            alternatives: vec![Compound {
                attributes: vec![AttributeTest {
                    name: name.to_owned(),
                    value: None,
                }],
                ..Compound::default()
            }],
        }
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.alternatives
            .iter()
            .any(|compound| compound.matches(doc, node))
    }
}

impl Compound {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(element) = doc.element(node) else {
            return false;
        };

        if let Some(tag) = &self.tag {
            if !element.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }

        if let Some(id) = &self.id {
            if element.attribute("id") != Some(id.as_str()) {
                return false;
            }
        }

        if !self.classes.is_empty() {
            let class_list = element.attribute("class").unwrap_or_default();
            let has_all = self
                .classes
                .iter()
                .all(|class| class_list.split_ascii_whitespace().any(|item| item == class));
            if !has_all {
                return false;
            }
        }

        self.attributes.iter().all(|test| {
            match (element.attribute(&test.name), &test.value) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => actual == expected,
            }
        })
    }
}

fn parse_compound(input: &str) -> Result<Compound, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut compound = Compound::default();
    let mut idx = 0_usize;

    let tag = read_ident(&chars, &mut idx);
    if !tag.is_empty() && tag != "*" {
        compound.tag = Some(tag.to_ascii_lowercase());
    }

    while idx < chars.len() {
        match chars[idx] {
            '#' => {
                idx += 1;
                let id = read_ident(&chars, &mut idx);
                if id.is_empty() {
                    return Err("missing id after `#`".to_owned());
                }
                compound.id = Some(id);
            }
            '.' => {
                idx += 1;
                let class = read_ident(&chars, &mut idx);
                if class.is_empty() {
                    return Err("missing class after `.`".to_owned());
                }
                compound.classes.push(class);
            }
            '[' => {
                idx += 1;
                compound.attributes.push(read_attribute_test(&chars, &mut idx)?);
            }
            other => return Err(format!("unexpected `{other}`")),
        }
    }

    Ok(compound)
}

fn read_ident(chars: &[char], idx: &mut usize) -> String {
    let mut out = String::new();
    while *idx < chars.len() {
        let ch = chars[*idx];
        if matches!(ch, '#' | '.' | '[' | ']' | '=' | ',' | '>' | '+' | '~' | ':')
            || ch.is_whitespace()
        {
            break;
        }
        out.push(ch);
        *idx += 1;
    }
    out
}

fn read_attribute_test(chars: &[char], idx: &mut usize) -> Result<AttributeTest, String> {
    let mut name = String::new();
    while *idx < chars.len() {
        match chars[*idx] {
            '\\' => {
                let escaped = chars
                    .get(*idx + 1)
                    .copied()
                    .ok_or_else(|| "dangling escape".to_owned())?;
                name.push(escaped);
                *idx += 2;
            }
            '=' | ']' => break,
            ch => {
                name.push(ch);
                *idx += 1;
            }
        }
    }

    let name = name.trim().to_owned();
    if name.is_empty() {
        return Err("missing attribute name".to_owned());
    }

    let mut value = None;
    if chars.get(*idx) == Some(&'=') {
        *idx += 1;
        value = Some(read_attribute_value(chars, idx)?);
    }

    if chars.get(*idx) != Some(&']') {
        return Err(format!("unterminated attribute test `{name}`"));
    }
    *idx += 1;

    Ok(AttributeTest { name, value })
}

fn read_attribute_value(chars: &[char], idx: &mut usize) -> Result<String, String> {
    let quote = match chars.get(*idx) {
        Some('"') => Some('"'),
        Some('\'') => Some('\''),
        _ => None,
    };

    let mut out = String::new();
    if let Some(quote) = quote {
        *idx += 1;
        while *idx < chars.len() && chars[*idx] != quote {
            out.push(chars[*idx]);
            *idx += 1;
        }
        if *idx >= chars.len() {
            return Err("unterminated quoted value".to_owned());
        }
        *idx += 1;
    } else {
        while *idx < chars.len() && chars[*idx] != ']' {
            out.push(chars[*idx]);
            *idx += 1;
        }
        out = out.trim().to_owned();
    }

    Ok(out)
}

fn split_top_level(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0_usize;
    let mut start = 0_usize;
    let mut escaped = false;
    for (idx, ch) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&input[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

fn invalid(input: &str, reason: &str) -> ShellError {
    ShellError::new(
        "dom.selector_invalid",
        format!("invalid selector `{input}`: {reason}"),
    )
}
