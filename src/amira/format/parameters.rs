//! The `Parameters { … }` block of an AmiraMesh header.
//!
//! Entries are either a value (`CoordType "uniform",`) or a nested group
//! (`Materials { Exterior { Id 1, Color 0 0 0 } }`). Values are kept as they
//! were written, quotes included, so a parsed block renders back unchanged.

use log::debug;

use crate::amira::types::error::{AmiraError, Result};
use crate::amira::types::models::ColorTable;

/// A parameter entry value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Raw value text, e.g. `"uniform"` (with quotes) or `0 1 0 1 0 1`.
    Text(String),
    Group(Vec<(String, ParamValue)>),
}

/// Ordered key-value view of a `Parameters` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmiraParameters {
    entries: Vec<(String, ParamValue)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    Open,
    Close,
    Comma,
    Newline,
}

impl AmiraParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// The block the writer emits when the caller supplies none.
    pub fn for_lattice(width: usize, height: usize, num_slices: usize) -> Self {
        let mut params = Self::new();
        params.set_property(
            "Content",
            &format!("\"{}x{}x{} byte, uniform coordinates\"", width, height, num_slices),
        );
        params.set_property("CoordType", "\"uniform\"");
        params
    }

    /// Parses the text starting at the `Parameters` keyword.
    ///
    /// Text after the block's closing brace (column declarations, data markers)
    /// is ignored. Text without a `Parameters` keyword yields an empty block.
    pub fn parse(text: &str) -> Result<Self> {
        let start = match text.find("Parameters") {
            Some(start) => start,
            None => return Ok(Self::new()),
        };
        let tokens = tokenize(&text[start + "Parameters".len()..])?;
        let pos = skip_separators(&tokens, 0);
        if tokens.get(pos) != Some(&Token::Open) {
            return Err(AmiraError::InvalidFormat(
                "Expected '{' after Parameters".to_string(),
            ));
        }
        let (entries, _) = parse_entries(&tokens, pos + 1)?;
        debug!("Parsed {} top-level parameters", entries.len());
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[(String, ParamValue)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value of a top-level property, with surrounding quotes removed.
    pub fn get_property(&self, name: &str) -> Option<&str> {
        self.entries.iter().find_map(|(key, value)| match value {
            ParamValue::Text(text) if key == name => Some(unquote(text)),
            _ => None,
        })
    }

    /// Nested group of a top-level property.
    pub fn get_group(&self, name: &str) -> Option<&[(String, ParamValue)]> {
        self.entries.iter().find_map(|(key, value)| match value {
            ParamValue::Group(group) if key == name => Some(group.as_slice()),
            _ => None,
        })
    }

    /// Sets a top-level value, given as raw text (quote strings yourself).
    pub fn set_property(&mut self, name: &str, raw_value: &str) {
        let value = ParamValue::Text(raw_value.to_string());
        match self.entries.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    /// Label fields carry a `Materials` group.
    pub fn is_label_field(&self) -> bool {
        self.get_group("Materials").is_some()
    }

    /// Derives a 256-entry color table from `Materials { <name> { Id n, Color r g b } }`.
    ///
    /// A material's label is its `Id` when present, else its position in the group.
    /// Returns `None` when no material declares a color.
    pub fn color_table(&self) -> Option<ColorTable> {
        let materials = self.get_group("Materials")?;
        let mut entries = vec![[0u8; 3]; 256];
        let mut any_color = false;

        for (position, (_, material)) in materials.iter().enumerate() {
            let ParamValue::Group(fields) = material else {
                continue;
            };
            let label = group_text(fields, "Id")
                .and_then(|id| id.trim().parse::<usize>().ok())
                .unwrap_or(position);
            let Some(color) = group_text(fields, "Color").and_then(parse_color) else {
                continue;
            };
            if let Some(slot) = entries.get_mut(label) {
                *slot = color;
                any_color = true;
            }
        }

        any_color.then_some(ColorTable { entries })
    }

    /// Renders the entries as they appear between `Parameters {` and `}`.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        render_entries(&self.entries, 1, &mut out);
        out
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            '{' => {
                chars.next();
                tokens.push(Token::Open);
            }
            '}' => {
                chars.next();
                tokens.push(Token::Close);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '\n' => {
                chars.next();
                tokens.push(Token::Newline);
            }
            '"' => {
                chars.next();
                let mut quoted = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(ch) => quoted.push(ch),
                        None => {
                            return Err(AmiraError::InvalidFormat(
                                "Unterminated string in Parameters".to_string(),
                            ))
                        }
                    }
                }
                tokens.push(Token::Quoted(quoted));
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            _ => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() || matches!(ch, '{' | '}' | ',' | '"') {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }

    Ok(tokens)
}

fn skip_separators(tokens: &[Token], mut pos: usize) -> usize {
    while matches!(tokens.get(pos), Some(Token::Newline | Token::Comma)) {
        pos += 1;
    }
    pos
}

/// Parses entries up to and including the closing brace; returns the position after it.
fn parse_entries(tokens: &[Token], mut pos: usize) -> Result<(Vec<(String, ParamValue)>, usize)> {
    let mut entries = Vec::new();
    loop {
        pos = skip_separators(tokens, pos);
        let name = match tokens.get(pos) {
            Some(Token::Close) => return Ok((entries, pos + 1)),
            Some(Token::Word(name)) => name.clone(),
            Some(other) => {
                return Err(AmiraError::InvalidFormat(format!(
                    "Unexpected {:?} where a parameter name was expected",
                    other
                )))
            }
            None => {
                return Err(AmiraError::InvalidFormat(
                    "Unterminated Parameters block".to_string(),
                ))
            }
        };
        pos += 1;

        if tokens.get(pos) == Some(&Token::Open) {
            let (group, next) = parse_entries(tokens, pos + 1)?;
            entries.push((name, ParamValue::Group(group)));
            pos = next;
            continue;
        }

        let mut parts = Vec::new();
        while let Some(token) = tokens.get(pos) {
            match token {
                Token::Word(word) => parts.push(word.clone()),
                Token::Quoted(quoted) => parts.push(format!("\"{}\"", quoted)),
                Token::Open => {
                    return Err(AmiraError::InvalidFormat(format!(
                        "Unexpected '{{' in value of parameter {}",
                        name
                    )))
                }
                Token::Close | Token::Comma | Token::Newline => break,
            }
            pos += 1;
        }
        entries.push((name, ParamValue::Text(parts.join(" "))));
    }
}

fn render_entries(entries: &[(String, ParamValue)], depth: usize, out: &mut String) {
    let indent = "    ".repeat(depth);
    for (i, (name, value)) in entries.iter().enumerate() {
        match value {
            ParamValue::Text(text) => {
                out.push_str(&indent);
                out.push_str(name);
                if !text.is_empty() {
                    out.push(' ');
                    out.push_str(text);
                }
                if i + 1 < entries.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            ParamValue::Group(group) => {
                out.push_str(&format!("{}{} {{\n", indent, name));
                render_entries(group, depth + 1, out);
                out.push_str(&format!("{}}}\n", indent));
            }
        }
    }
}

fn group_text<'a>(fields: &'a [(String, ParamValue)], name: &str) -> Option<&'a str> {
    fields.iter().find_map(|(key, value)| match value {
        ParamValue::Text(text) if key == name => Some(text.as_str()),
        _ => None,
    })
}

fn parse_color(text: &str) -> Option<[u8; 3]> {
    let components: Vec<f32> = text
        .split_whitespace()
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    if components.len() != 3 {
        return None;
    }
    let scale = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    Some([scale(components[0]), scale(components[1]), scale(components[2])])
}

fn unquote(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}
