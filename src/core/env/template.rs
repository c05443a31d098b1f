//! Typed model of an environment template.
//!
//! A template is an ordered list of lines. Each line is classified once
//! (anchor, key slot, quoted assignment, or verbatim) and rendered back
//! byte-for-byte unless the writer changes it.

use serde::{Deserialize, Serialize};

use crate::core::constants;

/// Insertion point marked by a structural comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorSlot {
    /// Receives the main connection string.
    DatabaseStart,
    /// Receives the per-parameter variables, then the secure parameters.
    DatabaseConnection,
    /// Receives the UID generation method.
    UidGeneration,
}

/// Quote character around an assignment literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quote {
    Single,
    Double,
}

impl Quote {
    pub fn as_char(self) -> char {
        match self {
            Quote::Single => '\'',
            Quote::Double => '"',
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            '\'' => Some(Quote::Single),
            '"' => Some(Quote::Double),
            _ => None,
        }
    }
}

/// A `NAME = 'literal'` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub indent: String,
    pub name: String,
    /// Everything between the name and the opening quote, `=` included.
    pub separator: String,
    pub quote: Quote,
    pub value: String,
    /// Trailing whitespace and line ending after the closing quote.
    pub tail: String,
}

impl Assignment {
    /// Parse one line (with or without its line ending).
    pub fn parse(line: &str) -> Option<Self> {
        let body = line.trim_start();
        let indent = &line[..line.len() - body.len()];

        let name_len = body
            .char_indices()
            .find(|&(i, c)| !(c == '_' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit())))
            .map(|(i, _)| i)
            .unwrap_or(body.len());
        if name_len == 0 {
            return None;
        }
        let (name, rest) = body.split_at(name_len);

        let after_eq = rest.trim_start_matches([' ', '\t']).strip_prefix('=')?;
        let literal = after_eq.trim_start_matches([' ', '\t']);
        let separator = &rest[..rest.len() - literal.len()];

        let quote = Quote::from_char(literal.chars().next()?)?;
        let inner = &literal[1..];
        let close = inner.find(quote.as_char())?;
        let tail = &inner[close + 1..];
        if !tail.trim().is_empty() {
            return None;
        }

        Some(Self {
            indent: indent.to_string(),
            name: name.to_string(),
            separator: separator.to_string(),
            quote,
            value: inner[..close].to_string(),
            tail: tail.to_string(),
        })
    }

    /// Same line with a different literal.
    pub fn with_value(&self, value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..self.clone()
        }
    }

    pub fn render(&self) -> String {
        let q = self.quote.as_char();
        format!(
            "{}{}{}{q}{}{q}{}",
            self.indent, self.name, self.separator, self.value, self.tail
        )
    }
}

/// One classified template line. Every variant keeps its line ending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateLine {
    Verbatim(String),
    Anchor { slot: AnchorSlot, text: String },
    /// The assignment that receives the bootstrap key.
    KeySlot(Assignment),
    Assignment(Assignment),
}

impl TemplateLine {
    pub fn text(&self) -> String {
        match self {
            TemplateLine::Verbatim(text) | TemplateLine::Anchor { text, .. } => text.clone(),
            TemplateLine::KeySlot(a) | TemplateLine::Assignment(a) => a.render(),
        }
    }
}

/// Anchor comment texts. A line containing the text is an anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Anchors {
    pub database_start: String,
    pub database_connection: String,
    pub uid_generation: String,
}

impl Default for Anchors {
    fn default() -> Self {
        Self {
            database_start: constants::ANCHOR_DATABASE_START.to_string(),
            database_connection: constants::ANCHOR_DATABASE_CONNECTION.to_string(),
            uid_generation: constants::ANCHOR_UID_GENERATION.to_string(),
        }
    }
}

impl Anchors {
    fn classify(&self, line: &str) -> Option<AnchorSlot> {
        if line.contains(&self.database_start) {
            Some(AnchorSlot::DatabaseStart)
        } else if line.contains(&self.database_connection) {
            Some(AnchorSlot::DatabaseConnection)
        } else if line.contains(&self.uid_generation) {
            Some(AnchorSlot::UidGeneration)
        } else {
            None
        }
    }
}

/// Reserved names and anchor texts that drive an install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    pub key_variable: String,
    pub connection_variable: String,
    pub uid_variable: String,
    pub anchors: Anchors,
}

impl Default for InstallLayout {
    fn default() -> Self {
        Self {
            key_variable: constants::KEY_VARIABLE.to_string(),
            connection_variable: constants::CONNECTION_VARIABLE.to_string(),
            uid_variable: constants::UID_VARIABLE.to_string(),
            anchors: Anchors::default(),
        }
    }
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvTemplate {
    lines: Vec<TemplateLine>,
}

impl EnvTemplate {
    /// Classify every line of `text`.
    ///
    /// Anchors win over assignments, so a commented anchor is never
    /// mistaken for a literal.
    pub fn parse(text: &str, layout: &InstallLayout) -> Self {
        let lines = text
            .split_inclusive('\n')
            .map(|line| {
                if let Some(slot) = layout.anchors.classify(line) {
                    return TemplateLine::Anchor {
                        slot,
                        text: line.to_string(),
                    };
                }
                match Assignment::parse(line) {
                    Some(a) if a.name == layout.key_variable => TemplateLine::KeySlot(a),
                    Some(a) => TemplateLine::Assignment(a),
                    None => TemplateLine::Verbatim(line.to_string()),
                }
            })
            .collect();

        Self { lines }
    }

    pub fn lines(&self) -> &[TemplateLine] {
        &self.lines
    }

    pub fn has_key_slot(&self) -> bool {
        self.lines
            .iter()
            .any(|l| matches!(l, TemplateLine::KeySlot(_)))
    }

    /// Reassemble the template unchanged.
    pub fn render(&self) -> String {
        self.lines.iter().map(TemplateLine::text).collect()
    }
}

/// Whether `name` is usable as a variable name in a generated file.
pub fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}
