//! IRCv3 message-tag block parsing.
//!
//! The tag block is the `@key=value;key=value` section preceding the
//! prefix. Values use the IRCv3 escape table; keys without a value are
//! recorded as empty strings. Unknown keys are kept (and ignored by the
//! consumers), duplicate keys are last-wins.

use std::collections::HashMap;

/// Parsed tag block with typed accessors for the fields the bot reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMap {
    entries: HashMap<String, String>,
}

impl TagMap {
    /// Parse a raw tag block (without the leading `@`).
    ///
    /// Never fails: entries that don't look like `key=value` degrade to a
    /// key with an empty value, and an empty block yields an empty map.
    pub fn parse(raw: &str) -> Self {
        let mut entries = HashMap::new();
        for item in raw.split(';') {
            if item.is_empty() {
                continue;
            }
            match item.split_once('=') {
                Some((key, value)) => {
                    entries.insert(key.to_string(), unescape_value(value));
                }
                None => {
                    entries.insert(item.to_string(), String::new());
                }
            }
        }
        Self { entries }
    }

    /// Look up a tag value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Look up a tag value, falling back to `""` when absent.
    pub fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    /// Whether a tag carries the boolean truthy value `1`.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key) == Some("1")
    }

    /// Number of parsed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the block parsed to nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reverse the IRCv3 tag-value escape table.
///
/// `\:` → `;`, `\s` → space, `\\` → `\`, `\r` → CR, `\n` → LF. A lone
/// trailing backslash is dropped; unknown escapes keep the escaped char.
fn unescape_value(value: &str) -> String {
    if !value.contains('\\') {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => break,
        }
    }
    out
}
