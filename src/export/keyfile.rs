//! Minimal freedesktop key file reader and writer
//!
//! Handles the format shared by `.desktop` and D-Bus `.service` files:
//!
//! ```text
//! # comment
//! [Desktop Entry]
//! Name=Foo
//! Name[de]=Fu
//! Exec=foo %U
//! ```
//!
//! Group order, key order and comments survive a parse/serialize round trip,
//! so rewritten files stay close to what the application shipped.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    /// Blank line or comment, kept verbatim
    Comment(String),
    Pair { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Group {
    name: String,
    entries: Vec<Entry>,
}

/// A parsed key file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyFile {
    header: Vec<String>,
    groups: Vec<Group>,
}

impl KeyFile {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut file = KeyFile::default();

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim_start();

            if line.is_empty() || line.starts_with('#') {
                match file.groups.last_mut() {
                    Some(group) => group.entries.push(Entry::Comment(raw.to_string())),
                    None => file.header.push(raw.to_string()),
                }
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest
                    .trim_end()
                    .strip_suffix(']')
                    .ok_or_else(|| error(line_no, "unterminated group header"))?;
                if name.is_empty() || name.contains(['[', ']']) || name.chars().any(char::is_control)
                {
                    return Err(error(line_no, format!("invalid group name '{name}'")));
                }
                if file.has_group(name) {
                    return Err(error(line_no, format!("duplicate group '{name}'")));
                }
                file.groups.push(Group {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(error(line_no, "expected 'key=value'"));
            };
            let key = key.trim_end();
            if !is_valid_key(key) {
                return Err(error(line_no, format!("invalid key '{key}'")));
            }
            let Some(group) = file.groups.last_mut() else {
                return Err(error(line_no, "key outside of any group"));
            };
            group.entries.push(Entry::Pair {
                key: key.to_string(),
                value: value.trim_start().to_string(),
            });
        }

        Ok(file)
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.group(name).is_some()
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.name.as_str())
    }

    pub fn has_key(&self, group: &str, key: &str) -> bool {
        self.raw_value(group, key).is_some()
    }

    /// Value of `key` with escape sequences resolved
    pub fn get_string(&self, group: &str, key: &str) -> Option<String> {
        self.raw_value(group, key).map(unescape)
    }

    /// Set `key`, replacing an existing value in place or appending a new one
    ///
    /// The group is created at the end of the file if it does not exist.
    pub fn set_string(&mut self, group: &str, key: &str, value: &str) {
        let escaped = escape(value);

        let index = match self.groups.iter().position(|g| g.name == group) {
            Some(index) => index,
            None => {
                self.groups.push(Group {
                    name: group.to_string(),
                    entries: Vec::new(),
                });
                self.groups.len() - 1
            }
        };
        let entries = &mut self.groups[index].entries;

        for entry in entries.iter_mut() {
            if let Entry::Pair { key: k, value: v } = entry {
                if k == key {
                    *v = escaped;
                    return;
                }
            }
        }

        // Keep trailing blank lines and comments after the new key
        let insert_at = entries
            .iter()
            .rposition(|e| matches!(e, Entry::Pair { .. }))
            .map_or(0, |i| i + 1);
        entries.insert(
            insert_at,
            Entry::Pair {
                key: key.to_string(),
                value: escaped,
            },
        );
    }

    /// Remove `key` and all of its localized variants from `group`
    ///
    /// Returns whether anything was removed.
    pub fn remove_key(&mut self, group: &str, key: &str) -> bool {
        let Some(group) = self.groups.iter_mut().find(|g| g.name == group) else {
            return false;
        };
        let before = group.entries.len();
        group.entries.retain(|entry| match entry {
            Entry::Pair { key: k, .. } => base_key(k) != key,
            Entry::Comment(_) => true,
        });
        group.entries.len() != before
    }

    fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    fn raw_value(&self, group: &str, key: &str) -> Option<&str> {
        self.group(group)?.entries.iter().find_map(|entry| match entry {
            Entry::Pair { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }
}

impl fmt::Display for KeyFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.header {
            writeln!(f, "{line}")?;
        }
        for group in &self.groups {
            writeln!(f, "[{}]", group.name)?;
            for entry in &group.entries {
                match entry {
                    Entry::Comment(line) => writeln!(f, "{line}")?,
                    Entry::Pair { key, value } => writeln!(f, "{key}={value}")?,
                }
            }
        }
        Ok(())
    }
}

fn error(line: usize, message: impl Into<String>) -> ParseError {
    ParseError {
        line,
        message: message.into(),
    }
}

/// Key name without its `[locale]` suffix
fn base_key(key: &str) -> &str {
    key.split_once('[').map_or(key, |(base, _)| base)
}

fn is_valid_key(key: &str) -> bool {
    let base = base_key(key);
    !base.is_empty()
        && !base.contains(|c: char| c.is_whitespace() || c == ']' || c.is_control())
        && (base.len() == key.len() || key.ends_with(']'))
}

/// Resolve `\s`, `\n`, `\t`, `\r` and `\\`; other escapes are kept as-is
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Inverse of [`unescape`]
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        match c {
            ' ' if i == 0 => out.push_str("\\s"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out
}
