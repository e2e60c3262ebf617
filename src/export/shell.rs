//! POSIX-shell style command line splitting and quoting
//!
//! `Exec` lines in desktop entries and D-Bus service files follow shell
//! quoting rules. Splitting mirrors the common subset: whitespace separates
//! words, single quotes are literal, double quotes allow backslash escapes
//! of `$`, `` ` ``, `"`, `\` and newline, a bare backslash escapes the next
//! character, and `#` at the start of a word comments out the rest of the
//! line. No expansion of any kind is performed.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("command line is empty")]
    Empty,
    #[error("unterminated {0} quote")]
    UnterminatedQuote(char),
    #[error("trailing backslash")]
    TrailingBackslash,
}

/// Split a command line into words
pub fn split(line: &str) -> Result<Vec<String>, SplitError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            '#' if !in_word => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            }
            '\\' => match chars.next() {
                Some('\n') => {}
                Some(escaped) => {
                    current.push(escaped);
                    in_word = true;
                }
                None => return Err(SplitError::TrailingBackslash),
            },
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(inner) => current.push(inner),
                        None => return Err(SplitError::UnterminatedQuote('\'')),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.peek().copied() {
                            Some(next @ ('$' | '`' | '"' | '\\')) => {
                                chars.next();
                                current.push(next);
                            }
                            Some('\n') => {
                                chars.next();
                            }
                            _ => current.push('\\'),
                        },
                        Some(inner) => current.push(inner),
                        None => return Err(SplitError::UnterminatedQuote('"')),
                    }
                }
            }
            other => {
                current.push(other);
                in_word = true;
            }
        }
    }

    if in_word {
        words.push(current);
    }
    if words.is_empty() {
        return Err(SplitError::Empty);
    }
    Ok(words)
}

/// Quote a word so that [`split`] returns it unchanged
///
/// Always uses single quotes; embedded single quotes become `'\''`.
pub fn quote(word: &str) -> String {
    let mut quoted = String::with_capacity(word.len() + 2);
    quoted.push('\'');
    for c in word.chars() {
        if c == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    quoted
}

/// Quote a word only if it contains characters the shell would interpret
///
/// Desktop entry field codes such as `%U` pass through untouched.
pub fn maybe_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '-' | '_' | '.' | '/' | '=' | '%' | '@' | ':' | ',' | '+')
        });
    if safe { word.to_string() } else { quote(word) }
}
