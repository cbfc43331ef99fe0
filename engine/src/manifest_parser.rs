//! plugin.json parsing with line-break repair
//!
//! Authors frequently paste multi-line descriptions into `plugin.json`,
//! leaving raw line breaks inside string literals. [`repair`] escapes those
//! before the text reaches `serde_json`; everything else is left for the
//! parser to diagnose.

use sdk::errors::{ParseFailure, PluginError};
use sdk::manifest::ManifestDraft;
use serde_json::Value;
use std::borrow::Cow;
use tracing::debug;

/// Escape raw line breaks inside quoted strings
///
/// CRLF and a lone CR become the two characters `\n`, as does LF. Only
/// bytes inside a terminated string literal are touched; a string with no
/// closing quote, and everything after it, is returned as-is. Text that needs
/// no repair comes back borrowed, so the pass is idempotent.
///
/// # Examples
///
/// ```
/// use edbp_engine::manifest_parser::repair;
///
/// assert_eq!(repair("{\"a\": \"x\r\ny\"}"), "{\"a\": \"x\\ny\"}");
/// assert_eq!(repair("{\n\"a\": 1\n}"), "{\n\"a\": 1\n}");
/// ```
pub fn repair(text: &str) -> Cow<'_, str> {
    let bytes = text.as_bytes();
    let mut out: Option<String> = None;
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'"' {
            i += 1;
            continue;
        }

        let Some(end) = closing_quote(bytes, i + 1) else {
            break;
        };

        let mut j = i + 1;
        while j < end {
            match bytes[j] {
                b'\\' => j += 2,
                b'\r' | b'\n' => {
                    let buf = out.get_or_insert_with(|| String::with_capacity(text.len() + 16));
                    buf.push_str(&text[copied..j]);
                    buf.push_str("\\n");
                    j += if bytes[j] == b'\r' && bytes.get(j + 1) == Some(&b'\n') {
                        2
                    } else {
                        1
                    };
                    copied = j;
                }
                _ => j += 1,
            }
        }

        i = end + 1;
    }

    match out {
        Some(mut buf) => {
            buf.push_str(&text[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(text),
    }
}

/// Index of the unescaped `"` closing a string that starts at `start`
fn closing_quote(bytes: &[u8], start: usize) -> Option<usize> {
    let mut j = start;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'"' => return Some(j),
            _ => j += 1,
        }
    }
    None
}

/// Map a `serde_json` failure to a remediation category
pub fn classify(err: &serde_json::Error) -> ParseFailure {
    let message = err.to_string();
    if message.contains("control character") {
        ParseFailure::ControlCharacter
    } else if message.contains("EOF while parsing a string") {
        ParseFailure::UnterminatedString
    } else {
        ParseFailure::Syntax
    }
}

/// Repair and parse manifest text into a draft
///
/// # Errors
///
/// Returns [`PluginError::ManifestParse`] with the parser's message as
/// `detail` and a [`ParseFailure`] category carrying remediation text.
pub fn parse_manifest(text: &str) -> Result<ManifestDraft, PluginError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let repaired = repair(text);

    if let Cow::Owned(_) = repaired {
        debug!("Escaped raw line breaks in plugin.json strings");
    }

    let value: Value = serde_json::from_str(&repaired).map_err(|e| PluginError::ManifestParse {
        reason: classify(&e),
        detail: e.to_string(),
    })?;

    // Structs also deserialize from arrays; the root must be an object
    if !value.is_object() {
        return Err(PluginError::ManifestParse {
            reason: ParseFailure::Syntax,
            detail: "expected a JSON object at the root".to_string(),
        });
    }

    serde_json::from_value(value).map_err(|e| PluginError::ManifestParse {
        reason: ParseFailure::Syntax,
        detail: e.to_string(),
    })
}
