//! Parse-or-fallback handling for free-form advisor output.

use serde::de::DeserializeOwned;

/// Outcome of interpreting advisor text as structured data.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    Parsed(T),
    Fallback,
}

/// Interpret `text` as JSON of type `T`.
///
/// Markdown fences are stripped first. If the whole text does not parse, the
/// first balanced `{...}` or `[...]` region is tried.
pub fn parse_advisory<T: DeserializeOwned>(text: &str) -> Parsed<T> {
    let stripped = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str(&stripped) {
        return Parsed::Parsed(value);
    }
    match first_json_region(&stripped) {
        Some(region) => match serde_json::from_str(region) {
            Ok(value) => Parsed::Parsed(value),
            Err(_) => Parsed::Fallback,
        },
        None => Parsed::Fallback,
    }
}

fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed.to_string();
    };
    let after_open = &trimmed[start + 3..];
    // Skip the info string (`json`, `JSON`, ...) up to the end of the line.
    let body = match after_open.find('\n') {
        Some(newline) => &after_open[newline + 1..],
        None => after_open,
    };
    let body = match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    };
    body.trim().to_string()
}

/// Slice of the first bracket-balanced object or array, honouring string literals.
fn first_json_region(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
