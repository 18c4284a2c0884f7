//! Response field codec
//!
//! A response payload is a comma-separated list of fields. A backslash makes
//! the next character literal, so fields may carry commas and backslashes.
//! The first field is the status token.

use vsp_core::{VspError, VspResult};

/// Status token of a successful response
pub const STATUS_OK: &str = "OK";

const SEPARATOR: char = ',';
const FIELD_ESCAPE: char = '\\';

/// Split a payload into fields, honouring backslash escapes
pub fn decompose(s: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            FIELD_ESCAPE if chars.peek().is_some() => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            SEPARATOR => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    fields.push(current);
    fields
}

/// Escape separators and backslashes inside one field
pub fn escape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        if c == SEPARATOR || c == FIELD_ESCAPE {
            out.push(FIELD_ESCAPE);
        }
        out.push(c);
    }
    out
}

/// Join fields into one payload; inverse of [`decompose`]
pub fn compose<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| escape_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Classify a raw response and return the fields after the status token
pub fn parse_response(raw: &str) -> VspResult<Vec<String>> {
    if raw.is_empty() {
        return Err(VspError::EmptyResponse);
    }

    let mut fields = decompose(raw);
    let rest = fields.split_off(1);
    if fields[0] != STATUS_OK {
        return Err(VspError::Peer(rest.join(", ")));
    }
    Ok(rest)
}
