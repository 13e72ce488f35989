//! Filename identity codec.
//!
//! A syncable file's storage name carries its identity: `encode` maps a
//! `(resource_id, resource_type)` pair to one name and `decode` inverts it.
//! The name is `escape(id) ~ escape(type)` where escaping rewrites `%` to
//! `%25` and `~` to `%7E`, so exactly one raw `~` delimiter survives in every
//! encoded name. Both fields may otherwise contain arbitrary Unicode; the
//! only character-set requirement on the backend is that it accepts `%`, `~`
//! and the fields' own characters in file names.

use thiserror::Error;

const DELIMITER: char = '~';

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("filename has no delimiter: {0}")]
    MissingDelimiter(String),
    #[error("filename has more than one delimiter: {0}")]
    ExtraDelimiter(String),
    #[error("filename contains a malformed escape: {0}")]
    BadEscape(String),
}

pub fn encode(resource_id: &str, resource_type: &str) -> String {
    format!("{}{}{}", escape(resource_id), DELIMITER, escape(resource_type))
}

pub fn decode(name: &str) -> Result<(String, String), CodecError> {
    let (id, rest) = name
        .split_once(DELIMITER)
        .ok_or_else(|| CodecError::MissingDelimiter(name.to_string()))?;
    if rest.contains(DELIMITER) {
        return Err(CodecError::ExtraDelimiter(name.to_string()));
    }
    Ok((unescape(id)?, unescape(rest)?))
}

fn escape(field: &str) -> String {
    // '%' first, so escape sequences themselves never need re-escaping.
    field.replace('%', "%25").replace(DELIMITER, "%7E")
}

fn unescape(field: &str) -> Result<String, CodecError> {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match (chars.next(), chars.next()) {
            (Some('2'), Some('5')) => out.push('%'),
            (Some('7'), Some('E')) => out.push(DELIMITER),
            _ => return Err(CodecError::BadEscape(field.to_string())),
        }
    }
    Ok(out)
}
