//! Helpers for writing component values back out as CSS text.
//!
//! Escaping follows the [serialization rules](https://drafts.csswg.org/cssom/#serialize-an-identifier)
//! so that a serialized identifier re-tokenizes to the same value.

use std::fmt::{self, Write};

/// Writes `value` as a CSS identifier, escaping wherever needed.
pub fn serialize_identifier<W: Write>(value: &str, dest: &mut W) -> fmt::Result {
    if value.is_empty() {
        return Ok(());
    }

    if value == "-" {
        return dest.write_str("\\-");
    }

    if let Some(rest) = value.strip_prefix("--") {
        dest.write_str("--")?;
        return serialize_name(rest, dest);
    }

    let mut value = value;
    if let Some(rest) = value.strip_prefix('-') {
        dest.write_char('-')?;
        value = rest;
    }

    // A leading digit cannot start an identifier and gets a hex escape.
    let mut chars = value.chars();
    if let Some(first) = chars.next() {
        if first.is_ascii_digit() {
            write!(dest, "\\{:x} ", first as u32)?;
            return serialize_name(chars.as_str(), dest);
        }
    }

    serialize_name(value, dest)
}

/// Writes `value` escaping every code point that is not a name code point.
pub fn serialize_name<W: Write>(value: &str, dest: &mut W) -> fmt::Result {
    for c in value.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' || !c.is_ascii() {
            dest.write_char(c)?;
        } else if c == '\0' {
            dest.write_char('\u{FFFD}')?;
        } else if (c as u32) < 0x20 || c == '\x7f' {
            write!(dest, "\\{:x} ", c as u32)?;
        } else {
            dest.write_char('\\')?;
            dest.write_char(c)?;
        }
    }
    Ok(())
}

/// Writes `value` as a double-quoted CSS string.
pub fn serialize_string<W: Write>(value: &str, dest: &mut W) -> fmt::Result {
    dest.write_char('"')?;
    for c in value.chars() {
        match c {
            '"' => dest.write_str("\\\"")?,
            '\\' => dest.write_str("\\\\")?,
            '\0' => dest.write_char('\u{FFFD}')?,
            c if (c as u32) < 0x20 || c == '\x7f' => write!(dest, "\\{:x} ", c as u32)?,
            c => dest.write_char(c)?,
        }
    }
    dest.write_char('"')
}

/// Writes `value` so that it re-tokenizes as a single unquoted url token.
pub fn serialize_unquoted_url<W: Write>(value: &str, dest: &mut W) -> fmt::Result {
    for c in value.chars() {
        match c {
            '(' | ')' | '"' | '\'' | '\\' => {
                dest.write_char('\\')?;
                dest.write_char(c)?;
            }
            c if (c as u32) <= 0x20 || c == '\x7f' => write!(dest, "\\{:x} ", c as u32)?,
            c => dest.write_char(c)?,
        }
    }
    Ok(())
}
