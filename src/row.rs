//! Textual rendering of result rows.
//!
//! Existing clients parse rows in tuple notation, e.g. `('alice', 3, None)`: text quoted,
//! numbers bare, `None` for NULL and a trailing comma on one-element tuples.

use std::fmt::Write;

use rusqlite::types::ValueRef;

/// Renders one row as a parenthesized, comma-separated tuple. A single value keeps the trailing
/// comma: `('alice',)`.
pub fn render_row(values: &[ValueRef<'_>]) -> String {
    let mut out = String::from("(");
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        render_value(&mut out, value);
    }
    if values.len() == 1 {
        out.push(',');
    }
    out.push(')');
    out
}

pub fn render_value(out: &mut String, value: &ValueRef<'_>) {
    match value {
        ValueRef::Null => out.push_str("None"),
        ValueRef::Integer(i) => {
            let _ = write!(out, "{}", i);
        }
        ValueRef::Real(f) => out.push_str(&render_real(*f)),
        ValueRef::Text(bytes) => render_text(out, &String::from_utf8_lossy(bytes)),
        ValueRef::Blob(bytes) => render_blob(out, bytes),
    }
}

fn render_real(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let magnitude = f.abs();
    if magnitude == 0.0 || (1e-4..1e16).contains(&magnitude) {
        // `{}` already gives the shortest string that round-trips.
        let mut s = format!("{}", f);
        if !s.contains('.') {
            s.push_str(".0");
        }
        return s;
    }

    // Rust writes `1e20` and `1.5e-7`, the expected form is `1e+20` and `1.5e-07`.
    let s = format!("{:e}", f);
    let Some((mantissa, exponent)) = s.split_once('e') else {
        return s;
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    format!("{}e{}{:0>2}", mantissa, sign, digits)
}

fn render_text(out: &mut String, text: &str) {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };

    out.push(quote);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if !is_printable(c) => {
                let code = c as u32;
                let _ = match code {
                    0..=0xff => write!(out, "\\x{:02x}", code),
                    0x100..=0xffff => write!(out, "\\u{:04x}", code),
                    _ => write!(out, "\\U{:08x}", code),
                };
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}

/// Whether `c` is written as-is inside quoted text. Controls, format characters, separators
/// other than the ASCII space, surrogates and private-use code points are escaped. Unassigned
/// code points are not detected and pass through.
fn is_printable(c: char) -> bool {
    !matches!(
        c as u32,
        0x00..=0x1f
            | 0x7f..=0xa0
            | 0xad
            | 0x600..=0x605
            | 0x61c
            | 0x6dd
            | 0x70f
            | 0x890..=0x891
            | 0x8e2
            | 0x1680
            | 0x180e
            | 0x2000..=0x200f
            | 0x2028..=0x202f
            | 0x205f..=0x2064
            | 0x2066..=0x206f
            | 0x3000
            | 0xd800..=0xf8ff
            | 0xfeff
            | 0xfff9..=0xfffb
            | 0x110bd
            | 0x110cd
            | 0x13430..=0x1343f
            | 0x1bca0..=0x1bca3
            | 0x1d173..=0x1d17a
            | 0xe0001
            | 0xe0020..=0xe007f
            | 0xf0000..=0x10ffff
    )
}

fn render_blob(out: &mut String, bytes: &[u8]) {
    let quote = if bytes.contains(&b'\'') && !bytes.contains(&b'"') {
        b'"'
    } else {
        b'\''
    };

    out.push('b');
    out.push(quote as char);
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b if b == quote => {
                out.push('\\');
                out.push(b as char);
            }
            0x20..=0x7e => out.push(b as char),
            b => {
                let _ = write!(out, "\\x{:02x}", b);
            }
        }
    }
    out.push(quote as char);
}
