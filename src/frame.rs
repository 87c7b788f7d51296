use std::fmt;

use bytes::Bytes;

/// Every frame, in both directions, ends with a single NUL byte. There is no length prefix, so a
/// payload can never contain the terminator itself.
pub const TERMINATOR: u8 = b'\0';

/// One terminator-delimited unit exchanged over a connection. The payload is opaque to the
/// transport; only the command layer reads it as text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    payload: Bytes,
}

impl Frame {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Decodes the payload as UTF-8. Malformed sequences are replaced with U+FFFD instead of
    /// failing, a client sending garbage must not take the handler down.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

impl From<String> for Frame {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&str> for Frame {
    fn from(text: &str) -> Self {
        Self::new(Bytes::copy_from_slice(text.as_bytes()))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_frame() {
        let frame = Frame::from("");

        assert!(frame.is_empty());
        assert_eq!(frame.to_text(), "");
    }

    #[test]
    fn display_shows_text() {
        let frame = Frame::from("done");

        assert_eq!(frame.to_string(), "done");
    }

    #[test]
    fn to_text_replaces_invalid_utf8() {
        let frame = Frame::new(Bytes::from_static(b"SELECT \xff\xfe"));

        assert_eq!(frame.to_text(), "SELECT \u{fffd}\u{fffd}");
    }

    #[test]
    fn to_text_keeps_multibyte_characters() {
        let frame = Frame::from("INSERT INTO users VALUES ('josé', 'ñ')");

        assert_eq!(frame.to_text(), "INSERT INTO users VALUES ('josé', 'ñ')");
    }
}
