//! Outer wire grammar: `IV=<digits>|<hex>`.
//!
//! Anything that does not match the grammar exactly is rejected here, before
//! any cryptographic work is done.  The caller drops rejected frames without
//! answering, so an unauthenticated sender learns nothing about why a frame
//! was refused.

use std::fmt;

use thiserror::Error;

/// Literal that opens every frame.
pub const NONCE_PREFIX: &str = "IV=";

/// Separator between the nonce and the ciphertext, and between the payload
/// and its signature inside the ciphertext.
pub const FIELD_SEPARATOR: char = '|';

/// Reasons an inbound frame is not well-formed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame is not valid UTF-8")]
    NotUtf8,

    #[error("frame does not start with `IV=`")]
    MissingNoncePrefix,

    #[error("frame has no `|` separator")]
    MissingSeparator,

    #[error("frame has more than one `|` separator")]
    ExtraSeparator,

    /// The nonce is empty, contains non-digits, or overflows `u64`.
    #[error("invalid nonce: {0:?}")]
    InvalidNonce(String),

    #[error("frame carries no ciphertext")]
    EmptyCiphertext,

    #[error("ciphertext contains non-hex characters")]
    NonHexCiphertext,
}

/// One parsed wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sender-chosen nonce that scopes this message's keystream.
    pub nonce: u64,
    /// Hex ciphertext of `<payload>|<signature>`.
    pub ciphertext: String,
}

impl Frame {
    pub fn new(nonce: u64, ciphertext: impl Into<String>) -> Self {
        Self {
            nonce,
            ciphertext: ciphertext.into(),
        }
    }

    /// Parses a raw transport payload.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::NotUtf8`] for non-text payloads, otherwise see
    /// [`Frame::parse`].
    pub fn from_bytes(raw: &[u8]) -> Result<Self, FrameError> {
        let text = std::str::from_utf8(raw).map_err(|_| FrameError::NotUtf8)?;
        Self::parse(text)
    }

    /// Parses `IV=<digits>|<hex>`, ignoring surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns the first [`FrameError`] the text violates.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use gate_core::Frame;
    ///
    /// let frame = Frame::parse("IV=7|0a1b\n").unwrap();
    /// assert_eq!(frame.nonce, 7);
    /// assert_eq!(frame.ciphertext, "0a1b");
    /// assert!(Frame::parse("7|0a1b").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let body = text
            .trim()
            .strip_prefix(NONCE_PREFIX)
            .ok_or(FrameError::MissingNoncePrefix)?;

        let (nonce_text, ciphertext) = body
            .split_once(FIELD_SEPARATOR)
            .ok_or(FrameError::MissingSeparator)?;
        if ciphertext.contains(FIELD_SEPARATOR) {
            return Err(FrameError::ExtraSeparator);
        }

        // `u64::from_str` tolerates a leading `+`; the grammar does not.
        if nonce_text.is_empty() || !nonce_text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FrameError::InvalidNonce(nonce_text.to_string()));
        }
        let nonce = nonce_text
            .parse::<u64>()
            .map_err(|_| FrameError::InvalidNonce(nonce_text.to_string()))?;

        if ciphertext.is_empty() {
            return Err(FrameError::EmptyCiphertext);
        }
        if !ciphertext.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(FrameError::NonHexCiphertext);
        }

        Ok(Self::new(nonce, ciphertext))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{NONCE_PREFIX}{}{FIELD_SEPARATOR}{}",
            self.nonce, self.ciphertext
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_frame() {
        let frame = Frame::parse("IV=42|00ff").unwrap();
        assert_eq!(frame, Frame::new(42, "00ff"));
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let frame = Frame::parse("  IV=1|ab\r\n").unwrap();
        assert_eq!(frame, Frame::new(1, "ab"));
    }

    #[test]
    fn test_parse_accepts_max_u64_nonce() {
        let text = format!("IV={}|ab", u64::MAX);
        assert_eq!(Frame::parse(&text).unwrap().nonce, u64::MAX);
    }

    #[test]
    fn test_parse_rejects_missing_prefix() {
        assert_eq!(Frame::parse("7|ab"), Err(FrameError::MissingNoncePrefix));
        assert_eq!(Frame::parse("iv=7|ab"), Err(FrameError::MissingNoncePrefix));
    }

    #[test]
    fn test_parse_rejects_missing_separator() {
        assert_eq!(Frame::parse("IV=7ab"), Err(FrameError::MissingSeparator));
    }

    #[test]
    fn test_parse_rejects_extra_separator() {
        assert_eq!(Frame::parse("IV=7|ab|cd"), Err(FrameError::ExtraSeparator));
    }

    #[test]
    fn test_parse_rejects_non_digit_nonce() {
        assert!(matches!(
            Frame::parse("IV=-7|ab"),
            Err(FrameError::InvalidNonce(_))
        ));
        assert!(matches!(
            Frame::parse("IV=+7|ab"),
            Err(FrameError::InvalidNonce(_))
        ));
        assert!(matches!(
            Frame::parse("IV=|ab"),
            Err(FrameError::InvalidNonce(_))
        ));
    }

    #[test]
    fn test_parse_rejects_overflowing_nonce() {
        let text = "IV=18446744073709551616|ab";
        assert!(matches!(Frame::parse(text), Err(FrameError::InvalidNonce(_))));
    }

    #[test]
    fn test_parse_rejects_empty_ciphertext() {
        assert_eq!(Frame::parse("IV=7|"), Err(FrameError::EmptyCiphertext));
    }

    #[test]
    fn test_parse_rejects_non_hex_ciphertext() {
        assert_eq!(Frame::parse("IV=7|xyz1"), Err(FrameError::NonHexCiphertext));
    }

    #[test]
    fn test_from_bytes_rejects_invalid_utf8() {
        assert_eq!(
            Frame::from_bytes(&[0x49, 0x56, 0x3d, 0xff]),
            Err(FrameError::NotUtf8)
        );
    }

    #[test]
    fn test_display_formats_wire_text() {
        assert_eq!(Frame::new(7, "0a0b").to_string(), "IV=7|0a0b");
    }
}
