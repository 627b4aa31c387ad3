//! Cursor codec for resumable streams.
//!
//! A cursor is the opaque event ID handed to clients. It encodes the tick the
//! event was emitted for, namespaced by the stream tag so that IDs issued by
//! one stream are never mistaken for positions in another. Encoding is
//! `"<tag><delimiter><tick>"` as UTF-8, then URL-safe base64 without padding.

use base64::{
    Engine,
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};
use tickstream_types::constants::DEFAULT_CURSOR_DELIMITER;

/// Error types for cursor decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CursorError {
    #[error("Cursor is not valid base64")]
    Encoding,

    #[error("Cursor is not valid UTF-8")]
    Utf8,

    #[error("Cursor does not belong to stream '{0}'")]
    TagMismatch(String),

    #[error("Cursor tick is not a non-negative integer: {0}")]
    InvalidTick(String),
}

/// Bidirectional mapping between ticks and opaque cursor strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorCodec {
    delimiter: char,
}

impl Default for CursorCodec {
    fn default() -> Self {
        Self::new(DEFAULT_CURSOR_DELIMITER)
    }
}

impl CursorCodec {
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Encode a tick into an opaque cursor.
    ///
    /// An empty tag produces an unprefixed cursor.
    pub fn encode(&self, tick: u64, tag: &str) -> String {
        let raw = if tag.is_empty() {
            tick.to_string()
        } else {
            format!("{}{}{}", tag, self.delimiter, tick)
        };
        URL_SAFE_NO_PAD.encode(raw.as_bytes())
    }

    /// Decode an opaque cursor back into a tick.
    ///
    /// Padded tokens are accepted as well, since some clients re-pad IDs
    /// before echoing them back.
    pub fn decode(&self, token: &str, tag: &str) -> Result<u64, CursorError> {
        let token = token.trim();
        let bytes = if token.ends_with('=') {
            URL_SAFE.decode(token)
        } else {
            URL_SAFE_NO_PAD.decode(token)
        }
        .map_err(|_| CursorError::Encoding)?;
        let raw = String::from_utf8(bytes).map_err(|_| CursorError::Utf8)?;

        let digits = if tag.is_empty() {
            raw.as_str()
        } else {
            raw.strip_prefix(tag)
                .and_then(|rest| rest.strip_prefix(self.delimiter))
                .ok_or_else(|| CursorError::TagMismatch(tag.to_string()))?
        };

        parse_tick(digits)
    }
}

/// Parse a strictly-digit tick. Signs, whitespace and overflow are rejected.
fn parse_tick(digits: &str) -> Result<u64, CursorError> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CursorError::InvalidTick(digits.to_string()));
    }
    digits
        .parse()
        .map_err(|_| CursorError::InvalidTick(digits.to_string()))
}

/// Encode a tick with the default delimiter.
pub fn encode_id(tick: u64, tag: &str) -> String {
    CursorCodec::default().encode(tick, tag)
}

/// Decode a cursor with the default delimiter.
pub fn decode_id(token: &str, tag: &str) -> Result<u64, CursorError> {
    CursorCodec::default().decode(token, tag)
}
