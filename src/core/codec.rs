//! Pure conversion between raw bytes and their configured textual
//! representation. No I/O, no shared state, safe to call from any task.

use crate::domain::descriptor::CodecMode;
use crate::domain::error::CodecError;

/// Converts operator input into the bytes that go on the wire.
///
/// Hex input may contain ASCII whitespace between digit pairs; an odd
/// number of digits or a non-hex character is rejected. Ascii input is
/// rejected if it contains a non-ASCII character.
pub fn encode(text: &str, mode: CodecMode) -> Result<Vec<u8>, CodecError> {
    match mode {
        CodecMode::Raw | CodecMode::Utf8 => Ok(text.as_bytes().to_vec()),
        CodecMode::Ascii => {
            if let Some(ch) = text.chars().find(|c| !c.is_ascii()) {
                return Err(CodecError::InvalidEncoding(format!(
                    "non-ASCII character {ch:?} in ascii payload"
                )));
            }
            Ok(text.as_bytes().to_vec())
        }
        CodecMode::Hex => {
            let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            if compact.len() % 2 != 0 {
                return Err(CodecError::InvalidEncoding(
                    "odd number of hex digits".to_string(),
                ));
            }
            hex::decode(&compact).map_err(|e| CodecError::InvalidEncoding(e.to_string()))
        }
    }
}

/// Renders received bytes for display.
///
/// Infallible: the receive path must not block on bad input, so Utf8 and
/// Ascii substitute a replacement marker instead of failing.
pub fn decode(bytes: &[u8], mode: CodecMode) -> String {
    match mode {
        CodecMode::Raw | CodecMode::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        CodecMode::Ascii => bytes
            .iter()
            .map(|&b| {
                if b.is_ascii() {
                    b as char
                } else {
                    char::REPLACEMENT_CHARACTER
                }
            })
            .collect(),
        CodecMode::Hex => hex::encode(bytes),
    }
}
