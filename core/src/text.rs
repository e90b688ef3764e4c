//! String encodings used by the puzzle file formats.

use crate::PuzzleError;
use encoding_rs::{UTF_8, WINDOWS_1252};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextEncoding {
    /// Single-byte legacy encoding of 1.x binary files.
    Windows1252,
    Utf8,
}

impl TextEncoding {
    /// Pick the encoding for a binary format version string such as `b"1.3\0"`.
    pub fn for_version(version: &[u8; 4]) -> Self {
        if version[0] >= b'2' {
            TextEncoding::Utf8
        } else {
            TextEncoding::Windows1252
        }
    }

    pub fn encode(self, text: &str) -> Result<Vec<u8>, PuzzleError> {
        match self {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Windows1252 => {
                let (bytes, _, had_errors) = WINDOWS_1252.encode(text);
                if had_errors {
                    return Err(PuzzleError::InvalidEncoding(text.to_string()));
                }
                Ok(bytes.into_owned())
            }
        }
    }

    /// Decoding never fails; malformed UTF-8 is replaced.
    pub fn decode(self, bytes: &[u8]) -> String {
        let encoding = match self {
            TextEncoding::Utf8 => UTF_8,
            TextEncoding::Windows1252 => WINDOWS_1252,
        };
        let (text, _) = encoding.decode_without_bom_handling(bytes);
        text.into_owned()
    }
}

/// Whether `text` survives a trip through the legacy single-byte encoding.
pub fn fits_windows1252(text: &str) -> bool {
    text.is_ascii() || !WINDOWS_1252.encode(text).2
}

/// Decode bytes as UTF-8 when they are valid, falling back to Windows-1252.
pub fn decode_guess(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => TextEncoding::Windows1252.decode(bytes),
    }
}
