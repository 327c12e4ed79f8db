//! Text encoding detection for project files.
//!
//! Files are rewritten in the encoding they were read with, so detection returns both
//! the decoded text and the [`TextEncoding`] needed to write it back.

use crate::error::EncodingError;

use encoding_rs::{Encoding, SHIFT_JIS, UTF_16BE, UTF_16LE, UTF_8};

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: [u8; 2] = [0xFF, 0xFE];
const UTF16_BE_BOM: [u8; 2] = [0xFE, 0xFF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
    /// A single- or multi-byte Windows code page such as cp932.
    CodePage(&'static Encoding),
}

impl TextEncoding {
    /// Encode `text`, including the byte order mark for encodings that carry one.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Utf8Bom => {
                let mut bytes = UTF8_BOM.to_vec();
                bytes.extend_from_slice(text.as_bytes());
                bytes
            }
            TextEncoding::Utf16Le => {
                let mut bytes = UTF16_LE_BOM.to_vec();
                bytes.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
                bytes
            }
            TextEncoding::Utf16Be => {
                let mut bytes = UTF16_BE_BOM.to_vec();
                bytes.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
                bytes
            }
            TextEncoding::CodePage(encoding) => encoding.encode(text).0.into_owned(),
        }
    }

    pub fn as_encoding(&self) -> &'static Encoding {
        match self {
            TextEncoding::Utf8 | TextEncoding::Utf8Bom => UTF_8,
            TextEncoding::Utf16Le => UTF_16LE,
            TextEncoding::Utf16Be => UTF_16BE,
            TextEncoding::CodePage(encoding) => encoding,
        }
    }
}

/// Decoded file content with the encoding it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding: TextEncoding,
}

pub trait EncodingDetector {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedText, EncodingError>;
}

/// Detection in the order the resource compiler reads files: a byte order mark wins,
/// then strict UTF-8, then the fallback code page (cp932 unless configured otherwise).
#[derive(Debug, Clone, Copy)]
pub struct TextDetector {
    fallback: Option<&'static Encoding>,
}

impl Default for TextDetector {
    fn default() -> Self {
        Self {
            fallback: Some(SHIFT_JIS),
        }
    }
}

impl TextDetector {
    pub fn with_fallback(fallback: &'static Encoding) -> Self {
        Self {
            fallback: Some(fallback),
        }
    }

    /// Files without a byte order mark must be UTF-8.
    pub fn utf8_only() -> Self {
        Self { fallback: None }
    }

    /// Resolve a WHATWG label such as `shift_jis`, `cp932` or `windows-1252`.
    /// `utf-8` turns the fallback off.
    pub fn for_label(label: &str) -> Option<Self> {
        Encoding::for_label(label.as_bytes()).map(|encoding| {
            if encoding == UTF_8 {
                Self::utf8_only()
            } else {
                Self::with_fallback(encoding)
            }
        })
    }
}

impl EncodingDetector for TextDetector {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedText, EncodingError> {
        if let Some((bom_encoding, bom_length)) = Encoding::for_bom(bytes) {
            let rest = &bytes[bom_length..];
            if bom_encoding == UTF_8 {
                return decode_utf8(rest).map(|text| DecodedText {
                    text,
                    encoding: TextEncoding::Utf8Bom,
                });
            }
            let encoding = if bom_encoding == UTF_16LE {
                TextEncoding::Utf16Le
            } else {
                TextEncoding::Utf16Be
            };
            return decode_utf16(rest, bom_encoding).map(|text| DecodedText { text, encoding });
        }

        if let Some(offset) = bytes.iter().position(|b| *b == 0) {
            return Err(EncodingError::Binary { offset });
        }
        let offset = match std::str::from_utf8(bytes) {
            Ok(text) => {
                return Ok(DecodedText {
                    text: text.to_string(),
                    encoding: TextEncoding::Utf8,
                })
            }
            Err(err) => err.valid_up_to(),
        };
        let Some(fallback) = self.fallback else {
            return Err(EncodingError::InvalidUtf8 { offset });
        };
        tracing::debug!(encoding = fallback.name(), "not UTF-8; trying fallback code page");
        fallback
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|text| DecodedText {
                text: text.into_owned(),
                encoding: TextEncoding::CodePage(fallback),
            })
            .ok_or(EncodingError::Undecodable {
                offset,
                fallback: fallback.name(),
            })
    }
}

fn decode_utf8(bytes: &[u8]) -> Result<String, EncodingError> {
    if let Some(offset) = bytes.iter().position(|b| *b == 0) {
        return Err(EncodingError::Binary { offset });
    }
    String::from_utf8(bytes.to_vec()).map_err(|err| EncodingError::InvalidUtf8 {
        offset: err.utf8_error().valid_up_to(),
    })
}

fn decode_utf16(bytes: &[u8], encoding: &'static Encoding) -> Result<String, EncodingError> {
    if bytes.len() % 2 != 0 {
        return Err(EncodingError::OddLength);
    }
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
        .ok_or(EncodingError::InvalidUtf16)
}
