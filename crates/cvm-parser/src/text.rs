//! Text decoding and numeric normalization.

use std::borrow::Cow;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Character encoding of a portal file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8, malformed sequences replaced.
    Utf8,
    /// ISO-8859-1, one char per byte.
    Latin1,
}

impl TextEncoding {
    /// Detects the encoding of a whole file and strips a UTF-8 byte order mark.
    ///
    /// Files are published as Latin-1. A byte order mark, or content that is
    /// valid UTF-8, is read as UTF-8 instead.
    #[must_use]
    pub fn detect(bytes: &[u8]) -> (Self, &[u8]) {
        if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
            return (Self::Utf8, rest);
        }
        match std::str::from_utf8(bytes) {
            Ok(_) => (Self::Utf8, bytes),
            Err(_) => (Self::Latin1, bytes),
        }
    }

    /// Decodes a slice of a file in this encoding. Never fails.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> Cow<'_, str> {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes),
            Self::Latin1 if bytes.is_ascii() => String::from_utf8_lossy(bytes),
            Self::Latin1 => Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }
}

/// Decodes portal text, see [`TextEncoding::detect`].
#[must_use]
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let (encoding, body) = TextEncoding::detect(bytes);
    encoding.decode(body)
}

/// Integer form of a company code.
///
/// `"004170"`, `"4170"` and `"4170.0"` all give `4170`. Anything that is not
/// a number gives `0`, which never matches a real company.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn numeric_code(value: &str) -> i64 {
    let value = value.trim();
    if let Ok(n) = value.parse::<i64>() {
        return n;
    }
    match value.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 => f as i64,
        _ => 0,
    }
}

/// Parses one value of a numeric column.
///
/// With `brazilian` set, `.` is a thousands separator and `,` the decimal
/// mark (`"1.234,56"` is `1234.56`). Unparseable values give `None`.
#[must_use]
pub fn parse_number(value: &str, brazilian: bool) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let parsed = if brazilian {
        value.replace('.', "").replace(',', ".").parse::<f64>()
    } else {
        value.parse::<f64>()
    };
    parsed.ok().filter(|v| v.is_finite())
}
