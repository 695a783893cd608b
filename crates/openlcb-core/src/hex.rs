use std::fmt;

pub(crate) fn write_hex_pairs(
    f: &mut fmt::Formatter<'_>,
    bytes: &[u8],
    separator: char,
) -> fmt::Result {
    for (index, byte) in bytes.iter().enumerate() {
        if index > 0 {
            write!(f, "{separator}")?;
        }
        write!(f, "{byte:02X}")?;
    }
    Ok(())
}

/// Render bytes as space separated upper-case hex pairs (`"0A 20 FF"`).
///
/// # Examples
/// ```
/// use openlcb_core::hex_space_string;
///
/// assert_eq!(hex_space_string(&[0x0a, 0x20, 0xff]), "0A 20 FF");
/// assert_eq!(hex_space_string(&[]), "");
/// ```
pub fn hex_space_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse hex pairs separated by `.`, space, `:` or `-`. A run of hex digits
/// without separators is also accepted.
pub(crate) fn parse_hex_pairs(text: &str) -> Option<Vec<u8>> {
    let digits: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, '.' | ' ' | ':' | '-'))
        .collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        return None;
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(pair, 16).ok()
        })
        .collect()
}

/// Serde adapter storing byte vectors as space separated hex pairs.
pub(crate) mod space_pairs {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::hex_space_string(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        super::parse_hex_pairs(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid hex payload {text:?}")))
    }
}
