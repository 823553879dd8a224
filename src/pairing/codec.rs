//! Wire payload codec.
//!
//! Produces the string that goes into the QR glyph and reads it back under
//! every format the surfaces have ever emitted:
//!
//! - `HOTPETV1:<base64url(JSON)>` — versioned, self-describing
//! - raw JSON object — long-form or single-letter keys, optional integer `i`
//! - percent-encoded JSON object
//! - bare integer / `i=<integer>` — a dataset index
//! - 4–8 alphanumeric characters — a legacy session code
//!
//! `decode` is total: any input either yields a `PartialRecord` or `None`.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Serialize;
use serde_json::Value;

use crate::error::PairingResult;
use crate::pairing::record::{PartialRecord, PetRecord};
use crate::pairing::resolver::is_absolute_url;
use crate::routes::util::uri_decode;

/// Literal tag in front of full payloads.
pub const FULL_PREFIX: &str = "HOTPETV1";

/// Version tag a full payload must carry.
pub const PAYLOAD_VERSION: u64 = 1;

/// Index-only payloads with hints must stay under this many bytes.
pub const INDEX_BYTE_BUDGET: usize = 120;

const HINT_CHARS: usize = 24;
const COMPACT_SPRITE_MAX: usize = 64;

/// How much of a record to put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeMode {
    Full,
    Compact,
    /// Pointer into the canonical dataset.
    IndexOnly { index: usize },
}

/// Which grammar matched during decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Full,
    Json,
    UriJson,
    Index,
    IndexAssignment,
    LegacyCode,
}

/// A decoded payload tagged with the grammar it matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub format: PayloadFormat,
    pub partial: PartialRecord,
}

// ── Encode ─────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FullPayload<'a> {
    v: u64,
    user_name: &'a str,
    pet_name: &'a str,
    pet_type: &'a str,
    pet_sprite: &'a str,
    discount_level: u32,
    current_points: u32,
    max_points: u32,
    quip: &'a str,
}

#[derive(Serialize)]
struct CompactPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    u: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    t: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    s: Option<&'a str>,
    d: u32,
    p: u32,
    m: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    q: Option<&'a str>,
}

#[derive(Serialize)]
struct IndexPayload {
    i: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    u: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<String>,
}

/// Encode `record` for the QR glyph.
pub fn encode(record: &PetRecord, mode: EncodeMode) -> PairingResult<String> {
    match mode {
        EncodeMode::Full => encode_full(record),
        EncodeMode::Compact => encode_compact(record),
        EncodeMode::IndexOnly { index } => encode_index(record, index),
    }
}

fn encode_full(record: &PetRecord) -> PairingResult<String> {
    let payload = FullPayload {
        v: PAYLOAD_VERSION,
        user_name: &record.owner_name,
        pet_name: &record.pet_name,
        pet_type: &record.pet_type,
        pet_sprite: &record.sprite,
        discount_level: record.discount_level,
        current_points: record.points_total,
        max_points: record.points_max,
        quip: &record.quip,
    };
    let json = serde_json::to_string(&payload)?;
    Ok(format!("{}:{}", FULL_PREFIX, URL_SAFE_NO_PAD.encode(json.as_bytes())))
}

fn encode_compact(record: &PetRecord) -> PairingResult<String> {
    fn set(s: &str) -> Option<&str> {
        (!s.is_empty()).then_some(s)
    }
    // Absolute or long sprite references are left for the dataset to fill in.
    let sprite = set(&record.sprite)
        .filter(|s| !is_absolute_url(s) && s.len() <= COMPACT_SPRITE_MAX);
    let payload = CompactPayload {
        u: set(&record.owner_name),
        n: set(&record.pet_name),
        t: set(&record.pet_type),
        s: sprite,
        d: record.discount_level,
        p: record.points_total,
        m: record.points_max,
        q: set(&record.quip),
    };
    Ok(serde_json::to_string(&payload)?)
}

fn encode_index(record: &PetRecord, index: usize) -> PairingResult<String> {
    let hint = |s: &str| -> Option<String> {
        (!s.is_empty()).then(|| s.chars().take(HINT_CHARS).collect())
    };
    let hinted = serde_json::to_string(&IndexPayload {
        i: index,
        u: hint(&record.owner_name),
        n: hint(&record.pet_name),
    })?;
    if hinted.len() < INDEX_BYTE_BUDGET {
        return Ok(hinted);
    }
    Ok(serde_json::to_string(&IndexPayload {
        i: index,
        u: None,
        n: None,
    })?)
}

// ── Decode ─────────────────────────────────────────────────────────

/// Decode a scanned string. `None` means "not a pairing payload".
pub fn decode(raw: &str) -> Option<PartialRecord> {
    decode_tagged(raw).map(|d| d.partial)
}

/// Decode and report which grammar matched. First match wins.
pub fn decode_tagged(raw: &str) -> Option<Decoded> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let tagged = |format: PayloadFormat| move |partial: PartialRecord| Decoded { format, partial };

    full_body(raw)
        .and_then(decode_full)
        .map(tagged(PayloadFormat::Full))
        .or_else(|| decode_json_object(raw).map(tagged(PayloadFormat::Json)))
        .or_else(|| {
            uri_decode(raw)
                .and_then(|decoded| decode_json_object(&decoded))
                .map(tagged(PayloadFormat::UriJson))
        })
        .or_else(|| {
            parse_integer(raw)
                .map(PartialRecord::with_index)
                .map(tagged(PayloadFormat::Index))
        })
        .or_else(|| {
            parse_index_assignment(raw)
                .map(PartialRecord::with_index)
                .map(tagged(PayloadFormat::IndexAssignment))
        })
        .or_else(|| {
            parse_legacy_code(raw)
                .map(PartialRecord::with_code)
                .map(tagged(PayloadFormat::LegacyCode))
        })
}

/// Body of `HOTPETV1[:- ]<base64>`, if `raw` has that shape.
fn full_body(raw: &str) -> Option<&str> {
    let rest = raw.strip_prefix(FULL_PREFIX)?;
    let rest = rest
        .strip_prefix(|c: char| matches!(c, ':' | '-' | ' '))
        .unwrap_or(rest);
    let is_b64 = |b: u8| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=' | b'-' | b'_');
    (!rest.is_empty() && rest.bytes().all(is_b64)).then_some(rest)
}

/// Accepts the standard and URL-safe alphabets, padded or not.
fn decode_full(body: &str) -> Option<PartialRecord> {
    let normalized: String = body
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    let bytes = URL_SAFE_NO_PAD.decode(normalized.as_bytes()).ok()?;
    let json = String::from_utf8(bytes).ok()?;
    let value: Value = serde_json::from_str(&json).ok()?;
    let obj = value.as_object()?;
    if obj.get("v").and_then(Value::as_u64) != Some(PAYLOAD_VERSION) {
        return None;
    }
    Some(PartialRecord::from_full_object(obj)).filter(|p| !p.is_empty())
}

fn decode_json_object(text: &str) -> Option<PartialRecord> {
    let value: Value = serde_json::from_str(text).ok()?;
    value
        .as_object()
        .map(PartialRecord::from_object)
        .filter(|p| !p.is_empty())
}

fn parse_integer(text: &str) -> Option<i64> {
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// `i\s*=\s*<integer>`, case-insensitive.
fn parse_index_assignment(text: &str) -> Option<i64> {
    let rest = text.strip_prefix(|c: char| c.eq_ignore_ascii_case(&'i'))?;
    let rest = rest.trim_start().strip_prefix('=')?;
    parse_integer(rest.trim_start())
}

fn parse_legacy_code(text: &str) -> Option<String> {
    let valid = (4..=8).contains(&text.len()) && text.bytes().all(|b| b.is_ascii_alphanumeric());
    valid.then(|| text.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;

    fn mochi() -> PetRecord {
        PetRecord {
            owner_name: "Demo User".to_string(),
            pet_name: "Mochi".to_string(),
            pet_type: "Cat".to_string(),
            sprite: "sprites/mochi.png".to_string(),
            discount_level: 2,
            points_total: 777,
            points_max: 1000,
            quip: "Feed me, then pay less.".to_string(),
        }
    }

    #[test]
    fn full_payload_scenario() {
        let json = r#"{"v":1,"petName":"Mochi","discountLevel":2,"currentPoints":777}"#;
        let raw = format!("HOTPETV1:{}", STANDARD.encode(json));
        let decoded = decode_tagged(&raw).unwrap();
        assert_eq!(decoded.format, PayloadFormat::Full);
        assert_eq!(decoded.partial.pet_name.as_deref(), Some("Mochi"));
        assert_eq!(decoded.partial.discount_level, Some(2));
        assert_eq!(decoded.partial.points_total, Some(777));
    }

    #[test]
    fn full_encode_decodes_back_to_every_field() {
        let record = mochi();
        let raw = encode(&record, EncodeMode::Full).unwrap();
        assert!(raw.starts_with("HOTPETV1:"));
        let partial = decode(&raw).unwrap();
        assert_eq!(partial, PartialRecord::from(&record));
    }

    #[test]
    fn full_payload_survives_non_ascii() {
        let record = PetRecord {
            pet_name: "Zoë 🐾".to_string(),
            ..mochi()
        };
        let partial = decode(&encode(&record, EncodeMode::Full).unwrap()).unwrap();
        assert_eq!(partial.pet_name.as_deref(), Some("Zoë 🐾"));
    }

    #[test]
    fn full_payload_accepts_dash_and_space_separators() {
        let body = URL_SAFE_NO_PAD.encode(r#"{"v":1,"n":"Pip"}"#);
        for sep in ["-", " ", ""] {
            let partial = decode(&format!("HOTPETV1{}{}", sep, body)).unwrap();
            assert_eq!(partial.pet_name.as_deref(), Some("Pip"));
        }
    }

    #[test]
    fn wrong_version_falls_through() {
        let raw = format!("HOTPETV1:{}", STANDARD.encode(r#"{"v":2,"petName":"Mochi"}"#));
        assert_eq!(decode(&raw), None);
    }

    #[test]
    fn corrupt_base64_falls_through() {
        assert_eq!(decode("HOTPETV1:!!notbase64"), None);
        assert_eq!(decode("HOTPETV1:AAAA"), None);
    }

    #[test]
    fn raw_json_object_with_index() {
        let decoded = decode_tagged(r#"{"i": 3, "n": "Pebble"}"#).unwrap();
        assert_eq!(decoded.format, PayloadFormat::Json);
        assert_eq!(decoded.partial.index, Some(3));
        assert_eq!(decoded.partial.pet_name.as_deref(), Some("Pebble"));
    }

    #[test]
    fn percent_encoded_json() {
        let decoded = decode_tagged("%7B%22n%22%3A%22Chub%20Shrimp%22%7D").unwrap();
        assert_eq!(decoded.format, PayloadFormat::UriJson);
        assert_eq!(decoded.partial.pet_name.as_deref(), Some("Chub Shrimp"));
    }

    #[test]
    fn bare_integer_scenario() {
        let decoded = decode_tagged("7").unwrap();
        assert_eq!(decoded.format, PayloadFormat::Index);
        assert_eq!(decoded.partial, PartialRecord::with_index(7));
    }

    #[test]
    fn index_assignment_forms() {
        assert_eq!(decode("i=4"), Some(PartialRecord::with_index(4)));
        assert_eq!(decode("I = 12"), Some(PartialRecord::with_index(12)));
        assert_eq!(decode("i=-1"), Some(PartialRecord::with_index(-1)));
        assert_eq!(decode("i="), None);
    }

    #[test]
    fn legacy_code_scenario() {
        let decoded = decode_tagged("abcd").unwrap();
        assert_eq!(decoded.format, PayloadFormat::LegacyCode);
        assert_eq!(decoded.partial.code.as_deref(), Some("ABCD"));
    }

    #[test]
    fn legacy_code_length_bounds() {
        assert_eq!(decode("ABC"), None);
        assert_eq!(decode("ABCDEFGHI"), None);
        assert!(decode("AB12CD34").is_some());
    }

    #[test]
    fn empty_json_object_is_no_match() {
        assert_eq!(decode("{}"), None);
        assert_eq!(decode(r#"{"unrelated": true}"#), None);
    }

    #[test]
    fn decode_is_total() {
        let inputs = [
            "",
            "   ",
            "HOTPETV1:",
            "HOTPETV1",
            "{",
            "[1,2,3]",
            "null",
            "%E0%A4%A",
            "%ZZ",
            "99999999999999999999999",
            "-",
            "i",
            "i==3",
            "\u{0}\u{1}\u{7f}",
            "https://example.com/pet?id=3",
            "🐾🐾🐾🐾",
            "\"just a string\"",
        ];
        for input in inputs {
            let _ = decode(input);
        }
        assert_eq!(decode("https://example.com/pet?id=3"), None);
        assert_eq!(decode("🐾🐾🐾🐾"), None);
    }

    #[test]
    fn compact_omits_absolute_sprites() {
        let record = PetRecord {
            sprite: "https://api.dicebear.com/9.x/pixel-art/png?seed=Mochi".to_string(),
            ..mochi()
        };
        let raw = encode(&record, EncodeMode::Compact).unwrap();
        assert!(!raw.contains("\"s\""));
        let partial = decode(&raw).unwrap();
        assert_eq!(partial.sprite, None);
        assert_eq!(partial.points_total, Some(777));
    }

    #[test]
    fn compact_keeps_short_relative_sprites() {
        let raw = encode(&mochi(), EncodeMode::Compact).unwrap();
        let partial = decode(&raw).unwrap();
        assert_eq!(partial.sprite.as_deref(), Some("sprites/mochi.png"));
        assert_eq!(partial.owner_name.as_deref(), Some("Demo User"));
    }

    #[test]
    fn index_only_with_hints_fits_budget() {
        let raw = encode(&mochi(), EncodeMode::IndexOnly { index: 1 }).unwrap();
        assert!(raw.len() < INDEX_BYTE_BUDGET);
        let partial = decode(&raw).unwrap();
        assert_eq!(partial.index, Some(1));
        assert_eq!(partial.pet_name.as_deref(), Some("Mochi"));
    }

    #[test]
    fn index_only_drops_hints_over_budget() {
        let record = PetRecord {
            owner_name: "\u{201c}".repeat(30),
            pet_name: "\u{201d}".repeat(30),
            ..mochi()
        };
        let raw = encode(&record, EncodeMode::IndexOnly { index: 0 }).unwrap();
        assert_eq!(raw, r#"{"i":0}"#);
    }
}
