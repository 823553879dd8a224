//! Cross-surface notices: fire-and-forget `{ type, payload, at }` messages.
//!
//! Only a convenience channel between surfaces on the same machine. Unknown
//! message types are ignored.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::PairingResult;

pub const MOBILE_SHOW_QR: &str = "mobile:show_qr";
pub const KIOSK_PAIRED: &str = "kiosk:paired";
pub const KIOSK_RESET: &str = "kiosk:reset";

/// Wire shape of a notice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    /// Milliseconds since the epoch, supplied by the host clock.
    #[serde(default)]
    pub at: i64,
}

/// Notices a surface knows how to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KnownNotice {
    /// The mobile surface is showing this payload.
    ShowQr { payload: String },
    Paired { code: String },
    Reset { code: String },
}

impl Notice {
    pub fn show_qr(payload: &str, at: i64) -> Self {
        Self::with_code(MOBILE_SHOW_QR, payload, at)
    }

    pub fn paired(code: &str, at: i64) -> Self {
        Self::with_code(KIOSK_PAIRED, code, at)
    }

    pub fn reset(code: &str, at: i64) -> Self {
        Self::with_code(KIOSK_RESET, code, at)
    }

    fn with_code(kind: &str, code: &str, at: i64) -> Self {
        Self {
            kind: kind.to_string(),
            payload: json!({ "code": code }),
            at,
        }
    }

    pub fn to_json(&self) -> PairingResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a received message. Malformed or unrecognized messages yield `None`.
    pub fn parse(json: &str) -> Option<KnownNotice> {
        let notice: Notice = serde_json::from_str(json).ok()?;
        notice.known()
    }

    pub fn known(&self) -> Option<KnownNotice> {
        let code = self.payload.get("code").and_then(Value::as_str)?.to_string();
        match self.kind.as_str() {
            MOBILE_SHOW_QR => Some(KnownNotice::ShowQr { payload: code }),
            KIOSK_PAIRED => Some(KnownNotice::Paired { code }),
            KIOSK_RESET => Some(KnownNotice::Reset { code }),
            _ => None,
        }
    }
}
