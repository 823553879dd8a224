//! Error types for the pairing surfaces.
//!
//! Decoding and resolving never fail loudly (they return `None`); these types
//! cover ingestion, configuration, session restore and the camera/decoder
//! primitives the kiosk drives.

use serde::Serialize;
use thiserror::Error;

/// Crate-wide error type.
///
/// Serializes as `{ kind, message }` so the wasm bridge can hand it to the
/// JavaScript host unchanged.
#[derive(Debug, Error)]
pub enum PairingError {
    /// JSON (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Base64 payload or session state could not be decoded.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Dataset file has an unusable shape.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Persisted session document could not be restored.
    #[error("Session state error: {0}")]
    Session(String),

    /// Session code contains characters outside the code alphabet.
    #[error("Invalid session code")]
    InvalidCode,
}

impl Serialize for PairingError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("PairingError", 2)?;

        let kind = match self {
            PairingError::Serialization(_) => "Serialization",
            PairingError::Base64(_) => "Base64",
            PairingError::Dataset(_) => "Dataset",
            PairingError::Session(_) => "Session",
            PairingError::InvalidCode => "InvalidCode",
        };

        state.serialize_field("kind", kind)?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Frame-source acquisition failures. Terminal for the current attempt only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("Camera permission denied or unavailable.")]
    PermissionDenied,

    #[error("Camera unavailable: {0}")]
    Unavailable(String),
}

/// Runtime failures of a frame decoder primitive. Never fatal to the scan loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The native detector threw while inspecting a frame.
    #[error("native detector failed: {0}")]
    Primitive(String),

    /// The host has no native detector for this frame.
    #[error("native detector unavailable")]
    Unavailable,

    /// The RGBA buffer is smaller than `width * height * 4`.
    #[error("frame buffer too small: {len} bytes for {width}x{height}")]
    ShortBuffer { len: usize, width: usize, height: usize },
}

pub type PairingResult<T> = Result<T, PairingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_kind_and_message() {
        let err = PairingError::Dataset("row 2 is not an object".to_string());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "Dataset");
        assert_eq!(json["message"], "Dataset error: row 2 is not an object");
    }

    #[test]
    fn invalid_code_has_stable_kind() {
        let json = serde_json::to_value(PairingError::InvalidCode).unwrap();
        assert_eq!(json["kind"], "InvalidCode");
        assert_eq!(json["message"], "Invalid session code");
    }
}
