//! Pairing protocol — the wire payload, its decoding under every legacy
//! format, and rehydration against the canonical dataset. Pure; no I/O.

pub mod codec;
pub mod deep_link;
pub mod notice;
pub mod record;
pub mod resolver;

pub use codec::{Decoded, EncodeMode, PayloadFormat, decode, decode_tagged, encode};
pub use record::{Dataset, PartialRecord, PetRecord};
pub use resolver::{MatchKind, Resolution, normalize_sprite_path, resolve, resolve_detailed};
