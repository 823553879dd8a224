//! Session store — a short opaque session code plus the last selected pet.
//!
//! Backed by a yrs document so the host can persist it as one URL-safe base64
//! string (e.g. in localStorage) and hand it back on the next load.
//!
//! ```text
//! SESSION_DOC (yrs::Doc)
//! └── "session" (YMap)
//!     ├── "code" (String)   — created lazily, replaced only by set_code
//!     └── "idx"  (f64)      — last selected dataset index
//! ```

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::debug;
use yrs::updates::decoder::Decode;
use yrs::{Any, Doc, Map, Out, ReadTxn, StateVector, Transact, Update, WriteTxn};

use crate::error::{PairingError, PairingResult};

/// No `0/O`, `1/I/L` look-alikes.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
pub const CODE_LENGTH: usize = 4;

const ROOT: &str = "session";
const CODE_KEY: &str = "code";
const INDEX_KEY: &str = "idx";

pub struct SessionStore {
    doc: Doc,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let doc = Doc::new();
        {
            let mut txn = doc.transact_mut();
            txn.get_or_insert_map(ROOT);
        }
        Self { doc }
    }

    /// Restore from [`SessionStore::encode`] output. Empty input gives a fresh store.
    pub fn restore(state_b64: &str) -> PairingResult<Self> {
        let store = Self::new();
        if state_b64.trim().is_empty() {
            return Ok(store);
        }
        let bytes = URL_SAFE_NO_PAD.decode(state_b64.trim())?;
        let update = Update::decode_v1(&bytes)
            .map_err(|e| PairingError::Session(format!("state decode error: {}", e)))?;
        {
            let mut txn = store.doc.transact_mut();
            txn.apply_update(update)
                .map_err(|e| PairingError::Session(format!("restore error: {}", e)))?;
        }
        debug!(code = ?store.code(), "session restored");
        Ok(store)
    }

    /// Full document state as URL-safe base64.
    pub fn encode(&self) -> String {
        let state = self.doc.transact().encode_diff_v1(&StateVector::default());
        URL_SAFE_NO_PAD.encode(&state)
    }

    pub fn code(&self) -> Option<String> {
        let root = self.doc.get_or_insert_map(ROOT);
        let txn = self.doc.transact();
        match root.get(&txn, CODE_KEY) {
            Some(Out::Any(Any::String(s))) if !s.is_empty() => Some(s.to_string()),
            _ => None,
        }
    }

    pub fn get_or_create_code(&mut self) -> String {
        self.get_or_create_code_with(&mut rand::rng())
    }

    pub fn get_or_create_code_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> String {
        if let Some(code) = self.code() {
            return code;
        }
        let code: String = (0..CODE_LENGTH)
            .filter_map(|_| CODE_ALPHABET.choose(rng).map(|&b| b as char))
            .collect();
        self.write(CODE_KEY, Any::from(code.clone()));
        debug!(code = %code, "session code created");
        code
    }

    /// Replace the code. Any alphanumeric text is accepted, uppercased.
    pub fn set_code(&mut self, code: &str) -> PairingResult<()> {
        let code = code.trim();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PairingError::InvalidCode);
        }
        self.write(CODE_KEY, Any::from(code.to_ascii_uppercase()));
        Ok(())
    }

    pub fn last_index(&self) -> Option<usize> {
        let root = self.doc.get_or_insert_map(ROOT);
        let txn = self.doc.transact();
        match root.get(&txn, INDEX_KEY) {
            Some(Out::Any(Any::Number(n))) if n >= 0.0 => Some(n as usize),
            _ => None,
        }
    }

    pub fn set_last_index(&mut self, index: usize) {
        self.write(INDEX_KEY, Any::from(index as f64));
    }

    fn write(&mut self, key: &str, value: Any) {
        let root = self.doc.get_or_insert_map(ROOT);
        let mut txn = self.doc.transact_mut();
        root.insert(&mut txn, key, value);
    }
}
