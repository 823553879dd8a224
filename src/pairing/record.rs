//! Pet records, partial records and the canonical dataset.
//!
//! Three naming schemes reach this module: the dataset's long form
//! (`UserName`, `PetName`, ...), the v1 payload's camelCase form (`userName`,
//! `currentPoints`, ...) and the compact single-letter keys (`u`, `n`, ...).
//! All of them are folded into one shape here, on ingestion.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{PairingError, PairingResult};

/// Ceiling used when a record carries no next-level requirement.
pub const DEFAULT_POINTS_MAX: u32 = 1000;

/// Sprite used for records synthesized without a dataset match.
pub const PLACEHOLDER_SPRITE: &str = "sprites/placeholder.png";

const OWNER_KEYS: &[&str] = &["UserName", "userName", "u"];
const PET_KEYS: &[&str] = &["PetName", "petName", "n"];
const TYPE_KEYS: &[&str] = &["PetType", "petType", "t"];
const SPRITE_KEYS: &[&str] = &["PetSpriteSrc", "petSprite", "petSpriteSrc", "s"];
const DISCOUNT_KEYS: &[&str] = &["DiscountLevel", "discountLevel", "d"];
const POINTS_KEYS: &[&str] = &["PointsTotal", "currentPoints", "pointsTotal", "p"];
const POINTS_MAX_KEYS: &[&str] = &[
    "MaxPointsNeedForNextLevel",
    "maxPointsNeedForNextLevel",
    "maxPoints",
    "m",
];
const QUIP_KEYS: &[&str] = &["Quips", "quips", "quip", "q"];
const INDEX_KEY: &str = "i";
const CODE_KEY: &str = "code";

/// A complete, canonical pet record. Serializes in the dataset's long form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PetRecord {
    #[serde(rename = "UserName")]
    pub owner_name: String,
    #[serde(rename = "PetName")]
    pub pet_name: String,
    #[serde(rename = "PetType")]
    pub pet_type: String,
    #[serde(rename = "PetSpriteSrc")]
    pub sprite: String,
    #[serde(rename = "DiscountLevel")]
    pub discount_level: u32,
    #[serde(rename = "PointsTotal")]
    pub points_total: u32,
    #[serde(rename = "MaxPointsNeedForNextLevel")]
    pub points_max: u32,
    #[serde(rename = "Quips")]
    pub quip: String,
}

impl Default for PetRecord {
    fn default() -> Self {
        Self {
            owner_name: String::new(),
            pet_name: String::new(),
            pet_type: String::new(),
            sprite: String::new(),
            discount_level: 0,
            points_total: 0,
            points_max: DEFAULT_POINTS_MAX,
            quip: String::new(),
        }
    }
}

impl PetRecord {
    /// Points needed for the next level, never zero.
    pub fn next_level_points(&self) -> u32 {
        self.points_max.max(1)
    }

    /// Progress toward the next level, 0..=100.
    pub fn progress_percent(&self) -> u32 {
        let pct = u64::from(self.points_total) * 100 / u64::from(self.next_level_points());
        pct.min(100) as u32
    }

    /// Build a record from a dataset row object, defaulting what is missing.
    fn from_object(obj: &Map<String, Value>) -> Self {
        let mut record = PetRecord::default();
        record.overlay(&PartialRecord::from_object(obj));
        record
    }

    /// Build a record from a positional row:
    /// `[UserName, PetName, PetSpriteSrc, DiscountLevel, PointsTotal, Max?, Quips?, PetType?]`.
    fn from_positional(row: &[Value]) -> Self {
        let text = |i: usize| row.get(i).and_then(text_value).unwrap_or_default();
        let number = |i: usize| row.get(i).and_then(number_value);
        PetRecord {
            owner_name: text(0),
            pet_name: text(1),
            sprite: text(2),
            discount_level: number(3).unwrap_or(0),
            points_total: number(4).unwrap_or(0),
            points_max: number(5).unwrap_or(DEFAULT_POINTS_MAX),
            quip: row.get(6).and_then(quip_value).unwrap_or_default(),
            pet_type: text(7),
        }
    }

    /// Synthesize a record from payload fields alone.
    ///
    /// A legacy code with no pet name becomes the display name.
    pub(crate) fn synthesize(partial: &PartialRecord) -> Self {
        let mut record = PetRecord {
            sprite: PLACEHOLDER_SPRITE.to_string(),
            ..PetRecord::default()
        };
        record.overlay(partial);
        if record.pet_name.is_empty() {
            if let Some(code) = &partial.code {
                record.pet_name = code.clone();
                if record.quip.is_empty() {
                    record.quip = "Legacy code payload".to_string();
                }
            }
        }
        record
    }

    /// Overlay every field `partial` carries. Sprites only replace when non-empty.
    pub(crate) fn overlay(&mut self, partial: &PartialRecord) {
        if let Some(v) = &partial.owner_name {
            self.owner_name = v.clone();
        }
        if let Some(v) = &partial.pet_name {
            self.pet_name = v.clone();
        }
        if let Some(v) = &partial.pet_type {
            self.pet_type = v.clone();
        }
        if let Some(v) = partial.sprite.as_ref().filter(|s| !s.is_empty()) {
            self.sprite = v.clone();
        }
        if let Some(v) = partial.discount_level {
            self.discount_level = v;
        }
        if let Some(v) = partial.points_total {
            self.points_total = v;
        }
        if let Some(v) = partial.points_max {
            self.points_max = v;
        }
        if let Some(v) = &partial.quip {
            self.quip = v.clone();
        }
    }
}

/// Whatever a payload carried. Never assumed complete.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartialRecord {
    pub owner_name: Option<String>,
    pub pet_name: Option<String>,
    pub pet_type: Option<String>,
    pub sprite: Option<String>,
    pub discount_level: Option<u32>,
    pub points_total: Option<u32>,
    pub points_max: Option<u32>,
    pub quip: Option<String>,
    /// Dataset position. Signed so out-of-range payloads survive to the resolver.
    pub index: Option<i64>,
    /// Legacy session token, uppercased.
    pub code: Option<String>,
}

impl PartialRecord {
    pub fn with_index(index: i64) -> Self {
        Self {
            index: Some(index),
            ..Self::default()
        }
    }

    pub fn with_code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::default()
        }
    }

    /// Read every recognized key from a JSON object, in any naming scheme.
    pub fn from_object(obj: &Map<String, Value>) -> Self {
        PartialRecord {
            owner_name: text_field(obj, OWNER_KEYS),
            pet_name: text_field(obj, PET_KEYS),
            pet_type: text_field(obj, TYPE_KEYS),
            sprite: text_field(obj, SPRITE_KEYS),
            discount_level: number_field(obj, DISCOUNT_KEYS),
            points_total: number_field(obj, POINTS_KEYS),
            points_max: number_field(obj, POINTS_MAX_KEYS),
            quip: QUIP_KEYS
                .iter()
                .find_map(|k| obj.get(*k).and_then(quip_value)),
            index: obj.get(INDEX_KEY).and_then(Value::as_i64),
            code: obj
                .get(CODE_KEY)
                .and_then(text_value)
                .map(|c| c.to_ascii_uppercase()),
        }
    }

    /// Read a versioned payload object. It describes the whole record, so
    /// text fields it carries are kept even when blank.
    pub fn from_full_object(obj: &Map<String, Value>) -> Self {
        PartialRecord {
            owner_name: full_text_field(obj, OWNER_KEYS),
            pet_name: full_text_field(obj, PET_KEYS),
            pet_type: full_text_field(obj, TYPE_KEYS),
            sprite: full_text_field(obj, SPRITE_KEYS),
            quip: full_text_field(obj, QUIP_KEYS),
            ..Self::from_object(obj)
        }
    }

    /// True when at least one record field (not index/code) is present.
    pub fn has_record_fields(&self) -> bool {
        self.owner_name.is_some()
            || self.pet_name.is_some()
            || self.pet_type.is_some()
            || self.sprite.is_some()
            || self.discount_level.is_some()
            || self.points_total.is_some()
            || self.points_max.is_some()
            || self.quip.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_record_fields() && self.index.is_none() && self.code.is_none()
    }
}

impl From<&PetRecord> for PartialRecord {
    fn from(record: &PetRecord) -> Self {
        let text = |s: &str| (!s.is_empty()).then(|| s.to_string());
        PartialRecord {
            owner_name: text(&record.owner_name),
            pet_name: text(&record.pet_name),
            pet_type: text(&record.pet_type),
            sprite: text(&record.sprite),
            discount_level: Some(record.discount_level),
            points_total: Some(record.points_total),
            points_max: Some(record.points_max),
            quip: text(&record.quip),
            index: None,
            code: None,
        }
    }
}

// ── Field extraction ───────────────────────────────────────────────

fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| obj.get(*k).and_then(text_value))
}

fn full_text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::String(s) => Some(s.clone()),
        other => quip_value(other),
    })
}

fn number_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    keys.iter().find_map(|k| obj.get(*k).and_then(number_value))
}

/// Non-empty string, or a number rendered as text. Empty strings count as absent.
fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Non-negative integer from an integer, an integral float or a numeric string.
fn number_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u32::try_from(u).ok()
            } else {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX))
                    .map(|f| f as u32)
            }
        }
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

/// A quip is a string, or the first non-empty string of an array.
fn quip_value(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.iter().find_map(text_value),
        other => text_value(other),
    }
}

// ── Dataset ────────────────────────────────────────────────────────

const DEMO_DATASET: &str = include_str!("../../assets/pets.json");

/// The canonical, read-only list of pets, indexed `0..len`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    records: Vec<PetRecord>,
}

impl Dataset {
    pub fn new(records: Vec<PetRecord>) -> Self {
        Self { records }
    }

    /// Parse a dataset file: an array of objects or positional arrays.
    pub fn from_json(json: &str) -> PairingResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        let rows = match value {
            Value::Array(rows) => rows,
            _ => return Err(PairingError::Dataset("expected a JSON array".to_string())),
        };
        let records = rows
            .iter()
            .enumerate()
            .map(|(i, row)| match row {
                Value::Object(obj) => Ok(PetRecord::from_object(obj)),
                Value::Array(items) => Ok(PetRecord::from_positional(items)),
                _ => Err(PairingError::Dataset(format!(
                    "row {} is neither an object nor an array",
                    i
                ))),
            })
            .collect::<PairingResult<Vec<_>>>()?;
        tracing::debug!(records = records.len(), "dataset loaded");
        Ok(Self { records })
    }

    /// The bundled six-pet demo dataset.
    pub fn demo() -> Self {
        Self::from_json(DEMO_DATASET).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "bundled dataset is invalid");
            Self::default()
        })
    }

    /// Record at `index`; negative or out-of-range positions yield `None`.
    pub fn get(&self, index: i64) -> Option<&PetRecord> {
        usize::try_from(index).ok().and_then(|i| self.records.get(i))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PetRecord> {
        self.records.iter()
    }
}
