//! Surface configuration.
//!
//! Both structs load from JSON with every key optional; the host passes them
//! through `configure_kiosk` or builds them directly in native code.

use serde::{Deserialize, Serialize};

use crate::error::PairingResult;

/// Which camera the frame source should prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    /// Rear camera.
    #[default]
    Environment,
    /// Front camera.
    User,
}

impl Facing {
    pub fn flipped(self) -> Self {
        match self {
            Facing::Environment => Facing::User,
            Facing::User => Facing::Environment,
        }
    }

    /// The `facingMode` constraint value the browser expects.
    pub fn as_str(self) -> &'static str {
        match self {
            Facing::Environment => "environment",
            Facing::User => "user",
        }
    }
}

/// Decoder strategy requested at scan start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecoderPreference {
    /// Native detector when the host reports one, software otherwise.
    #[default]
    Auto,
    Native,
    Software,
}

/// Kiosk options. Collapses every variant of the kiosk flow into one machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    /// Seconds a paired record stays on screen.
    pub countdown_secs: u32,
    /// Seconds added by one "extend" press.
    pub extend_secs: u32,
    pub decoder: DecoderPreference,
    /// Frames wider than this are downscaled before software decoding.
    pub working_width: usize,
    /// Prefix prepended to relative sprite references.
    pub asset_root: String,
    pub facing: Facing,
    /// Pair directly from `mobile:show_qr` notices (camera-less development).
    pub pair_from_broadcast: bool,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 20,
            extend_secs: 10,
            decoder: DecoderPreference::Auto,
            working_width: 640,
            asset_root: "../assets/".to_string(),
            facing: Facing::Environment,
            pair_from_broadcast: false,
        }
    }
}

impl KioskConfig {
    /// Parse from JSON, flooring zero durations and widths.
    pub fn from_json(json: &str) -> PairingResult<Self> {
        let config: KioskConfig = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    fn sanitized(mut self) -> Self {
        self.countdown_secs = self.countdown_secs.max(1);
        self.extend_secs = self.extend_secs.max(1);
        self.working_width = self.working_width.max(64);
        self
    }
}

/// Deep-link URL style for the mobile surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Scheme + host, e.g. `https://hotpet.example`.
    pub origin: String,
    /// Subfolder the site is hosted under, e.g. `/hotpet`. Empty at the root.
    pub base_path: String,
    /// The host page's `location.pathname`. Used to find `base_path` when
    /// that is left empty.
    pub pathname: String,
    /// `false` on static servers without rewrites; links then use a fragment.
    pub path_routing: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            origin: String::new(),
            base_path: String::new(),
            pathname: String::new(),
            path_routing: true,
        }
    }
}
