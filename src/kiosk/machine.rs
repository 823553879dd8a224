//! Kiosk pairing state machine.
//!
//! ```text
//!            decode + resolve ok
//!   Idle ───────────────────────────▶ Paired ──┐ extend / tick
//!    ▲  ◀──────────────────────────────  │  ◀──┘
//!    │      countdown expired / reset
//!    └── decode ok, resolve failed: report and keep scanning
//! ```
//!
//! Every host callback (frame, timer, button, notice) becomes a [`KioskEvent`]
//! and goes through [`KioskMachine::handle`]. The camera belongs to `Idle`: it
//! is released before `Paired` begins and reacquired on the way back.

use tracing::{info, warn};

use super::countdown::{Countdown, CountdownTick};
use super::decoder::select_decoder;
use super::frame::Camera;
use super::scan::{ScanLoop, ScanTick};
use crate::config::{Facing, KioskConfig};
use crate::error::CameraError;
use crate::pairing::notice::{KnownNotice, Notice};
use crate::pairing::{Dataset, Decoded, MatchKind, PayloadFormat, PetRecord, decode_tagged, resolve_detailed};

/// Full payload for "Mochi", discount 2, 777 points. Used by the simulate button.
pub const DEMO_PAYLOAD: &str =
    "HOTPETV1:eyJ2IjoxLCJwZXROYW1lIjoiTW9jaGkiLCJkaXNjb3VudExldmVsIjoyLCJjdXJyZW50UG9pbnRzIjo3Nzd9";

const UNREADABLE: &str = "Could not read code, try again.";

/// A resolved record on display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub record: PetRecord,
    pub format: PayloadFormat,
    pub matched_by: MatchKind,
}

impl Pairing {
    /// `Owner — Pet`, or the bare code for a legacy payload.
    pub fn title(&self) -> String {
        if self.is_legacy() {
            return self.record.pet_name.clone();
        }
        let owner = non_empty_or(&self.record.owner_name, "Guest");
        let pet = non_empty_or(&self.record.pet_name, "Pet");
        format!("{} — {}", owner, pet)
    }

    /// A bare legacy code that matched nothing in the dataset.
    pub fn is_legacy(&self) -> bool {
        self.format == PayloadFormat::LegacyCode && self.matched_by == MatchKind::Synthesized
    }

    pub fn stats_line(&self) -> String {
        format!(
            "Discount {}/5 • {} pts",
            self.record.discount_level, self.record.points_total
        )
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() { fallback } else { value }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KioskState {
    Idle,
    Paired(Pairing),
}

#[derive(Debug, Clone, PartialEq)]
pub enum KioskEvent {
    /// Acquire the camera and start scanning. Also the retry path.
    Start { native_available: bool },
    /// The host has pushed a frame into the camera.
    Frame,
    /// One second of countdown elapsed.
    CountdownTick,
    Reset,
    Extend,
    ToggleFacing,
    /// Feed a raw payload as if it had been scanned.
    Simulate(String),
    /// The host lost the camera after acquisition.
    CameraFailed(CameraError),
    Notice(Notice),
}

/// What a handled event did, for the host to decide whether to re-render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Ignored,
    Scanning,
    /// Still scanning; nothing to redraw.
    Waiting,
    Paired { remaining: u32 },
    Ticked { remaining: u32 },
    Extended { remaining: u32 },
    Expired,
    Reset,
    /// A payload was read but could not be turned into a record.
    Rejected { message: String },
    CameraUnavailable { message: String },
    FacingChanged { facing: Facing },
}

impl Transition {
    pub fn changes_view(&self) -> bool {
        !matches!(self, Transition::Ignored | Transition::Waiting)
    }
}

/// Notices the kiosk wants broadcast. The host stamps them with the session
/// code and the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outgoing {
    Paired,
    Reset,
}

pub struct KioskMachine<C: Camera> {
    config: KioskConfig,
    dataset: Dataset,
    camera: C,
    scan: ScanLoop,
    countdown: Countdown,
    facing: Facing,
    native_available: bool,
    /// Set once a camera acquisition succeeds, cleared when the camera fails.
    scanning_enabled: bool,
    state: KioskState,
    last_error: Option<String>,
    outbox: Vec<Outgoing>,
}

impl<C: Camera> KioskMachine<C> {
    pub fn new(config: KioskConfig, dataset: Dataset, camera: C) -> Self {
        Self {
            scan: ScanLoop::new(config.working_width),
            facing: config.facing,
            config,
            dataset,
            camera,
            countdown: Countdown::default(),
            native_available: false,
            scanning_enabled: false,
            state: KioskState::Idle,
            last_error: None,
            outbox: Vec::new(),
        }
    }

    pub fn handle(&mut self, event: KioskEvent) -> Transition {
        let paired = matches!(self.state, KioskState::Paired(_));
        match (paired, event) {
            (false, KioskEvent::Start { native_available }) => self.start(native_available),
            (false, KioskEvent::Frame) => self.scan_frame(),
            (false, KioskEvent::Simulate(raw)) => self.pair_from_raw(&raw),
            (false, KioskEvent::CameraFailed(e)) => self.camera_failed(e),
            (false, KioskEvent::ToggleFacing) => self.flip_camera(),
            (true, KioskEvent::ToggleFacing) => {
                self.facing = self.facing.flipped();
                Transition::FacingChanged { facing: self.facing }
            }
            (true, KioskEvent::CountdownTick) => match self.countdown.tick() {
                CountdownTick::Running(remaining) => Transition::Ticked { remaining },
                CountdownTick::Expired => self.return_to_idle(Transition::Expired),
                CountdownTick::Inactive => Transition::Ignored,
            },
            (true, KioskEvent::Extend) => match self.countdown.extend(self.config.extend_secs) {
                Some(remaining) => Transition::Extended { remaining },
                None => Transition::Ignored,
            },
            (true, KioskEvent::Reset) => {
                self.countdown.cancel();
                self.return_to_idle(Transition::Reset)
            }
            (_, KioskEvent::Notice(notice)) => self.receive_notice(&notice),
            _ => Transition::Ignored,
        }
    }

    fn start(&mut self, native_available: bool) -> Transition {
        self.native_available = native_available;
        if self.camera.is_active() && self.scan.is_running() {
            return Transition::Scanning;
        }
        if let Err(e) = self.camera.acquire(self.facing) {
            return self.camera_failed(e);
        }
        self.scanning_enabled = true;
        self.last_error = None;
        let decoder = select_decoder(self.config.decoder, native_available, self.config.working_width);
        self.scan.start(decoder);
        info!(facing = self.facing.as_str(), native_available, "kiosk scanning");
        Transition::Scanning
    }

    fn scan_frame(&mut self) -> Transition {
        match self.scan.tick(&mut self.camera) {
            ScanTick::Stopped => Transition::Ignored,
            ScanTick::Waiting | ScanTick::Miss => Transition::Waiting,
            ScanTick::Detected(detection) => self.pair(detection.decoded),
        }
    }

    fn pair_from_raw(&mut self, raw: &str) -> Transition {
        match decode_tagged(raw) {
            Some(decoded) => self.pair(decoded),
            None => self.reject(),
        }
    }

    fn pair(&mut self, decoded: Decoded) -> Transition {
        let Some(resolution) = resolve_detailed(&decoded.partial, &self.dataset) else {
            return self.reject();
        };

        self.scan.stop();
        self.camera.release();
        self.countdown.start(self.config.countdown_secs);
        self.last_error = None;
        self.outbox.push(Outgoing::Paired);

        let remaining = self.config.countdown_secs;
        info!(
            pet = %resolution.record.pet_name,
            matched_by = ?resolution.matched_by,
            format = ?decoded.format,
            remaining,
            "kiosk paired"
        );
        self.state = KioskState::Paired(Pairing {
            record: resolution.record,
            format: decoded.format,
            matched_by: resolution.matched_by,
        });
        Transition::Paired { remaining }
    }

    /// Decoded but unusable: tell the operator and keep scanning.
    fn reject(&mut self) -> Transition {
        info!("payload could not be resolved");
        self.last_error = Some(UNREADABLE.to_string());
        if self.scanning_enabled {
            self.scan.resume();
        }
        Transition::Rejected { message: UNREADABLE.to_string() }
    }

    fn camera_failed(&mut self, error: CameraError) -> Transition {
        warn!(error = %error, "camera unavailable");
        self.scan.stop();
        self.camera.release();
        self.scanning_enabled = false;
        let message = error.to_string();
        self.last_error = Some(message.clone());
        Transition::CameraUnavailable { message }
    }

    fn flip_camera(&mut self) -> Transition {
        self.facing = self.facing.flipped();
        if self.scanning_enabled {
            self.scan.stop();
            self.camera.release();
            if let Err(e) = self.camera.acquire(self.facing) {
                return self.camera_failed(e);
            }
            self.scan.resume();
        }
        info!(facing = self.facing.as_str(), "camera facing changed");
        Transition::FacingChanged { facing: self.facing }
    }

    fn return_to_idle(&mut self, transition: Transition) -> Transition {
        self.state = KioskState::Idle;
        self.outbox.push(Outgoing::Reset);
        info!(reason = ?transition, "kiosk idle");
        if self.scanning_enabled {
            if let Err(e) = self.camera.acquire(self.facing) {
                return self.camera_failed(e);
            }
            if !self.scan.resume() {
                let decoder =
                    select_decoder(self.config.decoder, self.native_available, self.config.working_width);
                self.scan.start(decoder);
            }
        }
        transition
    }

    fn receive_notice(&mut self, notice: &Notice) -> Transition {
        match notice.known() {
            Some(KnownNotice::ShowQr { payload })
                if self.config.pair_from_broadcast && self.state == KioskState::Idle =>
            {
                self.pair_from_raw(&payload)
            }
            _ => Transition::Ignored,
        }
    }

    pub fn state(&self) -> &KioskState {
        &self.state
    }

    pub fn pairing(&self) -> Option<&Pairing> {
        match &self.state {
            KioskState::Paired(pairing) => Some(pairing),
            KioskState::Idle => None,
        }
    }

    pub fn remaining(&self) -> Option<u32> {
        self.countdown.remaining()
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_scanning(&self) -> bool {
        self.scan.is_running()
    }

    pub fn decoder_name(&self) -> Option<&'static str> {
        self.scan.decoder_name()
    }

    pub fn config(&self) -> &KioskConfig {
        &self.config
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn set_dataset(&mut self, dataset: Dataset) {
        self.dataset = dataset;
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut C {
        &mut self.camera
    }

    pub fn take_outgoing(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }
}
