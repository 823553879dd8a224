//! Cooperative scan loop.
//!
//! The host drives the loop: every animation frame it calls [`ScanLoop::tick`]
//! and reschedules unless the tick says the loop stopped. At most one decode
//! runs per tick, and the running flag is checked before anything else so a
//! stopped loop never delivers.

use tracing::{debug, warn};

use super::decoder::{FrameDecoder, RqrrDecoder};
use super::frame::FrameSource;
use crate::pairing::{Decoded, decode_tagged};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Stopped,
    Running,
}

/// A payload the loop decoded and the codec recognized.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub raw: String,
    pub decoded: Decoded,
    /// Name of the decoder that produced `raw`.
    pub decoder: &'static str,
}

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanTick {
    /// The loop is not running. Do not reschedule.
    Stopped,
    /// No frame was ready.
    Waiting,
    /// A frame was inspected without a usable payload.
    Miss,
    /// The loop has stopped and hands over its single detection.
    Detected(Detection),
}

impl ScanTick {
    pub fn should_reschedule(&self) -> bool {
        matches!(self, ScanTick::Waiting | ScanTick::Miss)
    }
}

pub struct ScanLoop {
    state: ScanState,
    decoder: Option<Box<dyn FrameDecoder>>,
    working_width: usize,
}

impl ScanLoop {
    pub fn new(working_width: usize) -> Self {
        Self { state: ScanState::Stopped, decoder: None, working_width }
    }

    pub fn start(&mut self, decoder: Box<dyn FrameDecoder>) {
        debug!(decoder = decoder.name(), "scan loop started");
        self.decoder = Some(decoder);
        self.state = ScanState::Running;
    }

    /// Restart with the decoder from the previous run, keeping any downgrade.
    /// Returns `false` if the loop was never started.
    pub fn resume(&mut self) -> bool {
        if self.decoder.is_none() {
            return false;
        }
        self.state = ScanState::Running;
        true
    }

    /// Idempotent.
    pub fn stop(&mut self) {
        if self.state == ScanState::Running {
            debug!("scan loop stopped");
        }
        self.state = ScanState::Stopped;
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ScanState::Running
    }

    pub fn decoder_name(&self) -> Option<&'static str> {
        self.decoder.as_ref().map(|d| d.name())
    }

    pub fn tick(&mut self, source: &mut dyn FrameSource) -> ScanTick {
        if self.state != ScanState::Running {
            return ScanTick::Stopped;
        }
        let Some(decoder) = self.decoder.as_mut() else {
            self.state = ScanState::Stopped;
            return ScanTick::Stopped;
        };
        let Some(frame) = source.next_frame() else {
            return ScanTick::Waiting;
        };

        let name = decoder.name();
        match decoder.decode(&frame) {
            Ok(Some(raw)) if !raw.trim().is_empty() => match decode_tagged(&raw) {
                Some(decoded) => {
                    self.state = ScanState::Stopped;
                    debug!(decoder = name, format = ?decoded.format, "payload detected");
                    ScanTick::Detected(Detection { raw, decoded, decoder: name })
                }
                None => {
                    debug!(decoder = name, "unrecognized payload, still scanning");
                    ScanTick::Miss
                }
            },
            Ok(_) => ScanTick::Miss,
            Err(e) => {
                if decoder.downgrades() {
                    warn!(decoder = name, error = %e, "decoder failed, switching to software");
                    self.decoder = Some(Box::new(RqrrDecoder::new(self.working_width)));
                } else {
                    warn!(decoder = name, error = %e, "decoder failed, retrying next frame");
                }
                ScanTick::Miss
            }
        }
    }
}
