//! Camera backed by the JavaScript host.
//!
//! The host owns the real `getUserMedia` stream. Rust only tracks whether the
//! kiosk currently wants it and holds the latest frame until the next tick.

use super::frame::{Camera, Frame, FrameSource};
use crate::config::Facing;
use crate::error::CameraError;

#[derive(Debug, Default)]
pub struct HostCamera {
    active: bool,
    facing: Facing,
    pending: Option<Frame>,
}

impl HostCamera {
    /// Keep the newest frame. Frames arriving while released are dropped.
    pub fn push_frame(&mut self, frame: Frame) {
        if self.active {
            self.pending = Some(frame);
        }
    }

    /// The facing the host should open the stream with.
    pub fn facing(&self) -> Facing {
        self.facing
    }
}

impl FrameSource for HostCamera {
    fn next_frame(&mut self) -> Option<Frame> {
        self.pending.take()
    }
}

impl Camera for HostCamera {
    fn acquire(&mut self, facing: Facing) -> Result<(), CameraError> {
        // Permission failures surface later through `CameraFailed`.
        self.active = true;
        self.facing = facing;
        self.pending = None;
        Ok(())
    }

    fn release(&mut self) {
        self.active = false;
        self.pending = None;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_dropped_while_released() {
        let mut cam = HostCamera::default();
        cam.push_frame(Frame::new(vec![0; 4], 1, 1));
        assert!(cam.next_frame().is_none());
    }

    #[test]
    fn keeps_only_the_newest_frame() {
        let mut cam = HostCamera::default();
        cam.acquire(Facing::User).unwrap();
        cam.push_frame(Frame::new(vec![1; 4], 1, 1));
        cam.push_frame(Frame::new(vec![2; 4], 1, 1));
        assert_eq!(cam.next_frame().unwrap().rgba, vec![2; 4]);
        assert!(cam.next_frame().is_none());
        assert_eq!(cam.facing(), Facing::User);
    }

    #[test]
    fn release_discards_pending_frame() {
        let mut cam = HostCamera::default();
        cam.acquire(Facing::Environment).unwrap();
        cam.push_frame(Frame::new(vec![1; 4], 1, 1));
        cam.release();
        assert!(!cam.is_active());
        assert!(cam.next_frame().is_none());
    }
}
