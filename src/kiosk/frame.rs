//! Frames and the frame-source seam.
//!
//! The kiosk never touches a camera directly. The host pushes RGBA frames
//! (plus whatever its native detector saw in them) into a [`Camera`], and the
//! scan loop pulls them out one tick at a time.

use crate::config::Facing;
use crate::error::{CameraError, DecodeError};

/// What the host's native barcode detector reported for a frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NativeReading {
    /// No native detector ran on this frame.
    #[default]
    Unavailable,
    /// The detector ran and found nothing.
    Nothing,
    Text(String),
    /// The detector threw.
    Failed(String),
}

impl NativeReading {
    /// Map the host's `(status, text)` pair. Unknown statuses mean no detector.
    pub fn from_host(status: &str, text: &str) -> Self {
        match status {
            "found" if !text.trim().is_empty() => NativeReading::Text(text.to_string()),
            "found" | "none" => NativeReading::Nothing,
            "error" if text.is_empty() => NativeReading::Failed("unknown error".to_string()),
            "error" => NativeReading::Failed(text.to_string()),
            _ => NativeReading::Unavailable,
        }
    }
}

/// One sampled camera frame.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub width: usize,
    pub height: usize,
    /// Row-major RGBA, 4 bytes per pixel.
    pub rgba: Vec<u8>,
    pub native: NativeReading,
}

impl Frame {
    pub fn new(rgba: Vec<u8>, width: usize, height: usize) -> Self {
        Self { width, height, rgba, native: NativeReading::Unavailable }
    }

    pub fn with_native(mut self, native: NativeReading) -> Self {
        self.native = native;
        self
    }

    /// Luminance plane of the frame. Fails if the buffer is short, or if the
    /// dimensions overflow.
    pub fn greyscale(&self) -> Result<Vec<u8>, DecodeError> {
        let needed = self
            .width
            .checked_mul(self.height)
            .and_then(|pixels| pixels.checked_mul(4));
        match needed {
            Some(needed) if self.rgba.len() >= needed => {
                Ok(rgba_to_greyscale(&self.rgba, self.width, self.height))
            }
            _ => Err(DecodeError::ShortBuffer {
                len: self.rgba.len(),
                width: self.width,
                height: self.height,
            }),
        }
    }
}

/// Anything that can hand the scan loop a frame. `None` means "not ready yet".
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<Frame>;
}

/// A frame source with an exclusive acquire/release lifecycle.
pub trait Camera: FrameSource {
    fn acquire(&mut self, facing: Facing) -> Result<(), CameraError>;
    /// Idempotent.
    fn release(&mut self);
    fn is_active(&self) -> bool;
}

/// BT.601 luminance with integer weights: `(77R + 150G + 29B) >> 8`.
pub fn rgba_to_greyscale(rgba: &[u8], width: usize, height: usize) -> Vec<u8> {
    rgba.chunks_exact(4)
        .take(width.saturating_mul(height))
        .map(|px| {
            let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
            ((77 * r + 150 * g + 29 * b) >> 8) as u8
        })
        .collect()
}

/// Box-average `grey` down by an integer factor so its width fits `max_width`.
///
/// Returns the input untouched when it already fits.
pub fn fit_width(grey: Vec<u8>, width: usize, height: usize, max_width: usize) -> (Vec<u8>, usize, usize) {
    if max_width == 0 || width <= max_width {
        return (grey, width, height);
    }
    let factor = width.div_ceil(max_width);
    let (dw, dh) = (width / factor, height / factor);
    if dw == 0 || dh == 0 {
        return (grey, width, height);
    }

    let area = (factor * factor) as u32;
    let mut out = Vec::with_capacity(dw * dh);
    for dy in 0..dh {
        for dx in 0..dw {
            let mut sum = 0u32;
            for row in dy * factor..(dy + 1) * factor {
                let start = row * width + dx * factor;
                sum += grey[start..start + factor].iter().map(|&p| p as u32).sum::<u32>();
            }
            out.push(((sum + area / 2) / area) as u8);
        }
    }
    (out, dw, dh)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greyscale_weights() {
        let rgba = vec![128, 128, 128, 255, 0, 0, 0, 255, 255, 255, 0, 255];
        let grey = rgba_to_greyscale(&rgba, 3, 1);
        assert_eq!(grey[0], 128);
        assert_eq!(grey[1], 0);
        assert!(grey[2] > 220 && grey[2] < 230, "yellow luminance was {}", grey[2]);
    }

    #[test]
    fn short_buffer_is_an_error() {
        let frame = Frame::new(vec![0; 10], 100, 100);
        assert!(matches!(frame.greyscale(), Err(DecodeError::ShortBuffer { len: 10, .. })));
    }

    #[test]
    fn overflowing_dimensions_are_a_short_buffer() {
        let frame = Frame::new(vec![0; 16], usize::MAX / 2, 3);
        assert!(matches!(frame.greyscale(), Err(DecodeError::ShortBuffer { len: 16, height: 3, .. })));
        let frame = Frame::new(vec![0; 16], usize::MAX / 4 + 1, 1);
        assert!(frame.greyscale().is_err());
    }

    #[test]
    fn fit_width_averages_blocks() {
        let grey = vec![0, 100, 200, 56];
        let (out, w, h) = fit_width(grey, 2, 2, 1);
        assert_eq!((w, h), (1, 1));
        assert_eq!(out, vec![89]);
    }

    #[test]
    fn fit_width_keeps_small_frames() {
        let (out, w, h) = fit_width(vec![7; 12], 4, 3, 640);
        assert_eq!((w, h), (4, 3));
        assert_eq!(out.len(), 12);
    }

    #[test]
    fn fit_width_uses_integer_factor() {
        let (out, w, h) = fit_width(vec![50; 1280 * 720], 1280, 720, 640);
        assert_eq!((w, h), (640, 360));
        assert_eq!(out.len(), 640 * 360);
        assert!(out.iter().all(|&p| p == 50));
    }

    #[test]
    fn native_reading_from_host() {
        assert_eq!(NativeReading::from_host("found", "7"), NativeReading::Text("7".to_string()));
        assert_eq!(NativeReading::from_host("found", "  "), NativeReading::Nothing);
        assert_eq!(NativeReading::from_host("none", ""), NativeReading::Nothing);
        assert_eq!(
            NativeReading::from_host("error", "NotSupportedError"),
            NativeReading::Failed("NotSupportedError".to_string())
        );
        assert_eq!(NativeReading::from_host("", ""), NativeReading::Unavailable);
    }
}
