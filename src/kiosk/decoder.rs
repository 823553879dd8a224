//! Frame decoders: one capability, two interchangeable strategies.
//!
//! - [`NativeDecoder`] trusts the host's platform detector (e.g. the
//!   browser's `BarcodeDetector`), whose reading travels with the frame.
//! - [`RqrrDecoder`] is the pure Rust fallback built on `rqrr`, trying a short
//!   preprocessing cascade and returning on the first successful decode.
//!
//! A native failure is not fatal; the scan loop swaps in the software decoder.

use rqrr::PreparedImage;
use tracing::debug;

use super::frame::{Frame, NativeReading, fit_width};
use crate::config::DecoderPreference;
use crate::error::DecodeError;

pub trait FrameDecoder {
    fn name(&self) -> &'static str;

    /// Inspect one frame. `Ok(None)` means no code in this frame.
    fn decode(&mut self, frame: &Frame) -> Result<Option<String>, DecodeError>;

    /// Whether a runtime error should swap this decoder for the software one.
    fn downgrades(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct NativeDecoder;

impl FrameDecoder for NativeDecoder {
    fn name(&self) -> &'static str {
        "native"
    }

    fn decode(&mut self, frame: &Frame) -> Result<Option<String>, DecodeError> {
        match &frame.native {
            NativeReading::Text(text) => Ok(Some(text.clone())),
            NativeReading::Nothing => Ok(None),
            NativeReading::Failed(msg) => Err(DecodeError::Primitive(msg.clone())),
            NativeReading::Unavailable => Err(DecodeError::Unavailable),
        }
    }

    fn downgrades(&self) -> bool {
        true
    }
}

/// Software decoder. Frames wider than `working_width` are box-downscaled first.
#[derive(Debug)]
pub struct RqrrDecoder {
    working_width: usize,
}

impl RqrrDecoder {
    pub fn new(working_width: usize) -> Self {
        Self { working_width }
    }
}

impl FrameDecoder for RqrrDecoder {
    fn name(&self) -> &'static str {
        "rqrr"
    }

    fn decode(&mut self, frame: &Frame) -> Result<Option<String>, DecodeError> {
        let grey = frame.greyscale()?;
        let (grey, w, h) = fit_width(grey, frame.width, frame.height, self.working_width);
        if w == 0 || h == 0 {
            return Ok(None);
        }
        Ok(run_cascade(&grey, w, h))
    }
}

/// Pick a decoder at scan start from the configured preference and what the host supports.
pub fn select_decoder(
    preference: DecoderPreference,
    native_available: bool,
    working_width: usize,
) -> Box<dyn FrameDecoder> {
    match preference {
        DecoderPreference::Native | DecoderPreference::Auto if native_available => Box::new(NativeDecoder),
        DecoderPreference::Native => {
            debug!("native decoder requested but unavailable, using software");
            Box::new(RqrrDecoder::new(working_width))
        }
        _ => Box::new(RqrrDecoder::new(working_width)),
    }
}

// ── Cascade ────────────────────────────────────────────────────────

fn run_cascade(grey: &[u8], width: usize, height: usize) -> Option<String> {
    // Raw greyscale
    if let Some(text) = try_decode_greyscale(grey, width, height) {
        return Some(text);
    }

    // Light blur smooths sensor noise and moiré from phone screens
    let blurred = gaussian_blur(grey, width, height, 1);
    if let Some(text) = try_decode_greyscale(&blurred, width, height) {
        return Some(text);
    }

    // Local mean threshold for uneven lighting and screen glare
    let adaptive = adaptive_threshold(grey, width, height, 15, 8);
    if let Some(text) = try_decode_greyscale(&adaptive, width, height) {
        return Some(text);
    }

    // Global Otsu binarization on the blurred frame
    let threshold = otsu_threshold(&blurred);
    if let Some(text) = try_decode_bitmap(&blurred, width, height, threshold) {
        return Some(text);
    }

    // Code pressed up against the frame edge
    let (padded, pw, ph) = add_quiet_zone(grey, width, height, 20);
    try_decode_greyscale(&padded, pw, ph)
}

fn try_decode_greyscale(grey: &[u8], w: usize, h: usize) -> Option<String> {
    let mut img = PreparedImage::prepare_from_greyscale(w, h, |x, y| grey[y * w + x]);
    img.detect_grids()
        .iter()
        .find_map(|grid| grid.decode().ok())
        .map(|(_, content)| content)
}

fn try_decode_bitmap(grey: &[u8], w: usize, h: usize, threshold: u8) -> Option<String> {
    let mut img = PreparedImage::prepare_from_bitmap(w, h, |x, y| grey[y * w + x] < threshold);
    img.detect_grids()
        .iter()
        .find_map(|grid| grid.decode().ok())
        .map(|(_, content)| content)
}

/// Separable 5-tap `[1, 4, 6, 4, 1] / 16` blur, edges clamped.
fn gaussian_blur(grey: &[u8], width: usize, height: usize, passes: usize) -> Vec<u8> {
    const TAPS: [(isize, u32); 5] = [(-2, 1), (-1, 4), (0, 6), (1, 4), (2, 1)];
    let mut current = grey.to_vec();
    let mut temp = vec![0u8; width * height];

    for _ in 0..passes {
        for y in 0..height {
            let row = &current[y * width..(y + 1) * width];
            for x in 0..width {
                let sum: u32 = TAPS
                    .iter()
                    .map(|&(d, k)| k * row[clamp(x, d, width)] as u32)
                    .sum();
                temp[y * width + x] = (sum >> 4) as u8;
            }
        }
        for y in 0..height {
            for x in 0..width {
                let sum: u32 = TAPS
                    .iter()
                    .map(|&(d, k)| k * temp[clamp(y, d, height) * width + x] as u32)
                    .sum();
                current[y * width + x] = (sum >> 4) as u8;
            }
        }
    }
    current
}

fn clamp(i: usize, delta: isize, len: usize) -> usize {
    (i as isize + delta).clamp(0, len as isize - 1) as usize
}

/// Threshold each pixel against the mean of its `(2 * block + 1)²` window,
/// biased by `c` toward dark. Uses an integral image.
fn adaptive_threshold(grey: &[u8], width: usize, height: usize, block: usize, c: i64) -> Vec<u8> {
    let iw = width + 1;
    let mut integral = vec![0i64; iw * (height + 1)];
    for y in 0..height {
        let mut row_sum = 0i64;
        for x in 0..width {
            row_sum += grey[y * width + x] as i64;
            integral[(y + 1) * iw + x + 1] = row_sum + integral[y * iw + x + 1];
        }
    }

    let mut out = vec![0u8; width * height];
    for y in 0..height {
        let (y0, y1) = (y.saturating_sub(block), (y + block + 1).min(height));
        for x in 0..width {
            let (x0, x1) = (x.saturating_sub(block), (x + block + 1).min(width));
            let area = ((y1 - y0) * (x1 - x0)) as i64;
            let sum = integral[y1 * iw + x1] - integral[y0 * iw + x1] - integral[y1 * iw + x0]
                + integral[y0 * iw + x0];
            let pixel = grey[y * width + x] as i64;
            out[y * width + x] = if pixel < sum / area - c { 0 } else { 255 };
        }
    }
    out
}

/// Otsu's global threshold: maximizes between-class variance of the histogram.
fn otsu_threshold(grey: &[u8]) -> u8 {
    let mut hist = [0u32; 256];
    for &p in grey {
        hist[p as usize] += 1;
    }

    let total = grey.len() as f64;
    let sum_all: f64 = hist.iter().enumerate().map(|(i, &n)| i as f64 * n as f64).sum();

    let (mut best, mut best_variance) = (0u8, 0.0f64);
    let (mut weight_bg, mut sum_bg) = (0.0f64, 0.0f64);
    for (t, &count) in hist.iter().enumerate() {
        weight_bg += count as f64;
        if weight_bg == 0.0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0.0 {
            break;
        }
        sum_bg += t as f64 * count as f64;
        let diff = sum_bg / weight_bg - (sum_all - sum_bg) / weight_fg;
        let variance = weight_bg * weight_fg * diff * diff;
        if variance > best_variance {
            best_variance = variance;
            best = t as u8;
        }
    }
    best
}

/// Surround the image with a white border of `pad` pixels.
fn add_quiet_zone(grey: &[u8], width: usize, height: usize, pad: usize) -> (Vec<u8>, usize, usize) {
    let (nw, nh) = (width + 2 * pad, height + 2 * pad);
    let mut out = vec![255u8; nw * nh];
    for (y, row) in grey.chunks_exact(width).take(height).enumerate() {
        let start = (y + pad) * nw + pad;
        out[start..start + width].copy_from_slice(row);
    }
    (out, nw, nh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kiosk::machine::DEMO_PAYLOAD;
    use crate::pairing::{PayloadFormat, decode_tagged};
    use qrcode::{Color, QrCode};

    fn frame(native: NativeReading) -> Frame {
        Frame::new(vec![128; 4 * 4 * 4], 4, 4).with_native(native)
    }

    /// Render `text` as black-on-white RGBA, `module_px` pixels per module and
    /// `margin` white modules around the symbol.
    fn qr_frame(text: &str, module_px: usize, margin: usize) -> Frame {
        let code = QrCode::new(text.as_bytes()).unwrap();
        let modules = code.width();
        let colors = code.to_colors();
        let side = (modules + 2 * margin) * module_px;
        let inside = margin..margin + modules;

        let mut rgba = vec![255u8; side * side * 4];
        for y in 0..side {
            for x in 0..side {
                let (mx, my) = (x / module_px, y / module_px);
                let dark = inside.contains(&mx)
                    && inside.contains(&my)
                    && colors[(my - margin) * modules + (mx - margin)] == Color::Dark;
                if dark {
                    let i = (y * side + x) * 4;
                    rgba[i..i + 3].fill(0);
                }
            }
        }
        Frame::new(rgba, side, side)
    }

    #[test]
    fn rqrr_reads_rendered_payload() {
        let mut decoder = RqrrDecoder::new(640);
        let text = decoder.decode(&qr_frame(DEMO_PAYLOAD, 6, 4)).unwrap();
        assert_eq!(text.as_deref(), Some(DEMO_PAYLOAD));

        let decoded = decode_tagged(DEMO_PAYLOAD).unwrap();
        assert_eq!(decoded.format, PayloadFormat::Full);
        assert_eq!(decoded.partial.pet_name.as_deref(), Some("Mochi"));
    }

    #[test]
    fn rqrr_reads_payload_wider_than_working_width() {
        let frame = qr_frame(DEMO_PAYLOAD, 20, 4);
        assert!(frame.width > 640);
        let mut decoder = RqrrDecoder::new(640);
        assert_eq!(decoder.decode(&frame).unwrap().as_deref(), Some(DEMO_PAYLOAD));
    }

    #[test]
    fn rqrr_reads_code_touching_the_frame_edge() {
        let mut decoder = RqrrDecoder::new(640);
        let text = decoder.decode(&qr_frame("HOTPETV1:eyJ2IjoxfQ", 4, 0)).unwrap();
        assert_eq!(text.as_deref(), Some("HOTPETV1:eyJ2IjoxfQ"));
    }

    #[test]
    fn rqrr_reads_every_payload_kind() {
        let mut decoder = RqrrDecoder::new(640);
        for text in [r#"{"u":"Iza","n":"Chub Shrimp","d":3,"p":1200,"m":2000}"#, r#"{"i":3}"#, "K7QP"] {
            let found = decoder.decode(&qr_frame(text, 5, 4)).unwrap();
            assert_eq!(found.as_deref(), Some(text));
        }
    }

    #[test]
    fn native_decoder_reads_host_text() {
        let mut decoder = NativeDecoder;
        let text = decoder.decode(&frame(NativeReading::Text("HOTPETV1:abc".into()))).unwrap();
        assert_eq!(text.as_deref(), Some("HOTPETV1:abc"));
        assert_eq!(decoder.decode(&frame(NativeReading::Nothing)).unwrap(), None);
    }

    #[test]
    fn native_decoder_surfaces_primitive_errors() {
        let mut decoder = NativeDecoder;
        assert_eq!(
            decoder.decode(&frame(NativeReading::Failed("boom".into()))),
            Err(DecodeError::Primitive("boom".into()))
        );
        assert_eq!(decoder.decode(&frame(NativeReading::Unavailable)), Err(DecodeError::Unavailable));
        assert!(decoder.downgrades());
    }

    #[test]
    fn rqrr_blank_frame_finds_nothing() {
        let mut decoder = RqrrDecoder::new(640);
        let blank = Frame::new(vec![200; 32 * 32 * 4], 32, 32);
        assert_eq!(decoder.decode(&blank), Ok(None));
        assert!(!decoder.downgrades());
    }

    #[test]
    fn rqrr_short_buffer_is_an_error() {
        let mut decoder = RqrrDecoder::new(640);
        let short = Frame::new(vec![0; 10], 100, 100);
        assert!(matches!(decoder.decode(&short), Err(DecodeError::ShortBuffer { .. })));
    }

    #[test]
    fn selection_follows_preference_and_capability() {
        assert_eq!(select_decoder(DecoderPreference::Auto, true, 640).name(), "native");
        assert_eq!(select_decoder(DecoderPreference::Auto, false, 640).name(), "rqrr");
        assert_eq!(select_decoder(DecoderPreference::Native, false, 640).name(), "rqrr");
        assert_eq!(select_decoder(DecoderPreference::Software, true, 640).name(), "rqrr");
    }

    #[test]
    fn gaussian_blur_smooths_spike() {
        let mut grey = vec![0u8; 5 * 5];
        grey[12] = 255;
        let blurred = gaussian_blur(&grey, 5, 5, 1);
        assert_eq!(blurred.len(), 25);
        assert!(blurred[12] < 255);
        assert!(blurred[11] > 0);
    }

    #[test]
    fn adaptive_threshold_keeps_bright_regions() {
        let grey: Vec<u8> = (0..100).map(|i| if i % 10 < 5 { 30 } else { 220 }).collect();
        let out = adaptive_threshold(&grey, 10, 10, 3, 5);
        assert_eq!(out[9], 255);
        assert_eq!(out[5 * 10 + 4], 0);
    }

    #[test]
    fn otsu_splits_bimodal_histogram() {
        let grey: Vec<u8> = (0..50u8).chain((0..50u8).map(|i| 200 + i)).collect();
        let t = otsu_threshold(&grey);
        assert!((49..200).contains(&t), "otsu threshold was {}", t);
    }

    #[test]
    fn quiet_zone_pads_with_white() {
        let (padded, nw, nh) = add_quiet_zone(&[100; 10 * 10], 10, 10, 5);
        assert_eq!((nw, nh), (20, 20));
        assert_eq!(padded[0], 255);
        assert_eq!(padded[5 * 20 + 5], 100);
        assert_eq!(padded[14 * 20 + 14], 100);
        assert_eq!(padded[15 * 20 + 15], 255);
    }
}
