//! Kiosk surface: camera frames in, paired record on screen.

pub mod countdown;
pub mod decoder;
pub mod frame;
pub mod host;
pub mod machine;
pub mod scan;

pub use decoder::{FrameDecoder, NativeDecoder, RqrrDecoder, select_decoder};
pub use frame::{Camera, Frame, FrameSource, NativeReading};
pub use host::HostCamera;
pub use machine::{DEMO_PAYLOAD, KioskEvent, KioskMachine, KioskState, Outgoing, Pairing, Transition};
pub use scan::{ScanLoop, ScanState, ScanTick};
