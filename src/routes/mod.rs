pub mod kiosk;
pub mod mobile;
pub mod util;
