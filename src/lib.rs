//! HotPet pairing surfaces, compiled to WASM.
//!
//! Exports `handle_request(method, path, query, body)` for the Web Worker
//! bridge to call. Uses `matchit` for URL routing — the same router
//! engine that powers Axum.
//!
//! Two surfaces share one module instance:
//! `/api/kiosk/*` drives the kiosk display (scan, pair, countdown) and
//! `/api/mobile/*` drives the owner's phone (pick a pet, show its QR).
//! Camera frames skip the router and arrive through `kiosk_frame`.

use serde::Serialize;
use wasm_bindgen::prelude::*;

pub mod config;
pub mod error;
pub mod kiosk;
pub mod mobile;
pub mod pairing;
pub mod routes;
pub mod session;
pub mod state;

use crate::error::PairingResult;
use crate::state::{with_surfaces, with_surfaces_mut};

/// Process an HTTP-like request and return an HTML fragment.
///
/// Called from JavaScript (Web Worker) via wasm-bindgen.
///
/// # Arguments
/// * `method` — HTTP method (e.g., "GET", "POST")
/// * `path`   — URL path (e.g., "/api/kiosk/status")
/// * `query`  — Query string (e.g., "?kind=compact")
/// * `body`   — Request body (e.g., POST form data). Empty string for GET requests.
///
/// # Returns
/// An HTML string fragment suitable for HTMX to swap into the DOM.
/// `/api/kiosk/notices` is the exception and returns a JSON array.
#[wasm_bindgen]
pub fn handle_request(method: &str, path: &str, query: &str, body: &str) -> String {
    let mut router = matchit::Router::new();

    // Kiosk display
    router.insert("/api/kiosk/status", "kiosk_status").ok();
    router.insert("/api/kiosk/start", "kiosk_start").ok();
    router.insert("/api/kiosk/camera", "kiosk_camera").ok();
    router.insert("/api/kiosk/tick", "kiosk_tick").ok();
    router.insert("/api/kiosk/reset", "kiosk_reset").ok();
    router.insert("/api/kiosk/extend", "kiosk_extend").ok();
    router.insert("/api/kiosk/flip", "kiosk_flip").ok();
    router.insert("/api/kiosk/simulate", "kiosk_simulate").ok();
    router.insert("/api/kiosk/notice", "kiosk_notice").ok();
    router.insert("/api/kiosk/notices", "kiosk_notices").ok();

    // Mobile surface
    router.insert("/api/mobile/home", "mobile_home").ok();
    router.insert("/api/mobile/pets", "mobile_pets").ok();
    router.insert("/api/mobile/view", "mobile_view").ok();
    router.insert("/api/mobile/qr", "mobile_qr").ok();
    router.insert("/api/mobile/select", "mobile_select").ok();
    router.insert("/api/mobile/session", "mobile_session").ok();
    router.insert("/api/mobile/notice", "mobile_notice").ok();

    match router.at(path) {
        Ok(matched) => match (*matched.value, method) {
            ("kiosk_status", "GET") => routes::kiosk::handle_status_get(query),
            ("kiosk_notices", "GET") => routes::kiosk::handle_notices_get(query),
            ("kiosk_start", "POST") => routes::kiosk::handle_start_post(body),
            ("kiosk_camera", "POST") => routes::kiosk::handle_camera_post(body),
            ("kiosk_tick", "POST") => routes::kiosk::handle_tick_post(body),
            ("kiosk_reset", "POST") => routes::kiosk::handle_reset_post(body),
            ("kiosk_extend", "POST") => routes::kiosk::handle_extend_post(body),
            ("kiosk_flip", "POST") => routes::kiosk::handle_flip_post(body),
            ("kiosk_simulate", "POST") => routes::kiosk::handle_simulate_post(body),
            ("kiosk_notice", "POST") => routes::kiosk::handle_notice_post(body),

            ("mobile_home", "GET") => routes::mobile::handle_home_get(query),
            ("mobile_pets", "GET") => routes::mobile::handle_pets_get(query),
            ("mobile_view", "GET") => routes::mobile::handle_view_get(query),
            ("mobile_qr", "GET") => routes::mobile::handle_qr_get(query),
            ("mobile_session", "GET") => routes::mobile::handle_session_get(query),
            ("mobile_select", "POST") => routes::mobile::handle_select_post(body),
            ("mobile_session", "POST") => routes::mobile::handle_session_post(body),
            ("mobile_notice", "POST") => routes::mobile::handle_notice_post(body),

            _ => method_not_allowed(),
        },
        Err(_) => not_found(),
    }
}

/// Feed one camera frame to the kiosk.
///
/// `native_status` is the host detector's verdict for this frame:
/// "found" (with `native_text`), "none", "error", or "" when the host has
/// no detector. Returns the new kiosk fragment, or "" while the view is
/// unchanged so the host can skip the swap.
#[wasm_bindgen]
pub fn kiosk_frame(rgba: &[u8], width: usize, height: usize, native_status: &str, native_text: &str) -> String {
    routes::kiosk::handle_frame(rgba, width, height, native_status, native_text)
}

/// Replace the pet dataset on both surfaces. "" on success, else an error JSON.
#[wasm_bindgen]
pub fn load_dataset(json: &str) -> String {
    bridge_result(with_surfaces_mut(|s| s.load_dataset(json)))
}

/// Apply kiosk options (`countdown_secs`, `extend_secs`, `facing`, ...).
#[wasm_bindgen]
pub fn configure_kiosk(json: &str) -> String {
    bridge_result(with_surfaces_mut(|s| s.configure_kiosk(json)))
}

/// Tell the mobile surface how its own URLs look, for deep links.
#[wasm_bindgen]
pub fn configure_links(json: &str) -> String {
    bridge_result(with_surfaces_mut(|s| s.configure_links(json)))
}

/// Restore the persisted mobile session (base64 Yrs update).
#[wasm_bindgen]
pub fn restore_session(state_b64: &str) -> String {
    bridge_result(with_surfaces_mut(|s| s.restore_session(state_b64)))
}

/// Current mobile session as a base64 Yrs update, for the host to persist.
#[wasm_bindgen]
pub fn session_state() -> String {
    with_surfaces(|s| s.mobile.session().encode())
}

fn bridge_result(result: PairingResult<()>) -> String {
    match result {
        Ok(()) => String::new(),
        Err(e) => error_json(&e),
    }
}

fn error_json<E: Serialize + std::fmt::Display>(error: &E) -> String {
    serde_json::to_string(error).unwrap_or_else(|_| {
        serde_json::json!({ "kind": "Unknown", "message": error.to_string() }).to_string()
    })
}

/// Install a stderr subscriber for native builds and tests.
/// Filter comes from `RUST_LOG`, falling back to `hotpet_kiosk=debug`.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hotpet_kiosk=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .ok();
}

fn not_found() -> String {
    r#"<span class="text-error">404 — route not found</span>"#.to_string()
}

fn method_not_allowed() -> String {
    r#"<span class="text-error">405 — method not allowed</span>"#.to_string()
}
