//! `/api/kiosk/*` routes — the kiosk display driven by server-rendered fragments.
//!
//! The host owns the video element and timers. It reads the `data-*`
//! attributes on the returned fragment to decide what to do next:
//!   data-camera    — "on" while the kiosk wants the stream open
//!   data-facing    — "environment" | "user"
//!   data-scanning  — keep calling `kiosk_frame` every animation frame
//!   data-countdown — run the one-second `/api/kiosk/tick` timer

use crate::error::CameraError;
use crate::kiosk::{Camera, DEMO_PAYLOAD, Frame, HostCamera, KioskEvent, KioskMachine, NativeReading, Pairing};
use crate::pairing::normalize_sprite_path;
use crate::pairing::notice::Notice;
use crate::routes::util::{escape_html, get_param, parse_form_body};
use crate::state::{with_surfaces, with_surfaces_mut};

// ── GET /api/kiosk/status ──────────────────────────────────────────

pub fn handle_status_get(_query: &str) -> String {
    with_surfaces(|s| render(&s.kiosk))
}

// ── POST routes ────────────────────────────────────────────────────

/// Body: `native=true|false` — whether the host has a native detector.
pub fn handle_start_post(body: &str) -> String {
    let params = parse_form_body(body);
    let native_available = get_param(&params, "native") == Some("true");
    dispatch(KioskEvent::Start { native_available })
}

/// Body: `error=denied|unavailable&msg=...` — the host lost or never got the stream.
pub fn handle_camera_post(body: &str) -> String {
    let params = parse_form_body(body);
    let error = match get_param(&params, "error") {
        Some("denied") => CameraError::PermissionDenied,
        _ => CameraError::Unavailable(
            get_param(&params, "msg")
                .filter(|m| !m.is_empty())
                .unwrap_or("no camera found")
                .to_string(),
        ),
    };
    dispatch(KioskEvent::CameraFailed(error))
}

pub fn handle_tick_post(_body: &str) -> String {
    dispatch(KioskEvent::CountdownTick)
}

pub fn handle_reset_post(_body: &str) -> String {
    dispatch(KioskEvent::Reset)
}

pub fn handle_extend_post(_body: &str) -> String {
    dispatch(KioskEvent::Extend)
}

pub fn handle_flip_post(_body: &str) -> String {
    dispatch(KioskEvent::ToggleFacing)
}

/// Body: `raw=...` (optional). Without a payload the demo pet is used.
pub fn handle_simulate_post(body: &str) -> String {
    let params = parse_form_body(body);
    let raw = get_param(&params, "raw")
        .filter(|r| !r.trim().is_empty())
        .unwrap_or(DEMO_PAYLOAD);
    dispatch(KioskEvent::Simulate(raw.to_string()))
}

/// Body: `notice=<json>` — a message from another surface.
pub fn handle_notice_post(body: &str) -> String {
    let params = parse_form_body(body);
    let notice = get_param(&params, "notice").and_then(|json| serde_json::from_str::<Notice>(json).ok());
    match notice {
        Some(notice) => dispatch(KioskEvent::Notice(notice)),
        None => with_surfaces(|s| render(&s.kiosk)),
    }
}

/// GET `?at=<ms>` — JSON array of notices for the host to broadcast.
pub fn handle_notices_get(query: &str) -> String {
    let params = crate::routes::util::parse_query(query);
    let at = get_param(&params, "at").and_then(|v| v.parse().ok()).unwrap_or(0);
    let notices = with_surfaces_mut(|s| s.take_notices(at));
    serde_json::to_string(&notices).unwrap_or_else(|_| "[]".to_string())
}

/// One camera frame from the bridge. Empty string while nothing changed.
pub fn handle_frame(rgba: &[u8], width: usize, height: usize, native_status: &str, native_text: &str) -> String {
    with_surfaces_mut(|s| {
        let frame = Frame::new(rgba.to_vec(), width, height)
            .with_native(NativeReading::from_host(native_status, native_text));
        s.kiosk.camera_mut().push_frame(frame);
        let transition = s.kiosk.handle(KioskEvent::Frame);
        if transition.changes_view() { render(&s.kiosk) } else { String::new() }
    })
}

fn dispatch(event: KioskEvent) -> String {
    with_surfaces_mut(|s| {
        s.kiosk.handle(event);
        render(&s.kiosk)
    })
}

// ── HTML fragment builders ─────────────────────────────────────────

fn render(kiosk: &KioskMachine<HostCamera>) -> String {
    match kiosk.pairing() {
        Some(pairing) => paired_html(kiosk, pairing),
        None => idle_html(kiosk),
    }
}

fn idle_html(kiosk: &KioskMachine<HostCamera>) -> String {
    let camera_on = kiosk.camera().is_active();
    let status = match (kiosk.last_error(), camera_on) {
        (Some(err), _) => format!(r#"<p class="kiosk-error">{}</p>"#, escape_html(err)),
        (None, true) => r#"<p class="kiosk-status">Camera ready. Scanning…</p>"#.to_string(),
        (None, false) => r#"<p class="kiosk-status">Press “Start Scan”.</p>"#.to_string(),
    };
    let start_label = if kiosk.last_error().is_some() && !camera_on { "Retry Camera" } else { "Start Scan" };
    let start_button = if camera_on {
        String::new()
    } else {
        format!(
            r##"<button class="btn" hx-post="/api/kiosk/start" hx-vals='js:{{native: "BarcodeDetector" in self}}' hx-target="#kiosk" hx-swap="outerHTML">{}</button>"##,
            start_label
        )
    };
    let badge = if kiosk.is_scanning() { "Scanning…" } else { "Idle" };

    format!(
        r##"<div id="kiosk" data-state="idle" data-camera="{camera}" data-facing="{facing}" data-scanning="{scanning}">
  <span class="badge">{badge}</span>
  <h2>Scan your pet</h2>
  {status}
  <div class="controls">
    {start_button}
    <button class="btn" hx-post="/api/kiosk/flip" hx-target="#kiosk" hx-swap="outerHTML">Flip Camera</button>
    <button class="btn" hx-post="/api/kiosk/simulate" hx-target="#kiosk" hx-swap="outerHTML">Simulate Scan</button>
  </div>
</div>"##,
        camera = if camera_on { "on" } else { "off" },
        facing = kiosk.facing().as_str(),
        scanning = kiosk.is_scanning(),
        badge = badge,
        status = status,
        start_button = start_button,
    )
}

fn paired_html(kiosk: &KioskMachine<HostCamera>, pairing: &Pairing) -> String {
    let record = &pairing.record;
    let sprite = normalize_sprite_path(&record.sprite, &kiosk.config().asset_root);
    let remaining = kiosk.remaining().unwrap_or(0);

    let details = if pairing.is_legacy() {
        r#"<div class="muted extra-line">Legacy code payload</div>"#.to_string()
    } else {
        let pct = record.progress_percent();
        let quip = if record.quip.is_empty() {
            String::new()
        } else {
            format!(r#"<p class="quip">{}</p>"#, escape_html(&record.quip))
        };
        format!(
            r#"<div class="muted extra-line">{stats}</div>
  <div class="progress" role="progressbar" aria-valuenow="{pct}" aria-valuemin="0" aria-valuemax="100"><div class="progress-fill" style="width:{pct}%"></div></div>
  <div class="muted">{pct}% to next level ({points}/{next} pts)</div>
  {quip}"#,
            stats = escape_html(&pairing.stats_line()),
            pct = pct,
            points = record.points_total,
            next = record.next_level_points(),
            quip = quip,
        )
    };

    format!(
        r##"<div id="kiosk" data-state="paired" data-camera="off" data-facing="{facing}" data-scanning="false" data-countdown="{remaining}">
  <img class="pet-sprite" src="{sprite}" alt="{pet} sprite" />
  <h2 id="pairLabel">{title}</h2>
  {details}
  <p class="countdown">Returning in <span>{remaining}</span>s</p>
  <div class="controls">
    <button class="btn" hx-post="/api/kiosk/extend" hx-target="#kiosk" hx-swap="outerHTML">+{extend}s</button>
    <button class="btn" hx-post="/api/kiosk/reset" hx-target="#kiosk" hx-swap="outerHTML">Done</button>
  </div>
</div>"##,
        facing = kiosk.facing().as_str(),
        remaining = remaining,
        sprite = escape_html(&sprite),
        pet = escape_html(&record.pet_name),
        title = escape_html(&pairing.title()),
        details = details,
        extend = kiosk.config().extend_secs,
    )
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::reset_surfaces;

    #[test]
    fn idle_status_offers_start() {
        reset_surfaces();
        let html = handle_status_get("");
        assert!(html.contains(r#"data-state="idle""#));
        assert!(html.contains(r#"data-camera="off""#));
        assert!(html.contains(
            r##"hx-post="/api/kiosk/start" hx-vals='js:{native: "BarcodeDetector" in self}' hx-target="#kiosk" hx-swap="outerHTML">Start Scan</button>"##
        ));
    }

    #[test]
    fn start_turns_camera_on() {
        reset_surfaces();
        let html = handle_start_post("native=false");
        assert!(html.contains(r#"data-camera="on""#));
        assert!(html.contains(r#"data-scanning="true""#));
        assert!(html.contains("Camera ready"));
    }

    #[test]
    fn simulate_defaults_to_demo_pet() {
        reset_surfaces();
        let html = handle_simulate_post("");
        assert!(html.contains(r#"data-state="paired""#));
        assert!(html.contains("Demo User — Mochi"));
        assert!(html.contains("Discount 2/5 • 777 pts"));
        assert!(html.contains("../assets/sprites/mochi.png"));
        assert!(html.contains(r#"data-countdown="20""#));
    }

    #[test]
    fn legacy_code_view() {
        reset_surfaces();
        let html = handle_simulate_post("raw=zzzz");
        assert!(html.contains(">ZZZZ</h2>"));
        assert!(html.contains("Legacy code payload"));
        assert!(!html.contains("progressbar"));
    }

    #[test]
    fn unreadable_payload_shows_error() {
        reset_surfaces();
        let html = handle_simulate_post("raw=7");
        assert!(html.contains(r#"data-state="idle""#));
        assert!(html.contains("Could not read code, try again."));
    }

    #[test]
    fn payload_text_is_escaped() {
        reset_surfaces();
        let body = "raw=%7B%22n%22%3A%22%3Cb%3EEvil%22%7D";
        let html = handle_simulate_post(body);
        assert!(html.contains("&lt;b&gt;Evil"));
        assert!(!html.contains("<b>Evil"));
    }

    #[test]
    fn extend_and_tick_update_countdown() {
        reset_surfaces();
        handle_simulate_post("");
        let html = handle_extend_post("");
        assert!(html.contains(r#"data-countdown="30""#));
        let html = handle_tick_post("");
        assert!(html.contains(r#"data-countdown="29""#));
    }

    #[test]
    fn reset_returns_to_idle() {
        reset_surfaces();
        handle_simulate_post("");
        let html = handle_reset_post("");
        assert!(html.contains(r#"data-state="idle""#));
    }

    #[test]
    fn camera_denied_offers_retry() {
        reset_surfaces();
        handle_start_post("native=false");
        let html = handle_camera_post("error=denied");
        assert!(html.contains(r#"data-camera="off""#));
        assert!(html.contains("Camera permission denied or unavailable."));
        assert!(html.contains("Retry Camera"));
    }

    #[test]
    fn flip_changes_facing() {
        reset_surfaces();
        let html = handle_flip_post("");
        assert!(html.contains(r#"data-facing="user""#));
    }

    #[test]
    fn frames_are_silent_until_pairing() {
        reset_surfaces();
        handle_start_post("native=true");
        assert_eq!(handle_frame(&[0; 16], 2, 2, "none", ""), "");
        let html = handle_frame(&[0; 16], 2, 2, "found", "1");
        assert!(html.contains("Demo User — Mochi"));
    }

    #[test]
    fn notices_drain_once() {
        reset_surfaces();
        handle_simulate_post("");
        let json = handle_notices_get("?at=5");
        assert!(json.contains(r#""type":"kiosk:paired""#));
        assert!(json.contains(r#""at":5"#));
        assert_eq!(handle_notices_get("?at=6"), "[]");
    }

    #[test]
    fn broadcast_notice_ignored_by_default() {
        reset_surfaces();
        let notice = Notice::show_qr("1", 0).to_json().unwrap();
        let body = format!("notice={}", crate::routes::util::percent_encode(&notice));
        let html = handle_notice_post(&body);
        assert!(html.contains(r#"data-state="idle""#));
    }
}
