//! `/api/mobile/*` routes — pet list, current pet view, QR display and session code.
//!
//! Query params for /api/mobile/qr:
//!   kind — "full" (default), "compact" or "index"
//!   at   — host clock in ms, stamped on the `mobile:show_qr` notice
//!
//! Body params for POST /api/mobile/select:
//!   index — dataset position (0-based), or
//!   url   — a deep link to apply
//!
//! Body params for POST /api/mobile/notice:
//!   notice — a `kiosk:paired` / `kiosk:reset` message from a kiosk

use crate::mobile::{MobileSurface, PayloadKind, qr_image_url};
use crate::pairing::normalize_sprite_path;
use crate::pairing::notice::Notice;
use crate::routes::util::{escape_html, get_param, parse_form_body, parse_query};
use crate::state::{with_surfaces, with_surfaces_mut};

// ── GET routes ─────────────────────────────────────────────────────

/// GET /api/mobile/home — landing hint for the current pet.
pub fn handle_home_get(_query: &str) -> String {
    with_surfaces(|s| home_html(&s.mobile))
}

/// GET /api/mobile/pets — selectable pet cards with their deep links.
pub fn handle_pets_get(_query: &str) -> String {
    with_surfaces(|s| {
        let asset_root = &s.kiosk.config().asset_root;
        let cards: String = s
            .mobile
            .dataset()
            .iter()
            .enumerate()
            .map(|(i, pet)| {
                let link = s.mobile.deep_link(i);
                format!(
                    r##"<div class="pet">
  <img src="{sprite}" alt="{pet} sprite" />
  <div class="pet-name">{pet}</div>
  <div class="muted">{owner}</div>
  <div class="muted">Discount {d}/5 • {p} pts</div>
  <div class="muted deep-link">Deep link: <a class="link" href="{link}">{link}</a></div>
  <button class="btn" hx-post="/api/mobile/select" hx-vals='{{"index": "{i}"}}' hx-target="#mobile" hx-swap="innerHTML">Use this</button>
</div>"##,
                    sprite = escape_html(&normalize_sprite_path(&pet.sprite, asset_root)),
                    pet = escape_html(&pet.pet_name),
                    owner = escape_html(&pet.owner_name),
                    d = pet.discount_level,
                    p = pet.points_total,
                    link = escape_html(&link),
                    i = i,
                )
            })
            .collect();
        format!(r#"<div id="petGrid" class="pet-grid">{}</div>"#, cards)
    })
}

/// GET /api/mobile/view — the current pet with its "Show QR" button.
pub fn handle_view_get(_query: &str) -> String {
    with_surfaces(|s| view_html(&s.mobile, &s.kiosk.config().asset_root))
}

/// GET /api/mobile/qr?kind=full&at=<ms>
pub fn handle_qr_get(query: &str) -> String {
    let params = parse_query(query);
    let kind = PayloadKind::parse(get_param(&params, "kind").unwrap_or(""));
    let at = get_param(&params, "at").and_then(|v| v.parse().ok()).unwrap_or(0);

    let payload = match with_surfaces(|s| s.mobile.payload(kind)) {
        Ok(Some(payload)) => payload,
        Ok(None) => return error_html("No pet selected yet."),
        Err(e) => return error_html(&e.to_string()),
    };
    let notice = Notice::show_qr(&payload, at).to_json().unwrap_or_default();

    format!(
        r#"<div id="qrWrap" data-notice="{notice}">
  <img id="qrImg" src="{src}" alt="Pairing QR code" />
  <code class="payload">{payload}</code>
</div>"#,
        notice = escape_html(&notice),
        src = escape_html(&qr_image_url(&payload)),
        payload = escape_html(&payload),
    )
}

/// GET /api/mobile/session — the session code, created on first use.
pub fn handle_session_get(_query: &str) -> String {
    let code = with_surfaces_mut(|s| s.mobile.session_mut().get_or_create_code());
    code_html(&code)
}

// ── POST routes ────────────────────────────────────────────────────

/// POST /api/mobile/select — `index=N` or `url=<deep link>`.
pub fn handle_select_post(body: &str) -> String {
    let params = parse_form_body(body);
    with_surfaces_mut(|s| {
        let selected = if let Some(url) = get_param(&params, "url") {
            s.mobile.apply_deep_link(url).is_some()
        } else {
            get_param(&params, "index")
                .and_then(|v| v.trim().parse::<usize>().ok())
                .is_some_and(|i| s.mobile.select(i))
        };
        if selected {
            view_html(&s.mobile, &s.kiosk.config().asset_root)
        } else {
            home_html(&s.mobile)
        }
    })
}

/// POST /api/mobile/session — `code=XXXX` replaces the session code.
pub fn handle_session_post(body: &str) -> String {
    let params = parse_form_body(body);
    let code = get_param(&params, "code").unwrap_or("");
    with_surfaces_mut(|s| {
        let session = s.mobile.session_mut();
        match session.set_code(code) {
            Ok(()) => code_html(&session.get_or_create_code()),
            Err(e) => error_html(&e.to_string()),
        }
    })
}

/// POST /api/mobile/notice — `notice=<json>`. Unknown messages leave the
/// status unchanged.
pub fn handle_notice_post(body: &str) -> String {
    let params = parse_form_body(body);
    let notice = get_param(&params, "notice").and_then(Notice::parse);
    with_surfaces_mut(|s| {
        if let Some(notice) = notice {
            s.mobile.receive_notice(&notice);
        }
        kiosk_status_html(&s.mobile)
    })
}

// ── HTML fragment builders ─────────────────────────────────────────

fn home_html(mobile: &MobileSurface) -> String {
    let link = escape_html(&mobile.deep_link(0));
    match mobile.current() {
        Some(p) => format!(
            r#"<p id="currentHint">Current: {owner} — {pet} (Discount {d}/5, {pts} pts)<br><span class="muted">Tip: deep link example → <a class="link" href="{link}">{link}</a></span></p>"#,
            owner = escape_html(&p.owner_name),
            pet = escape_html(&p.pet_name),
            d = p.discount_level,
            pts = p.points_total,
            link = link,
        ),
        None => r#"<p id="currentHint">No pet selected yet.</p>"#.to_string(),
    }
}

fn view_html(mobile: &MobileSurface, asset_root: &str) -> String {
    let (Some(pet), Some(summary)) = (mobile.current(), mobile.summary()) else {
        return home_html(mobile);
    };
    format!(
        r##"<div id="view" data-index="{index}">
  <div id="character" class="character" style="background-image: url('{sprite}')"></div>
  <div id="petStats">{summary}</div>
  <button id="btnShowQR" class="btn" hx-get="/api/mobile/qr" hx-vals='js:{{at: Date.now()}}' hx-target="#qrSlot" hx-swap="innerHTML">Show QR</button>
  <div id="qrSlot"></div>
  {status}
</div>"##,
        index = mobile.selected_index(),
        status = kiosk_status_html(mobile),
        sprite = escape_html(&normalize_sprite_path(&pet.sprite, asset_root)),
        summary = escape_html(&summary),
    )
}

fn kiosk_status_html(mobile: &MobileSurface) -> String {
    let (paired, text) = if mobile.is_kiosk_paired() {
        (true, "Showing on the kiosk.")
    } else {
        (false, "Not on a kiosk yet.")
    };
    format!(r#"<p id="kioskStatus" class="muted" data-paired="{}">{}</p>"#, paired, text)
}

fn code_html(code: &str) -> String {
    format!(r#"<span class="session-code">{}</span>"#, escape_html(code))
}

fn error_html(msg: &str) -> String {
    format!(r#"<span class="text-error">{}</span>"#, escape_html(msg))
}

// ── Tests ──────────────────────────────────────────────────────────
