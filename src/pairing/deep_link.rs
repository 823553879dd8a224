//! Demo deep links: `demopet{N}` (1-based) → dataset index `N-1`.
//!
//! Three equivalent spellings are accepted, checked in this order:
//! fragment (`#demopet3`), query (`?demopet=3`), path (`/mobile/demopet3`).

use crate::config::LinkConfig;
use crate::routes::util::{get_param, parse_query};

const SELECTOR: &str = "demopet";

/// Dataset index addressed by `url`, clamped to be non-negative.
pub fn deep_link_index(url: &str) -> Option<usize> {
    let (rest, fragment) = url.split_once('#').unwrap_or((url, ""));
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));

    fragment_selector(fragment)
        .or_else(|| query_selector(query))
        .or_else(|| path_selector(path))
        .map(|n| n.saturating_sub(1) as usize)
}

fn fragment_selector(fragment: &str) -> Option<u64> {
    let lower = fragment.to_ascii_lowercase();
    let at = lower.find(SELECTOR)?;
    leading_number(&lower[at + SELECTOR.len()..])
}

fn query_selector(query: &str) -> Option<u64> {
    let params = parse_query(query);
    get_param(&params, SELECTOR).and_then(leading_number)
}

fn path_selector(path: &str) -> Option<u64> {
    let lower = path.to_ascii_lowercase();
    let needle = format!("/mobile/{}", SELECTOR);
    let at = lower.find(&needle)?;
    let tail = &lower[at + needle.len()..];
    let digits_end = tail.find(|c: char| !c.is_ascii_digit()).unwrap_or(tail.len());
    // The number must end the segment.
    match tail[digits_end..].chars().next() {
        None | Some('/') => leading_number(tail),
        _ => None,
    }
}

fn leading_number(text: &str) -> Option<u64> {
    let end = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
    text[..end].parse().ok()
}

/// Everything before the last `/{surface}` segment of `pathname` (subfolder hosting).
pub fn base_path(pathname: &str, surface: &str) -> String {
    let needle = format!("/{}", surface.to_ascii_lowercase());
    match pathname.to_ascii_lowercase().rfind(&needle) {
        Some(at) => pathname[..at].to_string(),
        None => String::new(),
    }
}

/// Deep link for demo pet `n` (1-based) in the host's URL style.
pub fn build_deep_link(links: &LinkConfig, n: usize) -> String {
    let base = links.base_path.trim_end_matches('/');
    if links.path_routing {
        format!("{}{}/mobile/{}{}", links.origin, base, SELECTOR, n)
    } else {
        format!("{}{}/mobile/index.html#{}{}", links.origin, base, SELECTOR, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_spellings_resolve_to_the_same_index() {
        for url in [
            "https://hotpet.example/mobile/demopet3",
            "https://hotpet.example/mobile/index.html#demopet3",
            "https://hotpet.example/mobile/index.html?demopet=3",
            "/hotpet/mobile/DemoPet3/",
        ] {
            assert_eq!(deep_link_index(url), Some(2), "{}", url);
        }
    }

    #[test]
    fn zero_clamps_to_first_index() {
        assert_eq!(deep_link_index("#demopet0"), Some(0));
    }

    #[test]
    fn fragment_wins_over_query_and_path() {
        assert_eq!(deep_link_index("/mobile/demopet1?demopet=2#demopet5"), Some(4));
        assert_eq!(deep_link_index("/mobile/demopet1?demopet=2"), Some(1));
    }

    #[test]
    fn missing_or_malformed_selector() {
        assert_eq!(deep_link_index("https://hotpet.example/mobile/"), None);
        assert_eq!(deep_link_index("/mobile/demopet"), None);
        assert_eq!(deep_link_index("/mobile/demopet3x"), None);
        assert_eq!(deep_link_index("?demopet=abc"), None);
    }

    #[test]
    fn base_path_handles_subfolders() {
        assert_eq!(base_path("/hotpet/mobile/index.html", "mobile"), "/hotpet");
        assert_eq!(base_path("/kiosk/", "kiosk"), "");
        assert_eq!(base_path("/other/page", "mobile"), "");
    }

    #[test]
    fn links_follow_routing_style() {
        let mut links = LinkConfig {
            origin: "https://hotpet.example".to_string(),
            base_path: "/hotpet".to_string(),
            ..LinkConfig::default()
        };
        assert_eq!(build_deep_link(&links, 2), "https://hotpet.example/hotpet/mobile/demopet2");
        links.path_routing = false;
        let link = build_deep_link(&links, 2);
        assert_eq!(link, "https://hotpet.example/hotpet/mobile/index.html#demopet2");
        assert_eq!(deep_link_index(&link), Some(1));
    }
}
