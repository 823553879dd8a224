//! Mobile surface — owns the selected pet and produces its QR payload.

use tracing::{debug, info};

use crate::config::LinkConfig;
use crate::error::PairingResult;
use crate::pairing::deep_link::{build_deep_link, deep_link_index};
use crate::pairing::notice::KnownNotice;
use crate::pairing::{Dataset, EncodeMode, PetRecord, encode};
use crate::routes::util::percent_encode;
use crate::session::SessionStore;

/// External glyph renderer; the kiosk never needs it.
const QR_SERVICE: &str = "https://quickchart.io/qr";
const QR_SIZE: u32 = 600;
const QR_MARGIN: u32 = 12;

/// Which payload to put in the QR code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadKind {
    #[default]
    Full,
    Compact,
    Index,
}

impl PayloadKind {
    /// `full` | `compact` | `index`. Anything else falls back to `full`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => PayloadKind::Compact,
            "index" | "index_only" => PayloadKind::Index,
            _ => PayloadKind::Full,
        }
    }
}

pub struct MobileSurface {
    dataset: Dataset,
    session: SessionStore,
    links: LinkConfig,
    selected: usize,
    /// A kiosk reported pairing with this session and has not reset since.
    kiosk_paired: bool,
}

impl MobileSurface {
    /// Selection starts from the session's last index when it is still valid.
    pub fn new(dataset: Dataset, session: SessionStore, links: LinkConfig) -> Self {
        let selected = session
            .last_index()
            .filter(|&i| i < dataset.len())
            .unwrap_or(0);
        Self {
            dataset,
            session,
            links,
            selected,
            kiosk_paired: false,
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Swap the dataset, keeping the selection only if it still exists.
    pub fn set_dataset(&mut self, dataset: Dataset) {
        if self.selected >= dataset.len() {
            self.selected = 0;
        }
        self.dataset = dataset;
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionStore {
        &mut self.session
    }

    /// Replace the session (e.g. after a restore) and re-read its selection.
    pub fn set_session(&mut self, session: SessionStore) {
        if let Some(i) = session.last_index().filter(|&i| i < self.dataset.len()) {
            self.selected = i;
        }
        self.session = session;
    }

    pub fn set_links(&mut self, links: LinkConfig) {
        self.links = links;
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn current(&self) -> Option<&PetRecord> {
        self.dataset.get(self.selected as i64)
    }

    /// Select and persist. Out-of-range indices are refused.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.dataset.len() {
            debug!(index, len = self.dataset.len(), "selection out of range");
            return false;
        }
        self.selected = index;
        self.session.set_last_index(index);
        info!(index, "pet selected");
        true
    }

    /// Select the pet a deep link points at. `None` if the link has no
    /// selector or points past the dataset.
    pub fn apply_deep_link(&mut self, url: &str) -> Option<usize> {
        let index = deep_link_index(url)?;
        self.select(index).then_some(index)
    }

    pub fn payload(&self, kind: PayloadKind) -> PairingResult<Option<String>> {
        let Some(record) = self.current() else {
            return Ok(None);
        };
        let mode = match kind {
            PayloadKind::Full => EncodeMode::Full,
            PayloadKind::Compact => EncodeMode::Compact,
            PayloadKind::Index => EncodeMode::IndexOnly { index: self.selected },
        };
        encode(record, mode).map(Some)
    }

    /// `Owner • Pet • Discount d/5 • p pts`
    pub fn summary(&self) -> Option<String> {
        self.current().map(|p| {
            format!(
                "{} • {} • Discount {}/5 • {} pts",
                p.owner_name, p.pet_name, p.discount_level, p.points_total
            )
        })
    }

    /// Track kiosk notices addressed to this session's code. Returns whether
    /// the notice applied.
    pub fn receive_notice(&mut self, notice: &KnownNotice) -> bool {
        let own = self.session.code();
        let is_own = |code: &str| own.as_deref() == Some(code);
        let paired = match notice {
            KnownNotice::Paired { code } if is_own(code.as_str()) => true,
            KnownNotice::Reset { code } if is_own(code.as_str()) => false,
            _ => return false,
        };
        self.kiosk_paired = paired;
        info!(paired, "kiosk notice received");
        true
    }

    pub fn is_kiosk_paired(&self) -> bool {
        self.kiosk_paired
    }

    /// Deep link for dataset position `index` (links are 1-based).
    pub fn deep_link(&self, index: usize) -> String {
        build_deep_link(&self.links, index + 1)
    }
}

/// Request URL for a rendered QR glyph of `payload`.
pub fn qr_image_url(payload: &str) -> String {
    format!(
        "{}?size={}&margin={}&text={}",
        QR_SERVICE,
        QR_SIZE,
        QR_MARGIN,
        percent_encode(payload)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairing::{decode, resolve};

    fn surface() -> MobileSurface {
        MobileSurface::new(Dataset::demo(), SessionStore::new(), LinkConfig::default())
    }

    #[test]
    fn defaults_to_first_pet() {
        let m = surface();
        assert_eq!(m.selected_index(), 0);
        assert_eq!(m.current().unwrap().pet_name, "Chub Shrimp");
    }

    #[test]
    fn selection_is_persisted_in_session() {
        let mut m = surface();
        assert!(m.select(3));
        let state = m.session().encode();
        let restored = MobileSurface::new(
            Dataset::demo(),
            SessionStore::restore(&state).unwrap(),
            LinkConfig::default(),
        );
        assert_eq!(restored.selected_index(), 3);
    }

    #[test]
    fn out_of_range_selection_is_refused() {
        let mut m = surface();
        assert!(!m.select(99));
        assert_eq!(m.selected_index(), 0);
    }

    #[test]
    fn deep_link_selects_pet() {
        let mut m = surface();
        assert_eq!(m.apply_deep_link("https://hotpet.example/mobile/demopet2"), Some(1));
        assert_eq!(m.current().unwrap().pet_name, "Mochi");
        assert_eq!(m.apply_deep_link("https://hotpet.example/mobile/demopet42"), None);
        assert_eq!(m.selected_index(), 1);
    }

    #[test]
    fn summary_line() {
        let mut m = surface();
        m.select(1);
        assert_eq!(m.summary().unwrap(), "Demo User • Mochi • Discount 2/5 • 777 pts");
    }

    #[test]
    fn every_payload_kind_resolves_back() {
        let mut m = surface();
        m.select(2);
        let expected = m.current().unwrap().clone();
        for kind in [PayloadKind::Full, PayloadKind::Compact, PayloadKind::Index] {
            let payload = m.payload(kind).unwrap().unwrap();
            let partial = decode(&payload).unwrap();
            assert_eq!(resolve(&partial, m.dataset()), Some(expected.clone()), "{:?}", kind);
        }
    }

    #[test]
    fn empty_dataset_has_no_payload() {
        let m = MobileSurface::new(Dataset::default(), SessionStore::new(), LinkConfig::default());
        assert_eq!(m.payload(PayloadKind::Full).unwrap(), None);
        assert_eq!(m.summary(), None);
    }

    #[test]
    fn kiosk_notices_for_this_session_toggle_pairing() {
        let mut m = surface();
        m.session_mut().set_code("K7QP").unwrap();

        let other = KnownNotice::Paired { code: "ZZZZ".to_string() };
        assert!(!m.receive_notice(&other));
        assert!(!m.is_kiosk_paired());

        assert!(m.receive_notice(&KnownNotice::Paired { code: "K7QP".to_string() }));
        assert!(m.is_kiosk_paired());
        assert!(!m.receive_notice(&KnownNotice::ShowQr { payload: "1".to_string() }));
        assert!(m.receive_notice(&KnownNotice::Reset { code: "K7QP".to_string() }));
        assert!(!m.is_kiosk_paired());
    }

    #[test]
    fn qr_url_escapes_payload() {
        let url = qr_image_url("HOTPETV1:ab=");
        assert_eq!(url, "https://quickchart.io/qr?size=600&margin=12&text=HOTPETV1%3Aab%3D");
    }

    #[test]
    fn payload_kind_parse() {
        assert_eq!(PayloadKind::parse("Compact"), PayloadKind::Compact);
        assert_eq!(PayloadKind::parse("index"), PayloadKind::Index);
        assert_eq!(PayloadKind::parse("bogus"), PayloadKind::Full);
    }
}
