//! Global surface state.
//!
//! Uses `thread_local!` + `RefCell` for safe mutable access in single-threaded
//! WASM. The Web Worker keeps the module alive, so both surfaces persist across
//! bridge calls for the whole page session.

use std::cell::RefCell;

use tracing::{debug, info};

use crate::config::{KioskConfig, LinkConfig};
use crate::error::PairingResult;
use crate::kiosk::{HostCamera, KioskMachine, Outgoing};
use crate::mobile::MobileSurface;
use crate::pairing::Dataset;
use crate::pairing::deep_link::base_path;
use crate::pairing::notice::Notice;
use crate::session::SessionStore;

pub struct Surfaces {
    pub kiosk: KioskMachine<HostCamera>,
    pub mobile: MobileSurface,
}

impl Default for Surfaces {
    fn default() -> Self {
        let dataset = Dataset::demo();
        Self {
            kiosk: KioskMachine::new(KioskConfig::default(), dataset.clone(), HostCamera::default()),
            mobile: MobileSurface::new(dataset, SessionStore::new(), LinkConfig::default()),
        }
    }
}

impl Surfaces {
    /// Replace the dataset on both surfaces.
    pub fn load_dataset(&mut self, json: &str) -> PairingResult<()> {
        let dataset = Dataset::from_json(json)?;
        info!(pets = dataset.len(), "dataset loaded");
        self.kiosk.set_dataset(dataset.clone());
        self.mobile.set_dataset(dataset);
        Ok(())
    }

    /// Rebuild the kiosk with new options. The kiosk returns to idle with the
    /// camera released; the host starts it again.
    pub fn configure_kiosk(&mut self, json: &str) -> PairingResult<()> {
        let config = KioskConfig::from_json(json)?;
        let dataset = self.kiosk.dataset().clone();
        self.kiosk = KioskMachine::new(config, dataset, HostCamera::default());
        Ok(())
    }

    /// Set the deep-link style. Without an explicit `base_path`, the subfolder
    /// is taken from the page path in front of `/mobile` or `/kiosk`.
    pub fn configure_links(&mut self, json: &str) -> PairingResult<()> {
        let mut links: LinkConfig = serde_json::from_str(json)?;
        if links.base_path.is_empty() && !links.pathname.is_empty() {
            links.base_path = ["mobile", "kiosk"]
                .iter()
                .map(|surface| base_path(&links.pathname, surface))
                .find(|base| !base.is_empty())
                .unwrap_or_default();
        }
        debug!(base_path = %links.base_path, path_routing = links.path_routing, "links configured");
        self.mobile.set_links(links);
        Ok(())
    }

    pub fn restore_session(&mut self, state_b64: &str) -> PairingResult<()> {
        let session = SessionStore::restore(state_b64)?;
        self.mobile.set_session(session);
        Ok(())
    }

    /// Drain the kiosk's pending notices, stamped with the session code.
    pub fn take_notices(&mut self, at: i64) -> Vec<Notice> {
        let outgoing = self.kiosk.take_outgoing();
        if outgoing.is_empty() {
            return Vec::new();
        }
        let code = self.mobile.session_mut().get_or_create_code();
        outgoing
            .into_iter()
            .map(|o| match o {
                Outgoing::Paired => Notice::paired(&code, at),
                Outgoing::Reset => Notice::reset(&code, at),
            })
            .collect()
    }
}

thread_local! {
    static SURFACES: RefCell<Surfaces> = RefCell::new(Surfaces::default());
}

/// Execute a closure with read access to the surfaces.
pub fn with_surfaces<F, R>(f: F) -> R
where
    F: FnOnce(&Surfaces) -> R,
{
    SURFACES.with(|s| f(&s.borrow()))
}

/// Execute a closure with mutable access to the surfaces.
pub fn with_surfaces_mut<F, R>(f: F) -> R
where
    F: FnOnce(&mut Surfaces) -> R,
{
    SURFACES.with(|s| f(&mut s.borrow_mut()))
}

/// Reset both surfaces to the bundled demo state.
pub fn reset_surfaces() {
    SURFACES.with(|s| {
        *s.borrow_mut() = Surfaces::default();
    });
}
