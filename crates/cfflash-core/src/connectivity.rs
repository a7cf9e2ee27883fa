// ── Multi-surface connectivity binding ──
//
// Several UI surfaces (main window toolbar, bootloader panel, ...) each carry
// an interface selector, an address field, and connect/scan controls. The
// binding keeps them showing the same address and interface, routes their
// click events to single-slot callbacks, and applies link-state changes to
// all of them at once.

use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use tracing::{debug, trace};

use crate::state::{ConnectionState, StateSink, StateView};

/// Handles to one set of connectivity widgets, provided by the UI layer.
pub trait UiSurface: Send + Sync {
    /// Committed address value.
    fn address(&self) -> u64;
    fn set_address(&self, address: u64);
    /// Value of the displayed address text when it differs from the
    /// committed value (the user typed but has not committed yet).
    fn uncommitted_address(&self) -> Option<u64>;

    /// Currently selected interface text.
    fn interface(&self) -> String;
    fn set_interface(&self, name: &str);
    /// Replace the interface list and select `index`.
    fn set_interfaces(&self, items: &[String], index: usize);

    /// Enable or disable every widget of the surface.
    fn set_enabled(&self, enabled: bool);
    /// Apply a link-state presentation.
    fn apply(&self, controls: &SurfaceControls);
}

/// Labels and enablement for one link state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceControls {
    pub connect_label: &'static str,
    /// `None` leaves the current tooltip in place.
    pub connect_tooltip: Option<&'static str>,
    pub connect_enabled: bool,
    /// `None` leaves the current scan label in place.
    pub scan_label: Option<&'static str>,
    pub scan_enabled: bool,
    /// Address field and interface selector.
    pub selection_enabled: bool,
}

/// Firmware-mode link state as reported by the connection layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected { can_connect: bool },
    Connecting,
    Connected,
    Scanning,
}

impl LinkState {
    pub fn controls(self) -> SurfaceControls {
        match self {
            Self::Disconnected { can_connect } => SurfaceControls {
                connect_label: "Connect",
                connect_tooltip: Some(
                    "Connect to the Crazyflie on the selected interface (Ctrl+I)",
                ),
                connect_enabled: can_connect,
                scan_label: Some("Scan"),
                scan_enabled: true,
                selection_enabled: true,
            },
            Self::Connecting => SurfaceControls {
                connect_label: "Cancel",
                connect_tooltip: Some("Cancel connecting to the Crazyflie"),
                connect_enabled: true,
                scan_label: None,
                scan_enabled: false,
                selection_enabled: false,
            },
            Self::Connected => SurfaceControls {
                connect_label: "Disconnect",
                connect_tooltip: Some("Disconnect from the Crazyflie (Ctrl+I)"),
                connect_enabled: true,
                scan_label: None,
                scan_enabled: false,
                selection_enabled: false,
            },
            Self::Scanning => SurfaceControls {
                connect_label: "Connect",
                connect_tooltip: None,
                connect_enabled: false,
                scan_label: Some("Scanning..."),
                scan_enabled: false,
                selection_enabled: false,
            },
        }
    }
}

type ConnectCallback = Box<dyn Fn() + Send + Sync>;
type ScanCallback = Box<dyn Fn(u64) + Send + Sync>;
type InterfaceCallback = Box<dyn Fn(&str) + Send + Sync>;
type LinkStateCallback = Box<dyn Fn(LinkState) + Send + Sync>;

/// Keeps every registered [`UiSurface`] in sync and dispatches their events.
///
/// Callbacks are single-slot: registering a second callback for the same
/// event replaces the first. They are invoked without holding any lock, so a
/// callback may call back into the binding.
pub struct ConnectivityBinding {
    surfaces: ArcSwap<Vec<Arc<dyn UiSurface>>>,
    on_connect: ArcSwapOption<ConnectCallback>,
    on_scan: ArcSwapOption<ScanCallback>,
    on_interface: ArcSwapOption<InterfaceCallback>,
    on_link_state: ArcSwapOption<LinkStateCallback>,
    /// Last interface broadcast through `interface_changed`.
    interface: ArcSwapOption<String>,
}

impl Default for ConnectivityBinding {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityBinding {
    pub fn new() -> Self {
        Self {
            surfaces: ArcSwap::from_pointee(Vec::new()),
            on_connect: ArcSwapOption::empty(),
            on_scan: ArcSwapOption::empty(),
            on_interface: ArcSwapOption::empty(),
            on_link_state: ArcSwapOption::empty(),
            interface: ArcSwapOption::empty(),
        }
    }

    pub fn register(&self, surface: Arc<dyn UiSurface>) {
        self.surfaces.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&surface));
            next
        });
        debug!(count = self.surfaces.load().len(), "registered UI surface");
    }

    // ── Callback registration ────────────────────────────────────────

    pub fn on_connect_clicked(&self, callback: impl Fn() + Send + Sync + 'static) {
        let callback: ConnectCallback = Box::new(callback);
        self.on_connect.store(Some(Arc::new(callback)));
    }

    pub fn on_scan_clicked(&self, callback: impl Fn(u64) + Send + Sync + 'static) {
        let callback: ScanCallback = Box::new(callback);
        self.on_scan.store(Some(Arc::new(callback)));
    }

    pub fn on_interface_changed(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        let callback: InterfaceCallback = Box::new(callback);
        self.on_interface.store(Some(Arc::new(callback)));
    }

    pub fn on_link_state_changed(&self, callback: impl Fn(LinkState) + Send + Sync + 'static) {
        let callback: LinkStateCallback = Box::new(callback);
        self.on_link_state.store(Some(Arc::new(callback)));
    }

    // ── Commands from the application ────────────────────────────────

    /// Apply a link state to every surface and notify the link-state
    /// callback once.
    pub fn set_link_state(&self, state: LinkState) {
        let controls = state.controls();
        for surface in self.surfaces.load().iter() {
            surface.apply(&controls);
        }
        if let Some(callback) = self.on_link_state.load_full() {
            callback(state);
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        for surface in self.surfaces.load().iter() {
            surface.set_enabled(enabled);
        }
    }

    pub fn set_address(&self, address: u64) {
        for surface in self.surfaces.load().iter() {
            surface.set_address(address);
        }
    }

    /// Address of the first registered surface, or 0 when there is none.
    pub fn address(&self) -> u64 {
        self.surfaces.load().first().map_or(0, |s| s.address())
    }

    pub fn set_interfaces(&self, items: &[String], index: usize) {
        for surface in self.surfaces.load().iter() {
            surface.set_interfaces(items, index);
        }
    }

    // ── Events from the surfaces ─────────────────────────────────────

    pub fn connect_clicked(&self) {
        if let Some(callback) = self.on_connect.load_full() {
            callback();
        }
    }

    pub fn scan_clicked(&self) {
        if let Some(callback) = self.on_scan.load_full() {
            callback(self.address());
        }
    }

    /// Live value change on one surface.
    pub fn address_changed(&self, address: u64) {
        self.broadcast_address(address);
    }

    /// Editing finished on some surface: the first one showing uncommitted
    /// text supplies the new address.
    pub fn address_edited(&self) {
        let edited = self
            .surfaces
            .load()
            .iter()
            .find_map(|surface| surface.uncommitted_address());

        if let Some(address) = edited {
            debug!(address, "address edited");
            self.broadcast_address(address);
        }
    }

    /// Selection changed on some surface. Echoes from surfaces the binding
    /// just updated carry the same name and are dropped.
    pub fn interface_changed(&self, interface: &str) {
        let previous = self.interface.swap(Some(Arc::new(interface.to_owned())));
        if previous.is_some_and(|name| *name == interface) {
            trace!(interface, "interface unchanged");
            return;
        }

        for surface in self.surfaces.load().iter() {
            if surface.interface() != interface {
                surface.set_interface(interface);
            }
        }
        if let Some(callback) = self.on_interface.load_full() {
            callback(interface);
        }
    }

    /// Write `address` to every surface not already showing it. Skipping
    /// equal surfaces keeps UI change notifications from looping.
    fn broadcast_address(&self, address: u64) {
        for surface in self.surfaces.load().iter() {
            if surface.address() != address {
                trace!(address, "propagating address");
                surface.set_address(address);
            }
        }
    }
}

impl StateSink for ConnectivityBinding {
    fn on_enter(&self, _state: ConnectionState, view: &StateView) {
        self.set_enabled(view.connectivity_enabled);
    }
}
