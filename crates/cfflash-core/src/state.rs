// ── Panel connection state machine ──
//
// One current state plus an optional failure message. Transitions are
// unconditional; every transition recomputes the panel presentation and
// hands it to each registered sink. The UI thread and the flash worker both
// transition, so updates and sink notification happen under one lock.

use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use strum::{Display, EnumIter};
use tokio::sync::watch;
use tracing::debug;

use crate::connectivity::LinkState;

/// Status text shown in Disconnected when no failure is pending.
pub const NOT_CONNECTED: &str = "Not connected";

/// Connection state of the bootloader panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum ConnectionState {
    Disconnected,
    ColdConnecting,
    ColdConnected,
    FwConnecting,
    FwConnected,
    Scanning,
    Flashing,
    Reset,
}

impl From<LinkState> for ConnectionState {
    /// Firmware-mode link states seen from the panel.
    fn from(link: LinkState) -> Self {
        match link {
            LinkState::Disconnected { .. } => Self::Disconnected,
            LinkState::Connecting => Self::FwConnecting,
            LinkState::Connected => Self::FwConnected,
            LinkState::Scanning => Self::Scanning,
        }
    }
}

/// Current state together with the failure message carried into
/// `Disconnected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    pub state: ConnectionState,
    pub last_error: Option<String>,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            last_error: None,
        }
    }
}

/// What the panel shows in a given state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateView {
    pub reset_enabled: bool,
    pub program_enabled: bool,
    pub cold_boot_enabled: bool,
    /// Interface/address selection block.
    pub connectivity_enabled: bool,
    pub status: String,
}

impl StateView {
    /// Presentation for a snapshot.
    pub fn for_snapshot(snapshot: &StateSnapshot) -> Self {
        let (reset, program, cold_boot, connectivity, status) = match snapshot.state {
            ConnectionState::Disconnected => (
                false,
                false,
                true,
                true,
                snapshot.last_error.as_deref().unwrap_or(NOT_CONNECTED),
            ),
            ConnectionState::ColdConnecting => (
                false,
                false,
                false,
                false,
                "Trying to connect cold bootloader, restart the Crazyflie to connect",
            ),
            ConnectionState::ColdConnected => {
                (true, true, false, false, "Connected to bootloader")
            }
            ConnectionState::FwConnecting => (
                false,
                false,
                false,
                true,
                "Trying to connect in firmware mode",
            ),
            ConnectionState::FwConnected => {
                (false, true, false, true, "Connected in firmware mode")
            }
            ConnectionState::Scanning => (false, false, false, true, "Scanning"),
            ConnectionState::Flashing => (false, false, false, false, "Flashing"),
            ConnectionState::Reset => (
                false,
                false,
                false,
                false,
                "Resetting to firmware, disconnected",
            ),
        };

        Self {
            reset_enabled: reset,
            program_enabled: program,
            cold_boot_enabled: cold_boot,
            connectivity_enabled: connectivity,
            status: status.to_owned(),
        }
    }
}

/// Receives state-entry actions. Implemented by the UI binding layer.
///
/// `on_enter` runs with the transition lock held and must not transition
/// the controller itself.
pub trait StateSink: Send + Sync {
    fn on_enter(&self, state: ConnectionState, view: &StateView);
}

/// Holds the panel state and drives registered [`StateSink`]s.
///
/// Observable through [`subscribe()`](Self::subscribe) as well, for
/// consumers that prefer a `watch` channel over a callback.
pub struct StateController {
    snapshot: watch::Sender<StateSnapshot>,
    sinks: ArcSwap<Vec<Arc<dyn StateSink>>>,
    transitions: Mutex<()>,
}

impl Default for StateController {
    fn default() -> Self {
        Self::new()
    }
}

impl StateController {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(StateSnapshot::default());
        Self {
            snapshot,
            sinks: ArcSwap::from_pointee(Vec::new()),
            transitions: Mutex::new(()),
        }
    }

    /// Register a sink. Sinks are notified in registration order.
    pub fn add_sink(&self, sink: Arc<dyn StateSink>) {
        self.sinks.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&sink));
            next
        });
    }

    /// Transition to `state`. A pending failure message survives only a
    /// transition into `Disconnected`.
    pub fn set_state(&self, state: ConnectionState) {
        let _guard = self.lock();
        self.transition(state, None);
    }

    /// Transition to `to` only if the current state is still `from`.
    /// Returns whether the transition happened.
    pub fn advance(&self, from: ConnectionState, to: ConnectionState) -> bool {
        let _guard = self.lock();
        if self.state() != from {
            debug!(expected = %from, current = %self.state(), %to, "transition skipped");
            return false;
        }
        self.transition(to, None);
        true
    }

    /// Record a failure and transition to `Disconnected`, which will show
    /// `message` in place of the generic status.
    pub fn fail(&self, message: impl Into<String>) {
        let _guard = self.lock();
        self.transition(ConnectionState::Disconnected, Some(message.into()));
    }

    pub fn state(&self) -> ConnectionState {
        self.snapshot.borrow().state
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Presentation of the current state.
    pub fn view(&self) -> StateView {
        StateView::for_snapshot(&self.snapshot.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.snapshot.subscribe()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Caller holds the transition lock.
    fn transition(&self, state: ConnectionState, error: Option<String>) {
        let mut entered = StateSnapshot::default();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| {
            snap.state = state;
            match error {
                Some(message) => snap.last_error = Some(message),
                None if state != ConnectionState::Disconnected => snap.last_error = None,
                None => {}
            }
            entered = snap.clone();
        });

        let view = StateView::for_snapshot(&entered);
        debug!(%state, status = %view.status, "entering state");
        for sink in self.sinks.load().iter() {
            sink.on_enter(state, &view);
        }
    }
}
