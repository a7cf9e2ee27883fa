// ── Flash orchestration ──
//
// A dedicated OS thread owns the bootloader and runs one request at a time:
// cold connect, program (with an optional warm reboot first), and reset to
// firmware. Requests queue on an mpsc channel; outcomes come back as
// `FlashEvent`s on an unbounded channel and as state transitions.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bootloader::{Bootloader, FirmwareLink, FlashTargets, Target};
use crate::error::CoreError;
use crate::state::{ConnectionState, StateController};

/// Status shown when no bootloader answered a connect attempt.
pub const BOOTLOADER_NOT_FOUND: &str = "Could not connect to bootloader";

/// Outcome and progress notifications from the flash worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashEvent {
    /// A cold connect attempt started.
    Connecting,
    /// The bootloader answered.
    Connected,
    /// A connect attempt failed; carries the status text.
    Failed(String),
    Progress { status: String, percent: i32 },
    /// Terminal result of a program request.
    Programmed(bool),
    /// The bootloader link was closed.
    Disconnected,
    /// A release archive is ready in the cache.
    Downloaded { release: String, path: PathBuf },
    DownloadFailed(String),
}

/// How the bootloader is reached before flashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootMode {
    /// Already connected to the bootloader.
    Cold,
    /// Reboot the running firmware into the bootloader first.
    Warm,
}

impl BootMode {
    pub fn for_state(state: ConnectionState) -> Self {
        if state == ConnectionState::ColdConnected {
            Self::Cold
        } else {
            Self::Warm
        }
    }
}

enum Request {
    ConnectCold {
        uri: String,
    },
    Program {
        image: PathBuf,
        targets: FlashTargets,
        boot: BootMode,
    },
    Reset,
    Shutdown,
}

/// Handle to the flash worker. Cloning shares the same worker; the worker
/// shuts down and is joined when the last handle drops.
#[derive(Clone)]
pub struct FlashOrchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    requests: mpsc::UnboundedSender<Request>,
    events: mpsc::UnboundedSender<FlashEvent>,
    state: Arc<StateController>,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl FlashOrchestrator {
    /// Start the worker thread. `link` is the application-firmware link
    /// closed before a warm boot, when there is one.
    pub fn spawn(
        bootloader: Box<dyn Bootloader>,
        state: Arc<StateController>,
        link: Option<Arc<dyn FirmwareLink>>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<FlashEvent>), CoreError> {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancel = Arc::new(AtomicBool::new(false));

        let worker = FlashWorker::new(
            bootloader,
            Arc::clone(&state),
            link,
            Arc::clone(&cancel),
            event_tx.clone(),
        );
        let handle = std::thread::Builder::new()
            .name("cfflash-worker".into())
            .spawn(move || worker.run(request_rx))?;

        let orchestrator = Self {
            inner: Arc::new(OrchestratorInner {
                requests: request_tx,
                events: event_tx,
                state,
                cancel,
                worker: Some(handle),
            }),
        };
        Ok((orchestrator, event_rx))
    }

    pub fn state(&self) -> &Arc<StateController> {
        &self.inner.state
    }

    /// Wait on `uri` for the quadcopter to power up into its bootloader.
    pub fn connect_cold(&self, uri: &str) -> Result<(), CoreError> {
        self.inner.cancel.store(false, Ordering::SeqCst);
        self.inner.state.set_state(ConnectionState::ColdConnecting);
        self.send(Request::ConnectCold {
            uri: uri.to_owned(),
        })
    }

    /// Abandon a pending cold connect.
    pub fn cancel_connect(&self) {
        self.inner.cancel.store(true, Ordering::SeqCst);
        self.inner
            .state
            .advance(ConnectionState::ColdConnecting, ConnectionState::Disconnected);
    }

    /// Flash `image`, restricted to `filter` when set. The boot mode
    /// follows the current state.
    pub fn program(&self, image: &Path, filter: Option<Target>) -> Result<(), CoreError> {
        let boot = BootMode::for_state(self.inner.state.state());
        self.program_with(image, FlashTargets::from_filter(filter), boot)
    }

    pub fn program_with(
        &self,
        image: &Path,
        targets: FlashTargets,
        boot: BootMode,
    ) -> Result<(), CoreError> {
        debug!(image = %image.display(), %targets, ?boot, "queueing program request");
        // A terminate issued after this point cancels the request.
        self.inner.cancel.store(false, Ordering::SeqCst);
        self.send(Request::Program {
            image: image.to_path_buf(),
            targets,
            boot,
        })
    }

    /// Ask a running flash to stop. The bootloader checks the flag between
    /// steps.
    pub fn terminate_flashing(&self) {
        self.inner.cancel.store(true, Ordering::SeqCst);
    }

    /// Leave the bootloader and restart the application firmware.
    pub fn reset_copter(&self) -> Result<(), CoreError> {
        self.inner.state.set_state(ConnectionState::Reset);
        self.send(Request::Reset)
    }

    /// Post an event on the same stream as the worker's.
    pub(crate) fn notify(&self, event: FlashEvent) {
        let _ = self.inner.events.send(event);
    }

    fn send(&self, request: Request) -> Result<(), CoreError> {
        self.inner
            .requests
            .send(request)
            .map_err(|_| CoreError::WorkerStopped)
    }
}

impl Drop for OrchestratorInner {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        let _ = self.requests.send(Request::Shutdown);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("flash worker panicked");
            }
        }
    }
}

// ── Worker ───────────────────────────────────────────────────────────

struct FlashWorker {
    bootloader: Box<dyn Bootloader>,
    state: Arc<StateController>,
    link: Option<Arc<dyn FirmwareLink>>,
    cancel: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<FlashEvent>,
}

impl FlashWorker {
    fn new(
        mut bootloader: Box<dyn Bootloader>,
        state: Arc<StateController>,
        link: Option<Arc<dyn FirmwareLink>>,
        cancel: Arc<AtomicBool>,
        events: mpsc::UnboundedSender<FlashEvent>,
    ) -> Self {
        let progress_tx = events.clone();
        bootloader.set_progress_callback(Box::new(move |status, percent| {
            let _ = progress_tx.send(FlashEvent::Progress {
                status: status.to_owned(),
                percent,
            });
        }));
        let flag = Arc::clone(&cancel);
        bootloader.set_cancel_query(Box::new(move || flag.load(Ordering::SeqCst)));

        Self {
            bootloader,
            state,
            link,
            cancel,
            events,
        }
    }

    fn run(mut self, mut requests: mpsc::UnboundedReceiver<Request>) {
        debug!("flash worker started");
        while let Some(request) = requests.blocking_recv() {
            match request {
                Request::ConnectCold { uri } => self.connect_cold(&uri),
                Request::Program {
                    image,
                    targets,
                    boot,
                } => self.program(&image, &targets, boot),
                Request::Reset => self.reset(),
                Request::Shutdown => break,
            }
        }
        self.bootloader.close();
        debug!("flash worker stopped");
    }

    fn emit(&self, event: FlashEvent) {
        let _ = self.events.send(event);
    }

    fn connect_cold(&mut self, uri: &str) {
        self.emit(FlashEvent::Connecting);
        self.bootloader.set_link_uri(uri);
        let result = self.bootloader.start_bootloader(false);

        if self.cancel.load(Ordering::SeqCst) {
            debug!("cold connect cancelled");
            self.state
                .advance(ConnectionState::ColdConnecting, ConnectionState::Disconnected);
            self.bootloader.close();
            self.emit(FlashEvent::Disconnected);
            return;
        }

        match result {
            Ok(true) => {
                // A cancel may land between the flag check and here.
                if !self
                    .state
                    .advance(ConnectionState::ColdConnecting, ConnectionState::ColdConnected)
                {
                    debug!("cold connect cancelled after answer");
                    self.bootloader.close();
                    self.emit(FlashEvent::Disconnected);
                    return;
                }
                info!("connected to bootloader");
                self.emit(FlashEvent::Connected);
            }
            Ok(false) => self.connect_failed(BOOTLOADER_NOT_FOUND.to_owned()),
            Err(e) => self.connect_failed(e.to_string()),
        }
    }

    fn connect_failed(&self, message: String) {
        warn!(%message, "bootloader connect failed");
        self.state.fail(message.clone());
        self.emit(FlashEvent::Failed(message));
    }

    fn program(&mut self, image: &Path, targets: &FlashTargets, boot: BootMode) {
        if self.cancel.load(Ordering::SeqCst) {
            debug!(image = %image.display(), "program request cancelled before start");
            self.emit(FlashEvent::Programmed(false));
            return;
        }
        if boot == BootMode::Warm && !self.warm_boot() {
            self.emit(FlashEvent::Programmed(false));
            return;
        }

        self.state.set_state(ConnectionState::Flashing);
        info!(image = %image.display(), %targets, "flashing");

        let ok = match self.bootloader.flash(image, targets) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, image = %image.display(), "flashing failed");
                false
            }
        };

        self.state.set_state(ConnectionState::ColdConnected);
        self.emit(FlashEvent::Programmed(ok));
    }

    /// Reboot the running firmware into its bootloader over the live link.
    fn warm_boot(&mut self) -> bool {
        if let Some(ref link) = self.link {
            let uri = link.uri();
            link.close();
            if let Some(uri) = uri {
                debug!(%uri, "warm booting over firmware link");
                self.bootloader.set_link_uri(&uri);
            }
        }

        match self.bootloader.start_bootloader(true) {
            Ok(true) => true,
            Ok(false) => {
                self.connect_failed(BOOTLOADER_NOT_FOUND.to_owned());
                false
            }
            Err(e) => {
                self.connect_failed(e.to_string());
                false
            }
        }
    }

    fn reset(&mut self) {
        if let Err(e) = self.bootloader.reset_to_firmware() {
            debug!(error = %e, "reset to firmware failed, closing anyway");
        }
        self.bootloader.close();
        self.state.set_state(ConnectionState::Disconnected);
        self.emit(FlashEvent::Disconnected);
    }
}
