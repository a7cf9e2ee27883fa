// ── Bootloader panel ──
//
// Wires the state controller, the connectivity binding, the release cache,
// and the flash worker into the operations a bootloader UI exposes. Input
// is validated synchronously; everything slow runs on the worker thread or
// the cache's runtime.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::bootloader::{Bootloader, FirmwareLink, FlashTargets, ImageKind, Target};
use crate::cache::ReleaseCache;
use crate::connectivity::{ConnectivityBinding, LinkState};
use crate::error::CoreError;
use crate::flash::{BootMode, FlashEvent, FlashOrchestrator};
use crate::release::{ReleaseCatalog, ReleaseIndexEntry};
use crate::state::{ConnectionState, StateController, StateSink, StateView};

/// Where the image to program comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirmwareSource {
    /// Local `.bin` or `.zip`. `filter` restricts flashing to one target.
    File {
        path: PathBuf,
        filter: Option<Target>,
    },
    /// Catalog label, e.g. `"2024.2 - cf2"`.
    Release { label: String },
}

/// Controller behind the bootloader UI.
pub struct BootloaderPanel {
    state: Arc<StateController>,
    binding: Arc<ConnectivityBinding>,
    flasher: FlashOrchestrator,
    cache: ReleaseCache,
    catalog: Arc<ArcSwap<ReleaseCatalog>>,
    link_uri: String,
    /// Bumped by `close()`. Downloads started under an older value never
    /// queue a program request.
    generation: Arc<Mutex<u64>>,
    downloads: Mutex<Vec<JoinHandle<()>>>,
}

impl BootloaderPanel {
    /// Start the flash worker and hook the panel into `binding`: state
    /// entries drive its enablement, and its link-state changes drive the
    /// panel state.
    pub fn new(
        bootloader: Box<dyn Bootloader>,
        link: Option<Arc<dyn FirmwareLink>>,
        binding: Arc<ConnectivityBinding>,
        cache: ReleaseCache,
        link_uri: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<FlashEvent>), CoreError> {
        let state = Arc::new(StateController::new());
        state.add_sink(binding.clone());

        let weak = Arc::downgrade(&state);
        binding.on_link_state_changed(move |link_state| {
            if let Some(state) = weak.upgrade() {
                state.set_state(ConnectionState::from(link_state));
            }
        });

        let (flasher, events) = FlashOrchestrator::spawn(bootloader, Arc::clone(&state), link)?;

        let panel = Self {
            state,
            binding,
            flasher,
            cache,
            catalog: Arc::new(ArcSwap::from_pointee(ReleaseCatalog::default())),
            link_uri: link_uri.to_owned(),
            generation: Arc::new(Mutex::new(0)),
            downloads: Mutex::new(Vec::new()),
        };
        Ok((panel, events))
    }

    pub fn state(&self) -> &Arc<StateController> {
        &self.state
    }

    pub fn view(&self) -> StateView {
        self.state.view()
    }

    pub fn binding(&self) -> &Arc<ConnectivityBinding> {
        &self.binding
    }

    /// Register an extra state sink, typically the panel's own widgets.
    pub fn add_sink(&self, sink: Arc<dyn StateSink>) {
        self.state.add_sink(sink);
    }

    /// Firmware link state changed outside the panel.
    pub fn link_state_changed(&self, link: LinkState) {
        self.state.set_state(ConnectionState::from(link));
    }

    // ── Image selection ──────────────────────────────────────────────

    /// Check a picked file and return the target preselected for it.
    pub fn select_image(&self, path: &Path) -> Result<Option<Target>, CoreError> {
        let kind = ImageKind::from_path(path)?;
        debug!(path = %path.display(), %kind, "image selected");
        Ok(kind.default_filter())
    }

    // ── Releases ─────────────────────────────────────────────────────

    pub fn set_releases(&self, entries: &[ReleaseIndexEntry]) {
        let catalog = ReleaseCatalog::from_entries(entries);
        debug!(count = catalog.len(), "release catalog updated");
        self.catalog.store(Arc::new(catalog));
    }

    /// Fetch the release index and replace the catalog.
    pub fn refresh_releases<F>(&self, on_done: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Arc<ReleaseCatalog>, CoreError>) + Send + 'static,
    {
        let slot = Arc::clone(&self.catalog);
        self.cache.list_releases(move |result| {
            let result = result.map(|entries| {
                let catalog = Arc::new(ReleaseCatalog::from_entries(&entries));
                slot.store(Arc::clone(&catalog));
                catalog
            });
            on_done(result);
        })
    }

    pub fn catalog(&self) -> Arc<ReleaseCatalog> {
        self.catalog.load_full()
    }

    // ── Actions ──────────────────────────────────────────────────────

    pub fn cold_boot(&self) -> Result<(), CoreError> {
        self.flasher.connect_cold(&self.link_uri)
    }

    pub fn cancel_cold_boot(&self) {
        self.flasher.cancel_connect();
    }

    /// Program from a file or a catalog release. Input errors are returned
    /// here; results arrive as [`FlashEvent`]s.
    pub fn program(&self, source: FirmwareSource) -> Result<(), CoreError> {
        match source {
            FirmwareSource::File { path, filter } => {
                if path.as_os_str().is_empty() {
                    return Err(CoreError::validation(
                        "Please choose an image file to program.",
                    ));
                }
                let kind = ImageKind::from_path(&path)?;
                if !kind.accepts(filter) {
                    return Err(CoreError::validation(format!(
                        "A .{kind} image must name the target to flash."
                    )));
                }
                self.flasher.program(&path, filter)
            }
            FirmwareSource::Release { label } => {
                let catalog = self.catalog.load();
                let Some(url) = catalog.url(&label) else {
                    return Err(CoreError::validation(format!(
                        "Unknown release: {label}"
                    )));
                };
                self.program_release(&label, url);
                Ok(())
            }
        }
    }

    /// Download through the cache, then program every target of the
    /// archive. The boot mode is decided now, not after the download.
    fn program_release(&self, label: &str, url: &str) {
        let boot = BootMode::for_state(self.state.state());
        let flasher = self.flasher.clone();
        let generation = Arc::clone(&self.generation);
        let started = *lock(&self.generation);
        debug!(release = %label, %url, ?boot, "fetching release for programming");

        let download = self.cache.download_release(label, url, move |result| {
            // Held while queueing so `close()` cannot slip in between.
            let current = lock(&generation);
            if *current != started {
                debug!("panel closed during download, not programming");
                return;
            }
            match result {
                Ok(artifact) => {
                    let path = artifact.path.clone();
                    flasher.notify(FlashEvent::Downloaded {
                        release: artifact.release,
                        path: artifact.path,
                    });
                    if let Err(e) = flasher.program_with(&path, FlashTargets::all(), boot) {
                        warn!(error = %e, "could not queue program request");
                    }
                }
                Err(e) => flasher.notify(FlashEvent::DownloadFailed(e.to_string())),
            }
        });

        let mut downloads = lock(&self.downloads);
        downloads.retain(|handle| !handle.is_finished());
        downloads.push(download);
    }

    pub fn terminate_flashing(&self) {
        self.flasher.terminate_flashing();
    }

    pub fn reset_copter(&self) -> Result<(), CoreError> {
        self.flasher.reset_copter()
    }

    /// Stop any flash or release download, drop the cached release, and
    /// return the quadcopter to its firmware. The returned task completes
    /// once the cache file is gone.
    pub fn close(&self) -> Result<JoinHandle<()>, CoreError> {
        {
            let mut generation = lock(&self.generation);
            *generation += 1;
            self.flasher.terminate_flashing();
        }

        let downloads = std::mem::take(&mut *lock(&self.downloads));
        for download in &downloads {
            download.abort();
        }

        let cache = self.cache.clone();
        let cleanup = self.cache.runtime().spawn(async move {
            // Aborted downloads release the slot before it is cleared.
            for download in downloads {
                let _ = download.await;
            }
            if let Err(e) = cache.invalidate().await {
                warn!(error = %e, "failed to remove cached release");
            }
        });
        self.flasher.reset_copter()?;
        Ok(cleanup)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
