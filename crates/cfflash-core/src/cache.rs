// ── Release fetch and single-slot download cache ──
//
// Lists releases and downloads one release archive at a time into a fixed
// file inside a private temporary directory. The slot is keyed by the
// download URL and guarded by an async mutex so concurrent downloads never
// race on the file. The directory is removed when the last handle drops.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use cfflash_api::{ReleaseClient, TransportConfig};

use crate::config::ReleaseSettings;
use crate::error::CoreError;
use crate::release::{ReleaseIndexEntry, index_entries};

/// File name of the cache slot inside the cache directory.
pub const CACHE_FILE_NAME: &str = "firmware.zip";

/// A downloaded release archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    pub path: PathBuf,
    pub release: String,
    pub url: String,
    /// `true` when served from the slot without a network fetch.
    pub reused: bool,
}

/// Identity of the release currently held in the slot.
#[derive(Debug)]
struct SlotKey {
    release: String,
    url: String,
}

/// Release listing and single-slot download cache.
///
/// Cheaply cloneable. Background operations run on the runtime handle given
/// at construction and report through a one-shot callback.
#[derive(Clone)]
pub struct ReleaseCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    client: ReleaseClient,
    dir: TempDir,
    slot: Mutex<Option<SlotKey>>,
    runtime: Handle,
}

impl ReleaseCache {
    /// Create a cache around an existing client. The cache directory is
    /// created under `cache_parent`, or the platform temp dir.
    pub fn new(
        client: ReleaseClient,
        cache_parent: Option<&Path>,
        runtime: Handle,
    ) -> Result<Self, CoreError> {
        let builder = {
            let mut b = tempfile::Builder::new();
            b.prefix("cfflash-");
            b
        };
        let dir = match cache_parent {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        debug!(dir = %dir.path().display(), "created release cache directory");

        Ok(Self {
            inner: Arc::new(CacheInner {
                client,
                dir,
                slot: Mutex::new(None),
                runtime,
            }),
        })
    }

    /// Build the HTTP client from settings, then the cache.
    pub fn from_settings(settings: &ReleaseSettings, runtime: Handle) -> Result<Self, CoreError> {
        let mut transport = TransportConfig::default().with_timeout(settings.timeout);
        if let Some(ref token) = settings.token {
            transport = transport.with_token(token.clone());
        }
        let client = ReleaseClient::new(settings.index_url.clone(), &transport)?;
        Self::new(client, settings.cache_parent.as_deref(), runtime)
    }

    /// Fixed location of the cache slot.
    pub fn path(&self) -> PathBuf {
        self.inner.dir.path().join(CACHE_FILE_NAME)
    }

    /// Where a download is written before it is checked and moved into
    /// the slot.
    pub fn partial_path(&self) -> PathBuf {
        self.path().with_extension("zip.part")
    }

    pub fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }

    // ── Background operations ────────────────────────────────────────

    /// Fetch the release index in the background.
    pub fn list_releases<F>(&self, on_done: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Vec<ReleaseIndexEntry>, CoreError>) + Send + 'static,
    {
        let cache = self.clone();
        self.inner.runtime.spawn(async move {
            let result = cache.fetch_releases().await;
            if let Err(ref e) = result {
                warn!(error = %e, "failed to fetch firmware releases");
            }
            on_done(result);
        })
    }

    /// Download `url` into the slot in the background.
    pub fn download_release<F>(&self, release: &str, url: &str, on_done: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<CachedArtifact, CoreError>) + Send + 'static,
    {
        let cache = self.clone();
        let release = release.to_owned();
        let url = url.to_owned();
        self.inner.runtime.spawn(async move {
            let result = cache.download(&release, &url).await;
            if let Err(ref e) = result {
                warn!(error = %e, %release, "failed to download firmware release");
            }
            on_done(result);
        })
    }

    // ── Async operations ─────────────────────────────────────────────

    /// Fetch the release index, dropping unnamed releases.
    pub async fn fetch_releases(&self) -> Result<Vec<ReleaseIndexEntry>, CoreError> {
        let releases = self.inner.client.list_releases().await?;
        let entries = index_entries(releases);
        if entries.is_empty() {
            warn!(url = %self.inner.client.index_url(), "release index contains no named releases");
        } else {
            debug!(count = entries.len(), "fetched firmware releases");
        }
        Ok(entries)
    }

    /// Return the slot if it already holds a valid archive for `url`,
    /// otherwise fetch `url` and replace the slot.
    pub async fn download(&self, release: &str, url: &str) -> Result<CachedArtifact, CoreError> {
        let mut slot = self.inner.slot.lock().await;
        let path = self.path();

        if slot.as_ref().is_some_and(|key| key.url == url) {
            match check_archive_blocking(path.clone()).await {
                Ok(()) => {
                    info!(path = %path.display(), %release, "using cached firmware release");
                    return Ok(CachedArtifact {
                        path,
                        release: release.to_owned(),
                        url: url.to_owned(),
                        reused: true,
                    });
                }
                Err(e) => {
                    warn!(error = %e, "cached firmware release is damaged, fetching again");
                }
            }
        }

        // The old archive is gone as soon as we start replacing it.
        *slot = None;

        let body = self.inner.client.download(url).await?;
        let partial = self.partial_path();
        if let Err(e) = store_checked(&partial, &body).await {
            if let Err(cleanup) = remove_if_present(&partial).await {
                warn!(error = %cleanup, "failed to remove partial download");
            }
            return Err(e);
        }
        tokio::fs::rename(&partial, &path).await?;

        info!(
            path = %path.display(),
            %release,
            bytes = body.len(),
            "stored firmware release"
        );
        *slot = Some(SlotKey {
            release: release.to_owned(),
            url: url.to_owned(),
        });

        Ok(CachedArtifact {
            path,
            release: release.to_owned(),
            url: url.to_owned(),
            reused: false,
        })
    }

    /// Forget the cached release and delete its file, along with any
    /// download left unfinished.
    pub async fn invalidate(&self) -> Result<(), CoreError> {
        let mut slot = self.inner.slot.lock().await;
        if let Some(key) = slot.take() {
            debug!(release = %key.release, "invalidating cached firmware release");
        }
        remove_if_present(&self.partial_path()).await?;
        remove_if_present(&self.path()).await
    }

    /// Release currently held in the slot.
    pub async fn cached_release(&self) -> Option<String> {
        self.inner
            .slot
            .lock()
            .await
            .as_ref()
            .map(|key| key.release.clone())
    }
}

async fn store_checked(partial: &Path, body: &[u8]) -> Result<(), CoreError> {
    tokio::fs::write(partial, body).await?;
    check_archive_blocking(partial.to_path_buf()).await
}

async fn remove_if_present(path: &Path) -> Result<(), CoreError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn check_archive_blocking(path: PathBuf) -> Result<(), CoreError> {
    tokio::task::spawn_blocking(move || check_archive(&path))
        .await
        .map_err(|e| CoreError::Internal(format!("archive check task failed: {e}")))?
}

/// Structural check of a zip archive: every entry must decompress and
/// match its stored CRC-32.
pub fn check_archive(path: &Path) -> Result<(), CoreError> {
    let invalid = |reason: String| CoreError::InvalidArtifact {
        path: path.display().to_string(),
        reason,
    };

    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| invalid(e.to_string()))?;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| invalid(e.to_string()))?;
        let name = entry.name().to_owned();
        io::copy(&mut entry, &mut io::sink()).map_err(|e| invalid(format!("{name}: {e}")))?;
    }
    Ok(())
}
