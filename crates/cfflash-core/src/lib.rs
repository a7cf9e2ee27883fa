//! Control core of a quadcopter bootloader panel, between `cfflash-api` and
//! UI consumers (CLI / desktop front ends).
//!
//! - **[`StateController`]** holds the panel's [`ConnectionState`] and the
//!   last failure message, computes the [`StateView`] each state shows, and
//!   drives registered [`StateSink`]s on every transition.
//!
//! - **[`ConnectivityBinding`]** keeps several [`UiSurface`]s (address field,
//!   interface selector, connect/scan buttons) in sync and routes their
//!   events to single-slot callbacks.
//!
//! - **[`ReleaseCache`]** lists published firmware releases and downloads one
//!   archive at a time into a validated, URL-keyed cache slot.
//!
//! - **[`FlashOrchestrator`]** owns the [`Bootloader`] on a dedicated worker
//!   thread and sequences cold connect, warm reboot, flashing and reset.
//!
//! - **[`BootloaderPanel`]** ties the four together behind the operations a
//!   bootloader UI exposes.

pub mod bootloader;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod flash;
pub mod panel;
pub mod release;
pub mod state;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bootloader::{
    Bootloader, BoxError, CancelQuery, FirmwareLink, FlashTargets, ImageKind, ProgressCallback,
    Target,
};
pub use cache::{CACHE_FILE_NAME, CachedArtifact, ReleaseCache, check_archive};
pub use config::{DEFAULT_LINK_URI, DEFAULT_RELEASE_INDEX_URL, ReleaseSettings};
pub use connectivity::{ConnectivityBinding, LinkState, SurfaceControls, UiSurface};
pub use error::CoreError;
pub use flash::{BOOTLOADER_NOT_FOUND, BootMode, FlashEvent, FlashOrchestrator};
pub use panel::{BootloaderPanel, FirmwareSource};
pub use release::{ReleaseAsset, ReleaseCatalog, ReleaseIndexEntry};
pub use state::{ConnectionState, NOT_CONNECTED, StateController, StateSink, StateSnapshot, StateView};
