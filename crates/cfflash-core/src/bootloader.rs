// ── Bootloader collaborator ──
//
// The radio bootloader protocol lives outside this crate. These traits are
// the seam it plugs into, plus the small vocabulary shared with it: flash
// targets and accepted image kinds.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::CoreError;

/// Error type returned by bootloader implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Progress report: status text and percentage (negative when unknown).
pub type ProgressCallback = Box<dyn Fn(&str, i32) + Send>;

/// Polled by the bootloader between flash steps; `true` asks it to stop.
pub type CancelQuery = Box<dyn Fn() -> bool + Send>;

/// Radio bootloader for the quadcopter.
///
/// All calls block; the flash worker owns the implementation exclusively.
pub trait Bootloader: Send {
    /// Connect to the bootloader. `warm_boot` reboots a running firmware
    /// link into bootloader mode instead of waiting for a power cycle.
    /// `Ok(false)` means no bootloader answered.
    fn start_bootloader(&mut self, warm_boot: bool) -> Result<bool, BoxError>;

    /// Write `image` to the selected targets. An empty target map flashes
    /// every target contained in the image.
    fn flash(&mut self, image: &Path, targets: &FlashTargets) -> Result<(), BoxError>;

    /// Leave the bootloader and start the application firmware.
    fn reset_to_firmware(&mut self) -> Result<(), BoxError>;

    fn close(&mut self);

    /// Link to reuse for a warm boot.
    fn set_link_uri(&mut self, uri: &str);

    fn set_progress_callback(&mut self, callback: ProgressCallback);

    fn set_cancel_query(&mut self, query: CancelQuery);
}

/// The live application-firmware link, closed before a warm boot.
pub trait FirmwareLink: Send + Sync {
    fn uri(&self) -> Option<String>;
    fn close(&self);
}

// ── Targets ──────────────────────────────────────────────────────────

/// A microcontroller on the quadcopter that can be flashed on its own.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Application MCU.
    Stm32,
    /// Radio and power MCU.
    Nrf51,
}

/// Image kinds to write per target. Empty means "everything in the image".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlashTargets(BTreeMap<Target, Vec<String>>);

impl FlashTargets {
    pub fn all() -> Self {
        Self::default()
    }

    /// Firmware of a single target.
    pub fn only(target: Target) -> Self {
        let mut map = BTreeMap::new();
        map.insert(target, vec!["fw".to_owned()]);
        Self(map)
    }

    pub fn from_filter(filter: Option<Target>) -> Self {
        filter.map_or_else(Self::all, Self::only)
    }

    pub fn is_all(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, target: Target) -> Option<&[String]> {
        self.0.get(&target).map(Vec::as_slice)
    }
}

impl fmt::Display for FlashTargets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            return f.write_str("all");
        }
        let names: Vec<&str> = self.0.keys().map(AsRef::as_ref).collect();
        f.write_str(&names.join(","))
    }
}

// ── Image kinds ──────────────────────────────────────────────────────

/// Firmware image formats accepted from local files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// Raw binary for one target.
    Bin,
    /// Release bundle with images for several targets.
    Zip,
}

impl ImageKind {
    /// Classify `path` by extension. Only `.bin` and `.zip` are accepted.
    pub fn from_path(path: &Path) -> Result<Self, CoreError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("bin") => Ok(Self::Bin),
            Some("zip") => Ok(Self::Zip),
            _ => Err(CoreError::validation(
                "Wrong file extension. Must be .bin or .zip.",
            )),
        }
    }

    /// Target preselected for this kind: everything for a bundle, the
    /// application MCU for a raw binary.
    pub fn default_filter(self) -> Option<Target> {
        match self {
            Self::Bin => Some(Target::Stm32),
            Self::Zip => None,
        }
    }

    /// A raw binary must name the target it is written to.
    pub fn accepts(self, filter: Option<Target>) -> bool {
        match self {
            Self::Bin => filter.is_some(),
            Self::Zip => true,
        }
    }
}
