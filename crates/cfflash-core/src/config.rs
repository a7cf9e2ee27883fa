// ── Runtime release configuration ──
//
// Describes where releases come from and where downloads are cached.
// The CLI (via cfflash-config) builds a `ReleaseSettings` and hands it in;
// core never reads config files.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// Release index of the official firmware bundles.
pub const DEFAULT_RELEASE_INDEX_URL: &str =
    "https://api.github.com/repos/bitcraze/crazyflie-release/releases";

/// Link used when initiating a cold boot.
pub const DEFAULT_LINK_URI: &str = "radio://0/100";

/// Configuration for [`ReleaseCache`](crate::ReleaseCache).
#[derive(Debug, Clone)]
pub struct ReleaseSettings {
    /// Release index URL.
    pub index_url: Url,
    /// Request timeout for index and artifact fetches.
    pub timeout: Duration,
    /// Parent directory for the temporary cache directory.
    /// `None` uses the platform temp dir.
    pub cache_parent: Option<PathBuf>,
    /// Optional bearer token for the index host.
    pub token: Option<SecretString>,
}

impl ReleaseSettings {
    /// Settings pointing at a custom index URL, everything else default.
    pub fn with_index_url(index_url: Url) -> Self {
        Self {
            index_url,
            timeout: Duration::from_secs(30),
            cache_parent: None,
            token: None,
        }
    }
}

impl Default for ReleaseSettings {
    fn default() -> Self {
        // The constant is a valid absolute URL.
        #[allow(clippy::expect_used)]
        let index_url = Url::parse(DEFAULT_RELEASE_INDEX_URL).expect("default index URL is valid");
        Self::with_index_url(index_url)
    }
}
