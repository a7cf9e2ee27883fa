// ── Release index model ──
//
// Domain view of the remote release index: named releases with ordered
// downloadable assets, and the flat label → URL catalog a selector shows.

use indexmap::IndexMap;
use serde::Serialize;

use cfflash_api::Release;

/// A downloadable file of a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub download_url: String,
}

/// One named release with its assets, in server order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseIndexEntry {
    pub name: String,
    pub assets: Vec<ReleaseAsset>,
}

impl ReleaseIndexEntry {
    /// `("<release> - <asset>", url)` for every asset.
    pub fn labels(&self) -> impl Iterator<Item = (String, &str)> {
        self.assets.iter().map(|asset| {
            (
                format!("{} - {}", self.name, asset.name),
                asset.download_url.as_str(),
            )
        })
    }
}

/// Convert wire releases, dropping those without a name.
pub(crate) fn index_entries(releases: Vec<Release>) -> Vec<ReleaseIndexEntry> {
    releases
        .into_iter()
        .filter_map(|release| {
            let name = release.name.filter(|name| !name.is_empty())?;
            let assets = release
                .assets
                .into_iter()
                .map(|asset| ReleaseAsset {
                    name: asset.name,
                    download_url: asset.browser_download_url,
                })
                .collect();
            Some(ReleaseIndexEntry { name, assets })
        })
        .collect()
}

/// Ordered label → download URL mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseCatalog {
    entries: IndexMap<String, String>,
}

impl ReleaseCatalog {
    pub fn from_entries(entries: &[ReleaseIndexEntry]) -> Self {
        let entries = entries
            .iter()
            .flat_map(ReleaseIndexEntry::labels)
            .map(|(label, url)| (label, url.to_owned()))
            .collect();
        Self { entries }
    }

    pub fn url(&self, label: &str) -> Option<&str> {
        self.entries.get(label).map(String::as_str)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(l, u)| (l.as_str(), u.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
