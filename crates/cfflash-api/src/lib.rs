//! Async HTTP client for the Crazyflie firmware release index.
//!
//! Two surfaces, both on a shared [`TransportConfig`]:
//!
//! - **[`ReleaseClient::list_releases`]** reads the GitHub-style release
//!   index (a JSON array of releases, each carrying downloadable assets).
//! - **[`ReleaseClient::download`]** fetches an arbitrary artifact URL and
//!   returns the raw body.
//!
//! Errors are reported through a single [`Error`] enum; `cfflash-core` maps
//! them into user-facing diagnostics.

pub mod error;
pub mod releases;
pub mod transport;

pub use error::Error;
pub use releases::{Asset, Release, ReleaseClient};
pub use transport::TransportConfig;
