//! Ambient configuration (spec §6.3 `BuildFlags`, §6.4 environment variables).
//!
//! [`crate::graph::BuildFlags`] already carries the per-invocation build
//! knobs (sdk/arch/config/xcargs/...); this module carries the knobs that
//! describe *where things live and how hard to hit the network*, loaded
//! from the environment via `clap`'s `env` attribute so every field is
//! also CLI-overridable.

use clap::Args;
use derive_more::Debug;
use std::time::Duration;

use crate::path::AbsDirPath;

/// Default request timeout (spec §5 Cancellation/timeouts: "300 s per
/// request").
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Default per-resource timeout (spec §5: "600 s per resource").
pub const DEFAULT_RESOURCE_TIMEOUT: Duration = Duration::from_secs(600);

/// Default upload/download parallelism (spec §4.6 "default 15").
pub const DEFAULT_PARALLELISM: usize = 15;

/// Reclamation hysteresis applied below the usage `limit` (spec §4.2,
/// "suggested hysteresis = 0.1").
pub const RECLAIM_HYSTERESIS: f64 = 0.1;

/// Root configuration for a `rugby` invocation: cache location, remote
/// endpoint/credentials, parallelism, and timeouts. Environment variables
/// per spec §6.4; every field is also settable on the CLI.
#[derive(Clone, Args, Debug)]
pub struct RugbyConfig {
    /// Root directory holding `bin/` and `backup/` (spec §6.1). Defaults to
    /// the platform cache directory (see [`crate::fs::user_global_cache_path`]).
    #[arg(long = "rugby-root", env = "RUGBY_ROOT")]
    pub rugby_root: Option<AbsDirPath>,

    /// S3-compatible endpoint host for the remote cache (spec §6.4).
    #[arg(long = "s3-endpoint", env = "S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// Bucket name for the remote cache (spec §6.4).
    #[arg(long = "s3-bucket", env = "S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Access key for the remote cache (spec §6.4).
    #[arg(long = "s3-access-key", env = "S3_ACCESS_KEY")]
    #[debug(skip)]
    pub s3_access_key: Option<String>,

    /// Secret key for the remote cache (spec §6.4). Never logged.
    #[arg(long = "s3-secret-key", env = "S3_SECRET_KEY")]
    #[debug(skip)]
    pub s3_secret_key: Option<String>,

    /// Upload/download parallelism (spec §4.6, default 15).
    #[arg(long = "parallelism", default_value_t = DEFAULT_PARALLELISM)]
    pub parallelism: usize,

    /// Enables detailed request-signing traces (spec §6.4 `RUGBY_DEBUG_S3`).
    #[arg(long = "debug-s3", env = "RUGBY_DEBUG_S3")]
    pub debug_s3: Option<String>,
}

impl RugbyConfig {
    /// Whether `RUGBY_DEBUG_S3` was set to a non-empty value (spec §6.4).
    pub fn s3_debug_enabled(&self) -> bool {
        self.debug_s3.as_deref().is_some_and(|v| !v.is_empty())
    }

    /// Resolve the cache root, falling back to the platform default.
    pub async fn resolve_rugby_root(&self) -> color_eyre::Result<AbsDirPath> {
        match &self.rugby_root {
            Some(root) => Ok(root.clone()),
            None => crate::fs::user_global_cache_path().await,
        }
    }
}

impl Default for RugbyConfig {
    fn default() -> Self {
        Self {
            rugby_root: None,
            s3_endpoint: None,
            s3_bucket: None,
            s3_access_key: None,
            s3_secret_key: None,
            parallelism: DEFAULT_PARALLELISM,
            debug_s3: None,
        }
    }
}

/// Immutable debug options threaded through [`crate::remote::RemoteTransport`]
/// construction (spec §9 "Global mutable state" design note): the
/// environment is read once at start-up rather than consulted ambiently.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct DebugOptions {
    pub trace_signing: bool,
}

impl From<&RugbyConfig> for DebugOptions {
    fn from(config: &RugbyConfig) -> Self {
        Self {
            trace_signing: config.s3_debug_enabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_s3_is_off_by_default() {
        let config = RugbyConfig::default();
        assert!(!config.s3_debug_enabled());
    }

    #[test]
    fn debug_s3_requires_non_empty_value() {
        let mut config = RugbyConfig::default();
        config.debug_s3 = Some(String::new());
        assert!(!config.s3_debug_enabled());
        config.debug_s3 = Some("1".to_string());
        assert!(config.s3_debug_enabled());
    }
}
