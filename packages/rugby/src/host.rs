//! Toolchain version detection for fingerprint stability.
//!
//! [`FingerprintEngine`](crate::fingerprint::FingerprintEngine) folds two
//! environment-derived strings into every target's context (spec §4.1,
//! inputs 3-4): the Swift toolchain version and the native (Xcode)
//! toolchain's `{base, build}` pair. Both are read once per process and are
//! otherwise opaque to the rest of the system — they exist purely so that a
//! toolchain upgrade invalidates every cached binary built under the old one.

use color_eyre::{Result, eyre::Context};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, instrument};

/// The `{base, build}` version pair reported by the native toolchain.
///
/// Modeled after `xcodebuild -version`, which prints a marketing version
/// (`Xcode 15.4`) and a build number (`Build version 15F31d`) on separate
/// lines.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Serialize, Deserialize)]
#[display("{base} ({build})")]
pub struct NativeToolchainVersion {
    /// The marketing version, e.g. `15.4`.
    pub base: String,
    /// The build identifier, e.g. `15F31d`.
    pub build: String,
}

impl NativeToolchainVersion {
    /// An explicit sentinel used when the toolchain cannot be queried.
    ///
    /// Still participates in the fingerprint so that "unknown toolchain"
    /// produces one stable fingerprint rather than a fresh one per run.
    pub fn unknown() -> Self {
        Self {
            base: "unknown".to_string(),
            build: "unknown".to_string(),
        }
    }

    /// Detect the installed native toolchain version by shelling out to
    /// `xcodebuild -version`.
    #[instrument(name = "NativeToolchainVersion::detect")]
    pub async fn detect() -> Result<Self> {
        let output = Command::new("xcodebuild")
            .arg("-version")
            .output()
            .await
            .context("run xcodebuild -version")?;
        if !output.status.success() {
            return Ok(Self::unknown());
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(Self::parse(&stdout))
    }

    /// Parse the output of `xcodebuild -version`.
    fn parse(stdout: &str) -> Self {
        let mut lines = stdout.lines();
        let base = lines
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .unwrap_or("unknown")
            .to_string();
        let build = lines
            .next()
            .and_then(|line| line.split_whitespace().last())
            .unwrap_or("unknown")
            .to_string();
        let version = Self { base, build };
        debug!(%version, "detected native toolchain version");
        version
    }
}

/// Detect the Swift toolchain version string by shelling out to `swift
/// --version`.
///
/// Returns the first line of output verbatim (e.g. `swift-driver version:
/// 1.90.11.1 Target: arm64-apple-macosx14.0`), since the fingerprint only
/// needs it to change when the toolchain changes, not to be parsed further.
#[instrument(name = "detect_swift_toolchain_version")]
pub async fn detect_swift_toolchain_version() -> Result<String> {
    let output = Command::new("swift")
        .arg("--version")
        .output()
        .await
        .context("run swift --version")?;
    if !output.status.success() {
        return Ok("unknown".to_string());
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = stdout
        .lines()
        .next()
        .unwrap_or("unknown")
        .trim()
        .to_string();
    debug!(%version, "detected swift toolchain version");
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_xcodebuild_output() {
        let stdout = "Xcode 15.4\nBuild version 15F31d\n";
        let version = NativeToolchainVersion::parse(stdout);
        assert_eq!(version.base, "15.4");
        assert_eq!(version.build, "15F31d");
    }

    #[test]
    fn falls_back_to_unknown_on_garbage_output() {
        let version = NativeToolchainVersion::parse("");
        assert_eq!(version.base, "unknown");
        assert_eq!(version.build, "unknown");
    }

    #[test]
    fn unknown_is_stable() {
        assert_eq!(
            NativeToolchainVersion::unknown(),
            NativeToolchainVersion::unknown()
        );
    }
}
