//! The content-addressed binary store (spec §4.2, component C2).
//!
//! Layout under `<rugbyRoot>/bin`:
//!
//! ```text
//! bin/
//!   <product-name>/
//!     <build-config>-<sdk>-<arch>/
//!       <fingerprint>/
//!         <artifact files and metadata.json>
//!   +latest
//! ```
//!
//! Depth from `bin/` to the `<fingerprint>` directory is exactly three; the
//! leaf directory name must match `[a-f0-9]+`. Scans (`refresh_latest`,
//! `usage`, `reclaim`) rely on this invariant to avoid parsing anything.

use std::collections::BTreeMap;
use std::time::SystemTime;

use color_eyre::{Result, eyre::Context};
use jiff::Timestamp;
use lazy_regex::regex_is_match;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{instrument, trace, warn};

use crate::error::RugbyError;
use crate::fs::{self, LockFile, Unlocked};
use crate::path::{AbsDirPath, AbsFilePath, JoinWith as _, RelativeTo as _, TryJoinWith as _};

/// Suggested hysteresis below `reclaim`'s `limit` fraction (spec §4.2).
pub const RECLAIM_HYSTERESIS: f64 = 0.1;

/// The name of the flat latest-pointer registry file (spec §3.1 `LatestPointer`).
pub const LATEST_FILE_NAME: &str = "+latest";

/// Identifies one cache entry: a target's product/build-config/sdk/arch
/// group, plus its fingerprint. Built by the caller (the `Orchestrator`,
/// which owns the `Target`/`BuildFlags` types this store doesn't need to
/// know about) from spec §3.1's `(product, buildConfig, sdk, arch,
/// fingerprint)` identity.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct CacheKey {
    pub product: String,
    pub config: String,
    pub sdk: String,
    pub arch: String,
    pub fingerprint: String,
}

impl CacheKey {
    /// The `<build-config>-<sdk>-<arch>` group key (spec §4.2 layout, §3.1
    /// `LatestPointer` grouping).
    pub fn group_key(&self) -> String {
        format!("{}-{}-{}", self.config, self.sdk, self.arch)
    }
}

/// The `metadata.json` sidecar written by [`BinaryStore::import`] (spec §6.1).
#[derive(Clone, Debug, Serialize, Deserialize)]
struct Metadata {
    fingerprint: String,
    product: String,
    config: String,
    sdk: String,
    arch: String,
    #[serde(rename = "createdAt")]
    created_at: String,
}

/// A located, validated cache entry (spec §3.1 `CacheEntry`).
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub path: AbsDirPath,
    pub size_bytes: u64,
    pub created_at: Timestamp,
    pub last_access: Option<SystemTime>,
}

/// Aggregate usage of the store's volume (spec §4.2 `usage()`).
#[derive(Clone, Copy, Debug)]
pub struct Usage {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl Usage {
    pub fn fraction_used(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.total_bytes as f64
        }
    }
}

/// The content-addressed local binary cache, keyed by [`CacheKey`].
pub struct BinaryStore {
    root: AbsDirPath,
}

impl BinaryStore {
    pub fn new(rugby_root: AbsDirPath) -> Self {
        Self { root: rugby_root }
    }

    /// The `<rugbyRoot>` this store is rooted at (spec §6.1).
    pub fn root(&self) -> &AbsDirPath {
        &self.root
    }

    /// Deletes every cache entry and the `+latest` pointer, leaving the
    /// backup journal (a separate component, spec §4.4) untouched.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        let _lock = self.lock().await?;
        let bin_dir = self.bin_dir()?;
        if bin_dir.exists().await {
            fs::remove_dir_all(&bin_dir).await.context("remove bin directory")?;
        }
        Ok(())
    }

    fn bin_dir(&self) -> Result<AbsDirPath> {
        self.root.try_join_dir("bin")
    }

    fn group_dir(&self, key: &CacheKey) -> Result<AbsDirPath> {
        self.bin_dir()?.try_join_dirs([key.product.as_str(), key.group_key().as_str()])
    }

    fn entry_dir(&self, key: &CacheKey) -> Result<AbsDirPath> {
        self.group_dir(key)?.try_join_dir(&key.fingerprint)
    }

    fn latest_path(&self) -> Result<AbsFilePath> {
        self.bin_dir()?.try_join_file(LATEST_FILE_NAME)
    }

    fn lock_path(&self) -> Result<AbsFilePath> {
        self.bin_dir()?.try_join_file(".lock")
    }

    /// Acquires the advisory `bin/.lock` taken around mutating operations
    /// (spec §5 Shared-resource policy, §9 supplemented feature). Multiple
    /// `rugby` processes against the same cache root serialize here.
    async fn lock(&self) -> Result<LockFile<crate::fs::Locked>> {
        let path = self.lock_path()?;
        fs::create_dir_all(&path.parent().expect("lock path has a parent")).await?;
        let lock = LockFile::<Unlocked>::open(path).await.context("open advisory lock")?;
        lock.lock().await.context("acquire advisory lock")
    }

    /// `lookup(key) -> Option<CacheEntry>` (spec §4.2).
    ///
    /// A missing or unparsable `metadata.json` is [`RugbyError::CorruptCacheEntry`]
    /// and is treated as a miss; the entry is removed so future lookups
    /// don't keep paying the parse cost (spec §7).
    #[instrument(skip(self))]
    pub async fn lookup(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let dir = self.entry_dir(key)?;
        if !dir.exists().await {
            return Ok(None);
        }

        match self.read_entry(key, &dir).await {
            Ok(entry) => Ok(Some(entry)),
            Err(err) => {
                warn!(?dir, error = ?err, "corrupt cache entry, treating as miss and removing");
                fs::remove_dir_all(&dir).await.ok();
                Ok(None)
            }
        }
    }

    async fn read_entry(&self, key: &CacheKey, dir: &AbsDirPath) -> Result<CacheEntry> {
        let metadata_path = dir.try_join_file("metadata.json")?;
        let bytes = fs::must_read_buffered(&metadata_path).await.map_err(|cause| {
            RugbyError::CorruptCacheEntry {
                path: dir.as_str_lossy().into_owned(),
                reason: format!("missing metadata.json: {cause}"),
            }
        })?;
        let metadata: Metadata = serde_json::from_slice(&bytes).map_err(|cause| RugbyError::CorruptCacheEntry {
            path: dir.as_str_lossy().into_owned(),
            reason: format!("unparsable metadata.json: {cause}"),
        })?;
        if metadata.fingerprint != key.fingerprint {
            return Err(RugbyError::CorruptCacheEntry {
                path: dir.as_str_lossy().into_owned(),
                reason: "metadata fingerprint does not match directory name".to_string(),
            }
            .into());
        }

        let size_bytes = Self::dir_size(dir).await?;
        let created_at: Timestamp = metadata.created_at.parse().map_err(|cause| RugbyError::CorruptCacheEntry {
            path: dir.as_str_lossy().into_owned(),
            reason: format!("unparsable createdAt: {cause}"),
        })?;
        let last_access = fs::metadata(dir.as_std_path())
            .await
            .ok()
            .flatten()
            .and_then(|m| m.accessed().ok());

        Ok(CacheEntry {
            key: key.clone(),
            path: dir.clone(),
            size_bytes,
            created_at,
            last_access,
        })
    }

    async fn dir_size(dir: &AbsDirPath) -> Result<u64> {
        use futures::TryStreamExt;
        fs::walk_files(dir)
            .and_then(|file| async move { fs::metadata(file.as_std_path()).await })
            .try_fold(0u64, |total, metadata| async move {
                Ok(total + metadata.map(|m| m.len()).unwrap_or(0))
            })
            .await
    }

    /// `import(key, source) -> CacheEntry` (spec §4.2).
    ///
    /// Atomic w.r.t. readers: writes to a temp directory alongside the
    /// canonical key, then renames into place (spec P4: "no partial entry is
    /// ever observed").
    #[instrument(skip(self))]
    pub async fn import(&self, key: &CacheKey, source: &AbsDirPath, created_at: Timestamp) -> Result<CacheEntry> {
        let _lock = self.lock().await?;

        let dir = self.entry_dir(key)?;
        let group_dir = self.group_dir(key)?;
        fs::create_dir_all(&group_dir).await.context("create group directory")?;

        let tmp_name = format!(".import-{}-{}", key.fingerprint, rand::thread_rng().r#gen::<u64>());
        let tmp_dir = group_dir.try_join_dir(&tmp_name)?;
        fs::copy_dir(source, &tmp_dir).await.context("stage artifacts")?;

        let metadata = Metadata {
            fingerprint: key.fingerprint.clone(),
            product: key.product.clone(),
            config: key.config.clone(),
            sdk: key.sdk.clone(),
            arch: key.arch.clone(),
            created_at: created_at.to_string(),
        };
        let metadata_path = tmp_dir.try_join_file("metadata.json")?;
        let metadata_bytes = serde_json::to_vec_pretty(&metadata).context("serialize metadata")?;
        fs::write(&metadata_path, metadata_bytes).await.context("write metadata")?;

        if dir.exists().await {
            fs::remove_dir_all(&dir).await.context("remove stale entry")?;
        }
        fs::rename(&tmp_dir, &dir).await.context("rename into place")?;

        trace!(?dir, "imported cache entry");
        self.read_entry(key, &dir).await
    }

    /// `refreshLatest() -> count` (spec §4.2).
    ///
    /// Walks the store, groups entries by `(product, group_key)`, picks the
    /// one with the greatest modification time per group, and writes the
    /// absolute paths one per line to `+latest`. Rotates any existing
    /// `+latest` to a microsecond-timestamped backup first, falling back to
    /// a random suffix on collision (spec §9 open question: the full
    /// fallback is kept). The rewrite itself is atomic (spec P5).
    #[instrument(skip(self))]
    pub async fn refresh_latest(&self) -> Result<usize> {
        let _lock = self.lock().await?;

        let entries = self.scan_all().await?;
        let mut newest: BTreeMap<(String, String), (AbsDirPath, SystemTime)> = BTreeMap::new();
        for (key, dir, mtime) in entries {
            let group = (key.product.clone(), key.group_key());
            match newest.get(&group) {
                Some((_, existing_mtime)) if *existing_mtime >= mtime => {}
                _ => {
                    newest.insert(group, (dir, mtime));
                }
            }
        }

        self.backup_existing_latest().await;

        let latest_path = self.latest_path()?;
        let tmp_path = latest_path.parent().expect("latest has a parent").try_join_file(format!(
            ".{}.tmp",
            LATEST_FILE_NAME.trim_start_matches('+')
        ))?;

        let mut body = String::new();
        for (_, (dir, _)) in &newest {
            body.push_str(&dir.as_str_lossy());
            body.push('\n');
        }
        fs::write(&tmp_path, body.as_bytes()).await.context("write latest tmp")?;
        fs::rename(&tmp_path, &latest_path).await.context("rename latest into place")?;

        Ok(newest.len())
    }

    /// Reads the `+latest` pointer file, yielding one absolute cache-entry
    /// directory per line (spec §4.6: "Selection is read from `+latest`").
    /// An absent file reads as empty rather than an error.
    #[instrument(skip(self))]
    pub async fn read_latest(&self) -> Result<Vec<AbsDirPath>> {
        let path = self.latest_path()?;
        let Some(content) = fs::read_buffered_utf8(&path).await? else {
            return Ok(Vec::new());
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| AbsDirPath::try_from(line).with_context(|| format!("parse +latest line {line:?}")))
            .collect()
    }

    /// The store-relative key for a cache-entry directory (spec §4.6
    /// Addressing: "Object key = relative path from `bin/` root"), e.g.
    /// `MyPod/Debug-sim-arm64/abc123`.
    pub fn relative_key(&self, entry_dir: &AbsDirPath) -> Result<String> {
        let bin_dir = self.bin_dir()?;
        let rel = entry_dir.relative_to(&bin_dir).context("entry dir must live under bin/")?;
        Ok(rel.as_str_lossy().replace(std::path::MAIN_SEPARATOR, "/"))
    }

    /// The inverse of [`Self::relative_key`]: the local cache-entry
    /// directory a store-relative key names, used by a `remote download`
    /// to know where to extract a fetched object to (spec §4.6 Addressing).
    pub fn entry_dir_for_key(&self, key: &str) -> Result<AbsDirPath> {
        self.bin_dir()?.try_join_dirs(key.split('/'))
    }

    async fn backup_existing_latest(&self) {
        let Ok(latest_path) = self.latest_path() else { return };
        if !latest_path.exists().await {
            return;
        }
        let Ok(bin_dir) = self.bin_dir() else { return };

        let micros = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_micros())
            .unwrap_or(0);
        let mut backup_path = bin_dir.try_join_file(format!("{LATEST_FILE_NAME}.backup.{micros}"));
        if backup_path.as_ref().is_ok_and(|p| p.as_std_path().exists()) {
            let suffix: u32 = rand::thread_rng().r#gen();
            backup_path = bin_dir.try_join_file(format!("{LATEST_FILE_NAME}.backup.{micros}.{suffix}"));
        }
        match backup_path {
            Ok(backup_path) => {
                if let Err(err) = fs::copy_file(&latest_path, &backup_path).await {
                    warn!(error = ?err, "failed to back up +latest, proceeding without backup");
                }
            }
            Err(err) => warn!(error = ?err, "failed to compute +latest backup path"),
        }
    }

    /// Walks `bin/` for every valid `<product>/<group>/<fingerprint>`
    /// triple, returning the parsed key, its directory, and its
    /// modification time (used as the LRU/"most recent" signal).
    async fn scan_all(&self) -> Result<Vec<(CacheKey, AbsDirPath, SystemTime)>> {
        let bin_dir = self.bin_dir()?;
        if !bin_dir.exists().await {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        let mut products = fs::read_dir(&bin_dir).await?;
        while let Some(product_entry) = products.next_entry().await.context("read bin dir")? {
            if !product_entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let product = product_entry.file_name().to_string_lossy().into_owned();
            let product_dir = AbsDirPath::try_from(product_entry.path())?;

            let mut groups = fs::read_dir(&product_dir).await?;
            while let Some(group_entry) = groups.next_entry().await.context("read product dir")? {
                if !group_entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                    continue;
                }
                let group_key = group_entry.file_name().to_string_lossy().into_owned();
                let Some((config, sdk, arch)) = split_group_key(&group_key) else {
                    continue;
                };
                let group_dir = AbsDirPath::try_from(group_entry.path())?;

                let mut fingerprints = fs::read_dir(&group_dir).await?;
                while let Some(fp_entry) = fingerprints.next_entry().await.context("read group dir")? {
                    if !fp_entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                        continue;
                    }
                    let fingerprint = fp_entry.file_name().to_string_lossy().into_owned();
                    if fingerprint.starts_with('.') || !regex_is_match!(r"^[a-f0-9]+$", &fingerprint) {
                        continue;
                    }
                    let dir = AbsDirPath::try_from(fp_entry.path())?;
                    let mtime = fs::metadata(dir.as_std_path())
                        .await
                        .ok()
                        .flatten()
                        .and_then(|m| m.modified().ok())
                        .unwrap_or(SystemTime::UNIX_EPOCH);
                    out.push((
                        CacheKey {
                            product: product.clone(),
                            config: config.to_string(),
                            sdk: sdk.to_string(),
                            arch: arch.to_string(),
                            fingerprint,
                        },
                        dir,
                        mtime,
                    ));
                }
            }
        }
        Ok(out)
    }

    /// `usage() -> {usedBytes, totalBytes, fractionUsed}` (spec §4.2).
    #[instrument(skip(self))]
    pub async fn usage(&self) -> Result<Usage> {
        let bin_dir = self.bin_dir()?;
        let used_bytes = if bin_dir.exists().await {
            Self::dir_size(&bin_dir).await?
        } else {
            0
        };
        let total_bytes = Self::volume_total_bytes(&bin_dir)?;
        Ok(Usage { used_bytes, total_bytes })
    }

    #[cfg(unix)]
    fn volume_total_bytes(path: &AbsDirPath) -> Result<u64> {
        use std::ffi::CString;
        use std::mem::MaybeUninit;

        let existing = path.as_std_path();
        let probe_path = if existing.exists() {
            existing.to_path_buf()
        } else {
            existing
                .ancestors()
                .find(|p| p.exists())
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| std::path::PathBuf::from("/"))
        };
        let c_path = CString::new(probe_path.to_string_lossy().as_bytes()).context("path contains NUL")?;

        // SAFETY: `c_path` is NUL-terminated and `stat` is initialized by
        // `statvfs` before we read from it (checked by the return code).
        let stat = unsafe {
            let mut stat: MaybeUninit<libc::statvfs> = MaybeUninit::uninit();
            if libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) != 0 {
                color_eyre::eyre::bail!("statvfs failed for {probe_path:?}");
            }
            stat.assume_init()
        };
        Ok(stat.f_blocks as u64 * stat.f_frsize as u64)
    }

    #[cfg(not(unix))]
    fn volume_total_bytes(_path: &AbsDirPath) -> Result<u64> {
        Ok(0)
    }

    /// `reclaim(limit) -> freedBytes` (spec §4.2).
    ///
    /// If usage is at or above `limit`, deletes entries least-recently-used
    /// first until strictly below `limit - RECLAIM_HYSTERESIS`. Entries in
    /// `protected` (the current run's plan, spec §4.2 "never delete an
    /// entry referenced by the current run's plan") are skipped.
    #[instrument(skip(self, protected))]
    pub async fn reclaim(&self, limit: f64, protected: &std::collections::BTreeSet<String>) -> Result<u64> {
        let _lock = self.lock().await?;

        let usage = self.usage().await?;
        if usage.fraction_used() < limit {
            return Ok(0);
        }
        if usage.total_bytes == 0 {
            return Ok(0);
        }

        let target_bytes = ((limit - RECLAIM_HYSTERESIS).max(0.0) * usage.total_bytes as f64) as u64;
        let mut entries = self.scan_all().await?;

        // LRU order: prefer atime, fall back to mtime (which doubles as
        // createdAt's proxy on filesystems without reliable atime tracking,
        // spec §4.2 "else by createdAt").
        let mut with_access = Vec::with_capacity(entries.len());
        for (key, dir, mtime) in entries.drain(..) {
            let access = fs::metadata(dir.as_std_path())
                .await
                .ok()
                .flatten()
                .and_then(|m| m.accessed().ok())
                .unwrap_or(mtime);
            with_access.push((key, dir, access));
        }
        with_access.sort_by_key(|(_, _, access)| *access);

        let mut freed = 0u64;
        let mut used = usage.used_bytes;
        for (key, dir, _) in with_access {
            if used <= target_bytes {
                break;
            }
            if protected.contains(&key.fingerprint) {
                continue;
            }
            let size = Self::dir_size(&dir).await.unwrap_or(0);
            if let Err(err) = fs::remove_dir_all(&dir).await {
                warn!(?dir, error = ?err, "failed to reclaim cache entry, continuing");
                continue;
            }
            freed += size;
            used = used.saturating_sub(size);
        }

        Ok(freed)
    }
}

fn split_group_key(group_key: &str) -> Option<(&str, &str, &str)> {
    let mut parts = group_key.rsplitn(3, '-');
    let arch = parts.next()?;
    let sdk = parts.next()?;
    let config = parts.next()?;
    Some((config, sdk, arch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(product: &str, fingerprint: &str) -> CacheKey {
        CacheKey {
            product: product.to_string(),
            config: "Debug".to_string(),
            sdk: "sim".to_string(),
            arch: "arm64".to_string(),
            fingerprint: fingerprint.to_string(),
        }
    }

    async fn store_at(tmp: &TempDir) -> BinaryStore {
        let root = AbsDirPath::try_from(tmp.path().to_path_buf()).unwrap();
        BinaryStore::new(root)
    }

    #[tokio::test]
    async fn import_then_lookup_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = store_at(&tmp).await;

        let source = TempDir::new().unwrap();
        fs::write(
            &AbsFilePath::try_from(source.path().join("lib.a")).unwrap(),
            b"binary content",
        )
        .await
        .unwrap();

        let k = key("MyPod", "abcdef0123");
        let entry = store
            .import(
                &k,
                &AbsDirPath::try_from(source.path().to_path_buf()).unwrap(),
                Timestamp::from_second(1_700_000_000).unwrap(),
            )
            .await
            .unwrap();
        assert!(entry.path.as_std_path().join("lib.a").exists());
        assert!(entry.path.as_std_path().join("metadata.json").exists());

        let found = store.lookup(&k).await.unwrap().expect("entry should be found");
        assert_eq!(found.key, k);
    }

    #[tokio::test]
    async fn lookup_of_unknown_key_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = store_at(&tmp).await;
        let k = key("MyPod", "0000000000");
        assert!(store.lookup(&k).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_metadata_is_treated_as_miss_and_removed() {
        let tmp = TempDir::new().unwrap();
        let store = store_at(&tmp).await;
        let k = key("MyPod", "deadbeef01");

        let dir = store.entry_dir(&k).unwrap();
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(&dir.try_join_file("metadata.json").unwrap(), b"not json").await.unwrap();

        assert!(store.lookup(&k).await.unwrap().is_none());
        assert!(!dir.as_std_path().exists());
    }

    #[tokio::test]
    async fn refresh_latest_picks_newest_per_group_p5() {
        let tmp = TempDir::new().unwrap();
        let store = store_at(&tmp).await;

        let source = TempDir::new().unwrap();
        fs::write(&AbsFilePath::try_from(source.path().join("a")).unwrap(), b"x").await.unwrap();
        let source_dir = AbsDirPath::try_from(source.path().to_path_buf()).unwrap();

        let k1 = key("MyPod", "1111111111");
        let k2 = key("MyPod", "2222222222");
        store
            .import(&k1, &source_dir, Timestamp::from_second(1_700_000_000).unwrap())
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let entry2 = store
            .import(&k2, &source_dir, Timestamp::from_second(1_700_000_100).unwrap())
            .await
            .unwrap();

        let count = store.refresh_latest().await.unwrap();
        assert_eq!(count, 1, "one group should yield one latest-pointer line");

        let latest_contents = fs::must_read_buffered_utf8(&store.latest_path().unwrap()).await.unwrap();
        let lines: Vec<_> = latest_contents.lines().collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0], entry2.path.as_str_lossy());
    }

    #[tokio::test]
    async fn refresh_latest_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = store_at(&tmp).await;

        let source = TempDir::new().unwrap();
        fs::write(&AbsFilePath::try_from(source.path().join("a")).unwrap(), b"x").await.unwrap();
        let source_dir = AbsDirPath::try_from(source.path().to_path_buf()).unwrap();

        store
            .import(&key("MyPod", "aaaaaaaaaa"), &source_dir, Timestamp::from_second(1_700_000_000).unwrap())
            .await
            .unwrap();

        store.refresh_latest().await.unwrap();
        let first = fs::must_read_buffered_utf8(&store.latest_path().unwrap()).await.unwrap();
        store.refresh_latest().await.unwrap();
        let second = fs::must_read_buffered_utf8(&store.latest_path().unwrap()).await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn split_group_key_parses_dashed_triple() {
        assert_eq!(split_group_key("Debug-sim-arm64"), Some(("Debug", "sim", "arm64")));
        assert_eq!(split_group_key("Release-device-x86_64"), Some(("Release", "device", "x86_64")));
        assert_eq!(split_group_key("weird"), None);
    }
}
