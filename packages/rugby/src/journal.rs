//! Crash-safe snapshot/restore of project files (spec §4.4, component C4).
//!
//! Two named slots, `original` and `tmp`, under `<rugbyRoot>/backup/`. Each
//! slot is a directory holding a shallow copy of every project file the
//! system will mutate, with relative paths preserved (spec §3.1
//! `JournalSlot`).

use std::collections::BTreeSet;

use color_eyre::{Result, eyre::Context};
use strum::{Display as StrumDisplay, EnumString};
use tracing::instrument;

use crate::error::RugbyError;
use crate::fs;
use crate::path::{AbsDirPath, AbsFilePath, RelativeTo as _, TryJoinWith as _};

/// The two named journal slots (spec §3.1 `JournalSlot`).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, StrumDisplay, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Slot {
    /// Created lazily on the first mutation of a clean project; retained
    /// until an explicit `rollback` (spec §4.4 Policy).
    Original,
    /// Created at the start of every mutating workflow; discarded on
    /// success, restored-then-discarded on failure or signal.
    Tmp,
}

/// Snapshots and restores project files under two named slots.
pub struct BackupJournal {
    backup_root: AbsDirPath,
}

impl BackupJournal {
    pub fn new(rugby_root: AbsDirPath) -> Result<Self> {
        let backup_root = rugby_root.try_join_dir("backup")?;
        Ok(Self { backup_root })
    }

    fn slot_dir(&self, slot: Slot) -> Result<AbsDirPath> {
        self.backup_root.try_join_dir(slot.to_string())
    }

    /// `exists(slot) -> bool` (spec §4.4).
    #[instrument(skip(self))]
    pub async fn exists(&self, slot: Slot) -> Result<bool> {
        Ok(self.slot_dir(slot)?.exists().await)
    }

    /// `snapshot(slot)` (spec §4.4): copies `files` (each an absolute path
    /// under `project_root`) into the slot, preserving their paths relative
    /// to `project_root`. Overwrites the slot if it already exists.
    #[instrument(skip(self, files))]
    pub async fn snapshot(
        &self,
        slot: Slot,
        project_root: &AbsDirPath,
        files: impl IntoIterator<Item = AbsFilePath>,
    ) -> Result<()> {
        let slot_dir = self.slot_dir(slot)?;
        if slot_dir.exists().await {
            fs::remove_dir_all(&slot_dir).await.context("clear existing slot")?;
        }
        fs::create_dir_all(&slot_dir).await.context("create slot directory")?;

        for file in files {
            let rel = file
                .relative_to(project_root)
                .with_context(|| format!("{file:?} is not under project root {project_root:?}"))?;
            let dst = slot_dir.join(&rel);
            if file.exists().await {
                fs::copy_file(&file, &dst).await.with_context(|| format!("snapshot {file:?}"))?;
            }
        }
        Ok(())
    }

    /// `restore(slot)` (spec §4.4): restores files from the slot back to
    /// their original locations under `project_root`. Fails with
    /// [`RugbyError::NoSnapshot`] if the slot does not exist.
    #[instrument(skip(self))]
    pub async fn restore(&self, slot: Slot, project_root: &AbsDirPath) -> Result<()> {
        let slot_dir = self.slot_dir(slot)?;
        if !slot_dir.exists().await {
            return Err(RugbyError::NoSnapshot.into());
        }

        use futures::TryStreamExt;
        fs::walk_files(&slot_dir)
            .try_for_each(|snapshotted| {
                let slot_dir = slot_dir.clone();
                let project_root = project_root.clone();
                async move {
                    let rel = snapshotted.relative_to(&slot_dir).context("relativize snapshot path")?;
                    let dst = project_root.join(&rel);
                    fs::copy_file(&snapshotted, &dst).await.with_context(|| format!("restore {dst:?}"))?;
                    Ok(())
                }
            })
            .await
    }

    /// `discard(slot)` (spec §4.4): deletes the slot.
    #[instrument(skip(self))]
    pub async fn discard(&self, slot: Slot) -> Result<()> {
        let slot_dir = self.slot_dir(slot)?;
        fs::remove_dir_all(&slot_dir).await
    }

    /// Ensures the `original` slot exists, snapshotting `files` into it if
    /// it doesn't (spec §4.4 Policy: "created lazily on the first mutation
    /// of a clean project").
    #[instrument(skip(self, files))]
    pub async fn ensure_original(
        &self,
        project_root: &AbsDirPath,
        files: impl IntoIterator<Item = AbsFilePath>,
    ) -> Result<()> {
        if self.exists(Slot::Original).await? {
            return Ok(());
        }
        self.snapshot(Slot::Original, project_root, files).await
    }
}

/// The set of project file paths a workflow is about to mutate, used to
/// build the snapshot list passed to [`BackupJournal::snapshot`]. Kept as a
/// plain set rather than deriving it from `ProjectGraph` here, since the
/// mapping from targets to on-disk project files is owned by the Project
/// Reader/Writer collaborators (spec §1 Non-goals).
pub type ProjectFileSet = BTreeSet<AbsFilePath>;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write(project_root: &AbsDirPath, rel: &str, content: &str) -> AbsFilePath {
        let path = project_root.try_join_file(rel).unwrap();
        fs::write(&path, content.as_bytes()).await.unwrap();
        path
    }

    #[tokio::test]
    async fn snapshot_then_restore_round_trips_p6() {
        let rugby_root = TempDir::new().unwrap();
        let project_root = TempDir::new().unwrap();
        let root = AbsDirPath::try_from(rugby_root.path().to_path_buf()).unwrap();
        let project_root = AbsDirPath::try_from(project_root.path().to_path_buf()).unwrap();
        let journal = BackupJournal::new(root).unwrap();

        let file = write(&project_root, "project.pbxproj", "original bytes").await;
        journal.snapshot(Slot::Tmp, &project_root, [file.clone()]).await.unwrap();

        fs::write(&file, b"mutated bytes").await.unwrap();
        assert_eq!(fs::must_read_buffered_utf8(&file).await.unwrap(), "mutated bytes");

        journal.restore(Slot::Tmp, &project_root).await.unwrap();
        assert_eq!(fs::must_read_buffered_utf8(&file).await.unwrap(), "original bytes");
    }

    #[tokio::test]
    async fn restore_without_snapshot_fails_no_snapshot() {
        let rugby_root = TempDir::new().unwrap();
        let project_root = TempDir::new().unwrap();
        let root = AbsDirPath::try_from(rugby_root.path().to_path_buf()).unwrap();
        let project_root = AbsDirPath::try_from(project_root.path().to_path_buf()).unwrap();
        let journal = BackupJournal::new(root).unwrap();

        let err = journal.restore(Slot::Original, &project_root).await.unwrap_err();
        assert_eq!(err.downcast_ref::<RugbyError>(), Some(&RugbyError::NoSnapshot));
    }

    #[tokio::test]
    async fn ensure_original_is_lazy_and_idempotent() {
        let rugby_root = TempDir::new().unwrap();
        let project_root = TempDir::new().unwrap();
        let root = AbsDirPath::try_from(rugby_root.path().to_path_buf()).unwrap();
        let project_root = AbsDirPath::try_from(project_root.path().to_path_buf()).unwrap();
        let journal = BackupJournal::new(root).unwrap();

        let file = write(&project_root, "project.pbxproj", "v1").await;
        journal.ensure_original(&project_root, [file.clone()]).await.unwrap();
        assert!(journal.exists(Slot::Original).await.unwrap());

        fs::write(&file, b"v2").await.unwrap();
        journal.ensure_original(&project_root, [file.clone()]).await.unwrap();

        journal.restore(Slot::Original, &project_root).await.unwrap();
        assert_eq!(fs::must_read_buffered_utf8(&file).await.unwrap(), "v1", "original slot must not be overwritten");
    }

    #[tokio::test]
    async fn discard_removes_slot() {
        let rugby_root = TempDir::new().unwrap();
        let project_root = TempDir::new().unwrap();
        let root = AbsDirPath::try_from(rugby_root.path().to_path_buf()).unwrap();
        let project_root = AbsDirPath::try_from(project_root.path().to_path_buf()).unwrap();
        let journal = BackupJournal::new(root).unwrap();

        let file = write(&project_root, "a", "x").await;
        journal.snapshot(Slot::Tmp, &project_root, [file]).await.unwrap();
        assert!(journal.exists(Slot::Tmp).await.unwrap());

        journal.discard(Slot::Tmp).await.unwrap();
        assert!(!journal.exists(Slot::Tmp).await.unwrap());
    }
}
