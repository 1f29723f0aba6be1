//! All-or-nothing in-place file rewrites.
//!
//! [`mutate_with_rollback`] snapshots a file into a sibling `.bak` before the
//! mutation runs. On success the backup is deleted; on failure the original
//! bytes are written back and then the backup is deleted. [`FileBackup`] also
//! restores on drop, which covers panics and cancelled futures.
//!
//! Every step that touches disk runs as a blocking task. A dropped future
//! cannot stop such a task halfway, so each one finishes its own cleanup.

use core::future::Future;
use core::mem::replace;
use std::ffi::OsStr;
use std::fs::{self as sync_fs, OpenOptions};
use std::io::{self, ErrorKind, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use devtools_core::{Error, Result};
use tokio::fs::read;
use tokio::task::{JoinError, spawn_blocking};
use tracing::{debug, error, warn};

/// Suffix appended to the target's file name for its backup.
pub const BACKUP_SUFFIX: &str = ".bak";

/// Sibling backup location for `target` (`app.ts` -> `app.ts.bak`).
pub fn backup_path_for(target: &Path) -> PathBuf {
    let mut file_name = target
        .file_name()
        .map(OsStr::to_os_string)
        .unwrap_or_default();
    file_name.push(BACKUP_SUFFIX);
    target.with_file_name(file_name)
}

/// Result of a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome<T> {
    /// Value produced by the mutation
    pub value: T,
    /// Whether the file's bytes differ from the snapshot
    pub changed: bool,
}

/// Where a backup write running on the blocking pool stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handoff {
    /// Still writing
    Pending,
    /// On disk, not yet claimed
    Written,
    /// The waiting future is gone; the writer removes what it made
    Abandoned,
    /// Owned by a [`FileBackup`]
    Claimed,
}

type SharedHandoff = Arc<Mutex<Handoff>>;

fn lock(handoff: &SharedHandoff) -> MutexGuard<'_, Handoff> {
    handoff.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns a backup file while it is written on the blocking pool.
///
/// Whichever of the writer and this guard finishes last removes the file,
/// unless it was claimed first.
#[derive(Debug)]
struct PendingBackup {
    path: PathBuf,
    handoff: SharedHandoff,
}

impl PendingBackup {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            handoff: Arc::new(Mutex::new(Handoff::Pending)),
        }
    }

    fn claim(&self) {
        *lock(&self.handoff) = Handoff::Claimed;
    }
}

impl Drop for PendingBackup {
    fn drop(&mut self) {
        let previous = replace(&mut *lock(&self.handoff), Handoff::Abandoned);
        if previous == Handoff::Written {
            debug!("Backup {:?} was never claimed, removing it", self.path);
            discard(&self.path);
        }
    }
}

/// Create `path` holding `contents`, refusing to replace an existing file.
///
/// A partially written file is removed before the error is returned.
fn write_new_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    let written = file.write_all(contents).and_then(|()| file.sync_all());
    if written.is_err() {
        drop(file);
        discard(path);
    }
    written
}

/// Blocking half of [`FileBackup::create`].
fn write_backup(path: &Path, contents: &[u8], handoff: &SharedHandoff) -> io::Result<()> {
    write_new_file(path, contents)?;
    if mark_written(handoff) == Handoff::Abandoned {
        debug!("Backup {path:?} finished after its caller went away, removing it");
        discard(path);
    }
    Ok(())
}

/// Record a finished write unless the caller already gave up.
fn mark_written(handoff: &SharedHandoff) -> Handoff {
    let mut state = lock(handoff);
    let previous = *state;
    if previous == Handoff::Pending {
        *state = Handoff::Written;
    }
    previous
}

fn discard(path: &Path) {
    if let Err(error) = sync_fs::remove_file(path) {
        warn!("Failed to remove backup {path:?}: {error}");
    }
}

fn task_failure(error: &JoinError) -> Error {
    Error::Mutation(format!("backup task failed: {error}"))
}

/// Target, backup location and snapshot, cheap to move onto the blocking pool.
#[derive(Debug, Clone)]
struct BackupSlot {
    target: PathBuf,
    backup: PathBuf,
    original: Arc<[u8]>,
}

impl BackupSlot {
    /// Drop the backup. If it cannot be removed the target is rolled back.
    fn release(&self) -> Result<()> {
        if let Err(error) = sync_fs::remove_file(&self.backup) {
            warn!(
                "Failed to remove backup {:?}, rolling {:?} back: {error}",
                self.backup, self.target
            );
            if let Err(restore_error) = sync_fs::write(&self.target, &self.original) {
                error!(
                    "Failed to restore {:?}; original content kept at {:?}: {restore_error}",
                    self.target, self.backup
                );
            }
            return Err(Error::Mutation(format!(
                "failed to remove backup {}: {error}",
                self.backup.display()
            )));
        }
        debug!("Committed mutation of {:?}", self.target);
        Ok(())
    }

    /// Write the snapshot back, then drop the backup.
    fn roll_back(&self) -> Result<()> {
        sync_fs::write(&self.target, &self.original).map_err(|error| {
            error!(
                "Failed to restore {:?}; original content kept at {:?}: {error}",
                self.target, self.backup
            );
            Error::Mutation(format!(
                "failed to restore {} (backup kept at {}): {error}",
                self.target.display(),
                self.backup.display()
            ))
        })?;

        sync_fs::remove_file(&self.backup).map_err(|error| {
            Error::Mutation(format!(
                "restored {} but failed to remove backup {}: {error}",
                self.target.display(),
                self.backup.display()
            ))
        })?;

        debug!("Restored {:?} from backup", self.target);
        Ok(())
    }
}

/// Scoped backup of one file.
///
/// Exactly one of [`Self::commit`] or [`Self::restore`] should be called. If
/// neither runs, drop restores the original content and removes the backup.
#[derive(Debug)]
pub struct FileBackup {
    slot: BackupSlot,
    armed: bool,
}

impl FileBackup {
    /// Snapshot `target` and write the untouched copy to its backup slot.
    ///
    /// Dropping the returned future at any point leaves no backup behind.
    ///
    /// # Errors
    /// Returns `Mutation` if the target cannot be read or the backup cannot
    /// be written, and `BackupExists` if the slot is already occupied.
    pub async fn create(target: &Path) -> Result<Self> {
        let original: Arc<[u8]> = read(target)
            .await
            .map_err(|error| {
                Error::Mutation(format!("failed to read {}: {error}", target.display()))
            })?
            .into();

        let backup = backup_path_for(target);
        let pending = PendingBackup::new(backup.clone());
        let handoff = Arc::clone(&pending.handoff);
        let contents = Arc::clone(&original);
        let job_path = backup.clone();

        spawn_blocking(move || write_backup(&job_path, &contents, &handoff))
            .await
            .map_err(|error| task_failure(&error))?
            .map_err(|error| {
                if error.kind() == ErrorKind::AlreadyExists {
                    Error::BackupExists(backup.clone())
                } else {
                    Error::Mutation(format!(
                        "failed to write backup {}: {error}",
                        backup.display()
                    ))
                }
            })?;
        pending.claim();

        debug!("Backed up {target:?} to {backup:?} ({} bytes)", original.len());

        Ok(Self {
            slot: BackupSlot {
                target: target.to_path_buf(),
                backup,
                original,
            },
            armed: true,
        })
    }

    /// Content of the file when the backup was taken.
    pub fn original(&self) -> &[u8] {
        &self.slot.original
    }

    /// Where the backup lives on disk.
    pub fn backup_path(&self) -> &Path {
        &self.slot.backup
    }

    /// Keep the mutated file and delete the backup.
    ///
    /// # Errors
    /// Returns `Mutation` if the backup cannot be removed. The target is
    /// rolled back in that case.
    pub async fn commit(mut self) -> Result<()> {
        self.armed = false;
        let slot = self.slot.clone();
        spawn_blocking(move || slot.release())
            .await
            .map_err(|error| task_failure(&error))?
    }

    /// Write the original bytes back and delete the backup.
    ///
    /// # Errors
    /// Returns `Mutation` if either step fails. If the target could not be
    /// rewritten the backup is left in place as the only good copy.
    pub async fn restore(mut self) -> Result<()> {
        self.armed = false;
        let slot = self.slot.clone();
        spawn_blocking(move || slot.roll_back())
            .await
            .map_err(|error| task_failure(&error))?
    }
}

impl Drop for FileBackup {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        warn!(
            "Mutation of {:?} did not complete, restoring original",
            self.slot.target
        );
        if let Err(error) = self.slot.roll_back() {
            error!("Rollback on drop failed: {error}");
        }
    }
}

/// Run `mutate` against `target` with backup-before and restore-on-failure.
///
/// The mutation's own success value is opaque here: a formatter exiting
/// nonzero is still a completed mutation. Only an `Err` from `mutate`, or a
/// failure re-reading the file afterwards, rolls the file back.
///
/// Dropping the returned future rolls the file back too. Work already handed
/// to the blocking pool runs to completion.
///
/// # Errors
/// Returns the mutation's error (after restoring), or `Mutation` /
/// `BackupExists` for backup-protocol failures.
pub async fn mutate_with_rollback<T, F, Fut>(target: &Path, mutate: F) -> Result<MutationOutcome<T>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let backup = FileBackup::create(target).await?;

    let attempt = async {
        let value = mutate().await?;
        let updated = read(target).await.map_err(|error| {
            Error::Mutation(format!(
                "failed to re-read {} after mutation: {error}",
                target.display()
            ))
        })?;
        Ok::<_, Error>((value, updated))
    }
    .await;

    match attempt {
        Ok((value, updated)) => {
            let changed = updated != backup.original();
            backup.commit().await?;
            Ok(MutationOutcome { value, changed })
        }
        Err(cause) => {
            warn!("Mutation of {target:?} failed, rolling back: {cause}");
            match backup.restore().await {
                Ok(()) => Err(cause),
                Err(restore_error) => Err(Error::Mutation(format!(
                    "{cause}; rollback also failed: {restore_error}"
                ))),
            }
        }
    }
}
