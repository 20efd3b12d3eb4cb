use crate::services::error::{StorageError, StorageResult};
use async_trait::async_trait;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::{NamedTempFile, PersistError};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

/// An upload written to the principal's staging area.
///
/// The file is deleted when the entry is dropped without being promoted,
/// which covers every failure path including a cancelled request.
#[derive(Debug)]
pub struct StagingEntry {
    file: NamedTempFile,
    size: u64,
}

impl StagingEntry {
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[derive(Debug, Error)]
pub enum PromoteError {
    /// The target name was taken after resolution. The entry is handed back
    /// so the caller can pick another name.
    #[error("target name already exists")]
    Collision(StagingEntry),

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Streams `reader` into a new staging entry, failing with
    /// `PayloadTooLarge` once more than `max_size` bytes arrive.
    async fn stage<'a>(
        &self,
        principal: &str,
        reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
        max_size: u64,
    ) -> StorageResult<StagingEntry>;

    /// Directory holding the principal's committed objects.
    fn principal_dir(&self, principal: &str) -> io::Result<PathBuf>;

    async fn ensure_principal_dir(&self, principal: &str) -> io::Result<PathBuf>;

    /// Atomically renames the entry to `name` inside the principal's directory
    /// without replacing an existing file. Returns the root-relative location.
    async fn promote(
        &self,
        entry: StagingEntry,
        principal: &str,
        name: &str,
    ) -> Result<String, PromoteError>;

    /// Opens a committed object, returning the handle and its current length.
    async fn open(&self, location: &str) -> io::Result<(File, u64)>;

    /// Removes a committed object. A missing file is not an error.
    async fn remove(&self, location: &str) -> io::Result<()>;

    /// Deletes staging files last modified before `older_than` ago.
    async fn sweep_staging(&self, older_than: Duration) -> io::Result<usize>;

    async fn health(&self) -> bool;
}

/// Local filesystem layout: `<root>/users/<principal>/<name>` for committed
/// objects and `<root>/tmp/<principal>/` for staging.
pub struct LocalStorageService {
    root: PathBuf,
}

pub fn validate_principal(principal: &str) -> io::Result<()> {
    let valid = !principal.is_empty()
        && principal.len() <= 128
        && principal
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid principal id: {:?}", principal),
        ))
    }
}

fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

impl LocalStorageService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn staging_root(&self) -> PathBuf {
        self.root.join("tmp")
    }

    fn staging_dir(&self, principal: &str) -> io::Result<PathBuf> {
        validate_principal(principal)?;
        Ok(self.staging_root().join(principal))
    }

    fn absolute(&self, location: &str) -> io::Result<PathBuf> {
        let relative = Path::new(location);
        if location.is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid storage location: {:?}", location),
            ));
        }
        Ok(self.root.join(relative))
    }

    async fn sweep_dir(dir: &Path, cutoff: SystemTime) -> io::Result<usize> {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let stale = meta.modified().map(|m| m < cutoff).unwrap_or(false);
            if stale {
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => warn!("Failed to remove staging file {:?}: {}", entry.path(), e),
                }
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    async fn stage<'a>(
        &self,
        principal: &str,
        reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
        max_size: u64,
    ) -> StorageResult<StagingEntry> {
        let dir = self.staging_dir(principal)?;
        tokio::fs::create_dir_all(&dir).await?;

        let temp = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".part")
            .tempfile_in(&dir)?;
        let mut file = File::from_std(temp.as_file().try_clone()?);

        let mut limited = reader.take(max_size.saturating_add(1));
        tokio::io::copy(&mut limited, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;

        let size = file.metadata().await?.len();
        if size > max_size {
            debug!("Staged upload for {} exceeded {} bytes", principal, max_size);
            return Err(StorageError::PayloadTooLarge { limit: max_size });
        }

        debug!("Staged {} bytes at {:?}", size, temp.path());
        Ok(StagingEntry { file: temp, size })
    }

    fn principal_dir(&self, principal: &str) -> io::Result<PathBuf> {
        validate_principal(principal)?;
        Ok(self.root.join("users").join(principal))
    }

    async fn ensure_principal_dir(&self, principal: &str) -> io::Result<PathBuf> {
        let dir = self.principal_dir(principal)?;
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    async fn promote(
        &self,
        entry: StagingEntry,
        principal: &str,
        name: &str,
    ) -> Result<String, PromoteError> {
        if !is_plain_name(name) {
            return Err(PromoteError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid object name: {:?}", name),
            )));
        }

        let dir = self.ensure_principal_dir(principal).await?;
        let target = dir.join(name);
        let StagingEntry { file, size } = entry;

        let persisted = tokio::task::spawn_blocking(move || file.persist_noclobber(&target))
            .await
            .map_err(io::Error::other)?;

        match persisted {
            Ok(_) => Ok(format!("users/{}/{}", principal, name)),
            Err(PersistError { error, file }) if error.kind() == io::ErrorKind::AlreadyExists => {
                Err(PromoteError::Collision(StagingEntry { file, size }))
            }
            Err(PersistError { error, .. }) => Err(PromoteError::Io(error)),
        }
    }

    async fn open(&self, location: &str) -> io::Result<(File, u64)> {
        let file = File::open(self.absolute(location)?).await?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }

    async fn remove(&self, location: &str) -> io::Result<()> {
        match tokio::fs::remove_file(self.absolute(location)?).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    async fn sweep_staging(&self, older_than: Duration) -> io::Result<usize> {
        let staging = self.staging_root();
        if !tokio::fs::try_exists(&staging).await? {
            return Ok(0);
        }

        let cutoff = SystemTime::now()
            .checked_sub(older_than)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut removed = 0;
        let mut principals = tokio::fs::read_dir(&staging).await?;
        while let Some(entry) = principals.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                removed += Self::sweep_dir(&entry.path(), cutoff).await?;
            }
        }

        if removed > 0 {
            info!("🧹 Removed {} stale staging files", removed);
        }
        Ok(removed)
    }

    async fn health(&self) -> bool {
        tokio::fs::try_exists(&self.root).await.unwrap_or(false)
    }
}
