use parking_lot::Mutex;
use std::io;
use std::path::PathBuf;
use tempfile::TempDir;
use uuid::Uuid;

const JOB_DIR_PREFIX: &str = "job-";

/// Filesystem storage for job artifacts under the configured audio directory.
///
/// Every job gets its own temporary directory; it is removed when the job
/// releases it or when the `JobStorage` is dropped.
pub struct ArtifactRepository {
    root: PathBuf,
}

impl ArtifactRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Remove job directories left behind by a previous process
    pub async fn sweep_stale(&self) -> io::Result<usize> {
        tokio::fs::create_dir_all(&self.root).await?;

        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let is_job_dir = name.to_string_lossy().starts_with(JOB_DIR_PREFIX)
                && entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_job_dir {
                continue;
            }

            match tokio::fs::remove_dir_all(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(
                    path = %entry.path().display(),
                    error = %e,
                    "Failed to remove stale job directory"
                ),
            }
        }

        tracing::info!(root = %self.root.display(), removed, "Stale job directories swept");
        Ok(removed)
    }

    /// Allocate the private directory of a new job
    pub async fn allocate(&self, job_id: Uuid) -> io::Result<JobStorage> {
        let root = self.root.clone();
        let dir = tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&root)?;
            tempfile::Builder::new()
                .prefix(&format!("{}{}-", JOB_DIR_PREFIX, job_id.simple()))
                .tempdir_in(&root)
        })
        .await
        .map_err(io::Error::other)??;

        tracing::debug!(job_id = %job_id, path = %dir.path().display(), "Job storage allocated");

        Ok(JobStorage {
            path: dir.path().to_path_buf(),
            dir: Mutex::new(Some(dir)),
        })
    }

    /// Probe used by the readiness check
    pub async fn is_writable(&self) -> bool {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&root).is_ok() && tempfile::tempfile_in(&root).is_ok()
        })
        .await
        .unwrap_or(false)
    }
}

/// A job's temporary directory. Released explicitly or on drop.
#[derive(Debug)]
pub struct JobStorage {
    path: PathBuf,
    dir: Mutex<Option<TempDir>>,
}

impl JobStorage {
    pub fn is_released(&self) -> bool {
        self.dir.lock().is_none()
    }

    pub async fn write_artifact(&self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        if self.is_released() {
            return Err(released_error());
        }
        let path = self.path.join(file_name);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    pub async fn read_artifact(&self, file_name: &str) -> io::Result<Vec<u8>> {
        if self.is_released() {
            return Err(released_error());
        }
        tokio::fs::read(self.path.join(file_name)).await
    }

    /// Delete the directory and everything in it. Idempotent.
    pub async fn release(&self) -> io::Result<()> {
        let dir = self.dir.lock().take();
        let Some(dir) = dir else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || dir.close())
            .await
            .map_err(io::Error::other)?
    }
}

fn released_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, "job storage has been released")
}
