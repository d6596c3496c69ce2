//! Local directory adapter
//!
//! Serves files below a root directory through the [`RemoteAccess`] interface.
//! Used by the CLI to stream files from a mounted share and by tests as a
//! real filesystem-backed source.

use std::io::{ErrorKind, SeekFrom};
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::trace;

use super::{RemoteAccess, RemoteError, RemoteReader};

/// Remote access over a local (or locally mounted) directory tree.
///
/// Paths are interpreted relative to the root. Absolute paths and `..`
/// components are refused so a registration cannot reach outside the root.
#[derive(Debug, Clone)]
pub struct LocalShare {
    root: PathBuf,
}

impl LocalShare {
    /// Creates a share rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory all paths are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, RemoteError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(RemoteError::AccessDenied {
                path: path.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

fn map_io_error(path: &str, error: std::io::Error) -> RemoteError {
    match error.kind() {
        ErrorKind::NotFound => RemoteError::NotFound {
            path: path.to_string(),
        },
        ErrorKind::PermissionDenied => RemoteError::AccessDenied {
            path: path.to_string(),
        },
        _ => RemoteError::Io { source: error },
    }
}

#[async_trait]
impl RemoteAccess for LocalShare {
    async fn exists(&self, path: &str) -> Result<bool, RemoteError> {
        let full_path = self.resolve(path)?;
        match tokio::fs::metadata(&full_path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(map_io_error(path, e)),
        }
    }

    async fn length(&self, path: &str) -> Result<u64, RemoteError> {
        let full_path = self.resolve(path)?;
        let metadata = tokio::fs::metadata(&full_path)
            .await
            .map_err(|e| map_io_error(path, e))?;
        Ok(metadata.len())
    }

    async fn open(&self, path: &str) -> Result<Box<dyn RemoteReader>, RemoteError> {
        let full_path = self.resolve(path)?;
        let file = File::open(&full_path)
            .await
            .map_err(|e| map_io_error(path, e))?;
        trace!("Opened local file {}", full_path.display());
        Ok(Box::new(LocalReader { file }))
    }
}

struct LocalReader {
    file: File,
}

#[async_trait]
impl RemoteReader for LocalReader {
    async fn seek(&mut self, offset: u64) -> Result<(), RemoteError> {
        self.file.seek(SeekFrom::Start(offset)).await?;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, RemoteError> {
        Ok(self.file.read(buf).await?)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn create_test_share() -> (LocalShare, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..2048u32).map(|i| (i % 251) as u8).collect();
        tokio::fs::create_dir(temp_dir.path().join("movies"))
            .await
            .unwrap();
        tokio::fs::write(temp_dir.path().join("movies/clip.mkv"), &data)
            .await
            .unwrap();

        (LocalShare::new(temp_dir.path()), temp_dir)
    }

    #[tokio::test]
    async fn test_exists_and_length() {
        let (share, _temp_dir) = create_test_share().await;

        assert!(share.exists("movies/clip.mkv").await.unwrap());
        assert!(!share.exists("movies/missing.mkv").await.unwrap());
        // Directories are not streamable files
        assert!(!share.exists("movies").await.unwrap());
        assert_eq!(share.length("movies/clip.mkv").await.unwrap(), 2048);
    }

    #[tokio::test]
    async fn test_seek_and_read() {
        let (share, _temp_dir) = create_test_share().await;

        let mut reader = share.open("movies/clip.mkv").await.unwrap();
        reader.seek(1000).await.unwrap();

        let mut buf = [0u8; 4];
        let read = reader.read(&mut buf).await.unwrap();
        assert_eq!(read, 4);
        // 1000 % 251 == 247
        assert_eq!(buf, [247, 248, 249, 250]);
    }

    #[tokio::test]
    async fn test_missing_file_maps_to_not_found() {
        let (share, _temp_dir) = create_test_share().await;

        let result = share.length("nope.mp4").await;
        assert!(matches!(result, Err(RemoteError::NotFound { .. })));

        let result = share.open("nope.mp4").await;
        assert!(matches!(result, Err(RemoteError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_paths_cannot_escape_root() {
        let (share, _temp_dir) = create_test_share().await;

        assert!(matches!(
            share.exists("../etc/passwd").await,
            Err(RemoteError::AccessDenied { .. })
        ));
        assert!(matches!(
            share.open("/etc/passwd").await,
            Err(RemoteError::AccessDenied { .. })
        ));
    }
}
