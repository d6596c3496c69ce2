//! Shared fixtures for proxy tests

use std::path::Path;

use tempfile::TempDir;

use crate::remote::{LocalShare, MemoryShare};

/// Deterministic, non-repeating-looking content so misplaced bytes show up.
pub fn patterned_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 251) % 256) as u8).collect()
}

/// In-memory share holding `files`.
pub fn memory_share(files: &[(&str, Vec<u8>)]) -> MemoryShare {
    let share = MemoryShare::new();
    for (path, data) in files {
        share.insert(*path, data.clone());
    }
    share
}

/// Writes `files` below a fresh temporary directory and returns a share over it.
///
/// The directory lives as long as the returned `TempDir`.
///
/// # Panics
/// Panics if the temporary directory or files cannot be created.
pub fn temp_local_share(files: &[(&str, Vec<u8>)]) -> (LocalShare, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    for (path, data) in files {
        let full_path = temp_dir.path().join(path);
        if let Some(parent) = full_path.parent().filter(|p| *p != Path::new("")) {
            std::fs::create_dir_all(parent).expect("Failed to create fixture directory");
        }
        std::fs::write(&full_path, data).expect("Failed to write fixture file");
    }
    (LocalShare::new(temp_dir.path()), temp_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteAccess;

    #[test]
    fn test_patterned_bytes_vary() {
        let data = patterned_bytes(1024);
        assert_eq!(data.len(), 1024);
        assert_ne!(data[0..256], data[256..512]);
    }

    #[tokio::test]
    async fn test_temp_local_share_creates_nested_files() {
        let (share, _temp_dir) = temp_local_share(&[("shows/s01/e01.mkv", patterned_bytes(10))]);

        assert!(share.exists("shows/s01/e01.mkv").await.unwrap());
        assert_eq!(share.length("shows/s01/e01.mkv").await.unwrap(), 10);
    }
}
