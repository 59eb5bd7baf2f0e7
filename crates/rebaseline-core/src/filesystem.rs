//! File system seam.
//!
//! Every command touches baselines and expectation files through
//! [`FileSystem`] so tests can run against [`crate::fakes::MemoryFileSystem`].

use std::path::{Path, PathBuf};

use crate::error::{RebaselineError, Result};

/// Synchronous file access used by the rebaseline commands.
pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    fn read_binary(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write `data`, creating missing parent directories.
    fn write_binary(&self, path: &Path, data: &[u8]) -> Result<()>;

    fn remove(&self, path: &Path) -> Result<()>;

    /// All files below `dir`, recursively, sorted.
    fn files_under(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    fn read_text(&self, path: &Path) -> Result<String> {
        let bytes = self.read_binary(path)?;
        String::from_utf8(bytes).map_err(|e| {
            RebaselineError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }

    fn write_text(&self, path: &Path, contents: &str) -> Result<()> {
        self.write_binary(path, contents.as_bytes())
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        let data = self.read_binary(from)?;
        self.write_binary(to, &data)
    }
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl RealFileSystem {
    pub fn new() -> Self {
        RealFileSystem
    }

    fn collect(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                Self::collect(&path, out)?;
            } else {
                out.push(path);
            }
        }
        Ok(())
    }
}

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_binary(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RebaselineError::FileNotFound(path.to_path_buf()),
            _ => RebaselineError::Io(e),
        })
    }

    fn write_binary(&self, path: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, data)?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path)?;
        Ok(())
    }

    fn files_under(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        if dir.is_dir() {
            Self::collect(dir, &mut files)?;
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFileSystem::new();
        let path = dir.path().join("platform/mac/fast/dom/test-expected.txt");

        fs.write_text(&path, "result").unwrap();

        assert!(fs.exists(&path));
        assert_eq!(fs.read_text(&path).unwrap(), "result");
    }

    #[test]
    fn test_files_under_is_recursive_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFileSystem::new();
        fs.write_text(&dir.path().join("b/second.html"), "").unwrap();
        fs.write_text(&dir.path().join("a/first.html"), "").unwrap();

        let files = fs.files_under(dir.path()).unwrap();

        assert_eq!(
            files,
            vec![dir.path().join("a/first.html"), dir.path().join("b/second.html")]
        );
        assert!(fs.files_under(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_read_missing_file_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = RealFileSystem::new()
            .read_binary(&dir.path().join("nope"))
            .unwrap_err();
        assert!(matches!(err, RebaselineError::FileNotFound(_)));
    }
}
