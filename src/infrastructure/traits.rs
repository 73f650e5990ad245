//! I/O boundary traits for testability
//!
//! These traits abstract external I/O operations, allowing services
//! to be tested with mock implementations.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Output;

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write string content to file.
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Write through a temporary file in the target directory, then rename into place.
    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a file.
    fn is_file(&self, path: &Path) -> bool;

    /// Check if path is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Create directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Direct entries of a directory, sorted by file name.
    fn read_dir_sorted(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Canonicalize path (resolve symlinks, make absolute).
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    /// Copy the contents of directory `from` into `to`, overwriting existing files.
    fn copy_dir(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Create parent directories if needed.
    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                self.create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

/// External command runner abstraction.
pub trait CommandRunner: Send + Sync {
    /// Run a command with arguments.
    fn run(&self, cmd: &str, args: &[&str]) -> io::Result<Output>;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        std::fs::write(path, content)
    }

    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()> {
        self.ensure_parent(path)?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn read_dir_sorted(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()?;
        entries.sort();
        Ok(entries)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::canonicalize(path)
    }

    fn copy_dir(&self, from: &Path, to: &Path) -> io::Result<()> {
        use fs_extra::dir::{copy, CopyOptions};

        std::fs::create_dir_all(to)?;
        let options = CopyOptions::new().overwrite(true).content_only(true);
        copy(from, to, &options)
            .map(|_| ())
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
    }
}

/// Real command runner implementation.
#[derive(Debug, Default)]
pub struct RealCommandRunner;

impl CommandRunner for RealCommandRunner {
    fn run(&self, cmd: &str, args: &[&str]) -> io::Result<Output> {
        std::process::Command::new(cmd).args(args).output()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn given_nested_target_when_writing_atomically_then_parents_created() {
        // Arrange
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("build/report.md");

        // Act
        RealFileSystem.write_atomic(&target, "# Report").unwrap();

        // Assert
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "# Report");
    }

    #[test]
    fn given_directory_tree_when_copying_then_contents_land_in_target() {
        // Arrange
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("assets");
        std::fs::create_dir_all(src.join("img")).unwrap();
        std::fs::write(src.join("img/logo.svg"), "<svg/>").unwrap();
        let dst = dir.path().join("out");

        // Act
        RealFileSystem.copy_dir(&src, &dst).unwrap();

        // Assert
        assert!(dst.join("img/logo.svg").is_file());
    }

    #[test]
    fn given_files_when_listing_then_sorted_by_name() {
        let dir = TempDir::new().unwrap();
        for name in ["b.md", "a.md", "c.md"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }

        let names: Vec<_> = RealFileSystem
            .read_dir_sorted(dir.path())
            .unwrap()
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();

        assert_eq!(names, vec!["a.md", "b.md", "c.md"]);
    }
}
