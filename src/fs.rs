//! Filesystem helpers
//!
//! Atomic writes use the tempfile + rename pattern so readers never observe
//! a partially written ledger or artifact.

use std::io::Write;
use std::path::Path;

use crate::error::EngineResult;

/// Write `bytes` to `path` atomically, creating parent directories.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> EngineResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn atomic_write_new_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");

        atomic_write(&path, b"Hello, World!").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"Hello, World!");
    }

    #[test]
    fn atomic_write_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");

        std::fs::write(&path, "original").unwrap();
        atomic_write(&path, b"replaced").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "replaced");
    }

    #[test]
    fn atomic_write_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("out.txt");

        atomic_write(&path, b"x").unwrap();

        assert!(path.exists());
    }
}
