//! On-disk compiled-unit store
//!
//! One artifact per module, stored beneath a reserved directory adjacent to
//! the module's source file. The artifact path derives from the source
//! file's own directory plus the module identifier's base segment, so
//! distinct source roots (and distinct subdirectories within one root)
//! never collide.

use std::path::{Path, PathBuf};

use crate::error::EngineResult;
use crate::fs::atomic_write;
use crate::ident::ModuleId;

/// Reserved directory for engine-managed files (artifacts, ledger).
pub const RESERVED_DIR: &str = ".unite";

/// File extension of persisted unit artifacts.
pub const UNIT_EXTENSION: &str = "unit";

/// Path of the artifact for `id`, given the module's source file path.
pub fn artifact_path(source: &Path, id: &ModuleId) -> PathBuf {
    let dir = source.parent().unwrap_or_else(|| Path::new("."));
    dir.join(RESERVED_DIR)
        .join(format!("{}.{}", id.base(), UNIT_EXTENSION))
}

pub fn has_artifact(source: &Path, id: &ModuleId) -> bool {
    artifact_path(source, id).is_file()
}

/// Read an artifact back. `None` means not found, including the case where
/// the file disappeared after an earlier [`has_artifact`] answered true.
pub fn read_artifact(source: &Path, id: &ModuleId) -> Option<Vec<u8>> {
    std::fs::read(artifact_path(source, id)).ok()
}

pub fn write_artifact(source: &Path, id: &ModuleId, bytes: &[u8]) -> EngineResult<()> {
    atomic_write(&artifact_path(source, id), bytes)
}
