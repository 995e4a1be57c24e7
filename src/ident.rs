//! Module identifiers

use std::fmt;
use std::path::{Component, Path};

/// File extension of module sources
pub const SOURCE_EXTENSION: &str = "src";

/// Identifier of one compilable source module.
///
/// Derived from the source file's path relative to the source root, without
/// the source extension and with `/` separators on every platform:
/// `<root>/util/A.src` becomes `util/A`, while `<root>/A.src` stays `A`.
/// Files sharing a base name in different directories therefore get distinct
/// identifiers and distinct artifact paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Derive the identifier of a source file under `root`.
    ///
    /// Returns `None` when the path does not carry the module source
    /// extension or is not located under the root.
    pub fn from_source_path(root: &Path, path: &Path) -> Option<Self> {
        if path.extension()? != SOURCE_EXTENSION {
            return None;
        }
        let rel = path.strip_prefix(root).ok()?;
        let stem = rel.with_extension("");
        let mut segments = Vec::new();
        for component in stem.components() {
            match component {
                Component::Normal(segment) => segments.push(segment.to_str()?.to_string()),
                _ => return None,
            }
        }
        if segments.is_empty() {
            return None;
        }
        Some(Self(segments.join("/")))
    }

    /// Final path segment, used for artifact file names.
    pub fn base(&self) -> &str {
        match self.0.rfind('/') {
            Some(i) => &self.0[i + 1..],
            None => &self.0,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
