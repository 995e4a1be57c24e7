//! Compiler and reference-resolution seams
//!
//! The actual source-to-unit compiler is an external collaborator consumed
//! behind [`ModuleCompiler`]; the engine never knows what a unit looks like
//! inside. Reference resolution is likewise an explicit object passed in at
//! construction, not ambient process-wide state.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::ident::ModuleId;
use crate::unit::CompiledUnit;

/// Severity of one compiler message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One compiler message, tied to a 1-based source line (0 = whole file).
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn error(line: usize, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            line,
            message: message.into(),
        }
    }

    pub fn warning(line: usize, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        if self.line == 0 {
            write!(f, "{severity}: {}", self.message)
        } else {
            write!(f, "line {}: {severity}: {}", self.line, self.message)
        }
    }
}

/// Options forwarded to every compile call, fixed at engine construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// Allow unsafe constructs in module sources.
    pub allow_unsafe: bool,
}

/// A named binary made visible to compilations as a reference.
#[derive(Debug, Clone)]
pub struct ReferenceBinary {
    pub name: String,
    pub bytes: Arc<[u8]>,
}

/// Failure reviving a unit from a persisted artifact image.
#[derive(Error, Debug)]
pub enum UnitLoadError {
    #[error("artifact is corrupt: {0}")]
    Corrupt(String),

    #[error("artifact format version {found} is not supported")]
    UnsupportedVersion { found: u32 },
}

/// The external source-to-unit compiler, consumed as an opaque service.
pub trait ModuleCompiler: Send + Sync + std::fmt::Debug {
    /// Compile source text into a loadable unit, or report diagnostics.
    fn compile(
        &self,
        module: &ModuleId,
        source: &str,
        references: &[ReferenceBinary],
        options: &CompileOptions,
    ) -> Result<Arc<dyn CompiledUnit>, Vec<Diagnostic>>;

    /// Revive a unit from a persisted artifact image.
    fn load(&self, module: &ModuleId, bytes: &[u8]) -> Result<Arc<dyn CompiledUnit>, UnitLoadError>;
}

/// Resolves named external binaries for compilations.
///
/// Lookups search already-loaded binaries first, then whatever backing store
/// the implementation is configured with.
pub trait ReferenceResolver: Send + Sync + std::fmt::Debug {
    /// Resolve one binary by name.
    fn resolve(&self, name: &str) -> Option<ReferenceBinary>;

    /// The current set of resolvable external references, passed to the
    /// compiler alongside each batch.
    fn resolvable(&self) -> Vec<ReferenceBinary>;
}

/// Extensions a directory resolver recognizes as reference binaries.
const BINARY_EXTENSIONS: [&str; 2] = ["bin", "unit"];

/// Resolver backed by an optional directory of binaries. Resolved binaries
/// are kept in memory, so a binary deleted from disk stays resolvable for
/// the lifetime of the engine.
#[derive(Debug)]
pub struct DirectoryResolver {
    dir: Option<PathBuf>,
    loaded: DashMap<String, ReferenceBinary>,
}

impl DirectoryResolver {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            loaded: DashMap::new(),
        }
    }

    fn load_from_dir(&self, name: &str) -> Option<ReferenceBinary> {
        let dir = self.dir.as_ref()?;
        for ext in BINARY_EXTENSIONS {
            let candidate = dir.join(format!("{name}.{ext}"));
            if let Ok(bytes) = std::fs::read(&candidate) {
                return Some(ReferenceBinary {
                    name: name.to_string(),
                    bytes: bytes.into(),
                });
            }
        }
        None
    }
}

impl ReferenceResolver for DirectoryResolver {
    fn resolve(&self, name: &str) -> Option<ReferenceBinary> {
        if let Some(hit) = self.loaded.get(name) {
            return Some(hit.value().clone());
        }
        let binary = self.load_from_dir(name)?;
        self.loaded.insert(name.to_string(), binary.clone());
        Some(binary)
    }

    fn resolvable(&self) -> Vec<ReferenceBinary> {
        if let Some(dir) = self.dir.as_ref() {
            if let Ok(entries) = std::fs::read_dir(dir) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    let is_binary = path
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| BINARY_EXTENSIONS.contains(&e));
                    if !is_binary {
                        continue;
                    }
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        let _ = self.resolve(stem);
                    }
                }
            }
        }
        let mut binaries: Vec<ReferenceBinary> =
            self.loaded.iter().map(|e| e.value().clone()).collect();
        binaries.sort_by(|a, b| a.name.cmp(&b.name));
        binaries
    }
}
