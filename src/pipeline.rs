//! Compilation pipeline
//!
//! Orchestrates, for a batch of source files, the decision to reuse a
//! persisted artifact or recompile, invokes the compiler, persists artifacts
//! and fingerprints, and populates the module cache. Per-file work runs in
//! parallel; the module cache and the fingerprint accumulator are the only
//! shared mutable state, and both serialize writers per module identifier.
//! No cache-wide lock is ever held across compiler or disk I/O.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::cache::ModuleCache;
use crate::compiler::{
    CompileOptions, Diagnostic, ModuleCompiler, ReferenceBinary, ReferenceResolver,
};
use crate::fingerprint::Fingerprint;
use crate::ident::ModuleId;
use crate::ledger;
use crate::store;
use crate::unit::CompiledUnit;

/// Outcome summary of one compilation batch.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Modules whose persisted unit was reused unchanged.
    pub reused: Vec<ModuleId>,
    /// Modules that were (re)compiled.
    pub compiled: Vec<ModuleId>,
    /// Modules that failed to compile, with their diagnostics.
    pub failed: Vec<(ModuleId, Vec<Diagnostic>)>,
}

impl BatchReport {
    /// Modules handled successfully, reused or compiled.
    pub fn handled(&self) -> usize {
        self.reused.len() + self.compiled.len()
    }
}

enum FileOutcome {
    Reused(ModuleId),
    Compiled(ModuleId),
    Failed(ModuleId, Vec<Diagnostic>),
}

#[derive(Debug)]
pub struct CompilePipeline {
    compiler: Arc<dyn ModuleCompiler>,
    resolver: Arc<dyn ReferenceResolver>,
    cache: Arc<ModuleCache>,
    options: CompileOptions,
    persist: bool,
    ledger_path: PathBuf,
    /// Last-known fingerprint per module, seeded from the persisted ledger.
    fingerprints: DashMap<ModuleId, Fingerprint>,
}

impl CompilePipeline {
    pub fn new(
        compiler: Arc<dyn ModuleCompiler>,
        resolver: Arc<dyn ReferenceResolver>,
        cache: Arc<ModuleCache>,
        options: CompileOptions,
        persist: bool,
        ledger_path: PathBuf,
    ) -> Self {
        let fingerprints = DashMap::new();
        for (id, fp) in ledger::load(&ledger_path) {
            fingerprints.insert(id, fp);
        }
        Self {
            compiler,
            resolver,
            cache,
            options,
            persist,
            ledger_path,
            fingerprints,
        }
    }

    pub fn cache(&self) -> &Arc<ModuleCache> {
        &self.cache
    }

    /// Last-known fingerprint of a successfully handled module.
    pub fn fingerprint(&self, id: &ModuleId) -> Option<Fingerprint> {
        self.fingerprints.get(id).map(|e| e.value().clone())
    }

    /// Compile (or reuse) every file in the batch, then rewrite the ledger.
    ///
    /// One file's failure never aborts the rest; failed modules keep their
    /// previous cache entry and lose their ledger entry so they retry on the
    /// next pass.
    pub fn run(&self, root: &Path, files: &[PathBuf]) -> BatchReport {
        let references = self.reference_set();

        let outcomes: Vec<FileOutcome> = files
            .par_iter()
            .filter_map(|path| self.process_file(root, path, &references))
            .collect();

        let mut report = BatchReport::default();
        for outcome in outcomes {
            match outcome {
                FileOutcome::Reused(id) => report.reused.push(id),
                FileOutcome::Compiled(id) => report.compiled.push(id),
                FileOutcome::Failed(id, diagnostics) => report.failed.push((id, diagnostics)),
            }
        }

        self.save_ledger();
        report
    }

    fn process_file(
        &self,
        root: &Path,
        path: &Path,
        references: &[ReferenceBinary],
    ) -> Option<FileOutcome> {
        let id = ModuleId::from_source_path(root, path)?;

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(module = %id, error = %e, "could not read source file");
                self.fingerprints.remove(&id);
                let diagnostic = Diagnostic::error(0, format!("could not read source: {e}"));
                return Some(FileOutcome::Failed(id, vec![diagnostic]));
            }
        };
        let fingerprint = Fingerprint::of_bytes(&bytes);

        if self.persist {
            if let Some(unit) = self.try_reuse(path, &id, &fingerprint) {
                self.cache.insert(unit);
                self.fingerprints.insert(id.clone(), fingerprint);
                debug!(module = %id, "reused persisted unit");
                return Some(FileOutcome::Reused(id));
            }
        }

        let source = match String::from_utf8(bytes) {
            Ok(source) => source,
            Err(_) => {
                self.fingerprints.remove(&id);
                let diagnostic = Diagnostic::error(0, "source is not valid UTF-8");
                return Some(FileOutcome::Failed(id, vec![diagnostic]));
            }
        };

        match self.compiler.compile(&id, &source, references, &self.options) {
            Ok(unit) => {
                if self.persist {
                    if let Err(e) = store::write_artifact(path, &id, unit.bytes()) {
                        warn!(module = %id, error = %e, "could not persist unit artifact");
                    }
                }
                self.cache.insert(unit);
                self.fingerprints.insert(id.clone(), fingerprint);
                debug!(module = %id, "compiled");
                Some(FileOutcome::Compiled(id))
            }
            Err(diagnostics) => {
                for diagnostic in &diagnostics {
                    warn!(module = %id, "{diagnostic}");
                }
                self.fingerprints.remove(&id);
                Some(FileOutcome::Failed(id, diagnostics))
            }
        }
    }

    /// The reuse path: ledger fingerprint unchanged and the persisted
    /// artifact still loads. Any miss falls back to recompilation.
    fn try_reuse(
        &self,
        path: &Path,
        id: &ModuleId,
        fresh: &Fingerprint,
    ) -> Option<Arc<dyn CompiledUnit>> {
        let unchanged = self
            .fingerprints
            .get(id)
            .is_some_and(|known| known.value() == fresh);
        if !unchanged {
            return None;
        }

        let bytes = store::read_artifact(path, id)?;
        match self.compiler.load(id, &bytes) {
            Ok(unit) => Some(unit),
            Err(e) => {
                warn!(module = %id, error = %e, "persisted unit unusable, recompiling");
                None
            }
        }
    }

    /// References visible to compilations: the resolver's resolvable
    /// externals plus the binaries of every currently cached unit.
    fn reference_set(&self) -> Vec<ReferenceBinary> {
        let mut references = self.resolver.resolvable();
        references.extend(self.cache.reference_binaries());
        references
    }

    fn save_ledger(&self) {
        let snapshot: BTreeMap<ModuleId, Fingerprint> = self
            .fingerprints
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        ledger::save(&self.ledger_path, &snapshot);
    }
}
