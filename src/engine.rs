//! Engine facade
//!
//! Construction scans and compiles the whole source tree; afterwards the
//! engine serves symbolic invocations from the module cache and can watch
//! the tree for changes. Configuration is fixed at construction.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::info;

use crate::cache::ModuleCache;
use crate::compiler::{CompileOptions, DirectoryResolver, ModuleCompiler, ReferenceResolver};
use crate::dispatch;
use crate::error::{DispatchError, EngineError, EngineResult};
use crate::ident::SOURCE_EXTENSION;
use crate::ledger::LEDGER_FILE;
use crate::pipeline::{BatchReport, CompilePipeline};
use crate::store::RESERVED_DIR;
use crate::value::{FromValue, Value};
use crate::watcher::{self, ReloadEvent};

/// Engine construction parameters. Fixed after construction.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Root of the module source tree.
    pub source_root: PathBuf,
    /// Directory searched for external reference binaries.
    pub binaries_dir: Option<PathBuf>,
    /// Emit per-event debug logging while watching.
    pub debug: bool,
    /// Allow unsafe constructs in module sources.
    pub allow_unsafe: bool,
    /// Reuse and persist compiled units across runs.
    pub persist_units: bool,
}

impl EngineOptions {
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            binaries_dir: None,
            debug: false,
            allow_unsafe: false,
            persist_units: true,
        }
    }
}

/// Hot-reloading module engine.
#[derive(Debug)]
pub struct ModuleEngine {
    root: PathBuf,
    options: EngineOptions,
    cache: Arc<ModuleCache>,
    pipeline: CompilePipeline,
    initial_report: BatchReport,
}

impl ModuleEngine {
    /// Build an engine and compile every module under the source root.
    ///
    /// Individual module failures never fail construction; they are logged
    /// and recorded in [`ModuleEngine::initial_report`].
    pub fn new(options: EngineOptions, compiler: Arc<dyn ModuleCompiler>) -> EngineResult<Self> {
        let resolver = Arc::new(DirectoryResolver::new(options.binaries_dir.clone()));
        Self::with_resolver(options, compiler, resolver)
    }

    /// Build an engine with an explicit reference resolver.
    pub fn with_resolver(
        options: EngineOptions,
        compiler: Arc<dyn ModuleCompiler>,
        resolver: Arc<dyn ReferenceResolver>,
    ) -> EngineResult<Self> {
        if !options.source_root.is_dir() {
            return Err(EngineError::SourceRootNotFound {
                path: options.source_root.clone(),
            });
        }
        let root = options.source_root.canonicalize()?;

        let cache = Arc::new(ModuleCache::new());
        let compile_options = CompileOptions {
            allow_unsafe: options.allow_unsafe,
        };
        let ledger_path = root.join(RESERVED_DIR).join(LEDGER_FILE);
        let pipeline = CompilePipeline::new(
            compiler,
            resolver,
            Arc::clone(&cache),
            compile_options,
            options.persist_units,
            ledger_path,
        );

        let mut engine = Self {
            root,
            options,
            cache,
            pipeline,
            initial_report: BatchReport::default(),
        };
        let report = engine.compile_all();
        info!(
            reused = report.reused.len(),
            compiled = report.compiled.len(),
            failed = report.failed.len(),
            "initial compilation complete"
        );
        engine.initial_report = report;
        Ok(engine)
    }

    /// Outcome of the initialize-and-compile-all pass run at construction.
    pub fn initial_report(&self) -> &BatchReport {
        &self.initial_report
    }

    /// Recompile every module source under the root.
    pub fn compile_all(&self) -> BatchReport {
        let files = collect_sources(&self.root);
        self.pipeline.run(&self.root, &files)
    }

    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    /// Invoke `function` on `type_name` in `module`, converting the result.
    pub fn invoke<T: FromValue>(
        &self,
        module: &str,
        namespace: &str,
        type_name: &str,
        function: &str,
        args: &[Value],
    ) -> Result<T, DispatchError> {
        dispatch::invoke(&self.cache, module, namespace, type_name, function, args)
    }

    /// Invoke and discard the produced value.
    pub fn invoke_void(
        &self,
        module: &str,
        namespace: &str,
        type_name: &str,
        function: &str,
        args: &[Value],
    ) -> Result<(), DispatchError> {
        dispatch::invoke_void(&self.cache, module, namespace, type_name, function, args)
    }

    /// Watch the source tree and recompile changed modules until `running`
    /// is cleared. Blocks the calling thread.
    pub fn watch(
        &self,
        running: Arc<AtomicBool>,
        on_event: impl Fn(ReloadEvent),
    ) -> EngineResult<()> {
        watcher::watch(
            &self.root,
            &self.pipeline,
            self.options.debug,
            running,
            on_event,
        )
    }
}

/// Recursively collect module sources, skipping hidden directories (which
/// include the reserved engine directories).
fn collect_sources(root: &Path) -> Vec<PathBuf> {
    fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                let hidden = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with('.'));
                if !hidden {
                    walk(&path, out);
                }
                continue;
            }
            if path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION) {
                out.push(path);
            }
        }
    }

    let mut out = Vec::new();
    walk(root, &mut out);
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ScriptCompiler;
    use tempfile::tempdir;

    #[test]
    fn missing_source_root_fails_construction() {
        let options = EngineOptions::new("/definitely/not/here");
        let err = ModuleEngine::new(options, Arc::new(ScriptCompiler::new())).unwrap_err();
        assert!(matches!(err, EngineError::SourceRootNotFound { .. }));
    }

    #[test]
    fn collect_sources_skips_hidden_directories() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::create_dir_all(dir.path().join(".unite")).unwrap();
        std::fs::write(dir.path().join("A.src"), "").unwrap();
        std::fs::write(dir.path().join("sub/B.src"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        std::fs::write(dir.path().join(".unite/C.src"), "").unwrap();

        let files = collect_sources(dir.path());
        let names: Vec<String> = files
            .iter()
            .map(|p| {
                p.strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        assert_eq!(names, vec!["A.src".to_string(), "sub/B.src".to_string()]);
    }

    #[test]
    fn construction_compiles_existing_modules() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("A.src"),
            "namespace NS\ntype C {\n    static fn G() -> int = 42\n}\n",
        )
        .unwrap();

        let engine =
            ModuleEngine::new(EngineOptions::new(dir.path()), Arc::new(ScriptCompiler::new()))
                .unwrap();

        assert_eq!(engine.initial_report().compiled.len(), 1);
        let result: i64 = engine.invoke("A", "NS", "C", "G", &[]).unwrap();
        assert_eq!(result, 42);
    }
}
