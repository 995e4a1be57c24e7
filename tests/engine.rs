//! End-to-end engine scenarios

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;

use unite::{
    CompileOptions, CompiledUnit, Diagnostic, DispatchError, EngineOptions, ModuleCompiler,
    ModuleEngine, ModuleId, ReferenceBinary, ScriptCompiler, UnitLoadError, Value,
};

const MODULE_A: &str = "\
namespace NS
type C {
    static fn F() { }
    static fn G() -> int = 42
    static fn Add(a: int, b: int) -> int = a + b
}
";

const MODULE_B: &str = "\
namespace NS
type D {
    fn H(text: str) { }
}
";

/// Wraps the script compiler and counts compile calls, so tests can observe
/// whether persisted units were reused.
#[derive(Debug)]
struct CountingCompiler {
    inner: ScriptCompiler,
    compiles: AtomicUsize,
}

impl CountingCompiler {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: ScriptCompiler::new(),
            compiles: AtomicUsize::new(0),
        })
    }

    fn count(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }
}

impl ModuleCompiler for CountingCompiler {
    fn compile(
        &self,
        module: &ModuleId,
        source: &str,
        references: &[ReferenceBinary],
        options: &CompileOptions,
    ) -> Result<Arc<dyn CompiledUnit>, Vec<Diagnostic>> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        self.inner.compile(module, source, references, options)
    }

    fn load(&self, module: &ModuleId, bytes: &[u8]) -> Result<Arc<dyn CompiledUnit>, UnitLoadError> {
        self.inner.load(module, bytes)
    }
}

fn engine_at(root: &Path) -> ModuleEngine {
    ModuleEngine::new(EngineOptions::new(root), Arc::new(ScriptCompiler::new())).unwrap()
}

#[test]
fn invoke_void_static_function() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("A.src"), MODULE_A).unwrap();

    let engine = engine_at(dir.path());
    engine.invoke_void("A", "NS", "C", "F", &[]).unwrap();
}

#[test]
fn invoke_typed_returns_integer() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("A.src"), MODULE_A).unwrap();

    let engine = engine_at(dir.path());
    let result: i64 = engine.invoke("A", "NS", "C", "G", &[]).unwrap();
    assert_eq!(result, 42);
}

#[test]
fn invoke_with_arguments() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("A.src"), MODULE_A).unwrap();

    let engine = engine_at(dir.path());
    let result: i64 = engine
        .invoke("A", "NS", "C", "Add", &[Value::Int(40), Value::Int(2)])
        .unwrap();
    assert_eq!(result, 42);
}

#[test]
fn instance_function_gets_default_instance() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("B.src"), MODULE_B).unwrap();

    let engine = engine_at(dir.path());
    engine
        .invoke_void("B", "NS", "D", "H", &[Value::from("hello")])
        .unwrap();
}

#[test]
fn dispatch_error_taxonomy() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("A.src"), MODULE_A).unwrap();

    let engine = engine_at(dir.path());

    let err = engine.invoke_void("Missing", "NS", "C", "F", &[]).unwrap_err();
    assert!(matches!(err, DispatchError::ModuleNotFound { .. }));

    let err = engine.invoke_void("A", "NS", "Nope", "F", &[]).unwrap_err();
    assert!(matches!(err, DispatchError::TypeNotFound { .. }));

    let err = engine.invoke_void("A", "NS", "C", "Nope", &[]).unwrap_err();
    assert!(matches!(err, DispatchError::FunctionNotFound { .. }));

    let err = engine.invoke::<String>("A", "NS", "C", "G", &[]).unwrap_err();
    assert!(matches!(err, DispatchError::ResultTypeMismatch { .. }));
}

#[test]
fn construction_persists_ledger_and_artifacts() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("A.src"), MODULE_A).unwrap();

    let _engine = engine_at(dir.path());

    assert!(dir.path().join(".unite").join("ledger.toml").is_file());
    assert!(dir.path().join(".unite").join("A.unit").is_file());
}

#[test]
fn second_engine_reuses_persisted_units() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("A.src"), MODULE_A).unwrap();

    let _first = engine_at(dir.path());

    let counting = CountingCompiler::new();
    let second = ModuleEngine::new(EngineOptions::new(dir.path()), counting.clone()).unwrap();

    assert_eq!(counting.count(), 0);
    assert_eq!(second.initial_report().reused.len(), 1);
    let result: i64 = second.invoke("A", "NS", "C", "G", &[]).unwrap();
    assert_eq!(result, 42);
}

#[test]
fn changed_source_is_recompiled_by_next_engine() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("A.src");
    std::fs::write(&file, MODULE_A).unwrap();

    let _first = engine_at(dir.path());
    std::fs::write(&file, MODULE_A.replace("42", "43")).unwrap();

    let counting = CountingCompiler::new();
    let second = ModuleEngine::new(EngineOptions::new(dir.path()), counting.clone()).unwrap();

    assert_eq!(counting.count(), 1);
    let result: i64 = second.invoke("A", "NS", "C", "G", &[]).unwrap();
    assert_eq!(result, 43);
}

#[test]
fn deleted_artifact_forces_recompilation() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("A.src"), MODULE_A).unwrap();

    let _first = engine_at(dir.path());
    std::fs::remove_file(dir.path().join(".unite").join("A.unit")).unwrap();

    let counting = CountingCompiler::new();
    let second = ModuleEngine::new(EngineOptions::new(dir.path()), counting.clone()).unwrap();

    assert_eq!(counting.count(), 1);
    let result: i64 = second.invoke("A", "NS", "C", "G", &[]).unwrap();
    assert_eq!(result, 42);
}

#[test]
fn compile_failure_keeps_previous_unit_authoritative() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("A.src");
    std::fs::write(&file, MODULE_A).unwrap();

    let engine = engine_at(dir.path());
    std::fs::write(&file, "this does not parse").unwrap();

    let report = engine.compile_all();
    assert_eq!(report.failed.len(), 1);

    // Prior unit still serves invocations.
    let result: i64 = engine.invoke("A", "NS", "C", "G", &[]).unwrap();
    assert_eq!(result, 42);
}

#[test]
fn one_bad_module_does_not_block_the_others() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("A.src"), "broken {").unwrap();
    std::fs::write(dir.path().join("B.src"), MODULE_B).unwrap();

    let engine = engine_at(dir.path());

    assert_eq!(engine.initial_report().failed.len(), 1);
    engine
        .invoke_void("B", "NS", "D", "H", &[Value::from("hello")])
        .unwrap();
    let err = engine.invoke_void("A", "NS", "C", "F", &[]).unwrap_err();
    assert!(matches!(err, DispatchError::ModuleNotFound { .. }));
}

#[test]
fn nested_modules_are_path_qualified() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("util")).unwrap();
    std::fs::write(dir.path().join("A.src"), MODULE_A).unwrap();
    std::fs::write(
        dir.path().join("util").join("A.src"),
        MODULE_A.replace("42", "7"),
    )
    .unwrap();

    let engine = engine_at(dir.path());

    let top: i64 = engine.invoke("A", "NS", "C", "G", &[]).unwrap();
    let nested: i64 = engine.invoke("util/A", "NS", "C", "G", &[]).unwrap();
    assert_eq!(top, 42);
    assert_eq!(nested, 7);
}

#[test]
fn unsafe_modules_require_opt_in() {
    let dir = tempdir().unwrap();
    let source = "namespace NS\ntype C {\n    unsafe fn Danger() { }\n}\n";
    std::fs::write(dir.path().join("A.src"), source).unwrap();

    let guarded = engine_at(dir.path());
    assert_eq!(guarded.initial_report().failed.len(), 1);

    let mut options = EngineOptions::new(dir.path());
    options.allow_unsafe = true;
    let permissive = ModuleEngine::new(options, Arc::new(ScriptCompiler::new())).unwrap();
    assert_eq!(permissive.initial_report().failed.len(), 0);
    permissive.invoke_void("A", "NS", "C", "Danger", &[]).unwrap();
}

#[test]
fn watch_reloads_changed_module() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("A.src");
    std::fs::write(&file, MODULE_A).unwrap();

    let engine = Arc::new(engine_at(dir.path()));
    let before: i64 = engine.invoke("A", "NS", "C", "G", &[]).unwrap();
    assert_eq!(before, 42);

    let running = Arc::new(AtomicBool::new(true));
    let watcher_engine = Arc::clone(&engine);
    let watcher_running = Arc::clone(&running);
    let handle = std::thread::spawn(move || {
        watcher_engine.watch(watcher_running, |_| {}).unwrap();
    });

    // Let the watcher get past its startup drain before editing.
    std::thread::sleep(Duration::from_millis(1500));
    std::fs::write(&file, MODULE_A.replace("42", "43")).unwrap();

    // Debounce plus compile, with generous margin.
    std::thread::sleep(Duration::from_millis(2500));
    let after: i64 = engine.invoke("A", "NS", "C", "G", &[]).unwrap();
    assert_eq!(after, 43);

    running.store(false, Ordering::SeqCst);
    handle.join().unwrap();
}
