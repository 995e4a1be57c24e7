//! Unite - hot-reloading dynamic module engine
//!
//! Unite watches a directory tree of module sources, compiles each file into
//! an independently loadable unit, caches compiled units in memory and on
//! disk keyed by content fingerprint, and exposes a symbolic invocation API
//! for calling named functions inside those units.
//!
//! The source-to-unit compiler is an external collaborator consumed behind
//! the [`ModuleCompiler`] trait; the crate ships [`ScriptCompiler`], a small
//! reference backend, so the engine can be driven end to end out of the box.

pub mod cache;
pub mod compiler;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod fs;
pub mod ident;
pub mod ledger;
pub mod pipeline;
pub mod script;
pub mod store;
pub mod unit;
pub mod value;
pub mod watcher;

// Re-exports for convenience
pub use cache::ModuleCache;
pub use compiler::{
    CompileOptions, Diagnostic, DirectoryResolver, ModuleCompiler, ReferenceBinary,
    ReferenceResolver, Severity, UnitLoadError,
};
pub use engine::{EngineOptions, ModuleEngine};
pub use error::{DispatchError, EngineError, EngineResult};
pub use fingerprint::Fingerprint;
pub use ident::{ModuleId, SOURCE_EXTENSION};
pub use pipeline::{BatchReport, CompilePipeline};
pub use script::ScriptCompiler;
pub use unit::{CallError, CallableHandle, CompiledUnit, Instance, InstantiateError, TypeHandle};
pub use value::{FromValue, Value};
pub use watcher::{ReloadEvent, DEBOUNCE_MS};
