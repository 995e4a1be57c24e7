//! Error types for Unite
//!
//! Uses `thiserror` for library errors. Engine-level failures and
//! per-invocation dispatch failures are separate enums because they surface
//! to different callers: `EngineError` ends construction or watching,
//! `DispatchError` is returned to every invoker and never crashes the engine.

use std::path::PathBuf;
use thiserror::Error;

use crate::unit::{CallError, InstantiateError};

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-level error type
#[derive(Error, Debug)]
pub enum EngineError {
    /// The configured source root does not exist
    #[error("source root not found: {path}")]
    SourceRootNotFound { path: PathBuf },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Filesystem watcher could not be set up
    #[error("file watcher error: {0}")]
    Watch(String),
}

/// Failure resolving or executing a symbolic call target.
///
/// The variants mirror the resolution order: module, then type, then
/// callable, then instance construction, then the call itself, then the
/// result conversion of the typed variant.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("module '{module}' is not loaded")]
    ModuleNotFound { module: String },

    #[error("type '{qualified}' not found in module '{module}'")]
    TypeNotFound { module: String, qualified: String },

    #[error("no callable '{function}' with {arity} argument(s) on type '{qualified}'")]
    FunctionNotFound {
        qualified: String,
        function: String,
        arity: usize,
    },

    #[error("cannot construct a default instance of '{qualified}': {source}")]
    InstantiationFailed {
        qualified: String,
        #[source]
        source: InstantiateError,
    },

    #[error("invoking '{function}' failed: {source}")]
    InvocationFailed {
        function: String,
        #[source]
        source: CallError,
    },

    #[error("result of '{function}' is {actual}, expected {expected}")]
    ResultTypeMismatch {
        function: String,
        expected: &'static str,
        actual: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_display_source_root() {
        let err = EngineError::SourceRootNotFound {
            path: PathBuf::from("/missing/modules"),
        };
        assert_eq!(err.to_string(), "source root not found: /missing/modules");
    }

    #[test]
    fn dispatch_error_display_module_not_found() {
        let err = DispatchError::ModuleNotFound {
            module: "A".to_string(),
        };
        insta::assert_snapshot!(err.to_string(), @"module 'A' is not loaded");
    }

    #[test]
    fn dispatch_error_display_function_not_found() {
        let err = DispatchError::FunctionNotFound {
            qualified: "NS.C".to_string(),
            function: "F".to_string(),
            arity: 2,
        };
        insta::assert_snapshot!(err.to_string(), @"no callable 'F' with 2 argument(s) on type 'NS.C'");
    }

    #[test]
    fn dispatch_error_display_result_mismatch() {
        let err = DispatchError::ResultTypeMismatch {
            function: "G".to_string(),
            expected: "int",
            actual: "str",
        };
        assert_eq!(err.to_string(), "result of 'G' is str, expected int");
    }
}
