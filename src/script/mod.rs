//! Reference script backend
//!
//! A small declarative module language used by the demo harness and the test
//! suite to exercise the engine end to end. The engine core only ever sees
//! the [`ModuleCompiler`] trait; any other backend can be dropped in.
//!
//! ```text
//! namespace NS
//! type C {
//!     static fn F() { }
//!     static fn G() -> int = 42
//!     static fn Add(a: int, b: int) -> int = a + b
//!     fn H(text: str) { }
//! }
//! type D(seed: int) {
//!     fn Poke() { }
//! }
//! ```
//!
//! Bodies are either empty (`{ }`, returning unit) or `= expr`, where an
//! expression is a literal, a parameter reference, or a `+` chain over them.

mod image;
mod parse;

pub use image::LoadedUnit;

use std::sync::Arc;

use crate::compiler::{CompileOptions, Diagnostic, ModuleCompiler, ReferenceBinary, UnitLoadError};
use crate::ident::ModuleId;
use crate::unit::CompiledUnit;

use image::{UnitImage, IMAGE_VERSION};

/// Compiler for the reference script format.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptCompiler;

impl ScriptCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleCompiler for ScriptCompiler {
    fn compile(
        &self,
        module: &ModuleId,
        source: &str,
        _references: &[ReferenceBinary],
        options: &CompileOptions,
    ) -> Result<Arc<dyn CompiledUnit>, Vec<Diagnostic>> {
        let image = parse::parse(module, source, options)?;
        let bytes = serde_json::to_vec_pretty(&image)
            .map_err(|e| vec![Diagnostic::error(0, format!("could not serialize unit image: {e}"))])?;
        Ok(Arc::new(LoadedUnit::from_parts(module.clone(), image, bytes)))
    }

    fn load(&self, module: &ModuleId, bytes: &[u8]) -> Result<Arc<dyn CompiledUnit>, UnitLoadError> {
        let image: UnitImage =
            serde_json::from_slice(bytes).map_err(|e| UnitLoadError::Corrupt(e.to_string()))?;
        if image.version != IMAGE_VERSION {
            return Err(UnitLoadError::UnsupportedVersion {
                found: image.version,
            });
        }
        Ok(Arc::new(LoadedUnit::from_parts(
            module.clone(),
            image,
            bytes.to_vec(),
        )))
    }
}
