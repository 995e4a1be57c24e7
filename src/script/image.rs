//! Serialized unit images and their evaluation
//!
//! A compiled script module is a flat image of types, constructor
//! parameters, and functions whose bodies are small expression trees. The
//! image serializes with `serde_json`; those bytes are the persistable
//! artifact form.

use serde::{Deserialize, Serialize};

use crate::ident::ModuleId;
use crate::unit::{
    CallError, CallableHandle, CompiledUnit, Instance, InstantiateError, TypeHandle,
};
use crate::value::Value;

/// Image format version. Bump when changing the serialized representation.
pub(crate) const IMAGE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct UnitImage {
    pub version: u32,
    pub module: String,
    pub types: Vec<TypeImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TypeImage {
    pub namespace: String,
    pub name: String,
    /// Parameters of an explicit constructor; empty means the type is
    /// default-constructible.
    pub ctor_params: Vec<Param>,
    pub functions: Vec<FnImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Param {
    pub name: String,
    pub ty: TypeTag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum TypeTag {
    Unit,
    Bool,
    Int,
    Float,
    Str,
}

impl TypeTag {
    pub(crate) fn parse(text: &str) -> Option<Self> {
        match text {
            "void" => Some(TypeTag::Unit),
            "bool" => Some(TypeTag::Bool),
            "int" => Some(TypeTag::Int),
            "float" => Some(TypeTag::Float),
            "str" => Some(TypeTag::Str),
            _ => None,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            TypeTag::Unit => "void",
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Str => "str",
        }
    }

    fn admits(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (TypeTag::Unit, Value::Unit)
                | (TypeTag::Bool, Value::Bool(_))
                | (TypeTag::Int, Value::Int(_))
                | (TypeTag::Float, Value::Float(_))
                | (TypeTag::Str, Value::Str(_))
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FnImage {
    pub name: String,
    pub is_static: bool,
    pub params: Vec<Param>,
    pub ret: TypeTag,
    pub body: Expr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum Expr {
    Const(Value),
    Param(usize),
    Add(Box<Expr>, Box<Expr>),
}

fn eval(expr: &Expr, args: &[Value]) -> Result<Value, CallError> {
    match expr {
        Expr::Const(value) => Ok(value.clone()),
        Expr::Param(index) => args
            .get(*index)
            .cloned()
            .ok_or_else(|| CallError::Runtime(format!("missing argument {index}"))),
        Expr::Add(lhs, rhs) => {
            let lhs = eval(lhs, args)?;
            let rhs = eval(rhs, args)?;
            match (lhs, rhs) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(b))),
                (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
                (lhs, rhs) => Err(CallError::Runtime(format!(
                    "cannot add {} and {}",
                    lhs.type_name(),
                    rhs.type_name()
                ))),
            }
        }
    }
}

/// Marker state of a default-constructed script instance.
struct ScriptInstance;

/// A script unit backed by its image and raw serialized bytes.
#[derive(Debug)]
pub struct LoadedUnit {
    module: ModuleId,
    image: UnitImage,
    bytes: Vec<u8>,
}

impl LoadedUnit {
    pub(crate) fn from_parts(module: ModuleId, image: UnitImage, bytes: Vec<u8>) -> Self {
        Self {
            module,
            image,
            bytes,
        }
    }
}

impl CompiledUnit for LoadedUnit {
    fn module(&self) -> &ModuleId {
        &self.module
    }

    fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn find_type(&self, namespace: &str, name: &str) -> Option<TypeHandle> {
        self.image
            .types
            .iter()
            .position(|t| t.namespace == namespace && t.name == name)
            .map(TypeHandle::new)
    }

    fn find_callable(&self, ty: TypeHandle, name: &str, arity: usize) -> Option<CallableHandle> {
        let type_image = self.image.types.get(ty.index())?;
        let fn_index = type_image
            .functions
            .iter()
            .position(|f| f.name == name && f.params.len() == arity)?;
        let is_static = type_image.functions[fn_index].is_static;
        Some(CallableHandle::new(ty.index(), fn_index, is_static))
    }

    fn instantiate(&self, ty: TypeHandle) -> Result<Instance, InstantiateError> {
        let type_image = self
            .image
            .types
            .get(ty.index())
            .ok_or_else(|| InstantiateError::Failed("unknown type handle".to_string()))?;
        if !type_image.ctor_params.is_empty() {
            return Err(InstantiateError::NoDefaultConstructor {
                type_name: type_image.name.clone(),
                arity: type_image.ctor_params.len(),
            });
        }
        Ok(Instance::new(ScriptInstance))
    }

    fn call(
        &self,
        callable: CallableHandle,
        instance: Option<&Instance>,
        args: &[Value],
    ) -> Result<Value, CallError> {
        let type_image = self
            .image
            .types
            .get(callable.type_index())
            .ok_or_else(|| CallError::Runtime("unknown type handle".to_string()))?;
        let function = type_image
            .functions
            .get(callable.fn_index())
            .ok_or_else(|| CallError::Runtime("unknown callable handle".to_string()))?;

        if args.len() != function.params.len() {
            return Err(CallError::Runtime(format!(
                "'{}' expects {} argument(s), got {}",
                function.name,
                function.params.len(),
                args.len()
            )));
        }
        for (index, (param, arg)) in function.params.iter().zip(args).enumerate() {
            if !param.ty.admits(arg) {
                return Err(CallError::ArgumentMismatch {
                    index,
                    expected: param.ty.name(),
                    actual: arg.type_name(),
                });
            }
        }

        if !function.is_static {
            let present = instance.is_some_and(|i| i.downcast_ref::<ScriptInstance>().is_some());
            if !present {
                return Err(CallError::Runtime(format!(
                    "'{}' is an instance function",
                    function.name
                )));
            }
        }

        let value = eval(&function.body, args)?;
        if !function.ret.admits(&value) {
            return Err(CallError::Runtime(format!(
                "'{}' produced {}, declared {}",
                function.name,
                value.type_name(),
                function.ret.name()
            )));
        }
        Ok(value)
    }
}
