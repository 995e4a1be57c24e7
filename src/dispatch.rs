//! Symbolic invocation dispatch
//!
//! Resolves a (module, namespace, type, function) tuple against the module
//! cache and invokes the callable, translating every failure into a
//! structured [`DispatchError`]. Dispatch reads only from the cache and is
//! independent of compilation; it caches nothing between calls.

use crate::cache::ModuleCache;
use crate::error::DispatchError;
use crate::ident::ModuleId;
use crate::value::{FromValue, Value};

fn qualified(namespace: &str, type_name: &str) -> String {
    if namespace.is_empty() {
        type_name.to_string()
    } else {
        format!("{namespace}.{type_name}")
    }
}

/// Resolve and invoke, returning the raw produced value.
pub fn invoke_value(
    cache: &ModuleCache,
    module: &str,
    namespace: &str,
    type_name: &str,
    function: &str,
    args: &[Value],
) -> Result<Value, DispatchError> {
    let id = ModuleId::new(module);
    let unit = cache.get(&id).ok_or_else(|| DispatchError::ModuleNotFound {
        module: module.to_string(),
    })?;

    let ty = unit
        .find_type(namespace, type_name)
        .ok_or_else(|| DispatchError::TypeNotFound {
            module: module.to_string(),
            qualified: qualified(namespace, type_name),
        })?;

    let callable =
        unit.find_callable(ty, function, args.len())
            .ok_or_else(|| DispatchError::FunctionNotFound {
                qualified: qualified(namespace, type_name),
                function: function.to_string(),
                arity: args.len(),
            })?;

    let instance = if callable.is_static() {
        None
    } else {
        let instance =
            unit.instantiate(ty)
                .map_err(|source| DispatchError::InstantiationFailed {
                    qualified: qualified(namespace, type_name),
                    source,
                })?;
        Some(instance)
    };

    unit.call(callable, instance.as_ref(), args)
        .map_err(|source| DispatchError::InvocationFailed {
            function: function.to_string(),
            source,
        })
}

/// Typed invocation: the produced value must convert into `T`.
pub fn invoke<T: FromValue>(
    cache: &ModuleCache,
    module: &str,
    namespace: &str,
    type_name: &str,
    function: &str,
    args: &[Value],
) -> Result<T, DispatchError> {
    let value = invoke_value(cache, module, namespace, type_name, function, args)?;
    T::from_value(value).map_err(|actual| DispatchError::ResultTypeMismatch {
        function: function.to_string(),
        expected: T::EXPECTED,
        actual: actual.type_name(),
    })
}

/// Void invocation: the produced value is discarded.
pub fn invoke_void(
    cache: &ModuleCache,
    module: &str,
    namespace: &str,
    type_name: &str,
    function: &str,
    args: &[Value],
) -> Result<(), DispatchError> {
    invoke_value(cache, module, namespace, type_name, function, args).map(|_| ())
}
