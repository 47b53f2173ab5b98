//! Discovery of virtualized methods.
//!
//! The obfuscator replaces the body of every protected method with a stub that hands the
//! original arguments to the embedded interpreter:
//!
//! ```text
//! newobj   instance void VM.Interpreter::.ctor()      // dispatcher acquisition
//! ldstr    "resource"                                 // resource identifier
//! ldstr    "position"                                 // encoded position
//! ldsfld   int64 <Keys>::Key                          // key field
//! ...                                                 // argument packing
//! callvirt instance object VM.Interpreter::Run(...)   // dispatch entry point
//! ```
//!
//! A method is reported only when this exact shape is present. Any other evidence, such
//! as a partial shape or two shapes that disagree, leaves the method unreported.

use std::collections::HashMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::{
    devirtualization::{
        config::AnalysisConfig,
        evaluator::{evaluate_field, EvalError},
    },
    disassembler::Instruction,
    metadata::{container::CodeContainer, token::Token},
};

/// One method whose body was replaced by a call into the interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualizedMethod {
    /// The protected method
    pub method: Token,
    /// Its display name, `Namespace.Type::Method`
    pub method_name: String,
    /// The interpreter's dispatch entry point
    pub dispatcher: Token,
    /// The interpreter implementation type
    pub interpreter_type: Token,
    /// Encoded position string
    pub position: String,
    /// Name of the embedded resource holding the bytecode
    pub resource: String,
    /// The static field the key is loaded from
    pub key_field: Token,
    /// The recovered key
    pub key: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CallShape {
    dispatcher: Token,
    interpreter_type: Token,
    resource: String,
    position: String,
    key_field: Token,
}

/// Every virtualized method in declaration order.
///
/// All returned facts carry the same key: the key of the first accepted method is the
/// module key, and methods whose key differs are dropped with a warning.
pub fn find_virtualized_methods<C: CodeContainer + ?Sized>(
    container: &C,
    config: &AnalysisConfig,
) -> Vec<VirtualizedMethod> {
    let methods = container.methods_with_bodies();

    let shapes: Vec<Option<CallShape>> = if config.parallel {
        methods
            .par_iter()
            .map(|&method| method_shape(container, method, config))
            .collect()
    } else {
        methods
            .iter()
            .map(|&method| method_shape(container, method, config))
            .collect()
    };

    let mut keys = KeyCache::default();
    let mut module_key = None;
    let mut found = Vec::new();

    for (&method, shape) in methods.iter().zip(shapes) {
        let Some(shape) = shape else {
            continue;
        };

        if let Some(fact) = accept(container, config, method, shape, &mut keys, &mut module_key) {
            found.push(fact);
        }
    }

    log::debug!(
        "Found {} virtualized methods among {} method bodies",
        found.len(),
        methods.len()
    );

    found
}

/// The first virtualized method in declaration order, stopping the scan as soon as it is
/// found.
pub fn find_first_virtualized_method<C: CodeContainer + ?Sized>(
    container: &C,
    config: &AnalysisConfig,
) -> Option<VirtualizedMethod> {
    let mut keys = KeyCache::default();
    let mut module_key = None;

    container.methods_with_bodies().into_iter().find_map(|method| {
        let shape = method_shape(container, method, config)?;
        accept(container, config, method, shape, &mut keys, &mut module_key)
    })
}

#[derive(Default)]
struct KeyCache(HashMap<Token, Result<i64, EvalError>>);

impl KeyCache {
    fn key<C: CodeContainer + ?Sized>(
        &mut self,
        container: &C,
        field: Token,
        max_depth: usize,
    ) -> Result<i64, EvalError> {
        self.0
            .entry(field)
            .or_insert_with(|| evaluate_field(container, field, max_depth))
            .clone()
    }
}

fn accept<C: CodeContainer + ?Sized>(
    container: &C,
    config: &AnalysisConfig,
    method: Token,
    shape: CallShape,
    keys: &mut KeyCache,
    module_key: &mut Option<i64>,
) -> Option<VirtualizedMethod> {
    let key = match keys.key(container, shape.key_field, config.max_eval_depth) {
        Ok(key) => key,
        Err(error) => {
            log::warn!(
                "Rejecting {}: key field {} could not be evaluated - {}",
                method,
                shape.key_field,
                error
            );
            return None;
        }
    };

    match *module_key {
        Some(expected) if expected != key => {
            log::warn!(
                "Rejecting {method}: key {key:#X} differs from the module key {expected:#X}"
            );
            return None;
        }
        Some(_) => {}
        None => *module_key = Some(key),
    }

    Some(VirtualizedMethod {
        method,
        method_name: container
            .method_name(method)
            .unwrap_or_else(|| method.to_string()),
        dispatcher: shape.dispatcher,
        interpreter_type: shape.interpreter_type,
        position: shape.position,
        resource: shape.resource,
        key_field: shape.key_field,
        key,
    })
}

/// The single call shape of `method`, if it has exactly one (or several identical ones).
fn method_shape<C: CodeContainer + ?Sized>(
    container: &C,
    method: Token,
    config: &AnalysisConfig,
) -> Option<CallShape> {
    let instructions = match container.method_instructions(method) {
        Ok(instructions) => instructions,
        Err(error) => {
            log::debug!("Skipping {method}: {error}");
            return None;
        }
    };

    let mut shapes = (0..instructions.len())
        .filter_map(|start| call_shape(container, &instructions[start..], config));

    let first = shapes.next()?;
    if let Some(other) = shapes.find(|shape| *shape != first) {
        log::debug!(
            "Rejecting {}: ambiguous interpreter calls ({} vs {})",
            method,
            first.position,
            other.position
        );
        return None;
    }

    Some(first)
}

/// Match the call shape at the start of `code`.
fn call_shape<C: CodeContainer + ?Sized>(
    container: &C,
    code: &[Instruction],
    config: &AnalysisConfig,
) -> Option<CallShape> {
    let [acquire, resource, position, key, rest @ ..] = code else {
        return None;
    };

    let interpreter_type = acquisition_type(container, acquire)?;
    if !resource.is("ldstr") || !position.is("ldstr") || !key.is("ldsfld") {
        return None;
    }

    let resource = container.user_string(resource.token()?)?;
    let position = container.user_string(position.token()?)?;
    let key_field = container.resolve_field(key.token()?)?;
    if !key_field.is_static || !key_field.field_type.is_integer() {
        return None;
    }

    for instruction in rest.iter().take(config.max_argument_window + 1) {
        if instruction.is("call") || instruction.is("callvirt") {
            let dispatcher = container.resolve_method(instruction.token()?)?;
            if dispatcher.is_constructor()
                || dispatcher.declaring_type != Some(interpreter_type)
                || !container.is_type_definition(interpreter_type)
            {
                log::debug!(
                    "Partial interpreter call shape ending in {}",
                    instruction
                );
                return None;
            }

            return Some(CallShape {
                dispatcher: dispatcher.token,
                interpreter_type,
                resource: resource.to_string(),
                position: position.to_string(),
                key_field: key_field.token,
            });
        }

        if !is_argument_packing(instruction) {
            return None;
        }
    }

    None
}

/// Declaring type of the member a dispatcher acquisition refers to.
fn acquisition_type<C: CodeContainer + ?Sized>(
    container: &C,
    instruction: &Instruction,
) -> Option<Token> {
    let token = instruction.token()?;

    match instruction.canonical_mnemonic() {
        "newobj" | "call" => container.resolve_method(token)?.declaring_type,
        "ldsfld" => container.resolve_field(token)?.declaring_type,
        _ => None,
    }
}

fn is_argument_packing(instruction: &Instruction) -> bool {
    let mnemonic = instruction.canonical_mnemonic();

    matches!(
        mnemonic,
        "ldarg"
            | "ldarga"
            | "ldloc"
            | "ldloca"
            | "ldc.i4"
            | "ldc.i8"
            | "ldc.r4"
            | "ldc.r8"
            | "ldnull"
            | "newarr"
            | "dup"
            | "box"
            | "ldstr"
            | "stelem"
    ) || mnemonic.starts_with("stelem.")
        || mnemonic.starts_with("conv.")
}
