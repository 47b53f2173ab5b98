//! The instruction catalog of an interpreter.
//!
//! The interpreter keeps one handler method per virtual opcode, and the opcode of a
//! handler is its index in declaration order. [`build_catalog`] walks the handlers in that
//! order, matches each one against the signature catalog and emits exactly one
//! [`VirtualInstruction`] per handler, identified or not.

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
};

use rayon::prelude::*;
use serde::Serialize;

use crate::{
    devirtualization::{
        config::AnalysisConfig,
        matcher::match_handler,
        signatures::{OperandType, SignatureCatalog},
    },
    metadata::{container::CodeContainer, signatures::ElementKind, token::Token},
    Result,
};

/// One virtual opcode and what its handler implements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualInstruction {
    /// Index of the handler in declaration order
    pub opcode: u32,
    /// The handler method
    pub handler: Token,
    /// Display name of the handler
    pub handler_name: String,
    /// Whether a signature matched the handler
    pub identified: bool,
    /// Real instruction implemented by the handler, when identified
    pub mnemonic: Option<String>,
    /// Operand type of the real instruction, when identified
    pub operand_type: Option<OperandType>,
}

/// Handler methods of `interpreter_type` in opcode order.
///
/// Handlers are instance methods returning `void` that take exactly one `object` and are
/// not constructors. With `include_nested`, the handlers of nested types follow those of
/// their enclosing type, depth-first in declaration order.
///
/// # Errors
/// Returns [`crate::Error::TypeNotFound`] if `interpreter_type` is not a type definition.
pub fn collect_handlers<C: CodeContainer + ?Sized>(
    container: &C,
    interpreter_type: Token,
    include_nested: bool,
) -> Result<Vec<Token>> {
    let mut handlers = Vec::new();
    let mut visited = HashSet::new();
    collect_from(
        container,
        interpreter_type,
        include_nested,
        &mut visited,
        &mut handlers,
    )?;

    Ok(handlers)
}

fn collect_from<C: CodeContainer + ?Sized>(
    container: &C,
    ty: Token,
    include_nested: bool,
    visited: &mut HashSet<Token>,
    handlers: &mut Vec<Token>,
) -> Result<()> {
    if !visited.insert(ty) {
        return Ok(());
    }

    handlers.extend(
        container
            .type_methods(ty)?
            .iter()
            .copied()
            .filter(|&method| is_handler(container, method)),
    );

    if include_nested {
        for &nested in container.nested_types(ty)? {
            collect_from(container, nested, include_nested, visited, handlers)?;
        }
    }

    Ok(())
}

fn is_handler<C: CodeContainer + ?Sized>(container: &C, method: Token) -> bool {
    let Some(method) = container.resolve_method(method) else {
        return false;
    };

    let signature = method.signature;
    signature.has_this
        && signature.ret == ElementKind::Void
        && matches!(signature.params.as_slice(), [param] if param.is_object())
        && !method.is_constructor()
}

/// Identify every handler of `interpreter_type`.
///
/// The result is in opcode order regardless of `config.parallel`.
///
/// # Errors
/// Returns [`crate::Error::TypeNotFound`] if `interpreter_type` is not a type definition.
pub fn build_catalog<C: CodeContainer + ?Sized>(
    container: &C,
    interpreter_type: Token,
    catalog: &SignatureCatalog,
    config: &AnalysisConfig,
) -> Result<Vec<VirtualInstruction>> {
    let handlers = collect_handlers(container, interpreter_type, config.include_nested_handlers)?;

    let identify = |(opcode, &handler): (usize, &Token)| {
        let result = match_handler(container, catalog, handler);
        VirtualInstruction {
            opcode: opcode as u32,
            handler,
            handler_name: container
                .method_name(handler)
                .unwrap_or_else(|| handler.to_string()),
            identified: result.is_identified(),
            mnemonic: result.mnemonic().map(str::to_string),
            operand_type: result.operand_type(),
        }
    };

    let instructions: Vec<VirtualInstruction> = if config.parallel {
        handlers.par_iter().enumerate().map(identify).collect()
    } else {
        handlers.iter().enumerate().map(identify).collect()
    };

    let summary = CatalogSummary::of(&instructions);
    log::debug!(
        "Interpreter {} has {} handlers, {}",
        interpreter_type,
        handlers.len(),
        summary
    );

    Ok(instructions)
}

/// Identification statistics of a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CatalogSummary {
    /// Number of virtual instructions
    pub total: usize,
    /// Number of identified virtual instructions
    pub identified: usize,
}

impl CatalogSummary {
    /// Count the identified entries of `instructions`.
    #[must_use]
    pub fn of(instructions: &[VirtualInstruction]) -> Self {
        CatalogSummary {
            total: instructions.len(),
            identified: instructions.iter().filter(|i| i.identified).count(),
        }
    }

    /// Share of identified entries in whole percent, rounded down; 0 for an empty catalog.
    #[must_use]
    pub fn percent_identified(&self) -> usize {
        if self.total == 0 {
            0
        } else {
            self.identified * 100 / self.total
        }
    }

    /// Number of unidentified entries.
    #[must_use]
    pub fn unidentified(&self) -> usize {
        self.total - self.identified
    }
}

impl fmt::Display for CatalogSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} identified ({}%)",
            self.identified,
            self.total,
            self.percent_identified()
        )
    }
}

/// Occurrences of each operand type among identified entries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct OperandTypeCounts {
    /// Identified entries per operand type
    pub identified: BTreeMap<OperandType, usize>,
    /// Entries without an operand type
    pub unidentified: usize,
}

impl OperandTypeCounts {
    /// Count `instructions` in one pass.
    #[must_use]
    pub fn of(instructions: &[VirtualInstruction]) -> Self {
        let mut counts = OperandTypeCounts::default();

        for instruction in instructions {
            match instruction.operand_type {
                Some(operand_type) => *counts.identified.entry(operand_type).or_default() += 1,
                None => counts.unidentified += 1,
            }
        }

        counts
    }

    /// Occurrences of `operand_type`.
    #[must_use]
    pub fn get(&self, operand_type: OperandType) -> usize {
        self.identified.get(&operand_type).copied().unwrap_or(0)
    }

    /// Sum over all buckets, equal to the catalog size.
    #[must_use]
    pub fn total(&self) -> usize {
        self.identified.values().sum::<usize>() + self.unidentified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        devirtualization::signatures::Step,
        disassembler::Operand,
        metadata::{
            builder::ModuleBuilder,
            members::MethodCode,
            method::MethodAttributes,
            signatures::{ElementKind, MethodSignature},
        },
        test::{handler_body, handler_signature, op, VmSample},
        Error,
    };

    fn template(catalog: &SignatureCatalog, mnemonic: &str) -> Vec<Step> {
        catalog
            .iter()
            .find(|signature| signature.mnemonic == mnemonic)
            .unwrap()
            .template
            .clone()
    }

    fn entry(identified: bool, operand_type: Option<OperandType>) -> VirtualInstruction {
        VirtualInstruction {
            opcode: 0,
            handler: Token::new(0x0600_0001),
            handler_name: String::new(),
            identified,
            mnemonic: None,
            operand_type,
        }
    }

    #[test]
    fn percentages() {
        let summary = |identified, total| CatalogSummary { total, identified };

        assert_eq!(summary(0, 7).percent_identified(), 0);
        assert_eq!(summary(7, 7).percent_identified(), 100);
        assert_eq!(summary(1, 3).percent_identified(), 33);
        assert_eq!(summary(2, 3).percent_identified(), 66);
        assert_eq!(summary(0, 0).percent_identified(), 0);
        assert_eq!(summary(30, 50).to_string(), "30/50 identified (60%)");
        assert_eq!(summary(0, 4).to_string(), "0/4 identified (0%)");
        assert_eq!(summary(1, 3).unidentified(), 2);
    }

    #[test]
    fn operand_type_counts() {
        let instructions = vec![
            entry(true, Some(OperandType::Branch)),
            entry(true, Some(OperandType::None)),
            entry(true, Some(OperandType::Branch)),
            entry(false, None),
        ];

        let counts = OperandTypeCounts::of(&instructions);
        assert_eq!(counts.get(OperandType::Branch), 2);
        assert_eq!(counts.get(OperandType::None), 1);
        assert_eq!(counts.get(OperandType::Field), 0);
        assert_eq!(counts.unidentified, 1);
        assert_eq!(counts.total(), instructions.len());
    }

    #[test]
    fn handler_shape() {
        let mut builder = ModuleBuilder::new("Test.dll");
        let vm = builder.add_type("VM", "Interpreter");
        let (flags, signature) = handler_signature();
        let body = || MethodCode::Decoded(vec![op("ret", Operand::None)]);

        let handler = builder
            .add_method(vm, "A", flags, signature.clone(), body())
            .unwrap();
        builder
            .add_method(vm, ".ctor", flags, signature.clone(), body())
            .unwrap();
        builder
            .add_method(
                vm,
                "Static",
                MethodAttributes::STATIC,
                MethodSignature::new(false, ElementKind::Void, vec![ElementKind::Object]),
                body(),
            )
            .unwrap();
        builder
            .add_method(
                vm,
                "Returns",
                flags,
                MethodSignature::new(true, ElementKind::Object, vec![ElementKind::Object]),
                body(),
            )
            .unwrap();
        builder
            .add_method(
                vm,
                "TwoArgs",
                flags,
                MethodSignature::new(
                    true,
                    ElementKind::Void,
                    vec![ElementKind::Object, ElementKind::Object],
                ),
                body(),
            )
            .unwrap();
        builder
            .add_method(
                vm,
                "IntArg",
                flags,
                MethodSignature::new(true, ElementKind::Void, vec![ElementKind::I4]),
                body(),
            )
            .unwrap();
        let module = builder.build();

        assert_eq!(collect_handlers(&module, vm, true).unwrap(), vec![handler]);
    }

    #[test]
    fn nested_handlers_follow_declaration_order() {
        let mut builder = ModuleBuilder::new("Test.dll");
        let vm = builder.add_type("VM", "Interpreter");
        let first = builder.add_nested_type(vm, "First").unwrap();
        let inner = builder.add_nested_type(first, "Inner").unwrap();
        let second = builder.add_nested_type(vm, "Second").unwrap();
        let (flags, signature) = handler_signature();
        let mut add = |ty, name: &str| {
            builder
                .add_method(
                    ty,
                    name,
                    flags,
                    signature.clone(),
                    MethodCode::Decoded(vec![op("ret", Operand::None)]),
                )
                .unwrap()
        };

        let second_handler = add(second, "S");
        let inner_handler = add(inner, "I");
        let vm_handler = add(vm, "V");
        let first_handler = add(first, "F");
        let module = builder.build();

        assert_eq!(
            collect_handlers(&module, vm, true).unwrap(),
            vec![vm_handler, first_handler, inner_handler, second_handler]
        );
        assert_eq!(collect_handlers(&module, vm, false).unwrap(), vec![vm_handler]);
        assert!(matches!(
            collect_handlers(&module, Token::new(0x0100_0001), true),
            Err(Error::TypeNotFound(_))
        ));
    }

    #[test]
    fn catalog_in_opcode_order() {
        let catalog = SignatureCatalog::builtin();
        let mut sample = VmSample::new(0x1234_ABCD);
        let mnemonics = ["ldc.i4", "add", "br", "ldfld", "call", "box", "switch", "ret"];

        for (index, mnemonic) in mnemonics.iter().enumerate() {
            let body = handler_body(&template(&catalog, mnemonic), &sample.tokens);
            sample.add_handler(&format!("H{index}"), body);
            sample.add_handler(
                &format!("U{index}"),
                vec![op("ldarg.0", Operand::None), op("throw", Operand::None)],
            );
        }
        let interpreter = sample.interpreter;
        let module = sample.build();

        let sequential =
            build_catalog(&module, interpreter, &catalog, &AnalysisConfig::sequential()).unwrap();
        let parallel =
            build_catalog(&module, interpreter, &catalog, &AnalysisConfig::default()).unwrap();
        assert_eq!(sequential, parallel);
        assert_eq!(sequential.len(), mnemonics.len() * 2);

        for (index, instruction) in sequential.iter().enumerate() {
            assert_eq!(instruction.opcode as usize, index);
            if index % 2 == 0 {
                assert!(instruction.identified);
                assert_eq!(instruction.mnemonic.as_deref(), Some(mnemonics[index / 2]));
            } else {
                assert!(!instruction.identified);
                assert_eq!(instruction.mnemonic, None);
                assert_eq!(instruction.operand_type, None);
            }
        }

        assert_eq!(sequential[0].operand_type, Some(OperandType::InlineConst));
        assert_eq!(sequential[12].operand_type, Some(OperandType::Switch));
        assert_eq!(sequential[0].handler_name, "VM.Interpreter::H0");

        let summary = CatalogSummary::of(&sequential);
        assert_eq!(summary.to_string(), "8/16 identified (50%)");
    }

    #[test]
    fn empty_interpreter() {
        let sample = VmSample::new(1);
        let interpreter = sample.interpreter;
        let module = sample.build();

        // Only the constructor and the dispatch entry point, neither has the handler shape
        let instructions = build_catalog(
            &module,
            interpreter,
            &SignatureCatalog::builtin(),
            &AnalysisConfig::default(),
        )
        .unwrap();
        assert!(instructions.is_empty());
        assert_eq!(CatalogSummary::of(&instructions).percent_identified(), 0);
    }
}
