//! Structural matching of handler bodies against the signature catalog.
//!
//! A handler body is first [`normalize`]d: every instruction becomes a [`Step`] holding
//! its canonical mnemonic and the shape of its operand, literal values are discarded and
//! `nop` padding is dropped. The resulting sequence is then looked up in the catalog by
//! exact equality. There is no partial scoring, so a handler either matches exactly one
//! signature or is unidentified.

use crate::{
    devirtualization::signatures::{
        OperandShape, OperandType, Signature, SignatureCatalog, Step, SwitchArms,
    },
    disassembler::{Instruction, Operand, OperandEncoding},
    metadata::{
        container::{CodeContainer, TokenKind},
        token::Token,
    },
};

/// Outcome of matching one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult<'c> {
    /// The normalized body equals the template of this signature
    Identified(&'c Signature),
    /// No template matched, or the body could not be read
    Unidentified,
}

impl<'c> MatchResult<'c> {
    /// Returns `true` if a signature matched.
    #[must_use]
    pub fn is_identified(&self) -> bool {
        matches!(self, MatchResult::Identified(_))
    }

    /// The matched signature.
    #[must_use]
    pub fn signature(&self) -> Option<&'c Signature> {
        match self {
            MatchResult::Identified(signature) => Some(signature),
            MatchResult::Unidentified => None,
        }
    }

    /// Mnemonic of the matched real instruction.
    #[must_use]
    pub fn mnemonic(&self) -> Option<&'c str> {
        self.signature().map(|signature| signature.mnemonic.as_str())
    }

    /// Operand type of the matched real instruction.
    #[must_use]
    pub fn operand_type(&self) -> Option<OperandType> {
        self.signature().map(|signature| signature.operand_type)
    }
}

/// Reduce an instruction sequence to its structural steps.
pub fn normalize<C: CodeContainer + ?Sized>(
    container: &C,
    instructions: &[Instruction],
) -> Vec<Step> {
    instructions
        .iter()
        .filter(|instruction| !instruction.is("nop"))
        .map(|instruction| Step {
            opcode: instruction.canonical_mnemonic(),
            shape: operand_shape(container, instruction),
        })
        .collect()
}

fn operand_shape<C: CodeContainer + ?Sized>(
    container: &C,
    instruction: &Instruction,
) -> OperandShape {
    let Some(info) = instruction.info() else {
        return OperandShape::None;
    };

    match (&instruction.operand, info.encoding) {
        (Operand::Switch(targets), _) => OperandShape::Switch(SwitchArms::of(targets.len())),
        (Operand::Token(token), OperandEncoding::Tok) => match container.token_kind(*token) {
            TokenKind::Type => OperandShape::Type,
            TokenKind::Method => OperandShape::Method,
            TokenKind::Field => OperandShape::Field,
            TokenKind::String => OperandShape::String,
            TokenKind::Signature => OperandShape::Sig,
            TokenKind::Other => OperandShape::Token,
        },
        _ => OperandShape::implied_by(info),
    }
}

/// Look up a normalized body in the catalog.
#[must_use]
pub fn match_steps<'c>(catalog: &'c SignatureCatalog, steps: &[Step]) -> MatchResult<'c> {
    match catalog.lookup(steps) {
        Some(signature) => MatchResult::Identified(signature),
        None => MatchResult::Unidentified,
    }
}

/// Normalize the body of `handler` and match it against the catalog.
///
/// Handlers without a readable body are unidentified.
pub fn match_handler<'c, C: CodeContainer + ?Sized>(
    container: &C,
    catalog: &'c SignatureCatalog,
    handler: Token,
) -> MatchResult<'c> {
    match container.method_instructions(handler) {
        Ok(instructions) => match_steps(catalog, &normalize(container, instructions)),
        Err(error) => {
            log::debug!("Handler {handler} has no readable body - {error}");
            MatchResult::Unidentified
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        disassembler::Immediate,
        metadata::{builder::ModuleBuilder, members::MethodCode},
        test::{handler_body, handler_signature, op, FixtureTokens},
    };

    #[test]
    fn normalization_folds_and_drops() {
        let module = ModuleBuilder::new("Test.dll").build();
        let body = vec![
            op("nop", Operand::None),
            op("ldarg.0", Operand::None),
            op("ldarg.s", Operand::Argument(3)),
            op("ldc.i4.m1", Operand::None),
            op("ldc.i4.s", Operand::Immediate(Immediate::Int8(-4))),
            op("ldc.r8", Operand::Immediate(Immediate::Float64(0.5))),
            op("stloc.2", Operand::None),
            op("br.s", Operand::Target(0)),
            op("switch", Operand::Switch(vec![0; 12])),
            op("ret", Operand::None),
        ];

        let steps = normalize(&module, &body)
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();

        assert_eq!(
            steps,
            [
                "ldarg",
                "ldarg",
                "ldc.i4",
                "ldc.i4",
                "ldc.r8",
                "stloc",
                "br",
                "switch:switch(large)",
                "ret"
            ]
        );
    }

    #[test]
    fn literal_values_are_ignored() {
        let module = ModuleBuilder::new("Test.dll").build();
        let first = normalize(
            &module,
            &[
                op("ldloc.0", Operand::None),
                op("ldc.i4", Operand::Immediate(Immediate::Int32(10))),
                op("brtrue", Operand::Target(40)),
            ],
        );
        let second = normalize(
            &module,
            &[
                op("ldloc.s", Operand::Local(17)),
                op("ldc.i4.7", Operand::None),
                op("brtrue.s", Operand::Target(2)),
            ],
        );

        assert_eq!(first, second);
    }

    #[test]
    fn ldtoken_shapes() {
        let mut builder = ModuleBuilder::new("Test.dll");
        let tokens = FixtureTokens::new(&mut builder);
        let module = builder.build();

        let shape = |token| {
            normalize(&module, &[op("ldtoken", Operand::Token(token))])[0].shape
        };

        assert_eq!(shape(tokens.ty), OperandShape::Type);
        assert_eq!(shape(tokens.method), OperandShape::Method);
        assert_eq!(shape(tokens.field), OperandShape::Field);
        assert_eq!(shape(Token::new(0x2700_0001)), OperandShape::Token);
    }

    #[test]
    fn switch_arm_classes() {
        let module = ModuleBuilder::new("Test.dll").build();
        let shape = |arms| {
            normalize(&module, &[op("switch", Operand::Switch(vec![0; arms]))])[0].shape
        };

        assert_eq!(shape(1), OperandShape::Switch(SwitchArms::Single));
        assert_eq!(shape(5), OperandShape::Switch(SwitchArms::Small));
        assert_eq!(shape(9), OperandShape::Switch(SwitchArms::Large));
    }

    #[test]
    fn every_builtin_template_matches_itself() {
        let catalog = SignatureCatalog::builtin();
        let mut builder = ModuleBuilder::new("Test.dll");
        let tokens = FixtureTokens::new(&mut builder);
        let vm = builder.add_type("VM", "Handlers");

        let handlers = catalog
            .iter()
            .map(|signature| {
                let (flags, handler) = handler_signature();
                let body = MethodCode::Decoded(handler_body(&signature.template, &tokens));
                builder
                    .add_method(vm, &format!("H_{}", signature.mnemonic), flags, handler, body)
                    .unwrap()
            })
            .collect::<Vec<_>>();
        let module = builder.build();

        for (signature, handler) in catalog.iter().zip(handlers) {
            let result = match_handler(&module, &catalog, handler);
            assert_eq!(result.mnemonic(), Some(signature.mnemonic.as_str()));
            assert_eq!(result.operand_type(), Some(signature.operand_type));
        }
    }

    #[test]
    fn near_misses_are_unidentified() {
        let catalog = SignatureCatalog::builtin();
        let module = ModuleBuilder::new("Test.dll").build();
        let template = &catalog
            .iter()
            .find(|signature| signature.mnemonic == "xor")
            .unwrap()
            .template;

        assert!(match_steps(&catalog, template).is_identified());
        assert!(!match_steps(&catalog, &template[1..]).is_identified());

        let mut extended = template.clone();
        extended.insert(0, Step::implied("dup").unwrap());
        assert_eq!(match_steps(&catalog, &extended), MatchResult::Unidentified);

        let empty = normalize(&module, &[]);
        assert!(match_steps(&catalog, &empty).mnemonic().is_none());
    }

    #[test]
    fn unreadable_handler() {
        let catalog = SignatureCatalog::builtin();
        let mut builder = ModuleBuilder::new("Test.dll");
        let vm = builder.add_type("VM", "Handlers");
        let (flags, signature) = handler_signature();
        let broken = builder
            .add_method(vm, "H", flags, signature, MethodCode::Malformed("bad".into()))
            .unwrap();
        let module = builder.build();

        assert_eq!(match_handler(&module, &catalog, broken), MatchResult::Unidentified);
    }
}
