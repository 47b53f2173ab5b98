//! Reference templates of handler bodies.
//!
//! A [`Signature`] pairs a real CIL instruction with the normalized body of a handler
//! implementing it. Bodies are sequences of [`Step`]s: canonical mnemonic plus operand
//! shape. The [`SignatureCatalog`] holds a set of signatures and guarantees at construction
//! that no two of them share a template, so a normalized handler body matches at most one
//! entry.
//!
//! Templates are written as text, one step per element: `opcode` or `opcode:shape`, where
//! the shape may be omitted when it is the one the opcode implies.
//!
//! # Examples
//!
//! ```rust
//! use vmscope::{OperandType, SignatureCatalog};
//!
//! let catalog = SignatureCatalog::from_json(r#"[
//!     { "mnemonic": "neg", "operand_type": "none",
//!       "template": ["ldarg", "callvirt:method", "stloc", "ldarg", "ldloc", "neg",
//!                    "box:type", "callvirt:method", "ret"] }
//! ]"#)?;
//!
//! let signature = catalog.iter().next().unwrap();
//! assert_eq!(signature.operand_type, OperandType::None);
//! assert_eq!(signature.template[1].to_string(), "callvirt");
//! # Ok::<(), vmscope::Error>(())
//! ```

use std::{
    collections::HashMap,
    fmt,
    str::FromStr,
    sync::{Arc, OnceLock},
};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::{
    devirtualization::builtin,
    disassembler::{
        is_argument_access,
        opcodes::{self, OpCode},
        OperandEncoding,
    },
    Error::{AmbiguousSignature, SignatureSyntax},
    Result,
};

/// What kind of operand a virtual instruction carries.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum OperandType {
    /// No operand
    None,
    /// Integer or floating point immediate
    InlineConst,
    /// Type token
    Type,
    /// Method token
    Method,
    /// Field token
    Field,
    /// Branch target
    Branch,
    /// Jump table of a `switch`
    Switch,
    /// Strings, other tokens, signatures, local and argument indices
    Other,
}

/// Arm count class of a `switch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchArms {
    /// One arm
    Single,
    /// Two to eight arms
    Small,
    /// More than eight arms
    Large,
}

impl SwitchArms {
    /// Classify a jump table of `count` arms.
    #[must_use]
    pub fn of(count: usize) -> Self {
        match count {
            0 | 1 => SwitchArms::Single,
            2..=8 => SwitchArms::Small,
            _ => SwitchArms::Large,
        }
    }
}

/// The operand of a normalized instruction, reduced to its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandShape {
    /// No operand
    None,
    /// Integer immediate
    Int,
    /// Floating point immediate
    Float,
    /// Local variable index
    Local,
    /// Argument index
    Arg,
    /// Branch target
    Branch,
    /// Jump table
    Switch(SwitchArms),
    /// Type token
    Type,
    /// Method token
    Method,
    /// Field token
    Field,
    /// User string
    String,
    /// Stand-alone signature
    Sig,
    /// Token of unknown kind
    Token,
}

impl OperandShape {
    /// The shape an opcode's operand has unless its token says otherwise.
    #[must_use]
    pub fn implied_by(opcode: &OpCode) -> Self {
        match opcode.encoding {
            OperandEncoding::None => OperandShape::None,
            OperandEncoding::ShortInt | OperandEncoding::Int | OperandEncoding::Int64 => {
                OperandShape::Int
            }
            OperandEncoding::ShortFloat | OperandEncoding::Float => OperandShape::Float,
            OperandEncoding::ShortVar | OperandEncoding::Var => {
                if is_argument_access(opcode.canonical) {
                    OperandShape::Arg
                } else {
                    OperandShape::Local
                }
            }
            OperandEncoding::ShortBranch | OperandEncoding::Branch => OperandShape::Branch,
            OperandEncoding::Switch => OperandShape::Switch(SwitchArms::Small),
            OperandEncoding::Type => OperandShape::Type,
            OperandEncoding::Method => OperandShape::Method,
            OperandEncoding::Field => OperandShape::Field,
            OperandEncoding::String => OperandShape::String,
            OperandEncoding::Sig => OperandShape::Sig,
            OperandEncoding::Tok => OperandShape::Token,
        }
    }
}

impl fmt::Display for OperandShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperandShape::None => "none",
            OperandShape::Int => "int",
            OperandShape::Float => "float",
            OperandShape::Local => "local",
            OperandShape::Arg => "arg",
            OperandShape::Branch => "branch",
            OperandShape::Switch(SwitchArms::Single) => "switch(single)",
            OperandShape::Switch(SwitchArms::Small) => "switch(small)",
            OperandShape::Switch(SwitchArms::Large) => "switch(large)",
            OperandShape::Type => "type",
            OperandShape::Method => "method",
            OperandShape::Field => "field",
            OperandShape::String => "string",
            OperandShape::Sig => "sig",
            OperandShape::Token => "token",
        };

        f.write_str(name)
    }
}

impl FromStr for OperandShape {
    type Err = crate::Error;

    fn from_str(text: &str) -> Result<Self> {
        Ok(match text {
            "none" => OperandShape::None,
            "int" => OperandShape::Int,
            "float" => OperandShape::Float,
            "local" => OperandShape::Local,
            "arg" => OperandShape::Arg,
            "branch" => OperandShape::Branch,
            "switch(single)" => OperandShape::Switch(SwitchArms::Single),
            "switch(small)" => OperandShape::Switch(SwitchArms::Small),
            "switch(large)" => OperandShape::Switch(SwitchArms::Large),
            "type" => OperandShape::Type,
            "method" => OperandShape::Method,
            "field" => OperandShape::Field,
            "string" => OperandShape::String,
            "sig" => OperandShape::Sig,
            "token" => OperandShape::Token,
            _ => return Err(SignatureSyntax(format!("unknown operand shape '{text}'"))),
        })
    }
}

/// One normalized instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Step {
    /// Canonical mnemonic
    pub opcode: &'static str,
    /// Operand shape
    pub shape: OperandShape,
}

impl Step {
    /// A step with the shape its opcode implies.
    ///
    /// # Errors
    /// Returns [`crate::Error::SignatureSyntax`] if `opcode` is not a canonical mnemonic.
    pub fn implied(opcode: &str) -> Result<Self> {
        let info = canonical_opcode(opcode)?;
        Ok(Step {
            opcode: info.mnemonic,
            shape: OperandShape::implied_by(info),
        })
    }
}

fn canonical_opcode(opcode: &str) -> Result<&'static OpCode> {
    match opcodes::by_mnemonic(opcode) {
        Some(info) if !info.is_folded() => Ok(info),
        Some(info) => Err(SignatureSyntax(format!(
            "'{}' is a short form, use '{}'",
            opcode, info.canonical
        ))),
        None => Err(SignatureSyntax(format!("unknown opcode '{opcode}'"))),
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let implied = opcodes::by_mnemonic(self.opcode).map(OperandShape::implied_by);
        if implied == Some(self.shape) {
            f.write_str(self.opcode)
        } else {
            write!(f, "{}:{}", self.opcode, self.shape)
        }
    }
}

impl FromStr for Step {
    type Err = crate::Error;

    fn from_str(text: &str) -> Result<Self> {
        match text.trim().split_once(':') {
            Some((opcode, shape)) => Ok(Step {
                opcode: canonical_opcode(opcode.trim())?.mnemonic,
                shape: shape.trim().parse()?,
            }),
            None => Step::implied(text.trim()),
        }
    }
}

/// The serialized form of a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureDefinition {
    /// The real instruction
    pub mnemonic: String,
    /// Its operand type
    pub operand_type: OperandType,
    /// Template steps in text form
    pub template: Vec<String>,
}

/// A real instruction and the normalized handler body that implements it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// The real instruction
    pub mnemonic: String,
    /// Its operand type
    pub operand_type: OperandType,
    /// Normalized handler body
    pub template: Vec<Step>,
}

impl Signature {
    /// Parse a signature from its serialized form.
    ///
    /// # Errors
    /// Returns [`crate::Error::SignatureSyntax`] for unparsable steps or an empty template.
    pub fn from_definition(definition: &SignatureDefinition) -> Result<Self> {
        if definition.template.is_empty() {
            return Err(SignatureSyntax(format!(
                "empty template for '{}'",
                definition.mnemonic
            )));
        }

        let template = definition
            .template
            .iter()
            .map(|step| step.parse())
            .collect::<Result<Vec<Step>>>()?;

        if template.iter().any(|step| step.opcode == "nop") {
            return Err(SignatureSyntax(format!(
                "template of '{}' contains nop, which normalization drops",
                definition.mnemonic
            )));
        }

        Ok(Signature {
            mnemonic: definition.mnemonic.clone(),
            operand_type: definition.operand_type,
            template,
        })
    }

    /// The serialized form.
    #[must_use]
    pub fn definition(&self) -> SignatureDefinition {
        SignatureDefinition {
            mnemonic: self.mnemonic.clone(),
            operand_type: self.operand_type,
            template: self.template.iter().map(ToString::to_string).collect(),
        }
    }
}

/// A set of signatures with pairwise distinct templates.
///
/// Read-only after construction and freely shareable across threads.
#[derive(Debug, Clone)]
pub struct SignatureCatalog {
    signatures: Vec<Signature>,
    index: HashMap<Vec<Step>, usize>,
}

impl SignatureCatalog {
    /// Build a catalog, rejecting templates shared by two signatures.
    ///
    /// # Errors
    /// Returns [`crate::Error::AmbiguousSignature`] naming the first conflicting pair.
    pub fn new(signatures: Vec<Signature>) -> Result<Self> {
        let mut index = HashMap::with_capacity(signatures.len());

        for (position, signature) in signatures.iter().enumerate() {
            if let Some(previous) = index.insert(signature.template.clone(), position) {
                return Err(AmbiguousSignature {
                    first: signatures[previous].mnemonic.clone(),
                    second: signature.mnemonic.clone(),
                });
            }
        }

        Ok(SignatureCatalog { signatures, index })
    }

    /// Build a catalog from serialized signatures.
    ///
    /// # Errors
    /// Returns an error for unparsable or ambiguous templates.
    pub fn from_definitions(definitions: &[SignatureDefinition]) -> Result<Self> {
        let signatures = definitions
            .iter()
            .map(Signature::from_definition)
            .collect::<Result<Vec<_>>>()?;

        Self::new(signatures)
    }

    /// Parse a JSON array of [`SignatureDefinition`]s.
    ///
    /// # Errors
    /// Returns [`crate::Error::Json`] for invalid documents and the errors of
    /// [`SignatureCatalog::from_definitions`].
    pub fn from_json(json: &str) -> Result<Self> {
        let definitions: Vec<SignatureDefinition> = serde_json::from_str(json)?;
        Self::from_definitions(&definitions)
    }

    /// Serialize the catalog as a pretty-printed JSON array.
    ///
    /// # Errors
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.definitions())?)
    }

    /// The catalog shipped with the crate, built once per process.
    ///
    /// # Panics
    /// Panics if two built-in templates coincide, which is a bug in the catalog data.
    #[must_use]
    pub fn builtin() -> Arc<SignatureCatalog> {
        static BUILTIN: OnceLock<Arc<SignatureCatalog>> = OnceLock::new();

        BUILTIN
            .get_or_init(|| {
                let catalog = SignatureCatalog::from_definitions(&builtin::definitions())
                    .expect("built-in signature templates must be valid and distinct");
                Arc::new(catalog)
            })
            .clone()
    }

    /// The signature whose template equals `steps` exactly.
    #[must_use]
    pub fn lookup(&self, steps: &[Step]) -> Option<&Signature> {
        self.index
            .get(steps)
            .map(|&position| &self.signatures[position])
    }

    /// Number of signatures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// Returns `true` if the catalog holds no signatures.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Iterate the signatures in definition order.
    pub fn iter(&self) -> std::slice::Iter<'_, Signature> {
        self.signatures.iter()
    }

    /// All signatures in serialized form.
    #[must_use]
    pub fn definitions(&self) -> Vec<SignatureDefinition> {
        self.signatures.iter().map(Signature::definition).collect()
    }
}

impl<'a> IntoIterator for &'a SignatureCatalog {
    type Item = &'a Signature;
    type IntoIter = std::slice::Iter<'a, Signature>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use strum::IntoEnumIterator;

    use super::*;

    fn definition(mnemonic: &str, template: &[&str]) -> SignatureDefinition {
        SignatureDefinition {
            mnemonic: mnemonic.to_string(),
            operand_type: OperandType::None,
            template: template.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn step_syntax() {
        let step: Step = "ldarg".parse().unwrap();
        assert_eq!(step.shape, OperandShape::Arg);
        assert_eq!(step.to_string(), "ldarg");

        let step: Step = "callvirt:method".parse().unwrap();
        assert_eq!(step.to_string(), "callvirt");

        let step: Step = "ldtoken:type".parse().unwrap();
        assert_eq!(step.shape, OperandShape::Type);
        assert_eq!(step.to_string(), "ldtoken:type");

        let step: Step = "switch:switch(large)".parse().unwrap();
        assert_eq!(step.to_string(), "switch:switch(large)");
        assert_eq!("switch".parse::<Step>().unwrap().shape, OperandShape::Switch(SwitchArms::Small));

        assert!("ldarg.0".parse::<Step>().is_err());
        assert!("frobnicate".parse::<Step>().is_err());
        assert!("ldloc:banana".parse::<Step>().is_err());
    }

    #[test]
    fn switch_classes() {
        assert_eq!(SwitchArms::of(1), SwitchArms::Single);
        assert_eq!(SwitchArms::of(2), SwitchArms::Small);
        assert_eq!(SwitchArms::of(8), SwitchArms::Small);
        assert_eq!(SwitchArms::of(9), SwitchArms::Large);
    }

    #[test]
    fn operand_type_names() {
        let names = OperandType::iter().map(|t| t.to_string()).collect::<Vec<_>>();
        assert_eq!(
            names,
            ["none", "inline-const", "type", "method", "field", "branch", "switch", "other"]
        );
        assert_eq!("inline-const".parse::<OperandType>().unwrap(), OperandType::InlineConst);
        assert_eq!(
            serde_json::to_string(&OperandType::InlineConst).unwrap(),
            "\"inline-const\""
        );
    }

    #[test]
    fn ambiguity_is_rejected() {
        let result = SignatureCatalog::from_definitions(&[
            definition("add", &["ldarg", "add", "ret"]),
            definition("sub", &["ldarg", "sub", "ret"]),
            definition("plus", &["ldarg", "add:none", "ret"]),
        ]);

        match result {
            Err(AmbiguousSignature { first, second }) => {
                assert_eq!(first, "add");
                assert_eq!(second, "plus");
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn invalid_templates() {
        assert!(SignatureCatalog::from_definitions(&[definition("x", &[])]).is_err());
        assert!(SignatureCatalog::from_definitions(&[definition("x", &["nop", "ret"])]).is_err());
        assert!(matches!(
            SignatureCatalog::from_json("{ not json"),
            Err(crate::Error::Json(_))
        ));
    }

    #[test]
    fn json_round_trip() {
        let catalog = SignatureCatalog::from_definitions(&[
            definition("add", &["ldarg", "add", "ret"]),
            definition("br", &["ldarg", "ldarg", "callvirt:method", "stfld", "ret"]),
        ])
        .unwrap();

        let json = catalog.to_json().unwrap();
        let reloaded = SignatureCatalog::from_json(&json).unwrap();
        assert_eq!(reloaded.definitions(), catalog.definitions());

        let steps = reloaded.iter().nth(1).unwrap().template.clone();
        assert_eq!(reloaded.lookup(&steps).unwrap().mnemonic, "br");
        assert!(reloaded.lookup(&steps[1..]).is_none());
    }

    #[test]
    fn builtin_catalog() {
        let catalog = SignatureCatalog::builtin();
        assert!(catalog.len() > 100);

        // Built once and shared
        assert!(Arc::ptr_eq(&catalog, &SignatureCatalog::builtin()));

        let mnemonics = catalog.iter().map(|s| s.mnemonic.as_str()).collect::<HashSet<_>>();
        assert_eq!(mnemonics.len(), catalog.len());
        for mnemonic in ["add", "ldc.i4", "br", "switch", "call", "ldfld", "box", "ldstr", "ret"] {
            assert!(mnemonics.contains(mnemonic), "{mnemonic}");
        }
    }
}
