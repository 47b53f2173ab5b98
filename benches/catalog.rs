//! Benchmarks for the analysis pipeline.
//!
//! - Position decoding
//! - Handler matching against the builtin catalog
//! - Virtualized method discovery and instruction catalogs, sequential and parallel

extern crate vmscope;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::hint::black_box;
use vmscope::{
    devirtualization::{
        encode_position, match_steps, AnalysisConfig, OperandShape, SwitchArms,
    },
    disassembler::{Immediate, Instruction, Operand},
    metadata::{
        builder::ModuleBuilder,
        members::MethodCode,
        method::{FieldAttributes, MethodAttributes},
        signatures::{ElementKind, MemberSignature, MethodSignature},
    },
    AnalysisSession, CilModule, SignatureCatalog, Token,
};

const KEY: i32 = 0x2545_F491;

fn op(mnemonic: &str, operand: Operand) -> Instruction {
    Instruction::from_mnemonic(mnemonic, operand).unwrap()
}

/// A module with one handler per builtin signature and `stubs` virtualized methods.
fn protected_module(stubs: usize) -> (CilModule, Token) {
    let mut builder = ModuleBuilder::new("Bench.exe");
    let object = builder.add_type_ref("System", "Object");
    let method_ref = builder.add_member_ref(
        object,
        "ToString",
        MemberSignature::Method(MethodSignature::new(true, ElementKind::String, Vec::new())),
    );
    let field_ref = builder.add_member_ref(object, "f", MemberSignature::Field(ElementKind::I4));
    let literal = builder.add_user_string("s");

    let holder = builder.add_type("", "<Module>");
    let key_field = builder
        .add_field(holder, "key", FieldAttributes::STATIC, ElementKind::I8)
        .unwrap();
    builder
        .add_method(
            holder,
            ".cctor",
            MethodAttributes::STATIC | MethodAttributes::RT_SPECIAL_NAME,
            MethodSignature::new(false, ElementKind::Void, Vec::new()),
            MethodCode::Decoded(vec![
                op("ldc.i4", Operand::Immediate(Immediate::Int32(KEY))),
                op("conv.i8", Operand::None),
                op("stsfld", Operand::Token(key_field)),
                op("ret", Operand::None),
            ]),
        )
        .unwrap();

    let interpreter = builder.add_type("VM", "Machine");
    let instance = builder
        .add_field(interpreter, "Instance", FieldAttributes::STATIC, ElementKind::Object)
        .unwrap();
    let dispatch = builder
        .add_method(
            interpreter,
            "Run",
            MethodAttributes::STATIC,
            MethodSignature::new(
                false,
                ElementKind::Object,
                vec![ElementKind::String, ElementKind::String, ElementKind::I8],
            ),
            MethodCode::Decoded(vec![op("ldnull", Operand::None), op("ret", Operand::None)]),
        )
        .unwrap();

    for (index, signature) in SignatureCatalog::builtin().iter().enumerate() {
        let body = signature
            .template
            .iter()
            .map(|step| {
                let operand = match step.shape {
                    OperandShape::None => Operand::None,
                    OperandShape::Int if step.opcode == "ldc.i8" => {
                        Operand::Immediate(Immediate::Int64(0))
                    }
                    OperandShape::Int => Operand::Immediate(Immediate::Int32(0)),
                    OperandShape::Float if step.opcode == "ldc.r4" => {
                        Operand::Immediate(Immediate::Float32(0.0))
                    }
                    OperandShape::Float => Operand::Immediate(Immediate::Float64(0.0)),
                    OperandShape::Local => Operand::Local(0),
                    OperandShape::Arg => Operand::Argument(1),
                    OperandShape::Branch => Operand::Target(0),
                    OperandShape::Switch(SwitchArms::Single) => Operand::Switch(vec![0]),
                    OperandShape::Switch(SwitchArms::Small) => Operand::Switch(vec![0; 4]),
                    OperandShape::Switch(SwitchArms::Large) => Operand::Switch(vec![0; 32]),
                    OperandShape::Type => Operand::Token(object),
                    OperandShape::Method => Operand::Token(method_ref),
                    OperandShape::Field => Operand::Token(field_ref),
                    OperandShape::String => Operand::Token(literal),
                    OperandShape::Sig | OperandShape::Token => {
                        Operand::Token(Token::new(0x1100_0001))
                    }
                };
                op(step.opcode, operand)
            })
            .collect();

        builder
            .add_method(
                interpreter,
                &format!("Handler{index}"),
                MethodAttributes::HIDE_BY_SIG,
                MethodSignature::new(true, ElementKind::Void, vec![ElementKind::Object]),
                MethodCode::Decoded(body),
            )
            .unwrap();
    }

    let program = builder.add_type("App", "Program");
    for index in 0..stubs {
        let resource = builder.add_user_string("data");
        let position =
            builder.add_user_string(&encode_position(index as i64 * 0x40, i64::from(KEY)));
        builder
            .add_method(
                program,
                &format!("Method{index}"),
                MethodAttributes::STATIC,
                MethodSignature::new(false, ElementKind::Object, Vec::new()),
                MethodCode::Decoded(vec![
                    op("ldsfld", Operand::Token(instance)),
                    op("ldstr", Operand::Token(resource)),
                    op("ldstr", Operand::Token(position)),
                    op("ldsfld", Operand::Token(key_field)),
                    op("call", Operand::Token(dispatch)),
                    op("ret", Operand::None),
                ]),
            )
            .unwrap();
    }

    (builder.build(), interpreter)
}

fn bench_position_decode(c: &mut Criterion) {
    let encoded = encode_position(0x0012_3456, i64::from(KEY));

    c.bench_function("position_decode", |b| {
        b.iter(|| {
            vmscope::devirtualization::decode_position(black_box(&encoded), i64::from(KEY))
                .unwrap()
        });
    });
}

fn bench_match_builtin(c: &mut Criterion) {
    let catalog = SignatureCatalog::builtin();
    let last = catalog.iter().last().unwrap().template.clone();

    c.bench_function("match_builtin_template", |b| {
        b.iter(|| black_box(match_steps(&catalog, black_box(&last))));
    });
}

fn bench_locate(c: &mut Criterion) {
    let (module, _) = protected_module(2000);

    for (name, config) in [
        ("locate_sequential", AnalysisConfig::sequential()),
        ("locate_parallel", AnalysisConfig::default()),
    ] {
        c.bench_function(name, |b| {
            b.iter_batched(
                || {
                    AnalysisSession::with_options(
                        &module,
                        config.clone(),
                        SignatureCatalog::builtin(),
                    )
                },
                |session| black_box(session.virtualized_methods().len()),
                BatchSize::SmallInput,
            );
        });
    }
}

fn bench_instruction_catalog(c: &mut Criterion) {
    let (module, interpreter) = protected_module(0);

    for (name, config) in [
        ("catalog_sequential", AnalysisConfig::sequential()),
        ("catalog_parallel", AnalysisConfig::default()),
    ] {
        c.bench_function(name, |b| {
            b.iter_batched(
                || {
                    AnalysisSession::with_options(
                        &module,
                        config.clone(),
                        SignatureCatalog::builtin(),
                    )
                },
                |session| black_box(session.instruction_catalog(interpreter).unwrap().len()),
                BatchSize::SmallInput,
            );
        });
    }
}

criterion_group!(
    benches,
    bench_position_decode,
    bench_match_builtin,
    bench_locate,
    bench_instruction_catalog
);
criterion_main!(benches);
