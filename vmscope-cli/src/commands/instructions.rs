use std::{path::Path, sync::Arc};

use anyhow::Context;
use serde::Serialize;
use vmscope::{
    devirtualization::OperandTypeCounts, AnalysisConfig, AnalysisSession, CatalogSummary,
    CodeContainer, SignatureCatalog, VirtualInstruction,
};

use crate::{
    app::GlobalOptions,
    commands::common::{load_module, NOTHING_FOUND},
    output::{print_output, Align, TabWriter},
};

pub struct InstructionsOptions<'a> {
    pub only_identified: bool,
    pub operand_types: bool,
    pub signatures: Option<&'a Path>,
}

#[derive(Debug, Serialize)]
struct InstructionsOutput {
    interpreter: Option<String>,
    summary: CatalogSummary,
    percent_identified: usize,
    instructions: Vec<VirtualInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    operand_types: Option<OperandTypeCounts>,
}

fn load_signatures(path: Option<&Path>) -> anyhow::Result<Arc<SignatureCatalog>> {
    let Some(path) = path else {
        return Ok(SignatureCatalog::builtin());
    };

    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read signatures: {}", path.display()))?;
    let catalog = SignatureCatalog::from_json(&json)
        .with_context(|| format!("invalid signature catalog: {}", path.display()))?;

    Ok(Arc::new(catalog))
}

pub fn run(
    path: &Path,
    options: &InstructionsOptions<'_>,
    opts: &GlobalOptions,
) -> anyhow::Result<()> {
    let signatures = load_signatures(options.signatures)?;
    let module = load_module(path)?;
    let session = AnalysisSession::with_options(&module, AnalysisConfig::default(), signatures);

    let Some(first) = session.first_virtualized_method() else {
        let output = InstructionsOutput {
            interpreter: None,
            summary: CatalogSummary::default(),
            percent_identified: 0,
            instructions: Vec::new(),
            operand_types: None,
        };
        return print_output(&output, opts, |_| println!("{NOTHING_FOUND}"));
    };

    let interpreter = first.interpreter_type;
    let catalog = session.instruction_catalog(interpreter)?;
    let summary = CatalogSummary::of(&catalog);

    let output = InstructionsOutput {
        interpreter: module.type_name(interpreter),
        summary,
        percent_identified: summary.percent_identified(),
        instructions: catalog
            .iter()
            .filter(|instruction| instruction.identified || !options.only_identified)
            .cloned()
            .collect(),
        operand_types: options
            .operand_types
            .then(|| OperandTypeCounts::of(&catalog)),
    };

    print_output(&output, opts, |out| {
        if let Some(interpreter) = &out.interpreter {
            println!("Interpreter: {interpreter}");
        }
        println!("Instructions: {}", out.summary);

        if !out.instructions.is_empty() {
            let mut tw = TabWriter::new(&[
                ("Opcode", Align::Right),
                ("Handler", Align::Left),
                ("Instruction", Align::Left),
                ("Operand", Align::Left),
            ]);
            for instruction in &out.instructions {
                tw.row(vec![
                    instruction.opcode.to_string(),
                    instruction.handler.to_string(),
                    instruction.mnemonic.clone().unwrap_or_else(|| "?".to_string()),
                    instruction
                        .operand_type
                        .map_or_else(String::new, |operand| operand.to_string()),
                ]);
            }
            println!();
            tw.print();
        }

        if let Some(counts) = &out.operand_types {
            println!("\nOperand types:");
            let mut tw =
                TabWriter::new(&[("Type", Align::Left), ("Count", Align::Right)]).indent("  ");
            for (operand_type, count) in &counts.identified {
                tw.row(vec![operand_type.to_string(), count.to_string()]);
            }
            tw.row(vec!["unidentified".to_string(), counts.unidentified.to_string()]);
            tw.print();
        }
    })
}
