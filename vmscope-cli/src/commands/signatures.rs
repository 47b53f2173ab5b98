use serde::Serialize;
use vmscope::{devirtualization::SignatureDefinition, SignatureCatalog};

use crate::{
    app::GlobalOptions,
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
#[serde(transparent)]
struct SignaturesOutput {
    signatures: Vec<SignatureDefinition>,
}

pub fn run(opts: &GlobalOptions) -> anyhow::Result<()> {
    let output = SignaturesOutput {
        signatures: SignatureCatalog::builtin().definitions(),
    };

    print_output(&output, opts, |out| {
        let mut tw = TabWriter::new(&[
            ("Instruction", Align::Left),
            ("Operand", Align::Left),
            ("Template", Align::Left),
        ]);
        for signature in &out.signatures {
            tw.row(vec![
                signature.mnemonic.clone(),
                signature.operand_type.to_string(),
                signature.template.join(" "),
            ]);
        }
        tw.print();
        println!("\n{} signature(s).", out.signatures.len());
    })
}
