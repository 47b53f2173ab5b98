use std::path::Path;

use serde::Serialize;
use vmscope::AnalysisSession;

use crate::{
    app::GlobalOptions,
    commands::common::{hex_key, load_module, NOTHING_FOUND},
    output::print_output,
};

#[derive(Debug, Serialize)]
struct KeyOutput {
    method: Option<String>,
    key_field: Option<String>,
    key: Option<i64>,
}

pub fn run(path: &Path, opts: &GlobalOptions) -> anyhow::Result<()> {
    let module = load_module(path)?;
    let session = AnalysisSession::new(&module);
    let first = session.first_virtualized_method();

    let output = KeyOutput {
        method: first.map(|method| method.method_name.clone()),
        key_field: first.map(|method| method.key_field.to_string()),
        key: first.map(|method| method.key),
    };

    print_output(&output, opts, |out| match (out.key, &out.method) {
        (Some(key), Some(method)) => {
            println!("Key: {} ({})", key, hex_key(key));
            println!("From: {method}");
        }
        _ => println!("{NOTHING_FOUND}"),
    })
}
