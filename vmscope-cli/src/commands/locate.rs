use std::path::Path;

use serde::Serialize;
use vmscope::AnalysisSession;

use crate::{
    app::GlobalOptions,
    commands::common::{hex_key, load_module, NOTHING_FOUND},
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct MethodEntry {
    token: String,
    method: String,
    position: String,
    decoded: Option<i64>,
    error: Option<String>,
    resource: String,
    key: i64,
}

#[derive(Debug, Serialize)]
struct LocateOutput {
    methods: Vec<MethodEntry>,
    count: usize,
}

pub fn run(path: &Path, opts: &GlobalOptions) -> anyhow::Result<()> {
    let module = load_module(path)?;
    let session = AnalysisSession::new(&module);

    let methods = session
        .virtualized_methods()
        .iter()
        .map(|method| {
            let decoded = session.decode_position(method);
            MethodEntry {
                token: method.method.to_string(),
                method: method.method_name.clone(),
                position: method.position.clone(),
                error: decoded.as_ref().err().map(ToString::to_string),
                decoded: decoded.ok(),
                resource: method.resource.clone(),
                key: method.key,
            }
        })
        .collect::<Vec<_>>();

    let output = LocateOutput {
        count: methods.len(),
        methods,
    };

    print_output(&output, opts, |out| {
        if out.methods.is_empty() {
            println!("{NOTHING_FOUND}");
            return;
        }

        let mut tw = TabWriter::new(&[
            ("Method", Align::Left),
            ("Position", Align::Left),
            ("Offset", Align::Right),
            ("Resource", Align::Left),
            ("Key", Align::Right),
        ]);
        for entry in &out.methods {
            tw.row(vec![
                entry.method.clone(),
                entry.position.clone(),
                entry
                    .decoded
                    .map_or_else(|| "invalid".to_string(), |offset| format!("0x{offset:08X}")),
                entry.resource.clone(),
                format!("{} ({})", entry.key, hex_key(entry.key)),
            ]);
        }
        tw.print();
        println!("\n{} virtualized method(s).", out.count);

        for entry in &out.methods {
            if let Some(error) = &entry.error {
                log::warn!("{}: {}", entry.method, error);
            }
        }
    })
}
