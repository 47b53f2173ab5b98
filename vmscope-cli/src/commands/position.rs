use std::path::Path;

use anyhow::{bail, Context};
use serde::Serialize;
use vmscope::{devirtualization::decode_position, AnalysisSession};

use crate::{app::GlobalOptions, commands::common::load_module, output::print_output};

#[derive(Debug, Serialize)]
struct PositionOutput<'a> {
    position: &'a str,
    key: i64,
    offset: i64,
}

/// Recover the key from the first virtualized method of `path`.
fn key_from_file(path: &Path) -> anyhow::Result<i64> {
    let module = load_module(path)?;
    let session = AnalysisSession::new(&module);

    match session.module_key() {
        Some(key) => Ok(key),
        None => bail!(
            "no virtualized methods in {}, cannot recover the key",
            path.display()
        ),
    }
}

pub fn run(
    position: &str,
    key: Option<i64>,
    file: Option<&Path>,
    opts: &GlobalOptions,
) -> anyhow::Result<()> {
    let key = match (key, file) {
        (Some(key), _) => key,
        (None, Some(path)) => key_from_file(path)?,
        (None, None) => bail!("either --key or --file is required"),
    };

    let offset = decode_position(position, key)
        .with_context(|| format!("invalid position string '{position}'"))?;

    let output = PositionOutput {
        position,
        key,
        offset,
    };

    print_output(&output, opts, |out| {
        println!("{} => {:08X}", out.position, out.offset);
    })
}
