mod app;
mod commands;
mod output;

use clap::Parser;

use crate::app::{Cli, Command};

fn main() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        eprintln!("\nCancelled.");
        std::process::exit(130);
    })
    .expect("failed to set Ctrl+C handler");

    let cli = Cli::parse();

    // vmscope info+ on stderr unless --json; --verbose enables debug; RUST_LOG overrides
    if !cli.global.json {
        let level = if cli.global.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_module("vmscope", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    match &cli.command {
        Command::Locate { path } => commands::locate::run(path, &cli.global),
        Command::Key { path } => commands::key::run(path, &cli.global),
        Command::Instructions {
            path,
            only_identified,
            operand_types,
            signatures,
        } => commands::instructions::run(
            path,
            &commands::instructions::InstructionsOptions {
                only_identified: *only_identified,
                operand_types: *operand_types,
                signatures: signatures.as_deref(),
            },
            &cli.global,
        ),
        Command::Position {
            position,
            key,
            file,
        } => commands::position::run(position, *key, file.as_deref(), &cli.global),
        Command::Signatures => commands::signatures::run(&cli.global),
    }
}
