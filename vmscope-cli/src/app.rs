use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// vmscope - analysis of virtualized .NET methods
#[derive(Debug, Parser)]
#[command(name = "vmscope", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List virtualized methods with their position, resource and key.
    Locate {
        /// Path to the .NET assembly file.
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// Print the interpreter key of the first virtualized method.
    Key {
        /// Path to the .NET assembly file.
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// List the interpreter's virtual instructions and what they implement.
    Instructions {
        /// Path to the .NET assembly file.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Omit handlers that matched no signature.
        #[arg(long)]
        only_identified: bool,

        /// Append occurrence counts per operand type.
        #[arg(long)]
        operand_types: bool,

        /// Match against the signatures in this JSON file instead of the built-in catalog.
        #[arg(long, value_name = "CATALOG")]
        signatures: Option<PathBuf>,
    },

    /// Decode a position string.
    Position {
        /// The encoded position string.
        #[arg(value_name = "STRING")]
        position: String,

        /// Key to decode with (decimal or 0x hex, optionally negative).
        #[arg(
            long,
            value_parser = parse_key,
            allow_hyphen_values = true,
            conflicts_with = "file",
            required_unless_present = "file"
        )]
        key: Option<i64>,

        /// Recover the key from this assembly instead.
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Dump the built-in signature catalog.
    Signatures,
}

/// Parse a key given in decimal or `0x` hexadecimal, with an optional leading `-`.
pub fn parse_key(text: &str) -> Result<i64, String> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => digits.parse::<u64>(),
    }
    .map_err(|e| format!("invalid key '{text}': {e}"))?;

    if negative {
        0_i64
            .checked_sub_unsigned(magnitude)
            .ok_or_else(|| format!("key '{text}' is out of range"))
    } else {
        // Hex keys may spell out the full 64-bit pattern
        Ok(magnitude as i64)
    }
}
