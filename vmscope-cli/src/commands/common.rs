use std::path::Path;

use anyhow::Context;
use vmscope::CilModule;

/// Load a .NET module, naming the file on failure.
pub fn load_module(path: &Path) -> anyhow::Result<CilModule> {
    CilModule::from_file(path)
        .with_context(|| format!("failed to load assembly: {}", path.display()))
}

/// Hex form of a key, the way it appears in decompiled initializers.
pub fn hex_key(key: i64) -> String {
    if key < 0 {
        format!("-0x{:X}", key.unsigned_abs())
    } else {
        format!("0x{key:X}")
    }
}

pub const NOTHING_FOUND: &str = "No virtualized methods found.";
