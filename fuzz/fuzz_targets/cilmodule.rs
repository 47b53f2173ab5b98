#![no_main]

use libfuzzer_sys::fuzz_target;
use vmscope::{AnalysisSession, CilModule};

fuzz_target!(|data: &[u8]| {
    if let Ok(module) = CilModule::from_mem(data.to_vec()) {
        let session = AnalysisSession::new(&module);
        for method in session.virtualized_methods() {
            let _ = session.bytecode(method);
            let _ = session.instruction_catalog(method.interpreter_type);
        }
    }
});
