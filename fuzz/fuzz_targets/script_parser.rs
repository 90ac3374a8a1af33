#![no_main]
use libfuzzer_sys::fuzz_target;
use sentinel_modules::module::{Module, ScriptModule, SessionContext};

fuzz_target!(|data: &[u8]| {
    // Module files are untrusted text: parsing and registering must
    // return an error, never panic
    let source = String::from_utf8_lossy(data);

    if let Ok(module) = ScriptModule::parse("fuzz", &source) {
        let mut ctx = SessionContext::new();
        let _ = module.register(&mut ctx);

        // Whatever was registered must render back to shell text
        let _ = ctx.render_shell();
    }
});
