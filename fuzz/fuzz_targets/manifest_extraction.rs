#![no_main]
use libfuzzer_sys::fuzz_target;
use sentinel_modules::module::registry::{ModuleDependencies, ModuleManifest};
use sentinel_modules::module::validation::is_valid_module_name;

fuzz_target!(|data: &[u8]| {
    let source = String::from_utf8_lossy(data);
    let manifest = ModuleManifest::from_source("fuzz", "fuzz.module", &source);

    // Only names that can be resolved safely ever reach the loader
    for dep in ModuleDependencies::loadable(&manifest) {
        assert!(is_valid_module_name(&dep));
    }
});
