#![no_main]
use colony_core::parse::{parse_item, parse_recipe};
use colony_core::test_utils::{rid, test_registry};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let registry = test_registry();
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let _ = parse_item(text, &registry);
    // Arbitrary JSON documents must be accepted or rejected, never panic.
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(text) {
        let _ = parse_recipe(rid("fuzz"), &json, &registry);
    }
});
