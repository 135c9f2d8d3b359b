#![no_main]
use colony_core::view::BuilderView;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Must not panic -- returning Err is fine. Anything that decodes must
    // survive a second trip unchanged.
    if let Ok(view) = BuilderView::decode(data) {
        let again = BuilderView::decode(&view.encode()).expect("re-encoded view decodes");
        assert_eq!(again.resources, view.resources);
        assert_eq!(again.worker_name, view.worker_name);
    }
});
