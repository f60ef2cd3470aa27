#![no_main]

use cairn_events::{CapabilityObject, EventKind, RawEvent};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for kind in EventKind::ALL {
        let Ok(event) = RawEvent::decode(kind.as_str(), data) else {
            continue;
        };
        assert_eq!(event.kind(), kind);
        let _ = event.repo_slug();
        let _ = CapabilityObject::new(event);
    }
});
