#![no_main]
use dispenser_core::time_sync::{ntp_to_civil, transmit_seconds};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (Vec<u8>, i32)| {
    let (datagram, offset) = input;
    let Some(secs) = transmit_seconds(&datagram) else {
        assert!(datagram.len() < 48);
        return;
    };
    if let Some(t) = ntp_to_civil(secs, offset % 50_400) {
        assert!((1..=12).contains(&t.month));
        assert!((1..=31).contains(&t.day));
        assert!(t.weekday <= 6);
        assert!(t.hour < 24 && t.minute < 60 && t.second < 60);
    }
});
