//! Fuzz target: stored config blob
//!
//! Whatever bytes sit in the config slot, `load_or_default` must return a
//! config that passes validation, and `load` must never panic.
//!
//! cargo fuzz run fuzz_config_blob

#![no_main]

use libfuzzer_sys::fuzz_target;
use tam110::adapters::nvs::NvsAdapter;
use tam110::app::ports::ConfigPort;

fuzz_target!(|data: &[u8]| {
    let Ok(mut nvs) = NvsAdapter::new() else {
        return;
    };
    nvs.sim_write_raw(data);

    let _ = nvs.load();
    let cfg = nvs.load_or_default();
    assert!(cfg.validate().is_ok(), "boot config must always validate");
});
