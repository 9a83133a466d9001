#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = toml::from_str::<dispenser_config::Config>(data)
        && cfg.validate().is_ok()
    {
        // a config that validates must also convert into runtime settings
        let _: dispenser_core::DistanceCfg = (&cfg.distance).into();
        let _: dispenser_core::SyncCfg = (&cfg.time_sync).into();
        let _: dispenser_core::TimingCfg = (&cfg.timing).into();
    }
});
