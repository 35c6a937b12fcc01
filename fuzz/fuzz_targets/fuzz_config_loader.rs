#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Arbitrary TOML must parse or fail cleanly, and a config that passes
    // validation must map onto the runtime structs without panicking.
    let Ok(cfg) = udm_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    if let Ok(core) = udm_core::ControllerCfg::try_from(&cfg) {
        let limits = core.echo_limits();
        assert!(limits.max_high_ticks >= limits.min_high_ticks);
        let _ = core.timing.echo_mask();
        let _ = core.timing.echo_loss_limit();
    }
});
