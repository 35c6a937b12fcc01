//! TOML text through `udm_config` into a running controller.
mod common;

use common::Rig;
use udm_core::display::frame_text;
use udm_core::{ButtonCount, ControllerCfg, Distance, LedMode, run_lockstep};
use udm_hardware::{MemoryEeprom, SensorFault};
use udm_traits::PageStore;

fn controller_cfg(text: &str) -> ControllerCfg {
    let cfg: udm_config::Config = toml::from_str(text).unwrap();
    cfg.validate().unwrap();
    ControllerCfg::try_from(&cfg).unwrap()
}

#[test]
fn echo_rate_sets_the_trigger_cadence() {
    let cfg = controller_cfg("[timing]\necho_rate = 32\n");
    assert_eq!(cfg.timing.echo_mask(), 31);
    assert_eq!(cfg.timing.echo_loss_limit(), 6);

    let rig = Rig::new(500);
    let mut orch = rig.build(cfg);
    let mut armed = Vec::new();
    run_lockstep(&mut orch, 100, |r| {
        if r.armed {
            armed.push(r.tick);
        }
    })
    .unwrap();
    assert_eq!(armed, vec![32, 64, 96]);
}

#[test]
fn storage_address_and_features_come_from_the_file() {
    let cfg = controller_cfg(
        r#"
[features]
buttons = 3
led_mode = "distance"

[storage]
address = 5
"#,
    );
    assert_eq!(cfg.features.buttons, ButtonCount::Three);
    assert_eq!(cfg.features.led_mode, LedMode::Distance);

    let mut image = MemoryEeprom::new(64, 16);
    image.program(5, &[42]).unwrap();
    let rig = Rig::new(500);
    let orch = rig.build_with_store(cfg, image);
    assert_eq!(orch.threshold_cm(), 42);
}

#[test]
fn loss_limit_of_255_still_forces_out_of_range() {
    // 255 slow ticks per second with a trigger on every tick.
    let cfg = controller_cfg("[timing]\nslow_tick_us = 3921\necho_rate = 1\n");
    assert_eq!(cfg.timing.echo_loss_limit(), u8::MAX);

    let rig = Rig::new(500);
    rig.sensor.set_fault(SensorFault::NoEcho);
    let mut orch = rig.build(cfg);
    let mut last = None;
    run_lockstep(&mut orch, 5000, |r| last = Some(r.clone())).unwrap();

    let r = last.unwrap();
    assert!(r.echo_lost > 255, "lost {}", r.echo_lost);
    assert_eq!(orch.distance(), Distance::OUT_OF_RANGE);
    assert_eq!(frame_text(&r.frame), "Err");
}
