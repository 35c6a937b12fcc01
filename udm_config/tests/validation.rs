use rstest::rstest;
use udm_config::{LedMode, load_toml};

#[test]
fn empty_file_is_a_valid_config() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults should pass");
    assert_eq!(cfg.timing.fast_tick_us, 50);
    assert_eq!(cfg.timing.slow_tick_us, 5000);
    assert_eq!(cfg.timing.echo_rate, 64);
    assert_eq!(cfg.alarm.default_threshold_cm, 35);
    assert_eq!(cfg.features.led_mode, LedMode::Proximity);
    assert_eq!(cfg.slow_ticks_per_sec(), 200);
}

#[test]
fn parses_full_file() {
    let toml = r#"
[timing]
fast_tick_us = 40
slow_tick_us = 4000
echo_rate = 32
speed_of_sound_cm_s = 34300

[echo]
max_low_us = 6000
min_high_us = 120
max_high_us = 24000

[features]
buttons = 3
leds = true
led_mode = "distance"
buzzer = false
persistence = true

[buttons]
hold_button_ticks = 20
hold_alarm_ticks = 300

[alarm]
default_threshold_cm = 50

[storage]
path = "/tmp/udm.eeprom"
address = 4
page_size = 64
capacity = 256

[pins]
trigger = 23
echo = 24
digits = [5, 6, 13]
segments = [2, 3, 4, 17, 27, 22, 10, 9]
set = 16
minus = 20
plus = 21

[logging]
level = "debug"
rotation = "daily"
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.features.led_mode, LedMode::Distance);
    assert_eq!(cfg.storage.path.as_deref(), Some("/tmp/udm.eeprom"));
    let pins = cfg.pins.expect("pins present");
    assert!(pins.segments_active_low);
    assert!(!pins.leds_active_low);
    assert_eq!(pins.set, Some(16));
}

#[rstest]
#[case("[timing]\nfast_tick_us = 0", "fast_tick_us must be >= 1")]
#[case("[timing]\nslow_tick_us = 50", "slow_tick_us must be > timing.fast_tick_us")]
#[case("[timing]\nslow_tick_us = 2000", "at most 255 ticks per second")]
#[case("[timing]\necho_rate = 48", "echo_rate must be a power of two")]
#[case("[timing]\necho_rate = 256", "echo_rate must be a power of two")]
#[case("[echo]\nmin_high_us = 10", "min_high_us must be at least one fast tick")]
#[case("[echo]\nmax_high_us = 100", "max_high_us must be > echo.min_high_us")]
#[case("[features]\nbuttons = 1", "features.buttons must be 0, 2 or 3")]
#[case("[buttons]\nhold_button_ticks = 0", "hold_button_ticks must be >= 1")]
#[case("[alarm]\ndefault_threshold_cm = 100", "default_threshold_cm must be <= 99")]
#[case("[storage]\npage_size = 64\ncapacity = 100", "non-zero multiple")]
#[case("[storage]\naddress = 512", "address must be < storage.capacity")]
#[case("[logging]\nrotation = \"weekly\"", "logging.rotation must be one of")]
fn rejects_out_of_range_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(needle),
        "expected '{needle}' in '{err}'"
    );
}

#[test]
fn three_button_pins_require_set() {
    let toml = r#"
[features]
buttons = 3
buzzer = false

[pins]
trigger = 23
echo = 24
digits = [5, 6, 13]
segments = [2, 3, 4, 17, 27, 22, 10, 9]
minus = 20
plus = 21
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("missing set pin");
    assert!(format!("{err}").contains("pins.set is required"));
}

#[test]
fn unknown_led_mode_is_a_parse_error() {
    let err = load_toml("[features]\nled_mode = \"sideways\"").expect_err("bad enum");
    assert!(err.to_string().contains("unknown variant"));
}

#[test]
fn loads_from_file_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("udm.toml");
    std::fs::write(&path, "[alarm]\ndefault_threshold_cm = 12\n").expect("write");
    let text = std::fs::read_to_string(&path).expect("read");
    let cfg = load_toml(&text).expect("parse");
    assert_eq!(cfg.alarm.default_threshold_cm, 12);
}

#[test]
fn shipped_sample_config_is_valid() {
    let text = include_str!("../../etc/udm.toml");
    let cfg = load_toml(text).expect("sample parses");
    cfg.validate().expect("sample validates");
    assert!(cfg.pins.is_none());
    assert_eq!(cfg.logging.rotation.as_deref(), Some("never"));
}
