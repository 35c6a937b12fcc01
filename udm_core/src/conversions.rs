//! `From` implementations bridging `udm_config` types to `udm_core` types.

use crate::config::{
    ButtonCount, ControllerCfg, EchoCfg, FeatureCfg, HoldCfg, LedMode, StoreCfg, TimingCfg,
};
use crate::error::UdmError;

// ── TimingCfg ────────────────────────────────────────────────────────────────

impl From<&udm_config::Timing> for TimingCfg {
    fn from(c: &udm_config::Timing) -> Self {
        Self {
            fast_tick_us: c.fast_tick_us,
            slow_tick_us: c.slow_tick_us,
            echo_rate: c.echo_rate,
            speed_of_sound_cm_s: c.speed_of_sound_cm_s,
        }
    }
}

// ── EchoCfg ──────────────────────────────────────────────────────────────────

impl From<&udm_config::Echo> for EchoCfg {
    fn from(c: &udm_config::Echo) -> Self {
        Self {
            max_low_us: c.max_low_us,
            min_high_us: c.min_high_us,
            max_high_us: c.max_high_us,
        }
    }
}

// ── LedMode ──────────────────────────────────────────────────────────────────

impl From<udm_config::LedMode> for LedMode {
    fn from(m: udm_config::LedMode) -> Self {
        match m {
            udm_config::LedMode::Proximity => Self::Proximity,
            udm_config::LedMode::Distance => Self::Distance,
        }
    }
}

// ── FeatureCfg ───────────────────────────────────────────────────────────────

impl TryFrom<&udm_config::Features> for FeatureCfg {
    type Error = UdmError;

    fn try_from(c: &udm_config::Features) -> Result<Self, Self::Error> {
        let buttons = ButtonCount::from_count(c.buttons).ok_or_else(|| {
            UdmError::Config(format!("unsupported button count {}", c.buttons))
        })?;
        Ok(Self {
            buttons,
            leds: c.leds,
            led_mode: c.led_mode.into(),
            buzzer: c.buzzer,
            persistence: c.persistence,
        })
    }
}

// ── HoldCfg ──────────────────────────────────────────────────────────────────

impl From<&udm_config::Buttons> for HoldCfg {
    fn from(c: &udm_config::Buttons) -> Self {
        Self {
            hold_button: c.hold_button_ticks,
            hold_alarm: c.hold_alarm_ticks,
        }
    }
}

// ── ControllerCfg ────────────────────────────────────────────────────────────

impl TryFrom<&udm_config::Config> for ControllerCfg {
    type Error = UdmError;

    fn try_from(c: &udm_config::Config) -> Result<Self, Self::Error> {
        Ok(Self {
            timing: (&c.timing).into(),
            echo: (&c.echo).into(),
            features: (&c.features).try_into()?,
            holds: (&c.buttons).into(),
            store: StoreCfg {
                address: c.storage.address,
                default_threshold_cm: c.alarm.default_threshold_cm,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_section() {
        let cfg = udm_config::load_toml(
            r#"
[timing]
fast_tick_us = 40
echo_rate = 32

[features]
buttons = 3
led_mode = "distance"
buzzer = false

[buttons]
hold_button_ticks = 10

[alarm]
default_threshold_cm = 20

[storage]
address = 7
"#,
        )
        .unwrap();
        let core = ControllerCfg::try_from(&cfg).unwrap();
        assert_eq!(core.timing.fast_tick_us, 40);
        assert_eq!(core.timing.echo_rate, 32);
        assert_eq!(core.features.buttons, ButtonCount::Three);
        assert_eq!(core.features.led_mode, LedMode::Distance);
        assert!(!core.features.buzzer);
        assert_eq!(core.holds.hold_button, 10);
        assert_eq!(core.holds.hold_alarm, 600);
        assert_eq!(core.store.address, 7);
        assert_eq!(core.store.default_threshold_cm, 20);
    }

    #[test]
    fn rejects_unsupported_button_count() {
        let cfg = udm_config::load_toml("[features]\nbuttons = 4").unwrap();
        assert!(matches!(
            ControllerCfg::try_from(&cfg),
            Err(UdmError::Config(_))
        ));
    }
}
