//! Runtime configuration for the controller.
//!
//! These are the structs the orchestrator is built from. They are separate
//! from the TOML-deserialized config in `udm_config`; see `conversions`.
use std::time::Duration;

use crate::util::{echo_loss_limit, ticks_per_sec, window_ticks};

/// Tick lengths and measurement cadence.
#[derive(Debug, Clone)]
pub struct TimingCfg {
    /// Fast (echo sampling) tick in microseconds.
    pub fast_tick_us: u32,
    /// Slow (UI) tick in microseconds.
    pub slow_tick_us: u32,
    /// Slow ticks between measurement triggers. Power of two.
    pub echo_rate: u32,
    pub speed_of_sound_cm_s: u32,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            fast_tick_us: 50,
            slow_tick_us: 5000,
            echo_rate: 64,
            speed_of_sound_cm_s: 34655,
        }
    }
}

impl TimingCfg {
    pub fn fast_period(&self) -> Duration {
        Duration::from_micros(u64::from(self.fast_tick_us.max(1)))
    }

    pub fn slow_period(&self) -> Duration {
        Duration::from_micros(u64::from(self.slow_tick_us.max(1)))
    }

    /// Slow ticks per second, saturated to the 8-bit tick counter range.
    pub fn slow_ticks_per_sec(&self) -> u8 {
        u8::try_from(ticks_per_sec(self.slow_tick_us)).unwrap_or(u8::MAX)
    }

    /// Mask selecting the slow ticks on which a measurement may be armed.
    pub fn echo_mask(&self) -> u8 {
        u8::try_from(self.echo_rate.max(1) - 1).unwrap_or(u8::MAX)
    }

    pub fn echo_loss_limit(&self) -> u8 {
        echo_loss_limit(self.slow_tick_us, self.echo_rate)
    }

    /// Fast ticks that elapse during one slow tick.
    pub fn fast_per_slow(&self) -> u32 {
        (self.slow_tick_us / self.fast_tick_us.max(1)).max(1)
    }
}

/// Echo acceptance windows in microseconds.
#[derive(Debug, Clone)]
pub struct EchoCfg {
    pub max_low_us: u32,
    pub min_high_us: u32,
    pub max_high_us: u32,
}

impl Default for EchoCfg {
    fn default() -> Self {
        Self {
            max_low_us: 5800,
            min_high_us: 120,
            max_high_us: 25000,
        }
    }
}

/// Echo windows expressed in fast ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoLimits {
    /// Low ticks after which a missing echo is declared.
    pub max_low_ticks: u32,
    /// High ticks needed before a falling edge counts as a valid echo.
    pub min_high_ticks: u32,
    /// High ticks after which the line is declared stuck.
    pub max_high_ticks: u32,
}

impl EchoLimits {
    pub fn new(echo: &EchoCfg, fast_tick_us: u32) -> Self {
        Self {
            max_low_ticks: 1 + window_ticks(echo.max_low_us, fast_tick_us),
            min_high_ticks: window_ticks(echo.min_high_us, fast_tick_us),
            max_high_ticks: window_ticks(echo.max_high_us, fast_tick_us),
        }
    }
}

impl Default for EchoLimits {
    fn default() -> Self {
        Self::new(&EchoCfg::default(), TimingCfg::default().fast_tick_us)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedMode {
    /// Lane i lit when the object is at or closer than its level.
    #[default]
    Proximity,
    /// Lane i lit when the object is at or farther than its level.
    Distance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonCount {
    /// No buttons: the threshold stays at its loaded value.
    None,
    /// MINUS and PLUS; the alarm view times out back to normal.
    #[default]
    Two,
    /// SET, MINUS and PLUS.
    Three,
}

impl ButtonCount {
    pub fn from_count(n: u8) -> Option<Self> {
        match n {
            0 => Some(Self::None),
            2 => Some(Self::Two),
            3 => Some(Self::Three),
            _ => None,
        }
    }
}

/// Optional peripherals fitted to this build.
#[derive(Debug, Clone)]
pub struct FeatureCfg {
    pub buttons: ButtonCount,
    pub leds: bool,
    pub led_mode: LedMode,
    pub buzzer: bool,
    pub persistence: bool,
}

impl Default for FeatureCfg {
    fn default() -> Self {
        Self {
            buttons: ButtonCount::Two,
            leds: true,
            led_mode: LedMode::Proximity,
            buzzer: true,
            persistence: true,
        }
    }
}

/// Button hold periods in slow ticks.
#[derive(Debug, Clone)]
pub struct HoldCfg {
    /// Period of threshold steps while MINUS/PLUS is held.
    pub hold_button: u16,
    /// Idle time in the alarm view before falling back to normal (two buttons).
    pub hold_alarm: u16,
}

impl Default for HoldCfg {
    fn default() -> Self {
        Self {
            hold_button: 40,
            hold_alarm: 600,
        }
    }
}

/// Where and how the alarm threshold is persisted.
#[derive(Debug, Clone)]
pub struct StoreCfg {
    pub address: usize,
    /// Used when the stored byte is blank.
    pub default_threshold_cm: u8,
}

impl Default for StoreCfg {
    fn default() -> Self {
        Self {
            address: 0,
            default_threshold_cm: 35,
        }
    }
}

/// Everything the orchestrator needs besides its peripherals.
#[derive(Debug, Clone, Default)]
pub struct ControllerCfg {
    pub timing: TimingCfg,
    pub echo: EchoCfg,
    pub features: FeatureCfg,
    pub holds: HoldCfg,
    pub store: StoreCfg,
}

impl ControllerCfg {
    pub fn echo_limits(&self) -> EchoLimits {
        EchoLimits::new(&self.echo, self.timing.fast_tick_us)
    }
}
