#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the distance meter.
//!
//! `Config` and its sections are deserialized from TOML and checked by
//! `Config::validate`. Every section has defaults matching the reference
//! board (50 µs fast tick, 5 ms slow tick, HC-SR04 style echo windows), so an
//! empty file is a valid configuration.
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Timing {
    /// Fast (echo timing) tick length in microseconds.
    pub fast_tick_us: u32,
    /// Slow (UI/control) tick length in microseconds.
    pub slow_tick_us: u32,
    /// Slow ticks between measurement triggers; power of two.
    pub echo_rate: u32,
    /// Speed of sound in cm/s used for distance conversion.
    pub speed_of_sound_cm_s: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            fast_tick_us: 50,
            slow_tick_us: 5000,
            echo_rate: 64,
            speed_of_sound_cm_s: 34655,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Echo {
    /// Longest wait for the echo to rise after the trigger.
    pub max_low_us: u32,
    /// Shortest accepted echo pulse (≈2 cm).
    pub min_high_us: u32,
    /// Longest accepted echo pulse (≈433 cm).
    pub max_high_us: u32,
}

impl Default for Echo {
    fn default() -> Self {
        Self {
            max_low_us: 5800,
            min_high_us: 120,
            max_high_us: 25000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LedMode {
    /// Lanes light up as the object comes closer.
    #[default]
    Proximity,
    /// Lanes light up as the object moves away.
    Distance,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Features {
    /// Number of buttons fitted: 0, 2 or 3.
    pub buttons: u8,
    pub leds: bool,
    pub led_mode: LedMode,
    pub buzzer: bool,
    pub persistence: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            buttons: 2,
            leds: true,
            led_mode: LedMode::Proximity,
            buzzer: true,
            persistence: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Buttons {
    /// Slow ticks between threshold steps while MINUS/PLUS is held.
    pub hold_button_ticks: u16,
    /// Slow ticks of inactivity in the alarm view before returning to normal.
    pub hold_alarm_ticks: u16,
}

impl Default for Buttons {
    fn default() -> Self {
        Self {
            hold_button_ticks: 40,
            hold_alarm_ticks: 600,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Alarm {
    /// Threshold used when storage is blank, in centimeters.
    pub default_threshold_cm: u8,
}

impl Default for Alarm {
    fn default() -> Self {
        Self {
            default_threshold_cm: 35,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Storage {
    /// EEPROM image file for the simulated store. In-memory when absent.
    pub path: Option<String>,
    /// Byte address of the persisted threshold.
    pub address: usize,
    pub page_size: usize,
    /// Total size of the simulated store in bytes.
    pub capacity: usize,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            path: None,
            address: 0,
            page_size: 512,
            capacity: 512,
        }
    }
}

/// BCM pin numbers for the GPIO backend. Polarity flags are `true` when the
/// line is driven low to activate.
#[derive(Debug, Deserialize, Clone)]
pub struct Pins {
    pub trigger: u8,
    pub echo: u8,
    pub digits: [u8; 3],
    /// Segment lines in order a, b, c, d, e, f, g, dp.
    pub segments: [u8; 8],
    #[serde(default)]
    pub leds: Vec<u8>,
    pub buzzer: Option<u8>,
    pub minus: Option<u8>,
    pub plus: Option<u8>,
    pub set: Option<u8>,
    #[serde(default = "default_true")]
    pub segments_active_low: bool,
    #[serde(default = "default_true")]
    pub digits_active_low: bool,
    #[serde(default)]
    pub leds_active_low: bool,
    #[serde(default = "default_true")]
    pub buttons_active_low: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub timing: Timing,
    pub echo: Echo,
    pub features: Features,
    pub buttons: Buttons,
    pub alarm: Alarm,
    pub storage: Storage,
    pub pins: Option<Pins>,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Largest threshold the display can show.
pub const MAX_THRESHOLD_CM: u8 = 99;

impl Config {
    /// Slow ticks per second.
    pub fn slow_ticks_per_sec(&self) -> u32 {
        1_000_000 / self.timing.slow_tick_us.max(1)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Timing
        let t = &self.timing;
        if t.fast_tick_us == 0 {
            eyre::bail!("timing.fast_tick_us must be >= 1");
        }
        if t.slow_tick_us <= t.fast_tick_us {
            eyre::bail!("timing.slow_tick_us must be > timing.fast_tick_us");
        }
        if self.slow_ticks_per_sec() > u32::from(u8::MAX) {
            eyre::bail!("timing.slow_tick_us must give at most 255 ticks per second");
        }
        if self.slow_ticks_per_sec() == 0 {
            eyre::bail!("timing.slow_tick_us must be <= 1000000");
        }
        if !t.echo_rate.is_power_of_two() || t.echo_rate > 128 {
            eyre::bail!("timing.echo_rate must be a power of two <= 128");
        }
        if t.speed_of_sound_cm_s == 0 {
            eyre::bail!("timing.speed_of_sound_cm_s must be > 0");
        }

        // Echo windows
        let e = &self.echo;
        if e.max_low_us < t.fast_tick_us {
            eyre::bail!("echo.max_low_us must be at least one fast tick");
        }
        if e.min_high_us < t.fast_tick_us {
            eyre::bail!("echo.min_high_us must be at least one fast tick");
        }
        if e.max_high_us <= e.min_high_us {
            eyre::bail!("echo.max_high_us must be > echo.min_high_us");
        }

        // Features
        if !matches!(self.features.buttons, 0 | 2 | 3) {
            eyre::bail!("features.buttons must be 0, 2 or 3");
        }

        // Buttons
        if self.buttons.hold_button_ticks == 0 {
            eyre::bail!("buttons.hold_button_ticks must be >= 1");
        }
        if self.buttons.hold_alarm_ticks == 0 {
            eyre::bail!("buttons.hold_alarm_ticks must be >= 1");
        }

        // Alarm
        if self.alarm.default_threshold_cm > MAX_THRESHOLD_CM {
            eyre::bail!("alarm.default_threshold_cm must be <= {MAX_THRESHOLD_CM}");
        }

        // Storage
        let s = &self.storage;
        if s.page_size == 0 {
            eyre::bail!("storage.page_size must be >= 1");
        }
        if s.capacity == 0 || s.capacity % s.page_size != 0 {
            eyre::bail!("storage.capacity must be a non-zero multiple of storage.page_size");
        }
        if s.address >= s.capacity {
            eyre::bail!("storage.address must be < storage.capacity");
        }

        // Pins
        if let Some(p) = &self.pins {
            if self.features.leds && !p.leds.is_empty() && p.leds.len() != 9 {
                eyre::bail!("pins.leds must list exactly 9 pins");
            }
            if self.features.buzzer && p.buzzer.is_none() {
                eyre::bail!("pins.buzzer is required when features.buzzer = true");
            }
            if self.features.buttons >= 2 && (p.minus.is_none() || p.plus.is_none()) {
                eyre::bail!("pins.minus and pins.plus are required when buttons are fitted");
            }
            if self.features.buttons == 3 && p.set.is_none() {
                eyre::bail!("pins.set is required when features.buttons = 3");
            }
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly");
        }

        Ok(())
    }
}
