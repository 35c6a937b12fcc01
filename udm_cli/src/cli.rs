//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use udm_traits::ButtonLevels;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Config file used when `--config` is not given and the file exists.
pub const DEFAULT_CONFIG: &str = "etc/udm.toml";

#[derive(Parser, Debug)]
#[command(name = "udm", version, about = "Ultrasonic distance meter controller")]
pub struct Cli {
    /// Path to config TOML (defaults to etc/udm.toml when present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and report as JSON instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        #[cfg(target_os = "linux")]
        {
            return RtLock::Current;
        }
        #[allow(unreachable_code)]
        RtLock::None
    }
}

/// Fault injected into the simulated sensor.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum SimFault {
    #[default]
    None,
    /// The echo never comes back
    NoEcho,
    /// The echo line is held high
    Stuck,
}

impl From<SimFault> for udm_hardware::SensorFault {
    fn from(f: SimFault) -> Self {
        match f {
            SimFault::None => Self::None,
            SimFault::NoEcho => Self::NoEcho,
            SimFault::Stuck => Self::Stuck,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PressButton {
    Minus,
    Plus,
    Set,
}

/// A scripted button press: `button@from..to`, held on slow ticks
/// `from..to` (1-based, end exclusive).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PressScript {
    pub button: PressButton,
    pub from: u64,
    pub to: u64,
}

impl PressScript {
    pub fn covers(&self, tick: u64) -> bool {
        (self.from..self.to).contains(&tick)
    }

    /// Combined levels of all presses active on `tick`.
    pub fn levels_at(presses: &[Self], tick: u64) -> ButtonLevels {
        let mut levels = ButtonLevels::default();
        for p in presses.iter().filter(|p| p.covers(tick)) {
            match p.button {
                PressButton::Minus => levels.minus = true,
                PressButton::Plus => levels.plus = true,
                PressButton::Set => levels.set = true,
            }
        }
        levels
    }
}

impl FromStr for PressScript {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, range) = s
            .split_once('@')
            .ok_or_else(|| format!("expected BUTTON@FROM..TO, got '{s}'"))?;
        let button = match name.trim().to_ascii_lowercase().as_str() {
            "minus" => PressButton::Minus,
            "plus" => PressButton::Plus,
            "set" => PressButton::Set,
            other => return Err(format!("unknown button '{other}' (minus|plus|set)")),
        };
        let (from, to) = range
            .split_once("..")
            .ok_or_else(|| format!("expected FROM..TO, got '{range}'"))?;
        let from: u64 = from
            .trim()
            .parse()
            .map_err(|e| format!("bad start tick '{from}': {e}"))?;
        let to: u64 = to
            .trim()
            .parse()
            .map_err(|e| format!("bad end tick '{to}': {e}"))?;
        if to <= from {
            return Err(format!("empty press range {from}..{to}"));
        }
        Ok(Self { button, from, to })
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the controller in real time (simulated board unless built with `hardware`)
    Run {
        /// Stop after this many slow ticks (runs until Ctrl-C otherwise)
        #[arg(long, value_name = "N")]
        ticks: Option<u64>,
        /// Distance of the simulated object in centimeters
        #[arg(long, value_name = "CM", default_value_t = 50)]
        object_cm: u32,
        /// Enable real-time mode (SCHED_FIFO on the fast thread, mlockall)
        #[arg(
            long,
            action = ArgAction::SetTrue,
            long_help = "Enable real-time mode on supported OSes.\n\nLinux: locks the process address space with mlockall and gives the fast echo-timing thread SCHED_FIFO priority. This reduces jitter in the echo width measurement but may require elevated privileges (CAP_SYS_NICE, CAP_IPC_LOCK) or raised ulimits."
        )]
        rt: bool,
        /// Real-time priority for SCHED_FIFO on Linux (1..=max)
        #[arg(long, value_name = "PRIO")]
        rt_prio: Option<i32>,
        /// Select memory locking mode for --rt: none, current, or all
        #[arg(long, value_enum, value_name = "MODE")]
        rt_lock: Option<RtLock>,
        /// CPU index to pin the fast thread to (Linux only)
        #[arg(long, value_name = "CPU")]
        rt_cpu: Option<usize>,
        /// Print timing and measurement stats
        #[arg(long, action = ArgAction::SetTrue)]
        stats: bool,
    },
    /// Deterministic lockstep run on a virtual clock
    Simulate {
        /// Number of slow ticks to run
        #[arg(long, value_name = "N")]
        ticks: u64,
        /// Distance of the simulated object in centimeters
        #[arg(long, value_name = "CM", default_value_t = 50)]
        object_cm: u32,
        /// Button press script, e.g. plus@10..60 (repeatable)
        #[arg(long = "press", value_name = "SCRIPT")]
        press: Vec<PressScript>,
        /// Inject a sensor fault
        #[arg(long, value_enum, default_value_t = SimFault::None)]
        fault: SimFault,
    },
    /// Show or write the persisted alarm threshold
    Threshold {
        /// New threshold in centimeters (0..=99)
        #[arg(long, value_name = "CM", value_parser = clap::value_parser!(u8).range(0..=99))]
        set: Option<u8>,
    },
    /// Verify configuration and storage, then ping the sensor once
    SelfCheck {
        /// Inject a fault into the simulated sensor (ignored with `hardware`)
        #[arg(long, value_enum, default_value_t = SimFault::None)]
        fault: SimFault,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_script_parses_and_covers_half_open_range() {
        let p: PressScript = "plus@10..12".parse().unwrap();
        assert_eq!(p.button, PressButton::Plus);
        assert!(!p.covers(9));
        assert!(p.covers(10));
        assert!(p.covers(11));
        assert!(!p.covers(12));
    }

    #[test]
    fn press_script_rejects_garbage() {
        assert!("plus".parse::<PressScript>().is_err());
        assert!("jump@1..2".parse::<PressScript>().is_err());
        assert!("minus@5..5".parse::<PressScript>().is_err());
        assert!("minus@a..5".parse::<PressScript>().is_err());
    }

    #[test]
    fn overlapping_presses_combine() {
        let presses = [
            "minus@1..5".parse::<PressScript>().unwrap(),
            "plus@3..8".parse::<PressScript>().unwrap(),
        ];
        let l = PressScript::levels_at(&presses, 4);
        assert!(l.minus && l.plus && !l.set);
        assert_eq!(PressScript::levels_at(&presses, 8), ButtonLevels::default());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
