#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Ultrasonic distance meter controller (hardware-agnostic).
//!
//! All hardware interactions go through the capability traits in
//! `udm_traits`; this crate holds the measurement and UI logic.
//!
//! ## Architecture
//!
//! - **Fast activity**: `sampler::TimingSampler` classifies the echo pulse
//!   every fast tick and hands the result over through `measurement::EchoSlot`.
//! - **Slow activity**: `orchestrator::Orchestrator` consumes results and
//!   drives the display, LEDs, buzzer and buttons.
//! - **Persistence**: `store::NonvolatileStore` keeps the alarm threshold.
//! - **Drivers**: `runner` runs both activities threaded or in lockstep.
//!
//! Tick counters are 8-bit and wrap; distances are integer meters and
//! centimeters.

pub mod alarm;
pub mod buttons;
pub mod config;
pub mod conversions;
pub mod display;
pub mod distance;
pub mod error;
pub mod hw_error;
pub mod measurement;
pub mod mocks;
pub mod orchestrator;
pub mod proximity;
pub mod runner;
pub mod sampler;
pub mod store;
pub mod util;

pub use alarm::AlarmController;
pub use buttons::{ButtonState, ButtonStateMachine, MAX_THRESHOLD_CM};
pub use config::{
    ButtonCount, ControllerCfg, EchoCfg, EchoLimits, FeatureCfg, HoldCfg, LedMode, StoreCfg,
    TimingCfg,
};
pub use display::{DisplayMultiplexer, Reading};
pub use distance::Distance;
pub use error::{BuildError, Report, Result, UdmError};
pub use measurement::{EchoFault, EchoMeasurement, EchoSlot, EchoStatus};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, TickReport};
pub use proximity::ProximityIndicator;
pub use runner::{ControllerHandle, Lockstep, RunOptions, RunStats, run, run_lockstep, spawn};
pub use sampler::{FastTicker, TimingSampler};
pub use store::{NonvolatileStore, WriteOutcome};
