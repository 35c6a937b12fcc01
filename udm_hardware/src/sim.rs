//! Simulated sensor, panel and buttons.
//!
//! All handles are cheap clones over shared atomics so a test (or the CLI)
//! can keep one copy for inspection while the controller owns another.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU16, AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use udm_traits::{
    ButtonLevels, ButtonPanel, Buzzer, Clock, DIGITS, EchoLine, HwResult, LED_LANES, LedBar,
    SegmentDisplay, TriggerLine,
};

use crate::error::HwError;

/// Delay between the trigger falling edge and the echo rising edge.
pub const SENSOR_LEAD_US: u64 = 250;

const NEVER: u64 = u64::MAX;

/// Failure injected into the simulated sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SensorFault {
    #[default]
    None = 0,
    /// The echo never rises (nothing in range, disconnected sensor).
    NoEcho = 1,
    /// The echo line is held high.
    Stuck = 2,
}

impl SensorFault {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::NoEcho,
            2 => Self::Stuck,
            _ => Self::None,
        }
    }
}

#[derive(Debug)]
struct SensorState {
    epoch: Instant,
    distance_mm: AtomicU32,
    fault: AtomicU8,
    trigger_high: AtomicBool,
    fired_at_us: AtomicU64,
    pulses: AtomicU32,
    speed_cm_s: u32,
}

/// Ultrasonic sensor model: on each trigger falling edge the echo rises after
/// [`SENSOR_LEAD_US`] and stays high for the round-trip time to the object.
#[derive(Debug, Clone)]
pub struct SimulatedSensor<C: Clock> {
    clock: C,
    state: Arc<SensorState>,
}

impl<C: Clock + Clone> SimulatedSensor<C> {
    pub fn new(clock: C, distance_cm: u32, speed_cm_s: u32) -> Self {
        let epoch = clock.now();
        Self {
            clock,
            state: Arc::new(SensorState {
                epoch,
                distance_mm: AtomicU32::new(distance_cm.saturating_mul(10)),
                fault: AtomicU8::new(SensorFault::None as u8),
                trigger_high: AtomicBool::new(false),
                fired_at_us: AtomicU64::new(NEVER),
                pulses: AtomicU32::new(0),
                speed_cm_s: speed_cm_s.max(1),
            }),
        }
    }

    /// Trigger output wired to this sensor.
    pub fn trigger(&self) -> SimTrigger<C> {
        SimTrigger {
            sensor: self.clone(),
        }
    }

    pub fn set_distance_mm(&self, mm: u32) {
        self.state.distance_mm.store(mm, Ordering::Relaxed);
    }

    pub fn set_distance_cm(&self, cm: u32) {
        self.set_distance_mm(cm.saturating_mul(10));
    }

    pub fn set_fault(&self, fault: SensorFault) {
        self.state.fault.store(fault as u8, Ordering::Relaxed);
    }

    /// Number of trigger pulses seen so far.
    pub fn pulses(&self) -> u32 {
        self.state.pulses.load(Ordering::Relaxed)
    }

    /// Round-trip echo duration for the current distance.
    pub fn echo_width_us(&self) -> u64 {
        let mm = u64::from(self.state.distance_mm.load(Ordering::Relaxed));
        mm * 200_000 / u64::from(self.state.speed_cm_s)
    }

    fn now_us(&self) -> u64 {
        self.clock.us_since(self.state.epoch)
    }
}

impl<C: Clock + Clone + Send + Sync> EchoLine for SimulatedSensor<C> {
    fn is_high(&self) -> bool {
        match SensorFault::from_u8(self.state.fault.load(Ordering::Relaxed)) {
            SensorFault::Stuck => return true,
            SensorFault::NoEcho => return false,
            SensorFault::None => {}
        }
        let fired = self.state.fired_at_us.load(Ordering::Acquire);
        if fired == NEVER {
            return false;
        }
        let rise = fired.saturating_add(SENSOR_LEAD_US);
        let fall = rise.saturating_add(self.echo_width_us());
        let now = self.now_us();
        now >= rise && now < fall
    }
}

/// Trigger handle for a [`SimulatedSensor`].
#[derive(Debug, Clone)]
pub struct SimTrigger<C: Clock> {
    sensor: SimulatedSensor<C>,
}

impl<C: Clock + Clone> TriggerLine for SimTrigger<C> {
    fn set_trigger(&mut self, high: bool) -> HwResult<()> {
        let st = &self.sensor.state;
        let was_high = st.trigger_high.swap(high, Ordering::AcqRel);
        if was_high && !high {
            st.fired_at_us.store(self.sensor.now_us(), Ordering::Release);
            st.pulses.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(pulses = st.pulses.load(Ordering::Relaxed), "sim sensor fired");
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PanelState {
    enabled: AtomicU8,
    bus: AtomicU8,
    latched: [AtomicU8; DIGITS],
    overlaps: AtomicU32,
    leds: AtomicU16,
    buzzer: AtomicBool,
    beeps: AtomicU32,
}

/// Display, LED ladder and buzzer model recording what the controller drove.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPanel {
    state: Arc<PanelState>,
}

impl SimulatedPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Segment pattern last shown on each digit, meters first.
    pub fn frame(&self) -> [u8; DIGITS] {
        std::array::from_fn(|i| self.state.latched[i].load(Ordering::Relaxed))
    }

    /// Times a digit was enabled while another was still on.
    pub fn overlaps(&self) -> u32 {
        self.state.overlaps.load(Ordering::Relaxed)
    }

    pub fn lanes(&self) -> [bool; LED_LANES] {
        let bits = self.state.leds.load(Ordering::Relaxed);
        std::array::from_fn(|i| bits & (1 << i) != 0)
    }

    pub fn lit_lanes(&self) -> usize {
        self.state.leds.load(Ordering::Relaxed).count_ones() as usize
    }

    pub fn buzzer_on(&self) -> bool {
        self.state.buzzer.load(Ordering::Relaxed)
    }

    /// Number of off→on buzzer transitions.
    pub fn beeps(&self) -> u32 {
        self.state.beeps.load(Ordering::Relaxed)
    }
}

impl SegmentDisplay for SimulatedPanel {
    fn select_digit(&mut self, digit: usize, enabled: bool) -> HwResult<()> {
        if digit >= DIGITS {
            return Err(Box::new(HwError::InvalidDigit(digit)));
        }
        let bit = 1u8 << digit;
        let st = &self.state;
        if enabled {
            let prev = st.enabled.fetch_or(bit, Ordering::AcqRel);
            if prev & !bit != 0 {
                st.overlaps.fetch_add(1, Ordering::Relaxed);
            }
            st.latched[digit].store(st.bus.load(Ordering::Relaxed), Ordering::Relaxed);
        } else {
            st.enabled.fetch_and(!bit, Ordering::AcqRel);
        }
        Ok(())
    }

    fn write_segments(&mut self, pattern: u8) -> HwResult<()> {
        let st = &self.state;
        st.bus.store(pattern, Ordering::Relaxed);
        let enabled = st.enabled.load(Ordering::Acquire);
        for (i, slot) in st.latched.iter().enumerate() {
            if enabled & (1 << i) != 0 {
                slot.store(pattern, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl LedBar for SimulatedPanel {
    fn set_lanes(&mut self, lanes: [bool; LED_LANES]) -> HwResult<()> {
        let bits = lanes
            .iter()
            .enumerate()
            .fold(0u16, |acc, (i, on)| if *on { acc | (1 << i) } else { acc });
        self.state.leds.store(bits, Ordering::Relaxed);
        Ok(())
    }
}

impl Buzzer for SimulatedPanel {
    fn set_buzzer(&mut self, on: bool) -> HwResult<()> {
        let was = self.state.buzzer.swap(on, Ordering::AcqRel);
        if on && !was {
            self.state.beeps.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

/// Button levels settable from outside the controller.
#[derive(Debug, Clone, Default)]
pub struct SimulatedButtons {
    bits: Arc<AtomicU8>,
}

impl SimulatedButtons {
    const MINUS: u8 = 1;
    const PLUS: u8 = 2;
    const SET: u8 = 4;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self, levels: ButtonLevels) {
        let mut bits = 0;
        if levels.minus {
            bits |= Self::MINUS;
        }
        if levels.plus {
            bits |= Self::PLUS;
        }
        if levels.set {
            bits |= Self::SET;
        }
        self.bits.store(bits, Ordering::Relaxed);
    }

    pub fn release_all(&self) {
        self.bits.store(0, Ordering::Relaxed);
    }

    pub fn current(&self) -> ButtonLevels {
        let bits = self.bits.load(Ordering::Relaxed);
        ButtonLevels {
            minus: bits & Self::MINUS != 0,
            plus: bits & Self::PLUS != 0,
            set: bits & Self::SET != 0,
        }
    }
}

impl ButtonPanel for SimulatedButtons {
    fn levels(&mut self) -> HwResult<ButtonLevels> {
        Ok(self.current())
    }
}
