//! The slow periodic activity.
//!
//! One [`Orchestrator::tick`] is one slow tick: consume the last echo result,
//! refresh one display digit, drive the buzzer, evaluate the buttons and
//! possibly arm the next measurement.
use std::sync::Arc;

use eyre::WrapErr;
use udm_traits::clock::{Clock, MonotonicClock};
use udm_traits::{
    ButtonLevels, ButtonPanel, Buzzer, DIGITS, EchoLine, LED_LANES, LedBar, PageStore,
    SegmentDisplay, TriggerLine,
};

use crate::alarm::AlarmController;
use crate::buttons::{ButtonState, ButtonStateMachine};
use crate::config::{ButtonCount, ControllerCfg};
use crate::display::{DisplayMultiplexer, Reading, render};
use crate::distance::{Distance, estimate};
use crate::error::{BuildError, Result};
use crate::hw_error::map_hw_error;
use crate::measurement::{EchoFault, EchoSlot, EchoStatus};
use crate::proximity::ProximityIndicator;
use crate::store::{NonvolatileStore, WriteOutcome};

pub type BoxedStore = NonvolatileStore<Box<dyn PageStore + Send>>;

/// Everything observable about one slow tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u8,
    pub distance: Distance,
    /// Result consumed on this tick, `NotReady` if none.
    pub echo: EchoStatus,
    pub fault: Option<EchoFault>,
    /// Consecutive lost measurements. Wider than the loss limit so a limit
    /// of 255 can still be exceeded.
    pub echo_lost: u16,
    pub lanes: [bool; LED_LANES],
    pub buzzer: bool,
    pub button_state: ButtonState,
    pub threshold_cm: u8,
    /// Full frame for the current reading (one digit is actually refreshed).
    pub frame: [u8; DIGITS],
    pub armed: bool,
    pub persisted: Option<WriteOutcome>,
}

/// Builder for [`Orchestrator`]. Echo, trigger and display are mandatory.
#[derive(Default)]
pub struct OrchestratorBuilder {
    cfg: Option<ControllerCfg>,
    slot: Option<Arc<EchoSlot>>,
    echo: Option<Arc<dyn EchoLine>>,
    trigger: Option<Box<dyn TriggerLine + Send>>,
    display: Option<Box<dyn SegmentDisplay + Send>>,
    leds: Option<Box<dyn LedBar + Send>>,
    buzzer: Option<Box<dyn Buzzer + Send>>,
    buttons: Option<Box<dyn ButtonPanel + Send>>,
    store: Option<Box<dyn PageStore + Send>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
}

impl OrchestratorBuilder {
    pub fn config(mut self, cfg: ControllerCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }

    /// Share an existing slot (e.g. one a [`crate::sampler::FastTicker`] already uses).
    pub fn slot(mut self, slot: Arc<EchoSlot>) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn echo(mut self, echo: Arc<dyn EchoLine>) -> Self {
        self.echo = Some(echo);
        self
    }

    pub fn trigger(mut self, trigger: impl TriggerLine + Send + 'static) -> Self {
        self.trigger = Some(Box::new(trigger));
        self
    }

    pub fn display(mut self, display: impl SegmentDisplay + Send + 'static) -> Self {
        self.display = Some(Box::new(display));
        self
    }

    pub fn leds(mut self, leds: impl LedBar + Send + 'static) -> Self {
        self.leds = Some(Box::new(leds));
        self
    }

    pub fn buzzer(mut self, buzzer: impl Buzzer + Send + 'static) -> Self {
        self.buzzer = Some(Box::new(buzzer));
        self
    }

    pub fn buttons(mut self, buttons: impl ButtonPanel + Send + 'static) -> Self {
        self.buttons = Some(Box::new(buttons));
        self
    }

    pub fn store(mut self, store: impl PageStore + Send + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate and construct. Loads the persisted threshold when
    /// persistence is enabled and a store was supplied.
    pub fn try_build(self) -> Result<Orchestrator> {
        let echo = self
            .echo
            .ok_or_else(|| eyre::Report::new(BuildError::MissingEcho))?;
        let mut trigger = self
            .trigger
            .ok_or_else(|| eyre::Report::new(BuildError::MissingTrigger))?;
        let mut display = self
            .display
            .ok_or_else(|| eyre::Report::new(BuildError::MissingDisplay))?;
        let cfg = self.cfg.unwrap_or_default();

        if !cfg.timing.echo_rate.is_power_of_two() || cfg.timing.echo_rate > 128 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "echo_rate must be a power of two <= 128",
            )));
        }
        if cfg.timing.slow_tick_us <= cfg.timing.fast_tick_us {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "slow tick must be longer than the fast tick",
            )));
        }
        if cfg.store.default_threshold_cm > crate::buttons::MAX_THRESHOLD_CM {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "default threshold must be <= 99",
            )));
        }

        let features = &cfg.features;
        let leds = self.leds.filter(|_| features.leds);
        let buzzer = self.buzzer.filter(|_| features.buzzer);
        let buttons = self
            .buttons
            .filter(|_| features.buttons != ButtonCount::None);
        let store = self
            .store
            .filter(|_| features.persistence)
            .map(NonvolatileStore::new);

        let threshold = match &store {
            Some(s) => s
                .load_threshold(&cfg.store)
                .wrap_err("loading alarm threshold")?,
            None => cfg.store.default_threshold_cm,
        };

        trigger
            .set_trigger(false)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("trigger init")?;
        let mut mux = DisplayMultiplexer::new();
        mux.blank(display.as_mut())
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("display init")?;

        let indicator = leds.as_ref().map(|_| ProximityIndicator::new(features.led_mode));
        let alarm = buzzer
            .as_ref()
            .map(|_| AlarmController::new(cfg.timing.slow_ticks_per_sec()));
        let machine = buttons
            .as_ref()
            .map(|_| ButtonStateMachine::new(features.buttons, cfg.holds.clone()));

        tracing::info!(
            threshold_cm = threshold,
            buttons = ?features.buttons,
            leds = leds.is_some(),
            buzzer = buzzer.is_some(),
            persistence = store.is_some(),
            "controller ready"
        );

        let mut orch = Orchestrator {
            loss_limit: cfg.timing.echo_loss_limit(),
            cfg,
            slot: self.slot.unwrap_or_default(),
            echo,
            trigger,
            display,
            leds,
            buzzer,
            buttons,
            store,
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(MonotonicClock::new())),
            mux,
            indicator,
            alarm,
            machine,
            tick: 0,
            distance: Distance::default(),
            echo_lost: 0,
            threshold,
            lanes: [false; LED_LANES],
            buzzer_on: false,
        };
        if let Some(leds) = orch.leds.as_mut() {
            leds.set_lanes([false; LED_LANES])
                .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
                .wrap_err("led init")?;
        }
        Ok(orch)
    }
}

pub struct Orchestrator {
    cfg: ControllerCfg,
    loss_limit: u8,
    slot: Arc<EchoSlot>,
    echo: Arc<dyn EchoLine>,
    trigger: Box<dyn TriggerLine + Send>,
    display: Box<dyn SegmentDisplay + Send>,
    leds: Option<Box<dyn LedBar + Send>>,
    buzzer: Option<Box<dyn Buzzer + Send>>,
    buttons: Option<Box<dyn ButtonPanel + Send>>,
    store: Option<BoxedStore>,
    clock: Arc<dyn Clock + Send + Sync>,
    mux: DisplayMultiplexer,
    indicator: Option<ProximityIndicator>,
    alarm: Option<AlarmController>,
    machine: Option<ButtonStateMachine>,
    tick: u8,
    distance: Distance,
    echo_lost: u16,
    threshold: u8,
    lanes: [bool; LED_LANES],
    buzzer_on: bool,
}

impl core::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("tick", &self.tick)
            .field("distance", &self.distance)
            .field("threshold_cm", &self.threshold)
            .field("echo_lost", &self.echo_lost)
            .field("state", &self.button_state())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    pub fn config(&self) -> &ControllerCfg {
        &self.cfg
    }

    pub fn slot(&self) -> &Arc<EchoSlot> {
        &self.slot
    }

    pub fn echo(&self) -> &Arc<dyn EchoLine> {
        &self.echo
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    pub fn distance(&self) -> Distance {
        self.distance
    }

    pub fn threshold_cm(&self) -> u8 {
        self.threshold
    }

    pub fn button_state(&self) -> ButtonState {
        self.machine
            .as_ref()
            .map_or(ButtonState::Normal, ButtonStateMachine::state)
    }

    pub fn store(&self) -> Option<&BoxedStore> {
        self.store.as_ref()
    }

    /// One slow tick with a plain busy-wait when arming.
    pub fn tick(&mut self) -> Result<TickReport> {
        self.tick_with_pump(&mut || {})
    }

    /// One slow tick. `pump` runs on every busy-wait iteration while waiting
    /// for the fast activity to observe a freshly armed measurement; a
    /// single-threaded driver uses it to execute fast ticks.
    pub fn tick_with_pump(&mut self, pump: &mut dyn FnMut()) -> Result<TickReport> {
        self.tick = self.tick.wrapping_add(1);

        let measurement = self.slot.take();
        let mut fault = None;
        match measurement.status {
            EchoStatus::NotReady => {}
            EchoStatus::Ok => {
                let d = estimate(
                    measurement.high_ticks,
                    self.cfg.timing.fast_tick_us,
                    self.cfg.timing.speed_of_sound_cm_s,
                );
                tracing::trace!(high_ticks = measurement.high_ticks, distance = %d, "echo");
                if d.is_error() {
                    fault = Some(EchoFault::OutOfRange);
                }
                self.echo_lost = 0;
                self.set_distance(d)?;
            }
            EchoStatus::Error(f) => {
                fault = Some(f);
                self.record_loss(f)?;
            }
        }

        let reading = if self.button_state().is_alarm_territory() {
            Reading::Threshold(self.threshold)
        } else {
            Reading::Distance(self.distance)
        };
        self.mux
            .refresh(self.display.as_mut(), reading)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("display refresh")?;

        if let (Some(alarm), Some(buzzer)) = (self.alarm.as_mut(), self.buzzer.as_mut()) {
            let on = alarm.update(self.tick, self.distance, self.threshold);
            if on != self.buzzer_on {
                buzzer
                    .set_buzzer(on)
                    .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
                    .wrap_err("buzzer")?;
                self.buzzer_on = on;
            }
        }

        let persisted = self.run_buttons()?;

        let mut armed = false;
        if self.tick & self.cfg.timing.echo_mask() == 0 && !self.slot.is_armed() {
            if self.echo.is_high() {
                // Previous echo still high at the next scheduled trigger.
                fault = Some(EchoFault::Stuck);
                self.record_loss(EchoFault::Stuck)?;
            } else {
                armed = self.arm(pump)?;
            }
        }

        Ok(TickReport {
            tick: self.tick,
            distance: self.distance,
            echo: measurement.status,
            fault,
            echo_lost: self.echo_lost,
            lanes: self.lanes,
            buzzer: self.buzzer_on,
            button_state: self.button_state(),
            threshold_cm: self.threshold,
            frame: render(reading),
            armed,
            persisted,
        })
    }

    fn record_loss(&mut self, fault: EchoFault) -> Result<()> {
        self.echo_lost = self.echo_lost.saturating_add(1);
        tracing::debug!(%fault, lost = self.echo_lost, "echo lost");
        if self.echo_lost > u16::from(self.loss_limit) {
            if self.distance != Distance::OUT_OF_RANGE {
                tracing::warn!(
                    lost = self.echo_lost,
                    "sustained echo loss, reporting out of range"
                );
            }
            self.set_distance(Distance::OUT_OF_RANGE)?;
        }
        Ok(())
    }

    fn set_distance(&mut self, d: Distance) -> Result<()> {
        self.distance = d;
        self.push_lanes(d)
    }

    fn push_lanes(&mut self, d: Distance) -> Result<()> {
        if let (Some(indicator), Some(leds)) = (self.indicator.as_ref(), self.leds.as_mut()) {
            let lanes = indicator.lanes(d);
            leds.set_lanes(lanes)
                .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
                .wrap_err("led update")?;
            self.lanes = lanes;
        }
        Ok(())
    }

    fn run_buttons(&mut self) -> Result<Option<WriteOutcome>> {
        let (Some(machine), Some(panel)) = (self.machine.as_mut(), self.buttons.as_mut()) else {
            return Ok(None);
        };
        let levels: ButtonLevels = panel
            .levels()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("reading buttons")?;
        let before = self.threshold;
        let step = machine.step(levels, &mut self.threshold);
        if step.threshold_changed {
            tracing::debug!(from = before, to = self.threshold, "threshold adjusted");
        }
        if !step.persist {
            return Ok(None);
        }
        let Some(store) = self.store.as_mut() else {
            return Ok(None);
        };
        match store.write_suspending(&self.slot, self.cfg.store.address, &[self.threshold]) {
            Ok(outcome) => {
                if outcome.touched_medium() {
                    tracing::info!(threshold_cm = self.threshold, ?outcome, "threshold saved");
                }
                Ok(Some(outcome))
            }
            Err(e) => {
                // Retried on the next return to Normal.
                tracing::error!(error = ?e, threshold_cm = self.threshold, "threshold save failed");
                Ok(None)
            }
        }
    }

    /// Pulse the trigger around the arming of a new measurement.
    fn arm(&mut self, pump: &mut dyn FnMut()) -> Result<bool> {
        if !self.slot.arm() {
            return Ok(false);
        }
        self.trigger
            .set_trigger(true)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("trigger high")?;

        let deadline = self.clock.now() + self.cfg.timing.fast_period() * 2;
        while self.slot.samples() == 0 {
            pump();
            if self.clock.now() >= deadline {
                tracing::debug!("fast activity did not run before trigger release");
                break;
            }
            self.clock.spin();
        }

        self.trigger
            .set_trigger(false)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("trigger low")?;
        Ok(true)
    }

    /// Drive every output to its idle level.
    pub fn shutdown(&mut self) -> Result<()> {
        self.mux
            .blank(self.display.as_mut())
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("display blank")?;
        self.trigger
            .set_trigger(false)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))?;
        if let Some(buzzer) = self.buzzer.as_mut() {
            buzzer
                .set_buzzer(false)
                .map_err(|e| eyre::Report::new(map_hw_error(&*e)))?;
            self.buzzer_on = false;
        }
        if let Some(leds) = self.leds.as_mut() {
            leds.set_lanes([false; LED_LANES])
                .map_err(|e| eyre::Report::new(map_hw_error(&*e)))?;
        }
        Ok(())
    }
}
