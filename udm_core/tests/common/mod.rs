#![allow(dead_code)]
use std::sync::Arc;

use udm_core::{ControllerCfg, Orchestrator};
use udm_hardware::{SimulatedButtons, SimulatedPanel, SimulatedSensor};
use udm_traits::PageStore;
use udm_traits::clock::virtual_clock::VirtualClock;

pub const SPEED: u32 = 34655;

/// Simulated board around one orchestrator. Handles are shared with the
/// controller, so tests can inspect outputs and drive inputs.
pub struct Rig {
    pub clock: VirtualClock,
    pub sensor: SimulatedSensor<VirtualClock>,
    pub panel: SimulatedPanel,
    pub buttons: SimulatedButtons,
}

impl Rig {
    pub fn new(distance_mm: u32) -> Self {
        let clock = VirtualClock::new();
        let sensor = SimulatedSensor::new(clock.clone(), 0, SPEED);
        sensor.set_distance_mm(distance_mm);
        Self {
            clock,
            sensor,
            panel: SimulatedPanel::new(),
            buttons: SimulatedButtons::new(),
        }
    }

    pub fn build(&self, cfg: ControllerCfg) -> Orchestrator {
        self.builder(cfg).try_build().unwrap()
    }

    pub fn build_with_store(
        &self,
        cfg: ControllerCfg,
        store: impl PageStore + Send + 'static,
    ) -> Orchestrator {
        self.builder(cfg).store(store).try_build().unwrap()
    }

    pub fn builder(&self, cfg: ControllerCfg) -> udm_core::OrchestratorBuilder {
        Orchestrator::builder()
            .config(cfg)
            .clock(Arc::new(self.clock.clone()))
            .echo(Arc::new(self.sensor.clone()))
            .trigger(self.sensor.trigger())
            .display(self.panel.clone())
            .leds(self.panel.clone())
            .buzzer(self.panel.clone())
            .buttons(self.buttons.clone())
    }
}
