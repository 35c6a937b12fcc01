//! Hardware assembly: config mapping, store selection and wiring the
//! peripherals into an orchestrator.

use std::sync::Arc;

use eyre::WrapErr;
use udm_core::hw_error::map_storage_error;
use udm_core::{ControllerCfg, NonvolatileStore, Orchestrator, Result, UdmError};
use udm_hardware::{FileEeprom, MemoryEeprom, SimulatedButtons, SimulatedPanel, SimulatedSensor};
use udm_traits::{Clock, PageStore};

/// The threshold store from `[storage]`: the image file when a path is set,
/// otherwise a blank in-memory page.
pub fn open_store(cfg: &udm_config::Config) -> Result<Box<dyn PageStore + Send>> {
    let s = &cfg.storage;
    match s.path.as_deref() {
        Some(path) => {
            let image = FileEeprom::open(path, s.capacity, s.page_size)
                .map_err(|e| eyre::Report::new(map_storage_error(&e)))
                .wrap_err_with(|| format!("opening EEPROM image {path}"))?;
            tracing::debug!(path, "threshold store opened");
            Ok(Box::new(image))
        }
        None => {
            tracing::debug!("no storage.path set; threshold kept in memory");
            Ok(Box::new(MemoryEeprom::new(s.capacity, s.page_size)))
        }
    }
}

/// Store for the `threshold` command, which only makes sense on a file.
pub fn open_persistent_store(
    cfg: &udm_config::Config,
) -> Result<NonvolatileStore<Box<dyn PageStore + Send>>> {
    if cfg.storage.path.is_none() {
        return Err(eyre::Report::new(UdmError::Config(
            "storage.path is not set; nothing to read or write".into(),
        )));
    }
    Ok(NonvolatileStore::new(open_store(cfg)?))
}

/// Simulated board: handles shared with the orchestrator so the caller can
/// drive inputs and read outputs.
pub struct SimBoard<C: Clock> {
    pub sensor: SimulatedSensor<C>,
    pub panel: SimulatedPanel,
    pub buttons: SimulatedButtons,
}

impl<C> SimBoard<C>
where
    C: Clock + Clone + Send + Sync + 'static,
{
    pub fn new(clock: C, object_cm: u32, speed_cm_s: u32) -> Self {
        Self {
            sensor: SimulatedSensor::new(clock, object_cm, speed_cm_s),
            panel: SimulatedPanel::new(),
            buttons: SimulatedButtons::new(),
        }
    }

    pub fn build(
        &self,
        clock: C,
        cfg: ControllerCfg,
        store: Box<dyn PageStore + Send>,
    ) -> Result<Orchestrator> {
        Orchestrator::builder()
            .config(cfg)
            .clock(Arc::new(clock))
            .echo(Arc::new(self.sensor.clone()))
            .trigger(self.sensor.trigger())
            .display(self.panel.clone())
            .leds(self.panel.clone())
            .buzzer(self.panel.clone())
            .buttons(self.buttons.clone())
            .store(store)
            .try_build()
    }
}

#[cfg(feature = "hardware")]
pub fn gpio_pins(cfg: &udm_config::Config) -> Result<udm_hardware::gpio::GpioPins> {
    let Some(p) = &cfg.pins else {
        return Err(eyre::Report::new(UdmError::Config(
            "hardware build requires a [pins] section".into(),
        )));
    };
    let leds = if cfg.features.leds && !p.leds.is_empty() {
        let lanes: [u8; udm_traits::LED_LANES] = p.leds.as_slice().try_into().map_err(|_| {
            eyre::Report::new(UdmError::Config("pins.leds must list exactly 9 pins".into()))
        })?;
        Some(lanes)
    } else {
        None
    };
    Ok(udm_hardware::gpio::GpioPins {
        trigger: p.trigger,
        echo: p.echo,
        digits: p.digits,
        segments: p.segments,
        leds,
        buzzer: p.buzzer,
        minus: p.minus,
        plus: p.plus,
        set: p.set,
        segments_active_low: p.segments_active_low,
        digits_active_low: p.digits_active_low,
        leds_active_low: p.leds_active_low,
        buttons_active_low: p.buttons_active_low,
    })
}

/// Open the GPIO board from `[pins]` and wire it into an orchestrator.
#[cfg(feature = "hardware")]
pub fn gpio_orchestrator(cfg: &udm_config::Config, ccfg: ControllerCfg) -> Result<Orchestrator> {
    use udm_core::hw_error::map_hw_error;
    use udm_hardware::gpio::GpioBoard;

    let pins = gpio_pins(cfg)?;
    let board = GpioBoard::open(&pins)
        .map_err(|e| eyre::Report::new(map_hw_error(&e)))
        .wrap_err("open GPIO board")?;

    let mut builder = Orchestrator::builder()
        .config(ccfg)
        .echo(Arc::new(board.echo))
        .trigger(board.trigger)
        .display(board.display)
        .store(open_store(cfg)?);
    if let Some(leds) = board.leds {
        builder = builder.leds(leds);
    }
    if let Some(buzzer) = board.buzzer {
        builder = builder.buzzer(buzzer);
    }
    if let Some(buttons) = board.buttons {
        builder = builder.buttons(buttons);
    }
    builder.try_build()
}
