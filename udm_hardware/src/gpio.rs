//! Raspberry Pi GPIO backend (rppal).
//!
//! Electrical polarity is resolved here; the core only deals in "on" and
//! "pressed".
use rppal::gpio::{Gpio, InputPin, Level, OutputPin};
use tracing::{debug, trace};

use udm_traits::{
    ButtonLevels, ButtonPanel, Buzzer, DIGITS, EchoLine, HwResult, LED_LANES, LedBar,
    SegmentDisplay, TriggerLine,
};

use crate::error::{HwError, Result};

/// Pin assignment for [`GpioBoard::open`]. BCM numbering.
#[derive(Debug, Clone)]
pub struct GpioPins {
    pub trigger: u8,
    pub echo: u8,
    pub digits: [u8; DIGITS],
    pub segments: [u8; 8],
    pub leds: Option<[u8; LED_LANES]>,
    pub buzzer: Option<u8>,
    pub minus: Option<u8>,
    pub plus: Option<u8>,
    pub set: Option<u8>,
    pub segments_active_low: bool,
    pub digits_active_low: bool,
    pub leds_active_low: bool,
    pub buttons_active_low: bool,
}

/// All peripherals of one board, ready to hand to the controller.
pub struct GpioBoard {
    pub echo: GpioEcho,
    pub trigger: GpioTrigger,
    pub display: GpioDisplay,
    pub leds: Option<GpioLeds>,
    pub buzzer: Option<GpioBuzzer>,
    pub buttons: Option<GpioButtons>,
}

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

fn level(on: bool, active_low: bool) -> Level {
    if on != active_low {
        Level::High
    } else {
        Level::Low
    }
}

fn output(gpio: &Gpio, pin: u8, off: Level) -> Result<OutputPin> {
    let mut out = gpio.get(pin).map_err(gpio_err)?.into_output();
    out.write(off);
    Ok(out)
}

impl GpioBoard {
    pub fn open(pins: &GpioPins) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;

        let echo = GpioEcho {
            pin: gpio.get(pins.echo).map_err(gpio_err)?.into_input_pulldown(),
        };
        let trigger = GpioTrigger {
            pin: output(&gpio, pins.trigger, Level::Low)?,
        };

        let mut digits = Vec::with_capacity(DIGITS);
        for p in pins.digits {
            digits.push(output(&gpio, p, level(false, pins.digits_active_low))?);
        }
        let mut segments = Vec::with_capacity(8);
        for p in pins.segments {
            segments.push(output(&gpio, p, level(false, pins.segments_active_low))?);
        }
        let display = GpioDisplay {
            digits,
            segments,
            digits_active_low: pins.digits_active_low,
            segments_active_low: pins.segments_active_low,
        };

        let leds = match pins.leds {
            Some(list) => {
                let mut lanes = Vec::with_capacity(LED_LANES);
                for p in list {
                    lanes.push(output(&gpio, p, level(false, pins.leds_active_low))?);
                }
                Some(GpioLeds {
                    lanes,
                    active_low: pins.leds_active_low,
                })
            }
            None => None,
        };

        let buzzer = match pins.buzzer {
            Some(p) => Some(GpioBuzzer {
                pin: output(&gpio, p, Level::Low)?,
            }),
            None => None,
        };

        let input = |p: u8| -> Result<InputPin> {
            let pin = gpio.get(p).map_err(gpio_err)?;
            Ok(if pins.buttons_active_low {
                pin.into_input_pullup()
            } else {
                pin.into_input_pulldown()
            })
        };
        let buttons = match (pins.minus, pins.plus) {
            (Some(m), Some(p)) => Some(GpioButtons {
                minus: input(m)?,
                plus: input(p)?,
                set: pins.set.map(input).transpose()?,
                active_low: pins.buttons_active_low,
            }),
            _ => None,
        };

        debug!(trigger = pins.trigger, echo = pins.echo, "gpio board opened");
        Ok(Self {
            echo,
            trigger,
            display,
            leds,
            buzzer,
            buttons,
        })
    }
}

pub struct GpioEcho {
    pin: InputPin,
}

impl EchoLine for GpioEcho {
    #[inline]
    fn is_high(&self) -> bool {
        self.pin.is_high()
    }
}

pub struct GpioTrigger {
    pin: OutputPin,
}

impl TriggerLine for GpioTrigger {
    fn set_trigger(&mut self, high: bool) -> HwResult<()> {
        self.pin.write(if high { Level::High } else { Level::Low });
        Ok(())
    }
}

pub struct GpioDisplay {
    digits: Vec<OutputPin>,
    segments: Vec<OutputPin>,
    digits_active_low: bool,
    segments_active_low: bool,
}

impl SegmentDisplay for GpioDisplay {
    fn select_digit(&mut self, digit: usize, enabled: bool) -> HwResult<()> {
        let pin = self
            .digits
            .get_mut(digit)
            .ok_or(HwError::InvalidDigit(digit))?;
        pin.write(level(enabled, self.digits_active_low));
        Ok(())
    }

    fn write_segments(&mut self, pattern: u8) -> HwResult<()> {
        for (i, pin) in self.segments.iter_mut().enumerate() {
            pin.write(level(pattern & (1 << i) != 0, self.segments_active_low));
        }
        trace!(pattern, "segments");
        Ok(())
    }
}

pub struct GpioLeds {
    lanes: Vec<OutputPin>,
    active_low: bool,
}

impl LedBar for GpioLeds {
    fn set_lanes(&mut self, lanes: [bool; LED_LANES]) -> HwResult<()> {
        for (pin, on) in self.lanes.iter_mut().zip(lanes) {
            pin.write(level(on, self.active_low));
        }
        Ok(())
    }
}

pub struct GpioBuzzer {
    pin: OutputPin,
}

impl Buzzer for GpioBuzzer {
    fn set_buzzer(&mut self, on: bool) -> HwResult<()> {
        self.pin.write(level(on, false));
        Ok(())
    }
}

pub struct GpioButtons {
    minus: InputPin,
    plus: InputPin,
    set: Option<InputPin>,
    active_low: bool,
}

impl ButtonPanel for GpioButtons {
    fn levels(&mut self) -> HwResult<ButtonLevels> {
        let pressed = |p: &InputPin| p.is_high() != self.active_low;
        Ok(ButtonLevels {
            minus: pressed(&self.minus),
            plus: pressed(&self.plus),
            set: self.set.as_ref().is_some_and(pressed),
        })
    }
}
