//! Hardware capabilities consumed by the controller.
//!
//! Every peripheral the measurement loop touches is reached through one of
//! these traits, so the core never sees pins, registers or polarity.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Error type returned across capability boundaries.
pub type HwResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Number of positions on the multiplexed 7-segment display.
pub const DIGITS: usize = 3;
/// Number of lanes on the LED ladder.
pub const LED_LANES: usize = 9;

/// Echo input of the ultrasonic sensor.
///
/// Shared between the fast and slow activities, hence `&self` and `Sync`.
pub trait EchoLine: Send + Sync {
    fn is_high(&self) -> bool;
}

/// Trigger output of the ultrasonic sensor.
pub trait TriggerLine {
    fn set_trigger(&mut self, high: bool) -> HwResult<()>;
}

/// Three digit-select lines plus a shared segment bus.
///
/// `pattern` is positive logic: bit set means the segment is lit, bit order
/// `dp g f e d c b a`.
pub trait SegmentDisplay {
    fn select_digit(&mut self, digit: usize, enabled: bool) -> HwResult<()>;
    fn write_segments(&mut self, pattern: u8) -> HwResult<()>;
}

pub trait LedBar {
    fn set_lanes(&mut self, lanes: [bool; LED_LANES]) -> HwResult<()>;
}

pub trait Buzzer {
    fn set_buzzer(&mut self, on: bool) -> HwResult<()>;
}

/// Instantaneous button levels, `true` meaning pressed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ButtonLevels {
    pub minus: bool,
    pub plus: bool,
    pub set: bool,
}

pub trait ButtonPanel {
    fn levels(&mut self) -> HwResult<ButtonLevels>;
}

/// Page-erasable byte storage (flash or EEPROM emulation).
///
/// Erased bytes read back as `0xFF`. Programming may only clear bits, so a
/// page must be erased before arbitrary data can be written into it.
pub trait PageStore {
    fn page_size(&self) -> usize;
    fn capacity(&self) -> usize;
    fn read_byte(&self, addr: usize) -> HwResult<u8>;
    /// Erase the page starting at `page_addr` (must be page aligned).
    fn erase_page(&mut self, page_addr: usize) -> HwResult<()>;
    fn program(&mut self, addr: usize, data: &[u8]) -> HwResult<()>;
}

impl<T: EchoLine + ?Sized> EchoLine for std::sync::Arc<T> {
    fn is_high(&self) -> bool {
        (**self).is_high()
    }
}

impl<T: TriggerLine + ?Sized> TriggerLine for Box<T> {
    fn set_trigger(&mut self, high: bool) -> HwResult<()> {
        (**self).set_trigger(high)
    }
}

impl<T: SegmentDisplay + ?Sized> SegmentDisplay for Box<T> {
    fn select_digit(&mut self, digit: usize, enabled: bool) -> HwResult<()> {
        (**self).select_digit(digit, enabled)
    }
    fn write_segments(&mut self, pattern: u8) -> HwResult<()> {
        (**self).write_segments(pattern)
    }
}

impl<T: LedBar + ?Sized> LedBar for Box<T> {
    fn set_lanes(&mut self, lanes: [bool; LED_LANES]) -> HwResult<()> {
        (**self).set_lanes(lanes)
    }
}

impl<T: Buzzer + ?Sized> Buzzer for Box<T> {
    fn set_buzzer(&mut self, on: bool) -> HwResult<()> {
        (**self).set_buzzer(on)
    }
}

impl<T: ButtonPanel + ?Sized> ButtonPanel for Box<T> {
    fn levels(&mut self) -> HwResult<ButtonLevels> {
        (**self).levels()
    }
}

impl<T: PageStore + ?Sized> PageStore for Box<T> {
    fn page_size(&self) -> usize {
        (**self).page_size()
    }
    fn capacity(&self) -> usize {
        (**self).capacity()
    }
    fn read_byte(&self, addr: usize) -> HwResult<u8> {
        (**self).read_byte(addr)
    }
    fn erase_page(&mut self, page_addr: usize) -> HwResult<()> {
        (**self).erase_page(page_addr)
    }
    fn program(&mut self, addr: usize, data: &[u8]) -> HwResult<()> {
        (**self).program(addr, data)
    }
}
