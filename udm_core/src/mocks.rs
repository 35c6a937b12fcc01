//! Test and helper mocks for udm_core

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use udm_traits::{
    Buzzer, HwResult, LED_LANES, LedBar, PageStore, SegmentDisplay, TriggerLine,
};

/// Echo input whose level is set directly.
#[derive(Debug, Clone, Default)]
pub struct EchoLevel {
    high: Arc<AtomicBool>,
}

impl EchoLevel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, high: bool) {
        self.high.store(high, Ordering::Relaxed);
    }
}

impl udm_traits::EchoLine for EchoLevel {
    fn is_high(&self) -> bool {
        self.high.load(Ordering::Relaxed)
    }
}

/// Output sink that accepts everything; stands in for peripherals a test
/// does not inspect.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOutput;

impl TriggerLine for NullOutput {
    fn set_trigger(&mut self, _high: bool) -> HwResult<()> {
        Ok(())
    }
}

impl SegmentDisplay for NullOutput {
    fn select_digit(&mut self, _digit: usize, _enabled: bool) -> HwResult<()> {
        Ok(())
    }

    fn write_segments(&mut self, _pattern: u8) -> HwResult<()> {
        Ok(())
    }
}

impl LedBar for NullOutput {
    fn set_lanes(&mut self, _lanes: [bool; LED_LANES]) -> HwResult<()> {
        Ok(())
    }
}

impl Buzzer for NullOutput {
    fn set_buzzer(&mut self, _on: bool) -> HwResult<()> {
        Ok(())
    }
}

/// A store that reads blank and refuses every erase or program.
#[derive(Debug, Clone, Copy)]
pub struct ReadOnlyStore {
    pub page_size: usize,
    pub capacity: usize,
}

impl Default for ReadOnlyStore {
    fn default() -> Self {
        Self {
            page_size: 512,
            capacity: 512,
        }
    }
}

impl PageStore for ReadOnlyStore {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn read_byte(&self, _addr: usize) -> HwResult<u8> {
        Ok(0xFF)
    }

    fn erase_page(&mut self, _page_addr: usize) -> HwResult<()> {
        Err(Box::new(std::io::Error::other("store is write protected")))
    }

    fn program(&mut self, _addr: usize, _data: &[u8]) -> HwResult<()> {
        Err(Box::new(std::io::Error::other("store is write protected")))
    }
}
