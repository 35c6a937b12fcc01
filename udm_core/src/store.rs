//! Wear-aware byte persistence on page-erasable storage.
//!
//! A write compares before touching the medium: identical data is a no-op,
//! the page is erased only if the target range is not already blank, and the
//! new bytes are programmed only if they are not all blank. Bytes of the
//! same page outside the written range survive an erase.
use eyre::WrapErr;
use udm_traits::PageStore;

use crate::buttons::MAX_THRESHOLD_CM;
use crate::config::StoreCfg;
use crate::error::{Result, UdmError};
use crate::hw_error::map_storage_error;
use crate::measurement::EchoSlot;

const BLANK: u8 = 0xFF;

/// What a write did to the medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Unchanged,
    /// Range was blank; bytes programmed without an erase.
    Programmed,
    /// New data is blank; erase alone was enough.
    Erased,
    ErasedAndProgrammed,
}

impl WriteOutcome {
    pub fn touched_medium(self) -> bool {
        self != Self::Unchanged
    }
}

#[derive(Debug)]
pub struct NonvolatileStore<S: PageStore> {
    store: S,
    erases: u32,
    programs: u32,
}

impl<S: PageStore> NonvolatileStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            erases: 0,
            programs: 0,
        }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    /// Page erases issued through this handle.
    pub fn erase_count(&self) -> u32 {
        self.erases
    }

    /// Program operations issued through this handle.
    pub fn program_count(&self) -> u32 {
        self.programs
    }

    pub fn read(&self, addr: usize) -> Result<u8> {
        self.store
            .read_byte(addr)
            .map_err(|e| eyre::Report::new(map_storage_error(&*e)))
            .wrap_err_with(|| format!("reading byte {addr:#x}"))
    }

    fn read_range(&self, addr: usize, len: usize) -> Result<Vec<u8>> {
        (addr..addr + len).map(|a| self.read(a)).collect()
    }

    /// Diff-aware write of `data` at `addr`. The range must lie in one page.
    pub fn write(&mut self, addr: usize, data: &[u8]) -> Result<WriteOutcome> {
        if data.is_empty() {
            return Ok(WriteOutcome::Unchanged);
        }
        let page = self.store.page_size().max(1);
        let page_start = addr - addr % page;
        let end = addr
            .checked_add(data.len())
            .ok_or_else(|| UdmError::Storage("write range overflows".into()))?;
        if end > page_start + page {
            return Err(UdmError::Storage(format!(
                "write {addr:#x}..{end:#x} crosses page boundary at {:#x}",
                page_start + page
            ))
            .into());
        }

        let old = self.read_range(addr, data.len())?;
        if old == data {
            return Ok(WriteOutcome::Unchanged);
        }
        let range_blank = old.iter().all(|b| *b == BLANK);
        let data_blank = data.iter().all(|b| *b == BLANK);

        if range_blank {
            self.program(addr, data)?;
            return Ok(WriteOutcome::Programmed);
        }

        let mut image = self.read_range(page_start, page)?;
        image[addr - page_start..end - page_start].copy_from_slice(data);
        self.store
            .erase_page(page_start)
            .map_err(|e| eyre::Report::new(map_storage_error(&*e)))
            .wrap_err_with(|| format!("erasing page {page_start:#x}"))?;
        self.erases = self.erases.saturating_add(1);

        // Restore the rest of the page along with the new data.
        let Some(first) = image.iter().position(|b| *b != BLANK) else {
            debug_assert!(data_blank);
            return Ok(WriteOutcome::Erased);
        };
        let last = image.iter().rposition(|b| *b != BLANK).unwrap_or(first);
        self.program(page_start + first, &image[first..=last])?;
        Ok(if data_blank {
            WriteOutcome::Erased
        } else {
            WriteOutcome::ErasedAndProgrammed
        })
    }

    /// [`Self::write`] with the fast sampler paused for the duration.
    pub fn write_suspending(
        &mut self,
        slot: &EchoSlot,
        addr: usize,
        data: &[u8],
    ) -> Result<WriteOutcome> {
        let _guard = slot.suspend();
        self.write(addr, data)
    }

    fn program(&mut self, addr: usize, data: &[u8]) -> Result<()> {
        self.store
            .program(addr, data)
            .map_err(|e| eyre::Report::new(map_storage_error(&*e)))
            .wrap_err_with(|| format!("programming {} bytes at {addr:#x}", data.len()))?;
        self.programs = self.programs.saturating_add(1);
        Ok(())
    }

    /// Read the persisted alarm threshold, substituting the default for a
    /// blank or out-of-range byte.
    pub fn load_threshold(&self, cfg: &StoreCfg) -> Result<u8> {
        let raw = self.read(cfg.address)?;
        Ok(match raw {
            BLANK => {
                tracing::debug!(
                    default = cfg.default_threshold_cm,
                    "threshold storage blank, using default"
                );
                cfg.default_threshold_cm
            }
            v if v > MAX_THRESHOLD_CM => {
                tracing::warn!(
                    stored = v,
                    default = cfg.default_threshold_cm,
                    "stored threshold out of range, using default"
                );
                cfg.default_threshold_cm
            }
            v => v,
        })
    }

    pub fn save_threshold(&mut self, cfg: &StoreCfg, threshold_cm: u8) -> Result<WriteOutcome> {
        self.write(cfg.address, &[threshold_cm])
    }
}
