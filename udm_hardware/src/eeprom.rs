//! Page-erasable storage backends.
//!
//! Both stores mimic NOR flash: erased bytes read `0xFF`, programming can
//! only clear bits, and erase works on whole pages.
use std::path::{Path, PathBuf};

use udm_traits::{HwResult, PageStore};

use crate::error::{HwError, Result};

const BLANK: u8 = 0xFF;

#[derive(Debug, Clone)]
pub struct MemoryEeprom {
    bytes: Vec<u8>,
    page_size: usize,
    erase_cycles: u32,
    program_cycles: u32,
}

impl MemoryEeprom {
    /// Blank store of `capacity` bytes. `capacity` is rounded up to whole pages.
    pub fn new(capacity: usize, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let pages = capacity.div_ceil(page_size).max(1);
        Self {
            bytes: vec![BLANK; pages * page_size],
            page_size,
            erase_cycles: 0,
            program_cycles: 0,
        }
    }

    fn from_bytes(mut bytes: Vec<u8>, capacity: usize, page_size: usize) -> Self {
        let mut store = Self::new(capacity, page_size);
        bytes.resize(store.bytes.len(), BLANK);
        store.bytes = bytes;
        store
    }

    pub fn erase_cycles(&self) -> u32 {
        self.erase_cycles
    }

    pub fn program_cycles(&self) -> u32 {
        self.program_cycles
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn check_range(&self, addr: usize, len: usize) -> Result<()> {
        match addr.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(()),
            _ => Err(HwError::OutOfBounds {
                addr,
                len,
                capacity: self.bytes.len(),
            }),
        }
    }

    fn erase(&mut self, page_addr: usize) -> Result<()> {
        if page_addr % self.page_size != 0 {
            return Err(HwError::Misaligned(page_addr));
        }
        self.check_range(page_addr, self.page_size)?;
        self.bytes[page_addr..page_addr + self.page_size].fill(BLANK);
        self.erase_cycles = self.erase_cycles.saturating_add(1);
        Ok(())
    }

    fn write(&mut self, addr: usize, data: &[u8]) -> Result<()> {
        self.check_range(addr, data.len())?;
        for (cell, d) in self.bytes[addr..addr + data.len()].iter_mut().zip(data) {
            *cell &= *d;
        }
        self.program_cycles = self.program_cycles.saturating_add(1);
        Ok(())
    }
}

impl PageStore for MemoryEeprom {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn read_byte(&self, addr: usize) -> HwResult<u8> {
        self.check_range(addr, 1)?;
        Ok(self.bytes[addr])
    }

    fn erase_page(&mut self, page_addr: usize) -> HwResult<()> {
        Ok(self.erase(page_addr)?)
    }

    fn program(&mut self, addr: usize, data: &[u8]) -> HwResult<()> {
        Ok(self.write(addr, data)?)
    }
}

/// EEPROM image persisted to a file, so a "power cycle" is a process restart.
///
/// The image is rewritten after every erase or program operation.
#[derive(Debug)]
pub struct FileEeprom {
    path: PathBuf,
    mem: MemoryEeprom,
}

impl FileEeprom {
    /// Open `path`, creating a blank image if it does not exist yet.
    pub fn open(path: impl AsRef<Path>, capacity: usize, page_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mem = match std::fs::read(&path) {
            Ok(bytes) => MemoryEeprom::from_bytes(bytes, capacity, page_size),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "creating blank eeprom image");
                let mem = MemoryEeprom::new(capacity, page_size);
                std::fs::write(&path, mem.as_bytes())?;
                mem
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, mem })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn erase_cycles(&self) -> u32 {
        self.mem.erase_cycles()
    }

    pub fn program_cycles(&self) -> u32 {
        self.mem.program_cycles()
    }

    fn flush(&self) -> Result<()> {
        std::fs::write(&self.path, self.mem.as_bytes())?;
        Ok(())
    }
}

impl PageStore for FileEeprom {
    fn page_size(&self) -> usize {
        self.mem.page_size
    }

    fn capacity(&self) -> usize {
        self.mem.bytes.len()
    }

    fn read_byte(&self, addr: usize) -> HwResult<u8> {
        self.mem.read_byte(addr)
    }

    fn erase_page(&mut self, page_addr: usize) -> HwResult<()> {
        self.mem.erase(page_addr)?;
        Ok(self.flush()?)
    }

    fn program(&mut self, addr: usize, data: &[u8]) -> HwResult<()> {
        self.mem.write(addr, data)?;
        Ok(self.flush()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_only_clears_bits() {
        let mut m = MemoryEeprom::new(16, 8);
        m.program(0, &[0x0F]).unwrap();
        m.program(0, &[0xF3]).unwrap();
        assert_eq!(m.read_byte(0).unwrap(), 0x03);
        m.erase_page(0).unwrap();
        assert_eq!(m.read_byte(0).unwrap(), 0xFF);
        assert_eq!(m.erase_cycles(), 1);
        assert_eq!(m.program_cycles(), 2);
    }

    #[test]
    fn rejects_misaligned_erase_and_out_of_bounds() {
        let mut m = MemoryEeprom::new(16, 8);
        assert!(m.erase_page(3).is_err());
        assert!(m.read_byte(16).is_err());
        assert!(m.program(15, &[0, 0]).is_err());
    }

    #[test]
    fn capacity_rounds_up_to_pages() {
        let m = MemoryEeprom::new(10, 8);
        assert_eq!(m.capacity(), 16);
    }
}
