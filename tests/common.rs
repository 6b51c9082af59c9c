#![allow(dead_code)]

// filename according to https://doc.rust-lang.org/book/ch11-03-test-organization.html
use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};
use flash_eeprom::Geometry;
use flash_eeprom::platform::FlashGate;

// APM32F103 main flash: 2 KiB sectors, half-word programming
pub const SECTOR_SIZE: usize = 2048;
pub const HALF_WORD_SIZE: usize = 2;
pub const ERASE_SIZE: usize = 64;
pub const RECORD_SIZE: usize = 4;

// small pages for exhaustive fault injection: 15 keys per page
pub const SMALL_SECTOR_SIZE: usize = 64;

pub fn geometry() -> Geometry {
    Geometry::new(0, SECTOR_SIZE as u32, 1)
}

pub fn small_geometry() -> Geometry {
    Geometry::new(0, SMALL_SECTOR_SIZE as u32, 1)
}

#[derive(Default)]
pub struct Flash {
    pub buf: Vec<u8>,
    pub fail_after_operation: usize,
    /// Only the first faulting operation fails, everything afterwards succeeds again.
    pub transient: bool,
    pub operations: Vec<Operation>,
    pub locked: bool,
    pub unlocks: usize,
    pub locks: usize,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Read { offset: u32, len: usize },
    Write { offset: u32, len: usize },
    Erase { offset: u32, len: usize },
}

impl Flash {
    /// Two pages of `sectors / 2` sectors each.
    pub fn new(sectors: usize) -> Self {
        Self::with_capacity(SECTOR_SIZE * sectors)
    }

    pub fn new_with_fault(sectors: usize, fail_after_operation: usize) -> Self {
        Self {
            fail_after_operation,
            ..Self::new(sectors)
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0xffu8; capacity],
            fail_after_operation: usize::MAX,
            locked: true,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
    }

    /// Lets the next `n` operations pass and fails everything after.
    pub fn fail_after(&mut self, n: usize) {
        self.fail_after_operation = self.operations.len() + n;
    }

    pub fn erases(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Erase { .. }))
            .count()
    }

    pub fn writes(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Write { .. }))
            .count()
    }

    pub fn half_word(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.buf[offset], self.buf[offset + 1]])
    }

    /// Writes raw bytes bypassing the operation log, for preparing flash images.
    pub fn program(&mut self, offset: usize, value: u16) {
        let bytes = value.to_le_bytes();
        self.buf[offset] &= bytes[0];
        self.buf[offset + 1] &= bytes[1];
    }

    pub fn record(&mut self, page_offset: usize, slot: usize, key: u16, value: u16) {
        let offset = page_offset + slot * RECORD_SIZE;
        self.program(offset, value);
        self.program(offset + 2, key);
    }

    pub fn dump_operations(&self) {
        println!("Operations:");
        for op in &self.operations {
            println!("  {:?}", op);
        }
    }

    fn fault(&mut self) -> bool {
        let fault = self.operations.len() >= self.fail_after_operation;
        if fault && self.transient {
            self.disable_faults();
        }
        fault
    }
}

#[derive(Debug)]
pub struct FlashError;

impl NorFlashError for FlashError {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

impl ErrorType for Flash {
    type Error = FlashError;
}

impl ReadNorFlash for Flash {
    const READ_SIZE: usize = HALF_WORD_SIZE;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::READ_SIZE as _));

        if self.fault() {
            return Err(FlashError);
        }
        self.operations.push(Operation::Read {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        bytes.copy_from_slice(&self.buf[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl NorFlash for Flash {
    const WRITE_SIZE: usize = HALF_WORD_SIZE;

    const ERASE_SIZE: usize = ERASE_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        assert!(from.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(to.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(!self.locked, "erase while locked");

        if self.fault() {
            return Err(FlashError);
        }

        self.operations.push(Operation::Erase {
            offset: from,
            len: (to - from) as usize,
        });

        for addr in from..to {
            self.buf[addr as usize] = 0xff;
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::WRITE_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::WRITE_SIZE as _));
        assert!(!bytes.is_empty());
        assert!(!self.locked, "write while locked");

        if self.fault() {
            return Err(FlashError);
        }

        self.operations.push(Operation::Write {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        for (i, &val) in bytes.iter().enumerate() {
            // programming can only flip bits from 1 to 0
            self.buf[offset + i] &= val;
        }
        Ok(())
    }
}

impl FlashGate for Flash {
    fn unlock(&mut self) {
        assert!(self.locked, "unlock while unlocked");
        self.locked = false;
        self.unlocks += 1;
    }

    fn lock(&mut self) {
        self.locked = true;
        self.locks += 1;
    }
}

/// The same flash with a 4 byte write granularity like SPI NOR flashes.
pub struct WordFlash(pub Flash);

impl ErrorType for WordFlash {
    type Error = FlashError;
}

impl ReadNorFlash for WordFlash {
    const READ_SIZE: usize = 4;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::READ_SIZE as _));
        self.0.read(offset, bytes)
    }

    fn capacity(&self) -> usize {
        self.0.capacity()
    }
}

impl NorFlash for WordFlash {
    const WRITE_SIZE: usize = 4;

    const ERASE_SIZE: usize = ERASE_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        self.0.erase(from, to)
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::WRITE_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::WRITE_SIZE as _));
        self.0.write(offset, bytes)
    }
}

impl FlashGate for WordFlash {
    fn unlock(&mut self) {
        self.0.unlock()
    }

    fn lock(&mut self) {
        self.0.lock()
    }
}
