use crate::error::Error;
use crate::platform::{AlignedOps, Platform};
use crate::PageStatus;
#[cfg(feature = "defmt")]
use defmt::trace;

pub(crate) const RECORD_SIZE: u32 = 4;
pub(crate) const ERASED_HALF_WORD: u16 = 0xFFFF;

#[derive(strum::FromRepr, Debug, PartialEq, Copy, Clone)]
#[repr(u16)]
pub(crate) enum StatusWord {
    // All bits set, default state after flash erase.
    Erased = 0xFFFF,

    // Page is the target of a running transfer and receives the copied records.
    Transfer = 0xCCCC,

    // Page holds the current records.
    Valid = 0x0000,
}

impl From<StatusWord> for PageStatus {
    fn from(val: StatusWord) -> Self {
        match val {
            StatusWord::Erased => PageStatus::Erased,
            StatusWord::Transfer => PageStatus::Transfer,
            StatusWord::Valid => PageStatus::Valid,
        }
    }
}

impl From<u16> for PageStatus {
    fn from(val: u16) -> Self {
        StatusWord::from_repr(val).map_or(PageStatus::Invalid, PageStatus::from)
    }
}

/// One 4-byte slot of a page: `[value: u16 LE][key: u16 LE]`.
#[derive(Debug, PartialEq, Copy, Clone)]
pub(crate) struct Record {
    pub(crate) value: u16,
    pub(crate) key: u16,
}

impl Record {
    pub(crate) fn from_bytes(raw: [u8; RECORD_SIZE as usize]) -> Self {
        Self {
            value: u16::from_le_bytes([raw[0], raw[1]]),
            key: u16::from_le_bytes([raw[2], raw[3]]),
        }
    }

    pub(crate) fn is_free(&self) -> bool {
        self.value == ERASED_HALF_WORD && self.key == ERASED_HALF_WORD
    }

    /// Power was lost after programming the value but before the key.
    pub(crate) fn is_torn(&self) -> bool {
        self.value != ERASED_HALF_WORD && self.key == ERASED_HALF_WORD
    }
}

/// Reads the 4-byte slot at `offset`. Slot 0 of a page starts with the status header.
pub(crate) fn read_slot<T: Platform>(hal: &mut T, offset: u32) -> Result<Record, Error> {
    let mut buf = [0u8; RECORD_SIZE as usize];
    hal.read(offset, &mut buf).map_err(Error::flash)?;
    Ok(Record::from_bytes(buf))
}

pub(crate) fn read_status<T: Platform>(hal: &mut T, page_address: u32) -> Result<PageStatus, Error> {
    // the header is the value half of slot 0
    Ok(PageStatus::from(read_slot(hal, page_address)?.value))
}

pub(crate) fn write_status<T: Platform>(
    hal: &mut T,
    page_address: u32,
    status: StatusWord,
) -> Result<(), Error> {
    program_half_word(hal, page_address, status as u16)
}

/// Programs a single half-word. Drivers with a 4-byte write granularity get the half-word padded
/// with ones, which leaves the neighbouring half-word of the same word untouched on NOR flash.
pub(crate) fn program_half_word<T: Platform>(
    hal: &mut T,
    offset: u32,
    value: u16,
) -> Result<(), Error> {
    #[cfg(feature = "defmt")]
    trace!("program_half_word @{:#08x}: {=u16:#x}", offset, value);

    let window = T::align_write_ceil(size_of::<u16>());
    let start = T::align_write_floor(offset as usize);
    let pivot = offset as usize - start;

    let mut buf = [0xFFu8; RECORD_SIZE as usize];
    buf[pivot..pivot + size_of::<u16>()].copy_from_slice(&value.to_le_bytes());

    hal.write(start as u32, &buf[..window])
        .map_err(Error::flash)
}
