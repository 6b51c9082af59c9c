use embedded_storage::nor_flash::{NorFlashError, NorFlashErrorKind};
use thiserror::Error;

/// Errors that can occur during EEPROM emulation operations. Marked as non-exhaustive to allow
/// for future additions without breaking the API. A caller would usually only need to handle
/// `KeyNotFound`, the configuration errors are static and the flash errors are fatal for the
/// current operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The error reported by the provided `NorFlash` implementation. It is passed through as is,
    /// no retry is attempted. The handle stays faulted until `init` succeeds again.
    #[error("flash error: {0:?}")]
    Flash(NorFlashErrorKind),

    /// Neither page header reads as valid (or transfer, for writes). Only `init` can repair this.
    #[error("no valid page")]
    NoValidPage,

    /// No record for the key has been written yet.
    #[error("key not found")]
    KeyNotFound,

    /// The write scan found no free slot. This only happens if every key of the page is in use
    /// and the other page is full as well.
    #[error("page full")]
    PageFull,

    /// Keys have to be smaller than `Geometry::max_keys`.
    #[error("key out of range")]
    KeyOutOfRange,

    /// The stored 16-bit value does not fit the requested type.
    #[error("value out of range: {0:#06x}")]
    ValueOutOfRange(u16),

    /// The base address has to be aligned to the erase size and both pages must fit into the
    /// flash capacity.
    #[error("invalid base address")]
    InvalidBaseAddress,

    /// The sector size has to be a non zero multiple of the erase size.
    #[error("invalid sector size")]
    InvalidSectorSize,

    /// The sector count has to be non zero and a page must not address more than 0xFFFE keys.
    #[error("invalid sector count")]
    InvalidSectorCount,

    /// Only write sizes of 1, 2 or 4 bytes and read sizes dividing 4 are supported.
    #[error("unsupported flash")]
    UnsupportedFlash,
}

impl Error {
    pub(crate) fn flash<E: NorFlashError>(error: E) -> Self {
        Error::Flash(error.kind())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Flash(kind) => defmt::write!(f, "Flash({})", defmt::Debug2Format(kind)),
            Error::NoValidPage => defmt::write!(f, "NoValidPage"),
            Error::KeyNotFound => defmt::write!(f, "KeyNotFound"),
            Error::PageFull => defmt::write!(f, "PageFull"),
            Error::KeyOutOfRange => defmt::write!(f, "KeyOutOfRange"),
            Error::ValueOutOfRange(value) => defmt::write!(f, "ValueOutOfRange({=u16:#x})", value),
            Error::InvalidBaseAddress => defmt::write!(f, "InvalidBaseAddress"),
            Error::InvalidSectorSize => defmt::write!(f, "InvalidSectorSize"),
            Error::InvalidSectorCount => defmt::write!(f, "InvalidSectorCount"),
            Error::UnsupportedFlash => defmt::write!(f, "UnsupportedFlash"),
        }
    }
}
