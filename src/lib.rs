#![doc = include_str ! ("../README.md")]
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

pub mod error;
mod geometry;
mod get;
mod internal;
pub mod platform;
mod raw;
mod recovery;
mod set;

pub use geometry::Geometry;
pub use get::Get;
pub use recovery::RecoveryAction;
pub use set::Set;

use crate::error::Error;
use crate::platform::Platform;

/// One of the two physical pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PageId {
    Page0 = 0,
    Page1 = 1,
}

impl PageId {
    pub const ALL: [PageId; 2] = [PageId::Page0, PageId::Page1];

    /// The page a transfer out of `self` copies into.
    pub const fn other(self) -> PageId {
        match self {
            PageId::Page0 => PageId::Page1,
            PageId::Page1 => PageId::Page0,
        }
    }
}

/// Decoded status header of a page. Everything that is not one of the three known status words
/// reads as `Invalid`.
#[derive(strum::EnumIter, strum::Display, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PageStatus {
    Erased,
    Transfer,
    Valid,
    Invalid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EepromStatistics {
    /// The page reads are served from, `None` if no page is valid.
    pub active_page: Option<PageId>,
    pub pages: [PageStatistics; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageStatistics {
    pub status: PageStatus,
    /// Slots holding a record, torn ones included.
    pub used: u16,
    pub empty: u16,
    /// Slots whose value was programmed but whose key was not.
    pub torn: u16,
}

/// Handle to the emulated EEPROM. Owns the flash driver and the page geometry, all operations go
/// through it. There is no internal locking: concurrent use, including from interrupt handlers
/// touching the same pages, must be serialized by the caller.
pub struct Eeprom<T: Platform> {
    pub(crate) hal: T,
    pub(crate) geometry: Geometry,
    pub(crate) faulted: Option<Error>,
}

impl<T: Platform> Eeprom<T> {
    /// Validates the geometry against the flash driver and runs [`Eeprom::init`], so the returned
    /// handle is always backed by exactly one valid page.
    pub fn new(geometry: Geometry, hal: T) -> Result<Eeprom<T>, Error> {
        geometry.validate(&hal)?;

        let mut eeprom = Self {
            hal,
            geometry,
            faulted: None,
        };

        eeprom.init()?;

        Ok(eeprom)
    }

    /// Resolves whatever status combination a previous power loss left behind into a single
    /// valid page:
    ///
    /// 1. pages whose header reads as erased are erased again, a cut erase may have left the
    ///    rest of the sectors programmed
    /// 2. the pair of page states is looked up in [`RecoveryAction::for_statuses`] and the action
    ///    is applied
    /// 3. a full valid page is transferred right away
    ///
    /// Returns the applied action. [`RecoveryAction::Format`] means the stored data was discarded.
    /// Flash errors are returned as is and leave the handle faulted.
    pub fn init(&mut self) -> Result<RecoveryAction, Error> {
        let result = self.unlocked().recover();
        match result {
            Ok(_) => self.faulted = None,
            Err(error @ Error::Flash(_)) => self.faulted = Some(error),
            Err(_) => {}
        }
        result
    }

    /// Read the newest value of a key.
    pub fn read(&mut self, key: u16) -> Result<u16, Error> {
        self.check_key(key)?;

        let result = self.read_record(key);
        self.latch(result)
    }

    /// Write a value, replacing the previous one. Transfers the page before the write if it is
    /// already full and afterwards if the write used the last free slot.
    pub fn write(&mut self, key: u16, value: u16) -> Result<(), Error> {
        if let Some(error) = self.faulted {
            return Err(error);
        }
        self.check_key(key)?;

        let result = self.unlocked().write_record(key, value);
        self.latch(result)
    }

    /// Get a value converted to the requested type.
    ///
    /// Supported types are bool, u8, i8, u16 and i16.
    pub fn get<R>(&mut self, key: u16) -> Result<R, Error>
    where
        Eeprom<T>: Get<R>,
    {
        Get::get(self, key)
    }

    /// Set a value of one of the types also supported by [`Eeprom::get`].
    pub fn set<R>(&mut self, key: u16, value: R) -> Result<(), Error>
    where
        Eeprom<T>: Set<R>,
    {
        Set::set(self, key, value)
    }

    /// Erases both pages and marks page 0 valid. All stored values are lost.
    pub fn format(&mut self) -> Result<(), Error> {
        if let Some(error) = self.faulted {
            return Err(error);
        }

        let result = self.unlocked().format_pages();
        self.latch(result)
    }

    pub fn statuses(&mut self) -> Result<[PageStatus; 2], Error> {
        self.page_statuses()
    }

    /// The page reads are currently served from.
    pub fn active_page(&mut self) -> Result<Option<PageId>, Error> {
        self.resolve_page(internal::Mode::Read)
    }

    /// Returns slot usage of both pages
    pub fn statistics(&mut self) -> Result<EepromStatistics, Error> {
        let active_page = self.resolve_page(internal::Mode::Read)?;
        let pages = [
            self.page_statistics(PageId::Page0)?,
            self.page_statistics(PageId::Page1)?,
        ];

        Ok(EepromStatistics { active_page, pages })
    }

    pub fn max_keys(&self) -> u16 {
        self.geometry.max_keys()
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    fn check_key(&self, key: u16) -> Result<(), Error> {
        if key >= self.geometry.max_keys() {
            return Err(Error::KeyOutOfRange);
        }
        Ok(())
    }

    fn latch<R>(&mut self, result: Result<R, Error>) -> Result<R, Error> {
        if let Err(error @ Error::Flash(_)) = result {
            self.faulted = Some(error);
        }
        result
    }
}
