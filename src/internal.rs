use crate::error::Error;
use crate::platform::Platform;
use crate::raw::{self, StatusWord};
use crate::{Eeprom, PageId, PageStatistics, PageStatus};
use core::ops::{Deref, DerefMut};
#[cfg(feature = "defmt")]
use defmt::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum Mode {
    /// The valid page
    Read,
    /// The transfer page if a transfer is running, the valid page otherwise
    Write,
}

/// Page 0 wins if both pages qualify.
pub(crate) fn resolve(mode: Mode, statuses: [PageStatus; 2]) -> Option<PageId> {
    let with_status = |status| {
        PageId::ALL
            .into_iter()
            .find(|&page| statuses[page as usize] == status)
    };

    match mode {
        Mode::Read => with_status(PageStatus::Valid),
        Mode::Write => with_status(PageStatus::Transfer).or_else(|| with_status(PageStatus::Valid)),
    }
}

/// Keeps the flash controller unlocked while alive.
pub(crate) struct Unlocked<'a, T: Platform> {
    eeprom: &'a mut Eeprom<T>,
}

impl<T: Platform> Deref for Unlocked<'_, T> {
    type Target = Eeprom<T>;

    fn deref(&self) -> &Self::Target {
        &*self.eeprom
    }
}

impl<T: Platform> DerefMut for Unlocked<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.eeprom
    }
}

impl<T: Platform> Drop for Unlocked<'_, T> {
    fn drop(&mut self) {
        self.eeprom.hal.lock();
    }
}

impl<T: Platform> Eeprom<T> {
    pub(crate) fn unlocked(&mut self) -> Unlocked<'_, T> {
        self.hal.unlock();
        Unlocked { eeprom: self }
    }

    pub(crate) fn page_status(&mut self, page: PageId) -> Result<PageStatus, Error> {
        raw::read_status(&mut self.hal, self.geometry.page_address(page))
    }

    pub(crate) fn page_statuses(&mut self) -> Result<[PageStatus; 2], Error> {
        Ok([
            self.page_status(PageId::Page0)?,
            self.page_status(PageId::Page1)?,
        ])
    }

    pub(crate) fn resolve_page(&mut self, mode: Mode) -> Result<Option<PageId>, Error> {
        Ok(resolve(mode, self.page_statuses()?))
    }

    /// Scans the page backwards, the record at the highest address is the newest one.
    pub(crate) fn find_record(&mut self, page: PageId, key: u16) -> Result<Option<u16>, Error> {
        for slot in (1..=self.geometry.max_keys()).rev() {
            let record = raw::read_slot(&mut self.hal, self.geometry.slot_address(page, slot))?;
            if record.key == key {
                return Ok(Some(record.value));
            }
        }

        Ok(None)
    }

    pub(crate) fn read_record(&mut self, key: u16) -> Result<u16, Error> {
        #[cfg(feature = "defmt")]
        trace!("read_record: {}", key);

        let page = self
            .resolve_page(Mode::Read)?
            .ok_or(Error::NoValidPage)?;

        self.find_record(page, key)?.ok_or(Error::KeyNotFound)
    }

    /// Appends a record to the first free slot of the write page without checking whether the
    /// page runs full.
    pub(crate) fn append_record(&mut self, key: u16, value: u16) -> Result<(), Error> {
        let page = self
            .resolve_page(Mode::Write)?
            .ok_or(Error::NoValidPage)?;

        for slot in 1..=self.geometry.max_keys() {
            let address = self.geometry.slot_address(page, slot);
            if !raw::read_slot(&mut self.hal, address)?.is_free() {
                continue;
            }

            #[cfg(feature = "defmt")]
            trace!("append_record: {}[{}] {} = {=u16:#x}", page, slot, key, value);

            #[cfg(feature = "debug-logs")]
            println!("  internal: append_record {page:?}[{slot}] {key} = {value:#06x}");

            // value first, a record cut before the key is programmed never matches a key
            raw::program_half_word(&mut self.hal, address, value)?;
            raw::program_half_word(&mut self.hal, address + 2, key)?;

            return Ok(());
        }

        #[cfg(feature = "defmt")]
        warn!("append_record: {} full", page);

        Err(Error::PageFull)
    }

    pub(crate) fn write_record(&mut self, key: u16, value: u16) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("write_record: {} = {=u16:#x}", key, value);

        #[cfg(feature = "debug-logs")]
        println!("internal: write_record {key} = {value:#06x}");

        self.ensure_capacity()?;
        self.append_record(key, value)?;
        self.ensure_capacity()
    }

    /// Transfers the valid page once its last slot is taken.
    pub(crate) fn ensure_capacity(&mut self) -> Result<(), Error> {
        let page = self
            .resolve_page(Mode::Read)?
            .ok_or(Error::NoValidPage)?;

        let last_slot = self.geometry.slot_address(page, self.geometry.max_keys());
        if raw::read_slot(&mut self.hal, last_slot)?.is_free() {
            return Ok(());
        }

        self.transfer_page()
    }

    /// Copies the newest value of every key from the valid page to the other one:
    ///
    /// 1. mark the target page as transfer, from now on writes land there
    /// 2. copy every key found on the source page
    /// 3. erase the source page
    /// 4. mark the target page as valid
    ///
    /// The source stays untouched until all records are copied. A power loss during 2 leaves a
    /// valid/transfer pair which `init` resolves by starting over, one after 3 leaves an
    /// erased/transfer pair and the copy is complete.
    pub(crate) fn transfer_page(&mut self) -> Result<(), Error> {
        let source = self
            .resolve_page(Mode::Read)?
            .ok_or(Error::NoValidPage)?;
        let target = source.other();

        #[cfg(feature = "defmt")]
        trace!("transfer_page: {} -> {}", source, target);

        #[cfg(feature = "debug-logs")]
        println!("internal: transfer_page {source:?} -> {target:?}");

        self.mark_page(target, StatusWord::Transfer)?;

        for key in 0..self.geometry.max_keys() {
            if let Some(value) = self.find_record(source, key)? {
                self.append_record(key, value)?;
            }
        }

        self.erase_page(source)?;
        self.mark_page(target, StatusWord::Valid)
    }

    pub(crate) fn mark_page(&mut self, page: PageId, status: StatusWord) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("mark_page: {} {}", page, defmt::Debug2Format(&status));

        #[cfg(feature = "debug-logs")]
        println!("  internal: mark_page {page:?} {status:?}");

        raw::write_status(&mut self.hal, self.geometry.page_address(page), status)
    }

    /// Erases all sectors of a page, stops at the first failing sector.
    pub(crate) fn erase_page(&mut self, page: PageId) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("erase_page: {}", page);

        #[cfg(feature = "debug-logs")]
        println!("  internal: erase_page {page:?}");

        let page_address = self.geometry.page_address(page);
        let sector_size = self.geometry.sector_size();
        for sector in 0..self.geometry.sector_count() {
            let from = page_address + sector * sector_size;
            self.hal
                .erase(from, from + sector_size)
                .map_err(Error::flash)?;
        }

        Ok(())
    }

    pub(crate) fn format_pages(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        warn!("format_pages: discarding all records");

        #[cfg(feature = "debug-logs")]
        println!("internal: format_pages");

        self.erase_page(PageId::Page0)?;
        self.erase_page(PageId::Page1)?;
        self.mark_page(PageId::Page0, StatusWord::Valid)
    }

    pub(crate) fn page_statistics(&mut self, page: PageId) -> Result<PageStatistics, Error> {
        let mut statistics = PageStatistics {
            status: self.page_status(page)?,
            used: 0,
            empty: 0,
            torn: 0,
        };

        for slot in 1..=self.geometry.max_keys() {
            let record = raw::read_slot(&mut self.hal, self.geometry.slot_address(page, slot))?;
            if record.is_free() {
                statistics.empty += 1;
            } else {
                statistics.used += 1;
                if record.is_torn() {
                    statistics.torn += 1;
                }
            }
        }

        Ok(statistics)
    }
}
