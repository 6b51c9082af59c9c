use crate::PageId;
use crate::error::Error;
use crate::raw::{ERASED_HALF_WORD, RECORD_SIZE};
use embedded_storage::nor_flash::NorFlash;

/// Placement of the two pages in flash. Each page spans `sector_count` consecutive sectors and
/// page 1 directly follows page 0.
///
/// ```text
/// +-----------------------------+-----------------------------+
/// |           PAGE 0            |           PAGE 1            |
/// +---------+-------+-----------+---------+-------+-----------+
/// | sector0 |  ...  | sector N  | sector0 |  ...  | sector N  |
/// +---------+-------+-----------+---------+-------+-----------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Geometry {
    base_address: u32,
    sector_size: u32,
    sector_count: u32,
}

impl Default for Geometry {
    /// One 2 KiB sector per page, starting at offset 0.
    fn default() -> Self {
        Self::new(0, 2048, 1)
    }
}

impl Geometry {
    pub const fn new(base_address: u32, sector_size: u32, sector_count: u32) -> Self {
        Self {
            base_address,
            sector_size,
            sector_count,
        }
    }

    /// Places both pages into the last `2 * sector_size * sector_count` bytes of a flash with
    /// the given capacity.
    pub fn at_end_of_flash(
        capacity: usize,
        sector_size: u32,
        sector_count: u32,
    ) -> Result<Self, Error> {
        let pages = (sector_size as usize)
            .checked_mul(sector_count as usize)
            .and_then(|page_size| page_size.checked_mul(2))
            .ok_or(Error::InvalidSectorCount)?;

        let base_address = capacity
            .checked_sub(pages)
            .and_then(|base| u32::try_from(base).ok())
            .ok_or(Error::InvalidBaseAddress)?;

        Ok(Self::new(base_address, sector_size, sector_count))
    }

    pub const fn base_address(&self) -> u32 {
        self.base_address
    }

    pub const fn sector_size(&self) -> u32 {
        self.sector_size
    }

    pub const fn sector_count(&self) -> u32 {
        self.sector_count
    }

    pub const fn page_size(&self) -> u32 {
        self.sector_size * self.sector_count
    }

    pub const fn page_address(&self, page: PageId) -> u32 {
        self.base_address + page as u32 * self.page_size()
    }

    /// Number of distinct keys, one less than the slots of a page as the first slot holds the
    /// page status.
    pub const fn max_keys(&self) -> u16 {
        (self.page_size() / RECORD_SIZE - 1) as u16
    }

    pub(crate) fn slot_address(&self, page: PageId, slot: u16) -> u32 {
        self.page_address(page) + slot as u32 * RECORD_SIZE
    }

    pub(crate) fn validate<T: NorFlash>(&self, hal: &T) -> Result<(), Error> {
        if !matches!(T::WRITE_SIZE, 1 | 2 | 4) || !(RECORD_SIZE as usize).is_multiple_of(T::READ_SIZE)
        {
            return Err(Error::UnsupportedFlash);
        }

        if self.sector_size == 0
            || !(self.sector_size as usize).is_multiple_of(T::ERASE_SIZE)
            || !self.sector_size.is_multiple_of(RECORD_SIZE)
        {
            return Err(Error::InvalidSectorSize);
        }

        let page_size = match self.sector_size.checked_mul(self.sector_count) {
            Some(page_size) if self.sector_count > 0 => page_size,
            _ => return Err(Error::InvalidSectorCount),
        };
        // the erased key must never be a valid key
        let slots = page_size / RECORD_SIZE;
        if slots < 2 || slots - 1 >= ERASED_HALF_WORD as u32 {
            return Err(Error::InvalidSectorCount);
        }

        if !(self.base_address as usize).is_multiple_of(T::ERASE_SIZE) {
            return Err(Error::InvalidBaseAddress);
        }

        let end = (self.base_address as usize)
            .checked_add(2 * page_size as usize)
            .ok_or(Error::InvalidBaseAddress)?;
        if end > hal.capacity() || end > u32::MAX as usize {
            return Err(Error::InvalidBaseAddress);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_sizes() {
        let geometry = Geometry::new(0x0800_F000, 1024, 2);
        assert_eq!(geometry.page_size(), 2048);
        assert_eq!(geometry.max_keys(), 511);
        assert_eq!(geometry.page_address(PageId::Page0), 0x0800_F000);
        assert_eq!(geometry.page_address(PageId::Page1), 0x0800_F800);
        assert_eq!(geometry.slot_address(PageId::Page1, 511), 0x0800_FFFC);
    }

    #[test]
    fn default_is_one_two_kib_sector() {
        assert_eq!(Geometry::default().page_size(), 2048);
        assert_eq!(Geometry::default().max_keys(), 511);
    }

    #[test]
    fn placed_at_end_of_flash() {
        let geometry = Geometry::at_end_of_flash(64 * 1024, 2048, 1).unwrap();
        assert_eq!(geometry.base_address(), 60 * 1024);
        assert_eq!(
            Geometry::at_end_of_flash(2048, 2048, 1),
            Err(Error::InvalidBaseAddress)
        );
    }
}
