use embedded_storage::nor_flash::NorFlash;

/// See README.md for an example implementation.
pub trait Platform: FlashGate + NorFlash {}

impl<T: FlashGate + NorFlash> Platform for T {}

/// Global program/erase enable of the flash controller, e.g. the FMC key sequence of STM32 and
/// APM32 parts. Every mutating entry point unlocks the controller once and locks it again on
/// every exit path.
pub trait FlashGate {
    fn unlock(&mut self);

    fn lock(&mut self);
}

impl<T: FlashGate> FlashGate for &mut T {
    fn unlock(&mut self) {
        T::unlock(self)
    }

    fn lock(&mut self) {
        T::lock(self)
    }
}

pub trait AlignedOps: Platform {
    fn align_write_ceil(size: usize) -> usize {
        align_ceil(size, Self::WRITE_SIZE)
    }

    fn align_write_floor(size: usize) -> usize {
        align_floor(size, Self::WRITE_SIZE)
    }
}

#[inline(always)]
const fn align_ceil(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size.saturating_add(alignment - 1) & !(alignment - 1)
    } else {
        size.saturating_add(alignment - 1) / alignment * alignment
    }
}

#[inline(always)]
const fn align_floor(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size & !(alignment - 1)
    } else {
        size / alignment * alignment
    }
}

impl<T: Platform> AlignedOps for T {}

#[cfg(any(
    feature = "esp32",
    feature = "esp32s2",
    feature = "esp32s3",
    feature = "esp32c2",
    feature = "esp32c3",
    feature = "esp32c6",
    feature = "esp32h2",
))]
mod chip {
    use esp_storage::FlashStorage;

    use crate::platform::FlashGate;

    // The SPI flash has no controller lock, esp-storage guards each operation on its own.
    impl FlashGate for FlashStorage<'_> {
        fn unlock(&mut self) {}

        fn lock(&mut self) {}
    }
}
