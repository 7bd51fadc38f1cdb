use embedded_storage::nor_flash::NorFlash;

/// Everything the store needs from the board: raw NOR flash plus the brownout detector.
pub trait Platform: Brownout + NorFlash {}

impl<T: Brownout + NorFlash> Platform for T {}

/// Supply voltage supervision. Consulted before every program and erase operation.
pub trait Brownout {
    /// Returns `true` while the supply is too low for flash to be modified safely.
    fn is_active(&self) -> bool;
}

impl<T: Brownout> Brownout for &mut T {
    fn is_active(&self) -> bool {
        T::is_active(self)
    }
}

pub(crate) trait AlignedOps: Platform {
    /// Smallest block multiple holding `size` bytes.
    fn align_block_ceil(size: usize) -> usize {
        block_floor(size.saturating_add(Self::ERASE_SIZE - 1), Self::ERASE_SIZE)
    }

    /// Start of the block holding `addr`.
    fn align_block_floor(addr: usize) -> usize {
        block_floor(addr, Self::ERASE_SIZE)
    }
}

#[inline(always)]
const fn block_floor(addr: usize, block: usize) -> usize {
    addr - addr % block
}

impl<T: Platform> AlignedOps for T {}
