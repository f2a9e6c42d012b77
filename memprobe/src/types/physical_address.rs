/*!
Abstraction over a physical address with information about its containing page.
*/

use super::{umem, Address};

use std::fmt;

/// This type represents a wrapper over an [address](super::Address)
/// with additional information about the containing page in the physical memory domain.
///
/// It is produced by the [pagemap translation](crate::pagemap::AddressTranslator).
/// The value is a snapshot: the kernel is free to migrate or swap out the page afterwards.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysicalAddress {
    address: Address,
    page_size: usize,
}

impl PhysicalAddress {
    /// Constructs a new `PhysicalAddress` from an `Address` and the
    /// size of the page it is contained in.
    ///
    /// Note: The page size must be a power of 2.
    #[inline]
    pub const fn with_page(address: Address, page_size: usize) -> Self {
        Self { address, page_size }
    }

    /// Returns the address of this physical address.
    #[inline]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Returns the size of the page this physical address is contained in.
    #[inline]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the base address of the containing page.
    #[inline]
    pub const fn page_base(&self) -> Address {
        self.address.as_page_aligned(self.page_size)
    }

    /// Returns the frame number of the containing page.
    #[inline]
    pub const fn page_frame_number(&self) -> umem {
        self.address.page_number(self.page_size)
    }

    /// Returns the containing address converted to a raw [`umem`].
    #[inline]
    pub const fn to_umem(self) -> umem {
        self.address.to_umem()
    }
}

impl From<PhysicalAddress> for Address {
    fn from(paddr: PhysicalAddress) -> Self {
        paddr.address
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "PhysicalAddress {{ address: {:x}, page_size: {:x} }}",
            self.address, self.page_size
        )
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.address, f)
    }
}
