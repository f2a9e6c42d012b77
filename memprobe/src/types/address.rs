/*!
Abstraction over an address in either the virtual or the physical domain.
*/

use std::fmt;
use std::ops;

/// The memory type used for every address and frame computation.
///
/// Physical addresses on 32-bit hosts with LPAE can exceed `usize`,
/// so this is always 64 bits wide.
#[allow(non_camel_case_types)]
pub type umem = u64;

/// This type represents an address on the host system.
///
/// It does not carry any information on which address space it belongs to.
/// The context it is used in decides whether it is a virtual or a physical address.
///
/// This type will not handle overflow.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct Address(umem);

impl Address {
    /// A address with the value of zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use memprobe::types::Address;
    ///
    /// println!("address: {}", Address::NULL);
    /// ```
    pub const NULL: Address = Address(0);

    /// A address with an invalid value.
    pub const INVALID: Address = Address(!0);

    /// Returns an address with a value of zero.
    #[inline]
    pub const fn null() -> Self {
        Address::NULL
    }

    /// Checks wether the address is zero or not.
    ///
    /// # Examples
    ///
    /// ```
    /// use memprobe::types::Address;
    ///
    /// assert_eq!(Address::null().is_null(), true);
    /// assert_eq!(Address::from(0x1000u64).is_null(), false);
    /// ```
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Checks wether the address is valid or not.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != !0
    }

    /// Returns the address aligned down to the given page size.
    ///
    /// The page size must be a power of 2.
    ///
    /// # Examples
    ///
    /// ```
    /// use memprobe::types::Address;
    ///
    /// assert_eq!(Address::from(0x1234u64).as_page_aligned(0x1000), Address::from(0x1000u64));
    /// ```
    #[inline]
    pub const fn as_page_aligned(self, page_size: usize) -> Address {
        Address(self.0 - self.0 % (page_size as umem))
    }

    /// Returns the offset of this address inside of its containing page.
    #[inline]
    pub const fn page_offset(self, page_size: usize) -> usize {
        (self.0 % (page_size as umem)) as usize
    }

    /// Returns the index of the page containing this address.
    #[inline]
    pub const fn page_number(self, page_size: usize) -> umem {
        self.0 / (page_size as umem)
    }

    /// Checks wether the address is a multiple of `align`.
    #[inline]
    pub const fn is_aligned(self, align: usize) -> bool {
        self.0 % (align as umem) == 0
    }

    /// Returns the raw address value.
    #[inline]
    pub const fn to_umem(self) -> umem {
        self.0
    }

    /// Converts the address into a `usize`, truncating on 32-bit hosts.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Adds `rhs` to the address, returning `None` on overflow.
    #[inline]
    pub fn checked_add(self, rhs: usize) -> Option<Address> {
        self.0.checked_add(rhs as umem).map(Address)
    }
}

impl From<umem> for Address {
    #[inline]
    fn from(item: umem) -> Self {
        Self(item)
    }
}

impl From<u32> for Address {
    #[inline]
    fn from(item: u32) -> Self {
        Self(item as umem)
    }
}

impl From<usize> for Address {
    #[inline]
    fn from(item: usize) -> Self {
        Self(item as umem)
    }
}

impl<T> From<*const T> for Address {
    #[inline]
    fn from(ptr: *const T) -> Self {
        Self(ptr as usize as umem)
    }
}

impl<T> From<*mut T> for Address {
    #[inline]
    fn from(ptr: *mut T) -> Self {
        Self(ptr as usize as umem)
    }
}

impl From<Address> for umem {
    #[inline]
    fn from(address: Address) -> Self {
        address.0
    }
}

impl ops::Add<usize> for Address {
    type Output = Self;

    fn add(self, other: usize) -> Self {
        Self(self.0 + other as umem)
    }
}

impl ops::AddAssign<usize> for Address {
    fn add_assign(&mut self, other: usize) {
        *self = Self(self.0 + other as umem)
    }
}

/// Subtracting two addresses yields the distance between them.
impl ops::Sub for Address {
    type Output = usize;

    fn sub(self, other: Self) -> usize {
        (self.0 - other.0) as usize
    }
}

impl ops::Sub<usize> for Address {
    type Output = Address;

    fn sub(self, other: usize) -> Address {
        Self(self.0 - other as umem)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl fmt::UpperHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::UpperHex::fmt(&self.0, f)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}
