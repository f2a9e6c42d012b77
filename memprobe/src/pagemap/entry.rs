/*!
Decoding of a single `/proc/<pid>/pagemap` entry.

Every virtual page of a process is described by one little-endian 64-bit word:

```text
 63   62   61   60..58  57      56    55          54..0
+----+----+----+-------+-------+-----+-----------+------------------------+
| PR | SW | FP | zero  | UFFD  | EX  | SOFTDIRTY | page frame number      |
+----+----+----+-------+-------+-----+-----------+------------------------+
```

When the page is swapped out bits 0-4 hold the swap type and bits 5-54 the swap offset.
See `Documentation/admin-guide/mm/pagemap.rst` in the linux tree.
*/

use crate::types::umem;

use std::fmt;

/// Size of a single pagemap entry in bytes.
pub const PAGEMAP_ENTRY_SIZE: usize = 8;

/// Bits 0-54 of an entry.
pub const PFN_MASK: u64 = (1 << 55) - 1;

const SWAP_TYPE_MASK: u64 = 0x1f;
const SWAP_OFFSET_SHIFT: u32 = 5;

bitflags! {
    /// Status bits of a pagemap entry.
    #[repr(transparent)]
    pub struct PagemapFlags: u64 {
        /// The pte was written to since the soft-dirty bits were last cleared.
        const SOFT_DIRTY = 1 << 55;
        /// The page is exclusively mapped.
        const EXCLUSIVE = 1 << 56;
        /// The pte is userfaultfd write-protected.
        const UFFD_WP = 1 << 57;
        /// The page is file-backed or shared anonymous memory.
        const FILE_PAGE = 1 << 61;
        /// The page is swapped out.
        const SWAPPED = 1 << 62;
        /// The page is resident in ram.
        const PRESENT = 1 << 63;
    }
}

/// A decoded pagemap entry.
///
/// Entries are transient. They describe the mapping at the time of the read
/// and are never cached since the kernel may populate, migrate or swap the page at any time.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct PagemapEntry(u64);

impl PagemapEntry {
    /// Creates an entry from its raw 64-bit value.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Decodes an entry from the 8 bytes read out of the pagemap file.
    #[inline]
    pub const fn from_le_bytes(bytes: [u8; PAGEMAP_ENTRY_SIZE]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }

    /// Returns the raw 64-bit value of the entry.
    #[inline]
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Returns the status bits of the entry.
    #[inline]
    pub const fn flags(&self) -> PagemapFlags {
        PagemapFlags::from_bits_truncate(self.0)
    }

    /// Returns the page frame number.
    ///
    /// This value is only meaningful when the page is [present](Self::present).
    /// Processes without `CAP_SYS_ADMIN` will see a frame number of zero.
    #[inline]
    pub const fn page_frame_number(&self) -> umem {
        self.0 & PFN_MASK
    }

    #[inline]
    pub const fn soft_dirty(&self) -> bool {
        self.flags().contains(PagemapFlags::SOFT_DIRTY)
    }

    #[inline]
    pub const fn file_page(&self) -> bool {
        self.flags().contains(PagemapFlags::FILE_PAGE)
    }

    #[inline]
    pub const fn swapped(&self) -> bool {
        self.flags().contains(PagemapFlags::SWAPPED)
    }

    #[inline]
    pub const fn present(&self) -> bool {
        self.flags().contains(PagemapFlags::PRESENT)
    }

    /// Returns the swap type of a swapped out page.
    pub const fn swap_type(&self) -> Option<u64> {
        if self.swapped() {
            Some(self.0 & SWAP_TYPE_MASK)
        } else {
            None
        }
    }

    /// Returns the swap offset of a swapped out page.
    pub const fn swap_offset(&self) -> Option<u64> {
        if self.swapped() {
            Some((self.0 & PFN_MASK) >> SWAP_OFFSET_SHIFT)
        } else {
            None
        }
    }
}

impl From<u64> for PagemapEntry {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for PagemapEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PagemapEntry")
            .field("page_frame_number", &format_args!("{:x}", self.page_frame_number()))
            .field("soft_dirty", &self.soft_dirty())
            .field("file_page", &self.file_page())
            .field("swapped", &self.swapped())
            .field("present", &self.present())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_present() {
        let entry = PagemapEntry::from_raw((1 << 63) | (1 << 55) | 0x12345);
        assert!(entry.present());
        assert!(entry.soft_dirty());
        assert!(!entry.swapped());
        assert!(!entry.file_page());
        assert_eq!(entry.page_frame_number(), 0x12345);
        assert_eq!(entry.swap_type(), None);
    }

    #[test]
    fn test_decode_bytes_le() {
        let raw: u64 = (1 << 63) | (1 << 61) | 0x7f_ffff_ffff_ffff;
        let entry = PagemapEntry::from_le_bytes(raw.to_le_bytes());
        assert_eq!(entry.raw(), raw);
        assert_eq!(entry.page_frame_number(), PFN_MASK);
        assert!(entry.file_page());
        assert_eq!(
            entry.flags(),
            PagemapFlags::PRESENT | PagemapFlags::FILE_PAGE
        );
    }

    #[test]
    fn test_decode_swapped() {
        let entry = PagemapEntry::from_raw((1 << 62) | (0xabc << 5) | 0x3);
        assert!(!entry.present());
        assert!(entry.swapped());
        assert_eq!(entry.swap_type(), Some(3));
        assert_eq!(entry.swap_offset(), Some(0xabc));
    }

    #[test]
    fn test_pfn_does_not_leak_flags() {
        let entry = PagemapEntry::from_raw(!0);
        assert_eq!(entry.page_frame_number(), PFN_MASK);
        assert!(entry.present() && entry.swapped() && entry.file_page() && entry.soft_dirty());
    }
}
