//! This module contains helper functions for creating various byte sizes.
//! All function are const and will be [optimized](https://rust.godbolt.org/z/T6LiwJ) by rustc.

/// Returns a usize representing the length in bytes from the given number of kilobytes.
pub const fn kb(kb: usize) -> usize {
    kb * 1024
}

/// Returns a usize representing the length in bytes from the given number of megabytes.
pub const fn mb(mb: usize) -> usize {
    kb(mb) * 1024
}

/// Returns a usize representing the length in bytes from the given number of gigabytes.
pub const fn gb(gb: usize) -> usize {
    mb(gb) * 1024
}

/// Returns the page size of the host as reported by the kernel.
///
/// Falls back to 4kb should `sysconf` refuse to answer, which does not happen on linux.
pub fn page_size() -> usize {
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page_size > 0 {
        page_size as usize
    } else {
        kb(4)
    }
}
