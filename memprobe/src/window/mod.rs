/*!
Bounds checked 32-bit register access over a mapped window of physical memory.

A `RegisterWindow` owns exactly one mapping of a peripheral's register block.
Every access is validated against the window and issued as a single volatile
32-bit load or store, so accesses reach the device in program order and are
never split into narrower transactions.
*/

use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::poll::{poll_until, PollConfig};
use crate::types::{page_size, umem, Address};

use log::{debug, info, trace};
use memmap::{MmapMut, MmapOptions};

use std::fmt;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// Width of a single register in bytes.
pub const REGISTER_SIZE: usize = 4;

/// Character device exposing the physical address space.
pub const DEV_MEM: &str = "/dev/mem";

/// A mapped window of physical memory containing device registers.
///
/// The mapping is released by [`close`](Self::close) or when the window is dropped,
/// whichever comes first.
///
/// # Examples
///
/// ```
/// use memprobe::types::Address;
/// use memprobe::window::RegisterWindow;
///
/// // ram backed, behaves like a register block without side effects
/// let mut window = RegisterWindow::anonymous(Address::from(0x1000_0000u64), 0x100).unwrap();
///
/// window.write32(Address::from(0x1000_0020u64), 0xdead_beef).unwrap();
/// assert_eq!(window.read32(Address::from(0x1000_0020u64)).unwrap(), 0xdead_beef);
///
/// assert!(window.write32(Address::from(0x1000_0120u64), 0).is_err());
/// ```
pub struct RegisterWindow {
    base: Address,
    size: usize,
    mapping: Option<MmapMut>,
    file: Option<File>,
}

impl RegisterWindow {
    /// Maps `size` bytes of physical memory starting at `base` through `/dev/mem`.
    ///
    /// `base` must be page aligned. The kernel rounds the mapping up to whole pages,
    /// accesses are still limited to `size` bytes.
    pub fn open(base: Address, size: usize) -> Result<Self> {
        Self::open_path(DEV_MEM, base, size)
    }

    /// Maps `size` bytes starting at offset `base` of the given character device.
    pub fn open_path<P: AsRef<Path>>(path: P, base: Address, size: usize) -> Result<Self> {
        Self::validate(base, size)?;
        if !base.is_aligned(page_size()) {
            return Err(Error(ErrorOrigin::RegisterWindow, ErrorKind::InvalidWindow)
                .log_error(format!("base {} is not page aligned", base)));
        }

        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(path)
            .map_err(|err| {
                Error(ErrorOrigin::RegisterWindow, ErrorKind::PermissionOrAvailability)
                    .log_error(format!("unable to open {}: {}", path.display(), err))
            })?;

        let mapping = unsafe {
            MmapOptions::new()
                .offset(base.to_umem())
                .len(size)
                .map_mut(&file)
        }
        .map_err(|err| {
            Error(ErrorOrigin::RegisterWindow, ErrorKind::PermissionOrAvailability).log_error(
                format!("unable to map {:x} bytes at {}: {}", size, base, err),
            )
        })?;

        info!(
            "mapped {} bytes of {} at {}",
            size,
            path.display(),
            base
        );

        Ok(Self {
            base,
            size,
            mapping: Some(mapping),
            file: Some(file),
        })
    }

    /// Creates a window backed by anonymous memory instead of a device.
    ///
    /// Reads return whatever was last written, which makes this useful for dry runs and tests.
    pub fn anonymous(base: Address, size: usize) -> Result<Self> {
        Self::validate(base, size)?;

        let mapping = MmapMut::map_anon(size).map_err(|err| {
            Error(ErrorOrigin::RegisterWindow, ErrorKind::PermissionOrAvailability)
                .log_error(format!("unable to map {:x} anonymous bytes: {}", size, err))
        })?;
        debug!("mapped {} anonymous bytes standing in for {}", size, base);

        Ok(Self {
            base,
            size,
            mapping: Some(mapping),
            file: None,
        })
    }

    fn validate(base: Address, size: usize) -> Result<()> {
        if size < REGISTER_SIZE {
            return Err(Error(ErrorOrigin::RegisterWindow, ErrorKind::InvalidWindow)
                .log_error(format!("window of {} bytes cannot hold a register", size)));
        }
        if base.checked_add(size).is_none() {
            return Err(Error(ErrorOrigin::RegisterWindow, ErrorKind::InvalidWindow)
                .log_error(format!("window {} + {:x} overflows", base, size)));
        }
        if !base.is_aligned(REGISTER_SIZE) {
            return Err(Error(ErrorOrigin::RegisterWindow, ErrorKind::InvalidWindow)
                .log_error(format!("base {} is not register aligned", base)));
        }
        Ok(())
    }

    /// Returns the physical base address of the window.
    #[inline]
    pub fn base(&self) -> Address {
        self.base
    }

    /// Returns the number of accessible bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns true until the window has been closed.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.mapping.is_some()
    }

    /// Checks whether a whole register at `addr` lies inside of the window.
    pub fn contains(&self, addr: Address) -> bool {
        addr.to_umem()
            .checked_sub(self.base.to_umem())
            .and_then(|offset| offset.checked_add(REGISTER_SIZE as umem))
            .map_or(false, |end| end <= self.size as umem)
    }

    fn offset_of(&self, addr: Address) -> Result<usize> {
        if !self.contains(addr) {
            return Err(
                Error(ErrorOrigin::RegisterWindow, ErrorKind::OutOfRangeAccess).log_error(
                    format!(
                        "{} is outside of {}..{}",
                        addr,
                        self.base,
                        self.base + self.size
                    ),
                ),
            );
        }
        if !addr.is_aligned(REGISTER_SIZE) {
            return Err(Error(ErrorOrigin::RegisterWindow, ErrorKind::UnalignedAccess)
                .log_error(format!("{} is not {} byte aligned", addr, REGISTER_SIZE)));
        }
        Ok(addr - self.base)
    }

    /// Reads the 32-bit register at `addr`.
    ///
    /// The load is volatile since reading a register may have side effects on the device.
    pub fn read32(&self, addr: Address) -> Result<u32> {
        let offset = self.offset_of(addr)?;
        let mapping = self
            .mapping
            .as_ref()
            .ok_or_else(|| closed_error(self.base))?;

        // offset is register aligned and the mapping itself is page aligned
        let value = unsafe { mapping.as_ptr().add(offset).cast::<u32>().read_volatile() };
        trace!("read32 {} => {:08x}", addr, value);
        Ok(value)
    }

    /// Writes `value` to the 32-bit register at `addr` as a single volatile store.
    pub fn write32(&mut self, addr: Address, value: u32) -> Result<()> {
        let offset = self.offset_of(addr)?;
        let base = self.base;
        let mapping = self
            .mapping
            .as_mut()
            .ok_or_else(|| closed_error(base))?;

        debug!("write32 {} <= {:08x}", addr, value);
        unsafe {
            mapping
                .as_mut_ptr()
                .add(offset)
                .cast::<u32>()
                .write_volatile(value)
        };
        Ok(())
    }

    /// Reads the register at `addr`, passes it through `f` and writes the result back.
    ///
    /// Returns the value that was written.
    pub fn modify32<F: FnOnce(u32) -> u32>(&mut self, addr: Address, f: F) -> Result<u32> {
        let value = f(self.read32(addr)?);
        self.write32(addr, value)?;
        Ok(value)
    }

    /// Reads `len` bytes worth of registers starting at the window base.
    pub fn dump(&self, len: usize) -> Result<Vec<(Address, u32)>> {
        (0..len)
            .step_by(REGISTER_SIZE)
            .map(|offset| {
                let addr = self.base + offset;
                self.read32(addr).map(|value| (addr, value))
            })
            .collect()
    }

    /// Polls the register at `addr` until all bits in `mask` are cleared.
    ///
    /// Returns the last value read. Fails with [`ErrorKind::Timeout`] once the bounds of
    /// `config` are exhausted.
    pub fn poll_clear(&self, addr: Address, mask: u32, config: &PollConfig) -> Result<u32> {
        poll_until(config, || self.read32(addr), |value| value & mask == 0)
    }

    /// Unmaps the window and closes the backing device.
    ///
    /// Calling this more than once is a no-op.
    pub fn close(&mut self) {
        if let Some(mapping) = self.mapping.take() {
            drop(mapping);
            info!("unmapped window at {}", self.base);
        }
        self.file.take();
    }
}

fn closed_error(base: Address) -> Error {
    Error(ErrorOrigin::RegisterWindow, ErrorKind::WindowClosed)
        .log_error(format!("window at {} was already closed", base))
}

impl Drop for RegisterWindow {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for RegisterWindow {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RegisterWindow")
            .field("base", &self.base)
            .field("size", &format_args!("{:x}", self.size))
            .field("open", &self.is_open())
            .field("device", &self.file.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests;
