use super::entry::{PagemapEntry, PAGEMAP_ENTRY_SIZE};
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::types::{page_size, umem, Address, PhysicalAddress};

use log::{info, trace};

use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;

/// A random-access byte stream of pagemap entries.
///
/// Reading 8 bytes at offset `vpn * 8` yields the raw entry for virtual page `vpn`.
/// The stream may return less data than requested, the translator takes care of retrying.
pub trait PagemapSource {
    /// Reads into `buf` starting at `offset` and returns the number of bytes read.
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}

impl PagemapSource for File {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        <File as FileExt>::read_at(self, buf, offset)
    }
}

impl<T: PagemapSource + ?Sized> PagemapSource for &mut T {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }
}

/// Translates virtual addresses of a process into physical addresses
/// by looking them up in the page table view the kernel exposes in procfs.
///
/// # Remarks
///
/// Reading frame numbers requires `CAP_SYS_ADMIN`, without it the kernel reports zeroes.
///
/// # Examples
///
/// ```no_run
/// use memprobe::pagemap::AddressTranslator;
/// use memprobe::types::Address;
///
/// let buf = vec![0u8; 64];
/// let mut translator = AddressTranslator::open().unwrap();
/// let paddr = translator.translate(Address::from(buf.as_ptr())).unwrap();
/// println!("buf @ {}", paddr);
/// ```
pub struct AddressTranslator<S = File> {
    source: S,
    page_size: usize,
}

impl AddressTranslator<File> {
    /// Opens the pagemap of the calling process.
    pub fn open() -> Result<Self> {
        Self::open_path("/proc/self/pagemap")
    }

    /// Opens the pagemap of the process with the given pid.
    pub fn with_pid(pid: u32) -> Result<Self> {
        Self::open_path(format!("/proc/{}/pagemap", pid))
    }

    /// Opens a pagemap file at an arbitrary path.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| {
            Error(ErrorOrigin::Pagemap, ErrorKind::PermissionOrAvailability)
                .log_error(format!("unable to open {}: {}", path.display(), err))
        })?;
        Ok(Self::with_source(file, page_size()))
    }
}

impl<S: PagemapSource> AddressTranslator<S> {
    /// Creates a translator on top of an already opened pagemap source.
    ///
    /// The page size must be a power of 2.
    pub fn with_source(source: S, page_size: usize) -> Self {
        Self { source, page_size }
    }

    /// Returns the page size used to split virtual addresses.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Consumes the translator and returns the underlying source.
    pub fn into_inner(self) -> S {
        self.source
    }

    /// Reads and decodes the pagemap entry of the page containing `virt`.
    pub fn entry(&mut self, virt: Address) -> Result<PagemapEntry> {
        let vpn = virt.page_number(self.page_size);
        let offset = vpn
            .checked_mul(PAGEMAP_ENTRY_SIZE as umem)
            .ok_or_else(|| {
                Error(ErrorOrigin::Pagemap, ErrorKind::TranslationRead)
                    .log_error(format!("virtual page {:x} is out of range", vpn))
            })?;

        let mut buf = [0u8; PAGEMAP_ENTRY_SIZE];
        let mut nread = 0;
        while nread < buf.len() {
            match self.source.read_at(&mut buf[nread..], offset + nread as u64) {
                Ok(0) => {
                    return Err(Error(ErrorOrigin::Pagemap, ErrorKind::TranslationRead)
                        .log_error(format!(
                            "short read at offset {:x} ({} of {} bytes)",
                            offset,
                            nread,
                            buf.len()
                        )));
                }
                Ok(n) => nread += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    return Err(Error(ErrorOrigin::Pagemap, ErrorKind::TranslationRead)
                        .log_error(format!("read at offset {:x} failed: {}", offset, err)));
                }
            }
        }

        let entry = PagemapEntry::from_le_bytes(buf);
        trace!("pagemap entry for {}: {:?}", virt, entry);
        Ok(entry)
    }

    /// Translates `virt` into the physical address currently backing it.
    ///
    /// The result is only valid at the time of the call.
    /// It should be handed to the hardware right away and not be kept across allocations.
    pub fn translate(&mut self, virt: Address) -> Result<PhysicalAddress> {
        let entry = self.entry(virt)?;

        if !entry.present() {
            return Err(Error(ErrorOrigin::Pagemap, ErrorKind::AbsentPage).log_error(
                format!(
                    "{} is not backed by a frame (swapped: {})",
                    virt,
                    entry.swapped()
                ),
            ));
        }

        // user pages never live in frame 0, a zero pfn means the kernel hid it from us
        let pfn = entry.page_frame_number();
        if pfn == 0 {
            return Err(
                Error(ErrorOrigin::Pagemap, ErrorKind::PermissionOrAvailability).log_error(
                    format!(
                        "page frame number of {} is hidden (missing CAP_SYS_ADMIN)",
                        virt
                    ),
                ),
            );
        }

        let address = pfn
            .checked_mul(self.page_size as umem)
            .and_then(|base| base.checked_add(virt.page_offset(self.page_size) as umem))
            .map(Address::from)
            .ok_or_else(|| {
                Error(ErrorOrigin::Pagemap, ErrorKind::TranslationRead).log_error(format!(
                    "frame {:x} of {} is outside of the physical address space",
                    pfn, virt
                ))
            })?;
        Ok(PhysicalAddress::with_page(address, self.page_size))
    }

    /// Translates `virt` and logs the virtual/physical pair under the given label.
    pub fn translate_labeled(&mut self, label: &str, virt: Address) -> Result<PhysicalAddress> {
        let paddr = self.translate(virt)?;
        info!("{}: virt @ {}, phys @ {}", label, virt, paddr);
        Ok(paddr)
    }
}

/// Translates a virtual address of the calling process in one shot.
///
/// The pagemap is opened for this single lookup and closed again before returning.
pub fn virt_to_phys(label: &str, virt: Address) -> Result<PhysicalAddress> {
    AddressTranslator::open()?.translate_labeled(label, virt)
}
