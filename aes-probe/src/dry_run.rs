/*!
A pagemap stand-in for runs without privileges.
*/

use std::io;

use memprobe::pagemap::entry::PFN_MASK;
use memprobe::pagemap::{PagemapFlags, PagemapSource, PAGEMAP_ENTRY_SIZE};

/// Frames handed out stay below this address so they fit the 32-bit address registers.
const FRAME_LIMIT: u64 = 1 << 32;

/// Reports every page as present and folds its page number into frames 1.. of the low 4 GiB.
///
/// The page offset of an address is kept, so translated buffers stay recognizable in dumps.
#[derive(Copy, Clone, Debug)]
pub struct FoldedPagemap {
    page_size: usize,
}

impl FoldedPagemap {
    pub fn new(page_size: usize) -> Self {
        Self { page_size }
    }

    fn entry(&self, vpn: u64) -> u64 {
        // frame 0 is what the kernel reports for hidden frames, so skip it
        let frames = FRAME_LIMIT / self.page_size as u64 - 1;
        PagemapFlags::PRESENT.bits() | ((1 + vpn % frames) & PFN_MASK)
    }
}

impl PagemapSource for FoldedPagemap {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let entry_size = PAGEMAP_ENTRY_SIZE as u64;
        for (pos, byte) in (offset..).zip(buf.iter_mut()) {
            let bytes = self.entry(pos / entry_size).to_le_bytes();
            *byte = bytes[(pos % entry_size) as usize];
        }
        Ok(buf.len())
    }
}
