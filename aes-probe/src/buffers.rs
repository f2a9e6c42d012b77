/*!
Input and output buffers handed to the engine.
*/

use std::fmt;

use memmap::MmapMut;

use memprobe::error::{Error, ErrorKind, ErrorOrigin, Result};
use memprobe::types::{page_size, Address};

/// A pair of dma buffers.
///
/// Each buffer lives on its own page-aligned anonymous mapping. A buffer never crosses a page
/// boundary, so the single physical address programmed into the engine describes all of it.
/// Both pages are written to on creation, which makes the kernel back them with a frame
/// before they are translated.
pub struct ProbeBuffers {
    input: MmapMut,
    output: MmapMut,
    len: usize,
}

impl ProbeBuffers {
    /// Allocates both buffers with `len` bytes each and copies `message` into the input buffer.
    pub fn new(message: &[u8], len: usize) -> Result<Self> {
        if len == 0 || len > page_size() || message.len() > len {
            return Err(Error(ErrorOrigin::Other, ErrorKind::Configuration).log_error(format!(
                "unable to place {} bytes into a {} byte buffer",
                message.len(),
                len
            )));
        }

        let mut input = touched_page()?;
        input[..message.len()].copy_from_slice(message);
        let output = touched_page()?;

        Ok(Self { input, output, len })
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn input(&self) -> &[u8] {
        &self.input[..self.len]
    }

    pub fn output(&self) -> &[u8] {
        &self.output[..self.len]
    }

    /// Virtual address of the input buffer.
    pub fn input_addr(&self) -> Address {
        Address::from(self.input.as_ptr())
    }

    /// Virtual address of the output buffer.
    pub fn output_addr(&self) -> Address {
        Address::from(self.output.as_ptr())
    }
}

fn touched_page() -> Result<MmapMut> {
    let mut page = MmapMut::map_anon(page_size()).map_err(|err| {
        Error(ErrorOrigin::Other, ErrorKind::PermissionOrAvailability).log_error(err)
    })?;
    // writing (not reading) forces a private frame instead of the shared zero page
    page.iter_mut().for_each(|b| *b = 0);
    Ok(page)
}

impl fmt::Debug for ProbeBuffers {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ProbeBuffers")
            .field("input", &self.input_addr())
            .field("output", &self.output_addr())
            .field("len", &self.len)
            .finish()
    }
}
