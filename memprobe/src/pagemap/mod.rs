/*!
Virtual to physical address translation through the linux pagemap interface.

Peripherals that perform dma only understand physical addresses.
This module resolves the frame backing a buffer of the calling process so that
its physical address can be programmed into the hardware.
*/

pub mod entry;
#[doc(hidden)]
pub use entry::{PagemapEntry, PagemapFlags, PAGEMAP_ENTRY_SIZE};

pub mod translator;
#[doc(hidden)]
pub use translator::{virt_to_phys, AddressTranslator, PagemapSource};
