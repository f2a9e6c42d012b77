//!
//! # memprobe
//!
//! Poking at memory mapped hardware from linux userspace.
//!
//! ## Introduction
//!
//! memprobe provides the two primitives needed to drive a dma capable peripheral
//! from a regular process, without writing a kernel driver:
//!
//! - a [`RegisterWindow`](crate::window::RegisterWindow) maps the register block of the device
//!   through `/dev/mem` and offers bounds checked, volatile 32-bit register access.
//! - an [`AddressTranslator`](crate::pagemap::AddressTranslator) resolves the physical address
//!   backing a buffer of the calling process via `/proc/self/pagemap`, so the buffer can be
//!   handed to the device.
//!
//! ```text
//! +-----------+   virt addr    +-------------------+
//! |  buffers  |--------------->| AddressTranslator |---+
//! +-----------+                +-------------------+   | phys addr
//!                                                      v
//! +-----------+   read32/write32   +----------------+    +--------+
//! |  caller   |------------------->| RegisterWindow |--->| device |
//! +-----------+                    +----------------+    +--------+
//! ```
//!
//! Both need root (or `CAP_SYS_ADMIN` and access to `/dev/mem`).
//! The meaning of the individual registers is entirely up to the caller.
//!
//! ## Getting started
//!
//! ```no_run
//! use memprobe::prelude::v1::*;
//!
//! # fn main() -> Result<()> {
//! let mut window = RegisterWindow::open(Address::from(0x38c0_0000u64), 0x100)?;
//!
//! let buf = vec![0u8; 64];
//! let paddr = virt_to_phys("buf", Address::from(buf.as_ptr()))?;
//!
//! window.write32(window.base() + 0x20, paddr.to_umem() as u32)?;
//! window.poll_clear(window.base() + 0xc, 1, &PollConfig::default())?;
//! # Ok(())
//! # }
//! ```
//!
//! All failures are reported as [`Error`](crate::error::Error) values and never retried.

#[macro_use]
extern crate bitflags;

pub mod error;

pub mod types;

pub mod pagemap;

pub mod window;

pub mod poll;

pub mod dump;

pub mod prelude {
    pub mod v1 {
        pub use crate::dump::*;
        pub use crate::error::*;
        pub use crate::pagemap::*;
        pub use crate::poll::*;
        pub use crate::types::*;
        pub use crate::window::*;
    }
    pub use v1::*;
}
