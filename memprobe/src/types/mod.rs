/*!
Module with basic types used in memprobe.

This module contains types for handling virtual and physical addresses
and it exposes different size helpers.
*/

pub mod address;
#[doc(hidden)]
pub use address::{umem, Address};

pub mod size;
#[doc(hidden)]
pub use size::page_size;

pub mod physical_address;
#[doc(hidden)]
pub use physical_address::PhysicalAddress;
