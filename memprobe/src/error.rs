/*!
Specialized `Error` and `Result` types for memprobe.
*/

use std::{error, fmt, result};

use log::{debug, error, info, trace, warn};

/// An error is described by where it happened and what went wrong.
///
/// Every failure in this crate is fatal for the operation that produced it.
/// Nothing is retried and no fallback value is ever substituted, so the caller
/// decides whether the process should terminate.
///
/// The error itself only carries origin and kind. Details like the offending
/// address, offset or frame number are logged where the error is created,
/// through the `log_*` helpers.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Error(pub ErrorOrigin, pub ErrorKind);

impl Error {
    /// Returns a static string representing the type of error.
    pub fn as_str(&self) -> &'static str {
        self.1.to_str()
    }

    /// Returns a static string representing the type of error.
    pub fn into_str(self) -> &'static str {
        self.as_str()
    }

    /// Returns the component the error originated from.
    pub const fn origin(&self) -> ErrorOrigin {
        self.0
    }

    /// Returns the kind of the error.
    pub const fn kind(&self) -> ErrorKind {
        self.1
    }

    pub fn log_error(self, err: impl fmt::Display) -> Self {
        error!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }

    pub fn log_warn(self, err: impl fmt::Display) -> Self {
        warn!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }

    pub fn log_info(self, err: impl fmt::Display) -> Self {
        info!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }

    pub fn log_debug(self, err: impl fmt::Display) -> Self {
        debug!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }

    pub fn log_trace(self, err: impl fmt::Display) -> Self {
        trace!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.0.to_str(), self.1.to_str())
    }
}

impl error::Error for Error {}

#[repr(u16)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorOrigin {
    Pagemap,
    RegisterWindow,
    Poll,
    Config,

    Other,
}

impl ErrorOrigin {
    /// Returns a static string representing the type of error.
    pub fn to_str(self) -> &'static str {
        match self {
            ErrorOrigin::Pagemap => "pagemap",
            ErrorOrigin::RegisterWindow => "register window",
            ErrorOrigin::Poll => "poll",
            ErrorOrigin::Config => "config",

            ErrorOrigin::Other => "other",
        }
    }
}

#[repr(u16)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// A privileged resource (pagemap, physical memory device, mapping) could not be acquired.
    PermissionOrAvailability,
    /// The positioned read of a pagemap entry came back short or failed.
    TranslationRead,
    /// The page backing a virtual address is not resident.
    AbsentPage,
    /// A register access fell outside of the mapped window.
    OutOfRangeAccess,
    /// A bounded wait ran out of iterations or time.
    Timeout,

    UnalignedAccess,
    WindowClosed,
    InvalidWindow,

    Configuration,
    UnableToReadFile,
    UnableToWriteFile,

    Unknown,
}

impl ErrorKind {
    /// Returns a static string representing the type of error.
    pub fn to_str(self) -> &'static str {
        match self {
            ErrorKind::PermissionOrAvailability => "privileged resource is not available",
            ErrorKind::TranslationRead => "unable to read page table entry",
            ErrorKind::AbsentPage => "page is not present",
            ErrorKind::OutOfRangeAccess => "access outside of the mapped window",
            ErrorKind::Timeout => "timed out",

            ErrorKind::UnalignedAccess => "unaligned register access",
            ErrorKind::WindowClosed => "register window is closed",
            ErrorKind::InvalidWindow => "invalid register window",

            ErrorKind::Configuration => "configuration error",
            ErrorKind::UnableToReadFile => "unable to read file",
            ErrorKind::UnableToWriteFile => "unable to write file",

            ErrorKind::Unknown => "unknown error",
        }
    }
}

/// Specialized `Result` type for memprobe results.
pub type Result<T> = result::Result<T, Error>;
