// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error handling for bridge operations.

use core::fmt;
use uefi_raw::Status;

/// Errors surfaced by bridge operations.
///
/// Every failure is contained to the operation and adapter that produced it;
/// there is no global failure state. Callers see the error, the log sees a
/// line, and the adapter keeps running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// A firmware call completed with a non-success status.
    Firmware(Status),
    /// The data to copy does not fit the destination buffer. Nothing was
    /// copied.
    BufferTooSmall {
        /// Bytes the copy would have needed.
        required: usize,
        /// Bytes the destination can hold.
        capacity: usize,
    },
    /// The device does not implement the requested operation.
    Unsupported,
}

/// Return type of bridge operations.
pub type Result<T = ()> = core::result::Result<T, Error>;

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Self::Firmware(status)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Firmware(status) => write!(f, "firmware call failed: {status}"),
            Self::BufferTooSmall { required, capacity } => {
                write!(f, "{required} bytes do not fit a {capacity}-byte buffer")
            }
            Self::Unsupported => write!(f, "operation not implemented"),
        }
    }
}

impl core::error::Error for Error {}

/// Extension trait converting raw firmware statuses into bridge results.
pub(crate) trait StatusExt {
    /// Maps success to `Ok(())` and everything else to [`Error::Firmware`].
    fn to_result(self) -> Result;

    /// Maps success to a lazily-built value.
    fn to_result_with_val<T>(self, val: impl FnOnce() -> T) -> Result<T>;
}

impl StatusExt for Status {
    #[inline]
    fn to_result(self) -> Result {
        if self.is_success() {
            Ok(())
        } else {
            Err(Error::Firmware(self))
        }
    }

    #[inline]
    fn to_result_with_val<T>(self, val: impl FnOnce() -> T) -> Result<T> {
        if self.is_success() {
            Ok(val())
        } else {
            Err(Error::Firmware(self))
        }
    }
}
