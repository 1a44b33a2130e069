// SPDX-License-Identifier: MIT OR Apache-2.0

//! Firmware handle discovery and pre-call housekeeping.
//!
//! Discovery runs once, single-threaded, during module initialization: the
//! [`HandleDirectory`] enumerates the handles carrying a protocol and hands
//! out their interface pointers. [`BootDirectory`] is the production
//! implementation over the resident firmware's boot services table.
//!
//! [`MapRefresh`] is the housekeeping hook that must run before any firmware
//! call once the kernel may have rearranged its virtual memory layout. The
//! call is idempotent and carries no data, so redundant invocations from
//! independent call sites are fine.

use crate::error::{Result, StatusExt};
use core::ffi::c_void;
use core::ptr::{self, NonNull};
use log::warn;
use uefi_raw::table::boot::BootServices;
use uefi_raw::{Guid, Handle, Status};

/// Locate-by-protocol search, `EFI_LOCATE_SEARCH_TYPE` member `ByProtocol`.
const BY_PROTOCOL: i32 = 2;

/// Enumerates firmware handles and resolves their protocol interfaces.
pub trait HandleDirectory {
    /// Fills `out` with the handles supporting `protocol`, in firmware
    /// order, and returns how many were admitted.
    ///
    /// Handles beyond the capacity of `out` are dropped. Zero handles is a
    /// normal outcome, not an error.
    fn locate_handles(&self, protocol: &Guid, out: &mut [Handle]) -> Result<usize>;

    /// Resolves the interface pointer `handle` exposes for `protocol`, or
    /// `None` when the handle does not support it.
    fn handle_protocol(&self, protocol: &Guid, handle: Handle) -> Option<NonNull<c_void>>;
}

/// Pre-firmware-call housekeeping.
pub trait MapRefresh {
    /// Re-registers the kernel's current memory map with the firmware.
    ///
    /// Must be invoked on every path that is about to call into firmware
    /// after the kernel's page-table layout may have changed. Idempotent;
    /// side effects only.
    fn refresh_memory_map(&self);
}

/// [`HandleDirectory`] over the resident firmware's boot services table.
pub struct BootDirectory {
    boot_services: NonNull<BootServices>,
}

impl BootDirectory {
    /// Wraps a raw boot services table.
    ///
    /// # Safety
    ///
    /// `boot_services` must point to a boot services table the resident
    /// firmware keeps valid and callable for the lifetime of this value.
    #[must_use]
    pub unsafe fn new(boot_services: NonNull<BootServices>) -> Self {
        Self { boot_services }
    }

    fn table(&self) -> &BootServices {
        // SAFETY: valid for the lifetime of `self` per the `new` contract.
        unsafe { self.boot_services.as_ref() }
    }
}

impl HandleDirectory for BootDirectory {
    fn locate_handles(&self, protocol: &Guid, out: &mut [Handle]) -> Result<usize> {
        let bs = self.table();
        let mut count = 0usize;
        let mut buffer: *mut Handle = ptr::null_mut();
        let status =
            unsafe { (bs.locate_handle_buffer)(BY_PROTOCOL, protocol, ptr::null(), &mut count, &mut buffer) };
        if status == Status::NOT_FOUND {
            return Ok(0);
        }
        status.to_result()?;

        let admitted = count.min(out.len());
        // SAFETY: firmware filled `buffer` with `count` handles; we copy the
        // prefix we have room for and give the pool allocation back.
        unsafe {
            ptr::copy_nonoverlapping(buffer, out.as_mut_ptr(), admitted);
            let _ = (bs.free_pool)(buffer.cast());
        }
        if admitted < count {
            warn!(
                "{protocol}: dropping {} handles beyond capacity {}",
                count - admitted,
                out.len()
            );
        }
        Ok(admitted)
    }

    fn handle_protocol(&self, protocol: &Guid, handle: Handle) -> Option<NonNull<c_void>> {
        let bs = self.table();
        let mut interface: *mut c_void = ptr::null_mut();
        let status = unsafe { (bs.handle_protocol)(handle, protocol, &mut interface) };
        if status.is_success() {
            NonNull::new(interface)
        } else {
            None
        }
    }
}
