// SPDX-License-Identifier: MIT OR Apache-2.0

//! Raw-backed implementation of [`TpmProtocol`] over the TCG2 protocol.

use super::{TpmCapability, TpmProtocol};
use crate::error::{Error, Result, StatusExt};
use core::mem;
use core::ptr::NonNull;
use uefi_raw::protocol::tcg::v2::{Tcg2BootServiceCapability, Tcg2Protocol};
use uefi_raw::Status;

/// The firmware TPM, addressed through its raw protocol table.
pub struct TcgDevice {
    proto: NonNull<Tcg2Protocol>,
}

impl TcgDevice {
    /// Wraps a raw TCG2 protocol interface pointer.
    ///
    /// # Safety
    ///
    /// `proto` must point to a valid protocol instance that the firmware
    /// keeps alive for the lifetime of this value, and no other code may
    /// call into the same instance concurrently.
    #[must_use]
    pub unsafe fn new(proto: NonNull<Tcg2Protocol>) -> Self {
        Self { proto }
    }
}

// SAFETY: reached only through the TPM adapter, which serializes its
// firmware calls behind one lock.
unsafe impl Send for TcgDevice {}
unsafe impl Sync for TcgDevice {}

impl TpmProtocol for TcgDevice {
    fn get_capability(&self) -> Result<TpmCapability> {
        let mut caps = Tcg2BootServiceCapability {
            // OK to unwrap, the structure is far smaller than a u8 can count.
            size: u8::try_from(mem::size_of::<Tcg2BootServiceCapability>()).unwrap(),
            ..Tcg2BootServiceCapability::default()
        };
        let p = self.proto.as_ptr();
        unsafe { ((*p).get_capability)(p, &mut caps) }.to_result_with_val(|| TpmCapability {
            tpm_present: caps.tpm_present_flag != 0,
            manufacturer_id: caps.manufacturer_id,
            max_command_size: caps.max_command_size,
            max_response_size: caps.max_response_size,
        })
    }

    fn submit_command(&self, command: &[u8], response: &mut [u8]) -> Result {
        let command_len =
            u32::try_from(command.len()).map_err(|_| Error::Firmware(Status::BAD_BUFFER_SIZE))?;
        let response_len =
            u32::try_from(response.len()).map_err(|_| Error::Firmware(Status::BAD_BUFFER_SIZE))?;
        let p = self.proto.as_ptr();
        unsafe {
            ((*p).submit_command)(
                p,
                command_len,
                command.as_ptr(),
                response_len,
                response.as_mut_ptr(),
            )
        }
        .to_result()
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeTcg;
    use super::*;

    #[test]
    fn capability_query_maps_the_firmware_structure() {
        let fw = FakeTcg::new();
        let caps = fw.device().get_capability().unwrap();
        assert!(caps.tpm_present);
        assert_eq!(caps.manufacturer_id, 0x1014);
        assert_eq!(caps.max_response_size, 4096);

        fw.state.lock().caps_status = Status::DEVICE_ERROR;
        assert_eq!(
            fw.device().get_capability(),
            Err(Error::Firmware(Status::DEVICE_ERROR))
        );
    }

    #[test]
    fn submit_passes_command_and_fills_response() {
        let fw = FakeTcg::new();
        fw.state.lock().response = alloc::vec![9, 8, 7];

        let mut response = [0u8; 16];
        assert_eq!(fw.device().submit_command(&[1, 2], &mut response), Ok(()));

        let state = fw.state.lock();
        assert_eq!(state.commands, [alloc::vec![1, 2]]);
        assert_eq!(state.response_capacity_seen, 16);
        assert_eq!(&response[..3], &[9, 8, 7]);
    }

    #[test]
    fn submit_failure_is_surfaced() {
        let fw = FakeTcg::new();
        fw.state.lock().submit_status = Status::DEVICE_ERROR;
        let mut response = [0u8; 16];
        assert_eq!(
            fw.device().submit_command(&[1], &mut response),
            Err(Error::Firmware(Status::DEVICE_ERROR))
        );
    }
}
