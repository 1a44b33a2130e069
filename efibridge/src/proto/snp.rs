// SPDX-License-Identifier: MIT OR Apache-2.0

//! Raw-backed implementation of [`NicProtocol`] over the Simple Network
//! Protocol.
//!
//! [`SnpDevice`] wraps the firmware's function-pointer table directly. No
//! call here takes a lock; the owning adapter serializes access, because the
//! firmware side is non-reentrant.

use super::{LinkInfo, NicCounters, NicProtocol};
use crate::error::{Error, Result, StatusExt};
use core::mem;
use core::ptr::{self, NonNull};
use uefi_raw::protocol::network::snp::{NetworkMode, NetworkStatistics, SimpleNetworkProtocol};
use uefi_raw::{Boolean, Status};

/// Frame capacity to fall back on when the firmware reports a zero maximum
/// packet size: an Ethernet payload plus its media header.
const FALLBACK_FRAME_LEN: usize = 1514;

/// One firmware network interface, addressed through its raw protocol table.
pub struct SnpDevice {
    proto: NonNull<SimpleNetworkProtocol>,
}

impl SnpDevice {
    /// Wraps a raw Simple Network Protocol interface pointer.
    ///
    /// # Safety
    ///
    /// `proto` must point to a valid protocol instance that the firmware
    /// keeps alive for the lifetime of this value, and no other code may
    /// call into the same instance concurrently.
    #[must_use]
    pub unsafe fn new(proto: NonNull<SimpleNetworkProtocol>) -> Self {
        Self { proto }
    }

    fn proto(&self) -> &SimpleNetworkProtocol {
        // SAFETY: valid for the lifetime of `self` per the `new` contract.
        unsafe { self.proto.as_ref() }
    }

    fn mode(&self) -> &NetworkMode {
        // SAFETY: the mode table is part of the protocol instance and shares
        // its lifetime.
        unsafe { &*self.proto().mode }
    }
}

// SAFETY: the wrapped interface is only reached through an adapter, and every
// adapter serializes its firmware calls behind one lock.
unsafe impl Send for SnpDevice {}
unsafe impl Sync for SnpDevice {}

impl NicProtocol for SnpDevice {
    fn start(&self) -> Result {
        let p = self.proto();
        unsafe { (p.start)(p) }.to_result()
    }

    fn stop(&self) -> Result {
        let p = self.proto();
        unsafe { (p.stop)(p) }.to_result()
    }

    fn transmit(&self, frame: &[u8]) -> Result {
        let p = self.proto();
        // Header size zero: the frame is fully formed, firmware must not
        // build a media header of its own, and the address/protocol
        // parameters stay unused.
        unsafe {
            (p.transmit)(
                p,
                0,
                frame.len(),
                frame.as_ptr().cast(),
                ptr::null(),
                ptr::null(),
                ptr::null(),
            )
        }
        .to_result()
    }

    fn receive(&self, buf: &mut [u8]) -> Result<Option<usize>> {
        let p = self.proto();
        let mut len = buf.len();
        let status = unsafe {
            (p.receive)(
                p,
                ptr::null_mut(),
                &mut len,
                buf.as_mut_ptr().cast(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        if status == Status::SUCCESS {
            Ok(Some(len))
        } else if status == Status::NOT_READY {
            Ok(None)
        } else {
            Err(Error::Firmware(status))
        }
    }

    fn statistics(&self) -> Result<NicCounters> {
        let p = self.proto();
        let mut table = NetworkStatistics::default();
        let mut size = mem::size_of::<NetworkStatistics>();
        unsafe { (p.statistics)(p, Boolean::FALSE, &mut size, &mut table) }.to_result_with_val(
            || NicCounters {
                rx_total_bytes: table.rx_total_bytes,
                rx_total_frames: table.rx_total_frames,
                rx_good_frames: table.rx_good_frames,
                rx_dropped_frames: table.rx_dropped_frames,
                rx_undersize_frames: table.rx_undersize_frames,
                rx_oversize_frames: table.rx_oversize_frames,
                rx_crc_error_frames: table.rx_crc_error_frames,
                rx_multicast_frames: table.rx_multicast_frames,
                tx_total_bytes: table.tx_total_bytes,
                tx_total_frames: table.tx_total_frames,
                tx_good_frames: table.tx_good_frames,
                tx_dropped_frames: table.tx_dropped_frames,
                collisions: table.collisions,
            },
        )
    }

    fn mac_address(&self) -> [u8; 6] {
        self.mode().current_address.into()
    }

    fn max_frame_len(&self) -> usize {
        let mode = self.mode();
        match (mode.media_header_size + mode.max_packet_size) as usize {
            0 => FALLBACK_FRAME_LEN,
            len => len,
        }
    }

    fn link_info(&self) -> LinkInfo {
        let mode = self.mode();
        LinkInfo {
            if_type: mode.if_type,
            media_present: mode.media_present.into(),
        }
    }
}
