// SPDX-License-Identifier: MIT OR Apache-2.0

//! The firmware-protocol seam.
//!
//! The bridges in [`crate::net`] and [`crate::tpm`] never touch firmware
//! directly; they go through the [`NicProtocol`] and [`TpmProtocol`] traits
//! defined here. The [`snp`] and [`tcg`] submodules provide the production
//! implementations over the raw UEFI function-pointer tables; tests provide
//! plain in-memory ones.
//!
//! Every trait method maps to exactly one firmware call. The firmware side is
//! synchronous and non-reentrant, so implementations assume their caller
//! serializes access to one instance; the adapters guarantee that with a
//! per-adapter lock.

pub mod snp;
pub mod tcg;

use crate::Result;

/// One firmware network interface.
pub trait NicProtocol {
    /// Brings the interface from stopped to started state.
    fn start(&self) -> Result;

    /// Brings the interface back to stopped state.
    fn stop(&self) -> Result;

    /// Submits one fully-formed link-layer frame for transmission.
    ///
    /// The frame already carries its media header; the firmware is asked to
    /// send it verbatim.
    fn transmit(&self, frame: &[u8]) -> Result;

    /// Polls for one pending inbound frame, written into `buf` in place.
    ///
    /// Returns `Ok(Some(len))` with the frame length on success and
    /// `Ok(None)` when no packet is pending (the firmware's distinguished
    /// not-ready status).
    fn receive(&self, buf: &mut [u8]) -> Result<Option<usize>>;

    /// Reads the interface's counter table.
    fn statistics(&self) -> Result<NicCounters>;

    /// The interface's current station address.
    fn mac_address(&self) -> [u8; 6];

    /// Largest frame the interface can hand back, media header included.
    fn max_frame_len(&self) -> usize;

    /// Interface type and media presence, for diagnostics.
    fn link_info(&self) -> LinkInfo;
}

/// Raw counter table of a network interface, as firmware reports it.
///
/// Values are copied verbatim from the firmware table on every query; nothing
/// is cached or accumulated on this side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NicCounters {
    /// Bytes received, error and dropped frames included.
    pub rx_total_bytes: u64,
    /// Frames received, error and dropped frames included.
    pub rx_total_frames: u64,
    /// Frames received and delivered into receive buffers.
    pub rx_good_frames: u64,
    /// Valid frames dropped for lack of receive buffers.
    pub rx_dropped_frames: u64,
    /// Frames below the medium's minimum length.
    pub rx_undersize_frames: u64,
    /// Frames above the medium's maximum length.
    pub rx_oversize_frames: u64,
    /// Frames with CRC or alignment errors.
    pub rx_crc_error_frames: u64,
    /// Valid multicast frames received.
    pub rx_multicast_frames: u64,
    /// Bytes transmitted, error and dropped frames included.
    pub tx_total_bytes: u64,
    /// Frames transmitted, error and dropped frames included.
    pub tx_total_frames: u64,
    /// Frames transmitted successfully.
    pub tx_good_frames: u64,
    /// Valid frames dropped on the transmit side.
    pub tx_dropped_frames: u64,
    /// Collisions detected on the subnet.
    pub collisions: u64,
}

/// Creation-time diagnostics about a network interface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkInfo {
    /// Interface type as reported by firmware (1 is Ethernet).
    pub if_type: u8,
    /// Whether media is currently attached, if the interface can tell.
    pub media_present: bool,
}

/// The firmware TPM command interface.
pub trait TpmProtocol {
    /// Queries protocol and device capabilities.
    fn get_capability(&self) -> Result<TpmCapability>;

    /// Submits one command and blocks until the full response round-trip is
    /// done.
    ///
    /// The firmware writes the response into `response` before returning;
    /// there is no separate completion step.
    fn submit_command(&self, command: &[u8], response: &mut [u8]) -> Result;
}

/// Summary of the TPM capability structure the bridge cares about.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TpmCapability {
    /// Whether a TPM device is actually present behind the protocol.
    pub tpm_present: bool,
    /// Manufacturer ID from the TCG vendor registry.
    pub manufacturer_id: u32,
    /// Largest command the device accepts, in bytes.
    pub max_command_size: u16,
    /// Largest response the device produces, in bytes.
    pub max_response_size: u16,
}
