// SPDX-License-Identifier: MIT OR Apache-2.0

//! The TPM adapter bridge.
//!
//! A single [`TpmAdapter`] wraps the firmware's TPM command interface. The
//! firmware call completes the whole command/response round-trip before
//! returning, so the kernel-facing contract degenerates pleasantly: `send`
//! performs the exchange into an adapter-owned response buffer, `recv` hands
//! the reply out with strict size accounting, and `status` is always ready.
//!
//! The response buffer is fixed at 4096 bytes and never grows; a reply that
//! claims to be larger than the caller's buffer (or than the response buffer
//! itself) is refused outright rather than truncated.

use crate::boot::{HandleDirectory, MapRefresh};
use crate::error::{Error, Result};
use crate::proto::tcg::TcgDevice;
use crate::proto::TpmProtocol;
use alloc::boxed::Box;
use alloc::sync::Arc;
use core::ptr;
use log::{info, trace, warn};
use spin::Mutex;
use uefi_raw::protocol::tcg::v2::Tcg2Protocol;
use uefi_raw::Handle;

/// Fixed capacity of the adapter-owned response buffer.
pub const RESPONSE_CAPACITY: usize = 4096;

/// Pattern the response buffer is cleared to before every command, so stale
/// or short replies stand out when debugging.
const RESPONSE_SENTINEL: u8 = 0xcc;

/// Byte length of the fixed-layout response header.
const RESPONSE_HEADER_LEN: usize = 10;

/// Readiness view the kernel TPM stack polls between send and recv.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TpmStatus {
    /// The last command has completed; a response is available.
    Ready,
    /// A command is still in flight. Never reported by this bridge, since
    /// the firmware call returns only after the response is complete.
    Busy,
}

/// Kernel-facing TPM callbacks implemented by the adapter.
pub trait TpmOps {
    /// Performs one full command/response exchange with the device.
    fn send(&self, command: &[u8]) -> Result;

    /// Copies the response of the last command into `response`, returning
    /// the byte count.
    ///
    /// Refuses with [`Error::BufferTooSmall`], copying nothing, when the
    /// encoded response size exceeds the destination.
    fn recv(&self, response: &mut [u8]) -> Result<usize>;

    /// Readiness of the device.
    fn status(&self) -> TpmStatus;

    /// Aborts the command in flight. Not supported by this device.
    fn cancel(&self) -> Result;

    /// Whether the command in flight was cancelled. Not supported by this
    /// device; the TPM stack must treat it as non-cancellable.
    fn request_cancelled(&self) -> Result<bool>;
}

/// Fixed-layout header at the front of every response, big-endian on the
/// wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ResponseHeader {
    tag: u16,
    /// Total response size in bytes, header included.
    size: u32,
    code: u32,
}

impl ResponseHeader {
    /// Decodes the header fields, refusing buffers shorter than a header.
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < RESPONSE_HEADER_LEN {
            return Err(Error::BufferTooSmall {
                required: RESPONSE_HEADER_LEN,
                capacity: buf.len(),
            });
        }
        Ok(Self {
            tag: u16::from_be_bytes([buf[0], buf[1]]),
            size: u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]),
            code: u32::from_be_bytes([buf[6], buf[7], buf[8], buf[9]]),
        })
    }
}

/// Bridge between the firmware TPM interface and a kernel TPM chip.
pub struct TpmAdapter {
    tpm: Box<dyn TpmProtocol + Send + Sync>,
    env: Arc<dyn MapRefresh + Send + Sync>,
    response: Mutex<Box<[u8; RESPONSE_CAPACITY]>>,
}

impl TpmAdapter {
    fn new(
        tpm: Box<dyn TpmProtocol + Send + Sync>,
        env: Arc<dyn MapRefresh + Send + Sync>,
    ) -> Self {
        Self {
            tpm,
            env,
            response: Mutex::new(Box::new([0; RESPONSE_CAPACITY])),
        }
    }
}

impl TpmOps for TpmAdapter {
    fn send(&self, command: &[u8]) -> Result {
        self.env.refresh_memory_map();
        let submitted = {
            let mut response = self.response.lock();
            response.fill(RESPONSE_SENTINEL);
            self.tpm.submit_command(command, &mut response[..])
        };
        submitted.map_err(|err| {
            warn!("tpm: submit of {} bytes failed: {err}", command.len());
            err
        })
    }

    fn recv(&self, response: &mut [u8]) -> Result<usize> {
        let buffer = self.response.lock();
        let header = ResponseHeader::parse(&buffer[..])?;
        let len = header.size as usize;
        trace!(
            "tpm: response tag={:#06x} rc={:#010x} len={len}",
            header.tag,
            header.code
        );
        if len > response.len() || len > buffer.len() {
            return Err(Error::BufferTooSmall {
                required: len,
                capacity: response.len().min(buffer.len()),
            });
        }
        response[..len].copy_from_slice(&buffer[..len]);
        Ok(len)
    }

    fn status(&self) -> TpmStatus {
        TpmStatus::Ready
    }

    fn cancel(&self) -> Result {
        warn!("tpm: cancel is not implemented");
        Err(Error::Unsupported)
    }

    fn request_cancelled(&self) -> Result<bool> {
        warn!("tpm: cancellation state is not implemented");
        Err(Error::Unsupported)
    }
}

/// Wraps the firmware TPM in an adapter, if one was found.
///
/// `None` means no protocol instance: nothing is registered and that is
/// not an error. The capability query only feeds a diagnostic line; its
/// failure does not stop the adapter from being created.
pub fn probe(
    tpm: Option<Box<dyn TpmProtocol + Send + Sync>>,
    env: Arc<dyn MapRefresh + Send + Sync>,
) -> Option<TpmAdapter> {
    let tpm = match tpm {
        Some(tpm) => tpm,
        None => {
            info!("tpm: protocol not present");
            return None;
        }
    };
    match tpm.get_capability() {
        Ok(caps) => info!(
            "tpm: present={} manufacturer={:08x}",
            caps.tpm_present, caps.manufacturer_id
        ),
        Err(err) => warn!("tpm: capability query failed: {err}"),
    }
    Some(TpmAdapter::new(tpm, env))
}

/// Locates the firmware TPM protocol and bridges it, if present.
pub fn discover<D: HandleDirectory>(
    dir: &D,
    env: Arc<dyn MapRefresh + Send + Sync>,
) -> Option<TpmAdapter> {
    let mut handles: [Handle; 1] = [ptr::null_mut()];
    let count = dir
        .locate_handles(&Tcg2Protocol::GUID, &mut handles)
        .unwrap_or_else(|err| {
            warn!("tpm: handle lookup failed: {err}");
            0
        });
    let device = handles[..count]
        .first()
        .and_then(|&handle| dir.handle_protocol(&Tcg2Protocol::GUID, handle))
        .map(|interface| {
            // SAFETY: the directory resolved this pointer for the TCG2
            // protocol GUID, and the resident firmware keeps the instance
            // alive for the module's lifetime.
            let device = unsafe { TcgDevice::new(interface.cast()) };
            Box::new(device) as Box<dyn TpmProtocol + Send + Sync>
        });
    probe(device, env)
}
