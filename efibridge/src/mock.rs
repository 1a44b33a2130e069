// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared in-memory trait implementations for unit tests.
//!
//! These mocks stand in for the firmware and kernel collaborators. The nic
//! mock additionally watches for concurrent entry into "firmware", which the
//! adapters must rule out by construction.

use crate::boot::{HandleDirectory, MapRefresh};
use crate::error::{Error, Result};
use crate::frame::FrameBuf;
use crate::net::FrameSink;
use crate::proto::{LinkInfo, NicCounters, NicProtocol, TpmCapability, TpmProtocol};
use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::ffi::c_void;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use spin::Mutex;
use uefi_raw::protocol::network::snp::SimpleNetworkProtocol;
use uefi_raw::protocol::tcg::v2::Tcg2Protocol;
use uefi_raw::{Guid, Handle, Status};

/// One scripted receive outcome.
pub(crate) enum RxStep {
    /// A frame is pending.
    Frame(Vec<u8>),
    /// No packet pending.
    NotReady,
    /// Any other failure status.
    Fail(Status),
}

/// Scriptable state behind a [`MockNic`].
#[derive(Default)]
pub(crate) struct NicState {
    pub start_result: Option<Error>,
    pub stop_result: Option<Error>,
    pub tx_result: Option<Error>,
    pub stats_fail: Option<Error>,
    pub counters: NicCounters,
    pub rx: VecDeque<RxStep>,
    pub tx_frames: Vec<Vec<u8>>,
    pub start_calls: usize,
    pub stop_calls: usize,
    pub receive_calls: usize,
}

/// Firmware network interface backed by plain memory.
///
/// Clones share state, so tests keep one handle for scripting while the
/// adapter owns another.
#[derive(Clone, Default)]
pub(crate) struct MockNic {
    pub state: Arc<Mutex<NicState>>,
    in_call: Arc<AtomicBool>,
    pub violations: Arc<AtomicUsize>,
}

impl MockNic {
    /// Marks firmware entry; a second concurrent entry is recorded as a
    /// violation instead of asserting, so the failure surfaces in the test
    /// thread.
    fn enter(&self) {
        if self.in_call.swap(true, Ordering::SeqCst) {
            self.violations.fetch_add(1, Ordering::SeqCst);
        }
        std::thread::yield_now();
    }

    fn exit(&self) {
        self.in_call.store(false, Ordering::SeqCst);
    }
}

impl NicProtocol for MockNic {
    fn start(&self) -> Result {
        let mut state = self.state.lock();
        state.start_calls += 1;
        match state.start_result {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn stop(&self) -> Result {
        let mut state = self.state.lock();
        state.stop_calls += 1;
        match state.stop_result {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn transmit(&self, frame: &[u8]) -> Result {
        self.enter();
        let result = {
            let mut state = self.state.lock();
            state.tx_frames.push(frame.to_vec());
            state.tx_result
        };
        self.exit();
        match result {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn receive(&self, buf: &mut [u8]) -> Result<Option<usize>> {
        self.enter();
        let step = {
            let mut state = self.state.lock();
            state.receive_calls += 1;
            state.rx.pop_front()
        };
        let outcome = match step {
            Some(RxStep::Frame(bytes)) => {
                let len = bytes.len().min(buf.len());
                buf[..len].copy_from_slice(&bytes[..len]);
                Ok(Some(len))
            }
            Some(RxStep::NotReady) | None => Ok(None),
            Some(RxStep::Fail(status)) => Err(Error::Firmware(status)),
        };
        self.exit();
        outcome
    }

    fn statistics(&self) -> Result<NicCounters> {
        let state = self.state.lock();
        match state.stats_fail {
            Some(err) => Err(err),
            None => Ok(state.counters),
        }
    }

    fn mac_address(&self) -> [u8; 6] {
        [2, 0, 0, 0, 0, 1]
    }

    fn max_frame_len(&self) -> usize {
        1514
    }

    fn link_info(&self) -> LinkInfo {
        LinkInfo {
            if_type: 1,
            media_present: true,
        }
    }
}

/// Collects ingested frames along with their EtherType tags.
#[derive(Clone, Default)]
pub(crate) struct MockSink {
    pub frames: Arc<Mutex<Vec<(Option<u16>, Vec<u8>)>>>,
}

impl FrameSink for MockSink {
    fn ingest(&self, frame: FrameBuf) {
        self.frames
            .lock()
            .push((frame.ethertype(), frame.as_slice().to_vec()));
    }
}

/// Counts memory-map refresh invocations.
#[derive(Clone, Default)]
pub(crate) struct MockEnv {
    pub refreshes: Arc<AtomicUsize>,
}

impl MapRefresh for MockEnv {
    fn refresh_memory_map(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Handle directory over fixed interface lists.
///
/// Synthetic handles encode the list index; `None` entries produce handles
/// whose protocol lookup fails, like a handle that lost its interface.
pub(crate) struct MockDirectory {
    pub nets: Vec<Option<NonNull<c_void>>>,
    pub tpms: Vec<Option<NonNull<c_void>>>,
}

impl MockDirectory {
    fn list(&self, protocol: &Guid) -> &[Option<NonNull<c_void>>] {
        if *protocol == SimpleNetworkProtocol::GUID {
            &self.nets
        } else if *protocol == Tcg2Protocol::GUID {
            &self.tpms
        } else {
            &[]
        }
    }
}

impl HandleDirectory for MockDirectory {
    fn locate_handles(&self, protocol: &Guid, out: &mut [Handle]) -> Result<usize> {
        let list = self.list(protocol);
        let admitted = list.len().min(out.len());
        for (slot, index) in out.iter_mut().zip(0..admitted) {
            *slot = (index + 1) as Handle;
        }
        Ok(admitted)
    }

    fn handle_protocol(&self, protocol: &Guid, handle: Handle) -> Option<NonNull<c_void>> {
        let index = (handle as usize).checked_sub(1)?;
        self.list(protocol).get(index).copied().flatten()
    }
}

/// Scriptable state behind a [`MockTpm`].
pub(crate) struct TpmState {
    pub capability: TpmCapability,
    pub caps_fail: Option<Error>,
    pub submit_fail: Option<Error>,
    /// Bytes written into the response buffer on a successful submit.
    pub response: Vec<u8>,
    /// When false the buffer is left untouched, emulating firmware that
    /// reports success without writing a reply.
    pub write_response: bool,
    pub commands: Vec<Vec<u8>>,
    /// Whether the response buffer arrived fully sentinel-cleared.
    pub sentinel_seen: Option<bool>,
}

impl Default for TpmState {
    fn default() -> Self {
        Self {
            capability: TpmCapability {
                tpm_present: true,
                manufacturer_id: 0x1014,
                max_command_size: 4096,
                max_response_size: 4096,
            },
            caps_fail: None,
            submit_fail: None,
            response: Vec::new(),
            write_response: true,
            commands: Vec::new(),
            sentinel_seen: None,
        }
    }
}

/// Firmware TPM backed by plain memory; clones share state.
#[derive(Clone, Default)]
pub(crate) struct MockTpm {
    pub state: Arc<Mutex<TpmState>>,
}

impl TpmProtocol for MockTpm {
    fn get_capability(&self) -> Result<TpmCapability> {
        let state = self.state.lock();
        match state.caps_fail {
            Some(err) => Err(err),
            None => Ok(state.capability),
        }
    }

    fn submit_command(&self, command: &[u8], response: &mut [u8]) -> Result {
        let mut state = self.state.lock();
        state.commands.push(command.to_vec());
        state.sentinel_seen = Some(response.iter().all(|&b| b == 0xcc));
        if let Some(err) = state.submit_fail {
            return Err(err);
        }
        if state.write_response {
            let len = state.response.len().min(response.len());
            response[..len].copy_from_slice(&state.response[..len]);
        }
        Ok(())
    }
}

/// Builds a response blob: 10-byte header with a big-endian total size,
/// followed by `payload`.
pub(crate) fn tpm_response(tag: u16, code: u32, payload: &[u8]) -> Vec<u8> {
    let total = 10 + payload.len();
    let mut blob = Vec::with_capacity(total);
    blob.extend_from_slice(&tag.to_be_bytes());
    blob.extend_from_slice(&u32::try_from(total).unwrap().to_be_bytes());
    blob.extend_from_slice(&code.to_be_bytes());
    blob.extend_from_slice(payload);
    blob
}
