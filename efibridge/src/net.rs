// SPDX-License-Identifier: MIT OR Apache-2.0

//! The network adapter bridge.
//!
//! One [`NetAdapter`] wraps one firmware network interface and exposes the
//! kernel-side device callbacks ([`NetDeviceOps`]). Inbound traffic has no
//! interrupt to ride on; the poll task in [`crate::poll`] drives
//! [`NetAdapter::poll_rx`] instead.
//!
//! A single lock per adapter serializes every firmware call and guards the
//! pending receive buffer. The lock is released before a received frame is
//! handed to the [`FrameSink`], so the critical section never extends into
//! stack code that may itself block or take locks.

use crate::boot::{HandleDirectory, MapRefresh};
use crate::error::Result;
use crate::frame::{FrameBuf, RX_HEADROOM};
use crate::proto::snp::SnpDevice;
use crate::proto::{NicCounters, NicProtocol};
use crate::registry::{Registry, MAX_ADAPTERS};
use alloc::boxed::Box;
use alloc::sync::Arc;
use core::ptr;
use core::sync::atomic::{AtomicBool, Ordering};
use log::{error, info, trace, warn};
use spin::Mutex;
use uefi_raw::protocol::network::snp::SimpleNetworkProtocol;
use uefi_raw::Handle;

/// Kernel-facing device callbacks implemented by every adapter.
pub trait NetDeviceOps {
    /// Brings the device up. On failure the device stays down.
    fn open(&self) -> Result;

    /// Takes the device down. Best-effort: a firmware failure is logged but
    /// the device is down regardless.
    fn stop(&self) -> Result;

    /// Sends one fully-formed link-layer frame.
    ///
    /// The frame buffer stays with the caller whatever the outcome; the
    /// bridge neither queues nor retries.
    fn transmit(&self, frame: &[u8]) -> Result;

    /// Rebuilds the device statistics from the firmware counters.
    ///
    /// The returned snapshot is only as fresh as this call; when the
    /// firmware query fails, the previous snapshot is returned.
    fn stats(&self) -> DeviceStats;

    /// The device's hardware address, as firmware reports it.
    fn mac_address(&self) -> [u8; 6];
}

/// Ingestion point of the kernel network stack, one per registered device.
///
/// Always invoked outside the adapter lock.
pub trait FrameSink {
    /// Takes ownership of one received frame.
    fn ingest(&self, frame: FrameBuf);
}

/// Outcome of one receive poll, steering the poll loop's burst draining.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub enum RxPoll {
    /// Nothing was delivered; the poll loop need not come back early.
    Idle,
    /// A frame went up the stack; more may be pending.
    Delivered,
}

/// Device statistics in the kernel's shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Bytes received.
    pub rx_bytes: u64,
    /// Frames received.
    pub rx_packets: u64,
    /// Receive errors of any kind.
    pub rx_errors: u64,
    /// Frames dropped for lack of buffers.
    pub rx_dropped: u64,
    /// Undersized frames.
    pub rx_length_errors: u64,
    /// Oversized frames.
    pub rx_over_errors: u64,
    /// Frames with CRC or alignment errors.
    pub rx_crc_errors: u64,
    /// Bytes transmitted.
    pub tx_bytes: u64,
    /// Frames transmitted.
    pub tx_packets: u64,
    /// Transmit errors of any kind.
    pub tx_errors: u64,
    /// Frames dropped on the transmit side.
    pub tx_dropped: u64,
    /// Multicast frames received.
    pub multicast: u64,
    /// Collisions detected.
    pub collisions: u64,
}

impl From<&NicCounters> for DeviceStats {
    fn from(c: &NicCounters) -> Self {
        Self {
            rx_bytes: c.rx_total_bytes,
            rx_packets: c.rx_total_frames,
            rx_errors: c.rx_total_frames.wrapping_sub(c.rx_good_frames),
            rx_dropped: c.rx_dropped_frames,
            rx_length_errors: c.rx_undersize_frames,
            rx_over_errors: c.rx_oversize_frames,
            rx_crc_errors: c.rx_crc_error_frames,
            tx_bytes: c.tx_total_bytes,
            tx_packets: c.tx_total_frames,
            // Historical mapping: the error count is derived from the
            // rx-side good-frame counter, not the tx-side one.
            tx_errors: c.tx_total_frames.wrapping_sub(c.rx_good_frames),
            tx_dropped: c.tx_dropped_frames,
            multicast: c.rx_multicast_frames,
            collisions: c.collisions,
        }
    }
}

struct Inner {
    rx_buf: Option<FrameBuf>,
    stats: DeviceStats,
}

/// Bridge between one firmware network interface and a kernel net device.
pub struct NetAdapter {
    id: usize,
    nic: Box<dyn NicProtocol + Send + Sync>,
    env: Arc<dyn MapRefresh + Send + Sync>,
    sink: Arc<dyn FrameSink + Send + Sync>,
    up: AtomicBool,
    inner: Mutex<Inner>,
}

impl NetAdapter {
    /// Wraps a firmware interface; the device starts out down.
    ///
    /// `sink` is the kernel-side device this adapter feeds received frames
    /// into; `env` is the memory-map refresh hook shared across the module.
    pub fn new(
        id: usize,
        nic: Box<dyn NicProtocol + Send + Sync>,
        env: Arc<dyn MapRefresh + Send + Sync>,
        sink: Arc<dyn FrameSink + Send + Sync>,
    ) -> Self {
        let link = nic.link_info();
        let mac = nic.mac_address();
        info!(
            "nic{id}: type={} media={} addr={:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            link.if_type, link.media_present, mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
        );
        Self {
            id,
            nic,
            env,
            sink,
            up: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                rx_buf: None,
                stats: DeviceStats::default(),
            }),
        }
    }

    /// Position of this adapter in discovery order.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Whether the device is administratively up.
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.up.load(Ordering::Acquire)
    }

    /// Drains at most one pending inbound frame.
    ///
    /// Driven only by the poll task. A down adapter is a no-op. The receive
    /// buffer survives not-ready and error outcomes and is replaced only
    /// after a frame actually left for the stack.
    pub fn poll_rx(&self) -> RxPoll {
        if !self.is_up() {
            return RxPoll::Idle;
        }

        // Replenish outside the critical section. Only the poll task installs
        // or consumes the buffer, so the slot cannot change in between.
        let spare = if self.inner.lock().rx_buf.is_none() {
            Some(FrameBuf::with_headroom(self.nic.max_frame_len(), RX_HEADROOM))
        } else {
            None
        };

        let mut inner = self.inner.lock();
        let Some(mut buf) = inner.rx_buf.take().or(spare) else {
            return RxPoll::Idle;
        };
        match self.nic.receive(buf.tail_mut()) {
            Ok(Some(len)) => {
                drop(inner);
                buf.fill(len);
                trace!(
                    "nic{}: rx {} bytes proto {:04x?}",
                    self.id,
                    buf.len(),
                    buf.ethertype()
                );
                self.sink.ingest(buf);
                RxPoll::Delivered
            }
            Ok(None) => {
                inner.rx_buf = Some(buf);
                RxPoll::Idle
            }
            Err(err) => {
                inner.rx_buf = Some(buf);
                drop(inner);
                error!("nic{}: receive failed: {err}", self.id);
                RxPoll::Idle
            }
        }
    }
}

impl NetDeviceOps for NetAdapter {
    fn open(&self) -> Result {
        self.env.refresh_memory_map();
        if let Err(err) = self.nic.start() {
            warn!("nic{}: start failed: {err}", self.id);
            return Err(err);
        }
        self.up.store(true, Ordering::Release);
        info!("nic{}: started", self.id);
        Ok(())
    }

    fn stop(&self) -> Result {
        self.env.refresh_memory_map();
        // Down-state is published first so an in-flight poll exits early.
        self.up.store(false, Ordering::Release);
        match self.nic.stop() {
            Ok(()) => info!("nic{}: stopped", self.id),
            Err(err) => warn!("nic{}: stop failed: {err}", self.id),
        }
        Ok(())
    }

    fn transmit(&self, frame: &[u8]) -> Result {
        self.env.refresh_memory_map();
        // The lock serializes this call against the receive poll; the
        // firmware interface tolerates no concurrent entry.
        let sent = {
            let _inner = self.inner.lock();
            self.nic.transmit(frame)
        };
        sent.map_err(|err| {
            warn!("nic{}: tx of {} bytes failed: {err}", self.id, frame.len());
            err
        })
    }

    fn stats(&self) -> DeviceStats {
        self.env.refresh_memory_map();
        let counters = {
            let _inner = self.inner.lock();
            self.nic.statistics()
        };
        match counters {
            Ok(counters) => {
                let snapshot = DeviceStats::from(&counters);
                self.inner.lock().stats = snapshot;
                snapshot
            }
            Err(err) => {
                warn!("nic{}: statistics failed: {err}", self.id);
                self.inner.lock().stats
            }
        }
    }

    fn mac_address(&self) -> [u8; 6] {
        self.nic.mac_address()
    }
}

/// Discovers every firmware network interface and wraps each in an adapter.
///
/// `attach` is invoked once per interface with its discovery id and MAC so
/// the caller can create the kernel-side device and return its ingestion
/// sink. Zero interfaces is a normal outcome. Handles that fail the protocol
/// lookup are skipped; their ids stay reserved so logs stay aligned with the
/// firmware's handle order.
pub fn discover<D, F>(
    dir: &D,
    env: &Arc<dyn MapRefresh + Send + Sync>,
    mut attach: F,
) -> Result<Registry>
where
    D: HandleDirectory,
    F: FnMut(usize, [u8; 6]) -> Arc<dyn FrameSink + Send + Sync>,
{
    let mut handles: [Handle; MAX_ADAPTERS] = [ptr::null_mut(); MAX_ADAPTERS];
    let count = dir.locate_handles(&SimpleNetworkProtocol::GUID, &mut handles)?;
    info!("found {count} network handles");

    let mut registry = Registry::new();
    for (id, handle) in handles[..count].iter().enumerate() {
        let Some(interface) = dir.handle_protocol(&SimpleNetworkProtocol::GUID, *handle) else {
            warn!("nic{id}: handle does not expose the network protocol");
            continue;
        };
        // SAFETY: the directory resolved this pointer for the network
        // protocol GUID, and the resident firmware keeps the instance alive
        // for the module's lifetime.
        let nic = unsafe { SnpDevice::new(interface.cast()) };
        let sink = attach(id, nic.mac_address());
        let adapter = Arc::new(NetAdapter::new(id, Box::new(nic), Arc::clone(env), sink));
        if !registry.register(adapter) {
            break;
        }
    }
    Ok(registry)
}
