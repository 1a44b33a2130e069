// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridging polled UEFI device protocols into a kernel device model.
//!
//! A firmware that stays resident after the OS takes over leaves behind a
//! small set of useful devices reachable only through its boot-time protocol
//! tables: network interfaces behind the Simple Network Protocol and a TPM
//! behind the TCG2 protocol. Both interfaces are synchronous, single-threaded
//! and non-reentrant, and neither has any notion of interrupts. This crate
//! adapts them to a kernel's concurrent device model: every firmware handle
//! is wrapped in an adapter object exposing the kernel-side callbacks, every
//! firmware call is serialized behind a per-adapter lock, and a fixed-interval
//! poll task stands in for the receive interrupt the firmware cannot deliver.
//!
//! # Crate organisation
//!
//! The [`proto`] module holds the firmware-facing seam: the [`NicProtocol`]
//! and [`TpmProtocol`] traits describing what the bridge needs from firmware,
//! and the raw implementations backed by [`uefi_raw`] function-pointer
//! tables. The [`boot`] module covers handle discovery and the memory-map
//! refresh hook that must precede firmware calls once the kernel owns the
//! page tables.
//!
//! On top of that seam sit the bridges themselves: [`net`] wraps one network
//! interface per adapter, [`registry`] holds the bounded set of discovered
//! adapters, [`poll`] drains their receive paths on a timer tick, and [`tpm`]
//! wraps the single TPM instance.
//!
//! All firmware failures are local: they are logged via the [`log`] crate and
//! surfaced as [`Error`] values to the kernel-facing caller; no failure tears
//! down an adapter or the bridge as a whole.
//!
//! [`NicProtocol`]: proto::NicProtocol
//! [`TpmProtocol`]: proto::TpmProtocol

#![cfg_attr(not(test), no_std)]
#![warn(clippy::all, clippy::ptr_as_ptr, missing_docs, unused)]

extern crate alloc;

pub mod boot;
mod error;
pub mod frame;
pub mod net;
pub mod poll;
pub mod proto;
pub mod registry;
pub mod tpm;

#[cfg(test)]
pub(crate) mod mock;

pub use error::{Error, Result};
pub use uefi_raw::Status;
