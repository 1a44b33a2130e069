// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timer-driven receive polling.
//!
//! The firmware network protocol has no interrupt or callback mechanism, so
//! a single recurring task drains the receive path of every registered
//! adapter. One [`RxPoller::tick`] runs a burst of drain rounds, which bounds
//! the latency a fixed polling interval would otherwise add, and stops as
//! soon as a full round moves nothing, avoiding unbounded busy-looping under
//! load.
//!
//! The task itself is owned by an external repeating-task scheduler: it
//! calls `tick()` and re-arms the timer with the returned interval until the
//! tick reports cancellation.

use crate::boot::MapRefresh;
use crate::net::RxPoll;
use crate::registry::Registry;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use log::trace;

/// Interval between poll ticks once running.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Delay before the very first tick after initialization.
pub const INITIAL_DELAY: Duration = Duration::from_millis(10);

/// Most drain rounds one tick will run before yielding back to the timer.
pub const DRAIN_ROUNDS: usize = 10;

/// Cooperative stop flag for the poll task.
///
/// Cloning is cheap and clones share the flag: the module keeps one to
/// cancel at teardown, the poller checks another at every tick.
#[derive(Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the running state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the poll task to stop at its next tick.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether [`cancel`](Self::cancel) was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// The recurring task emulating receive interrupts.
///
/// Owns the registry for the rest of the module lifetime; kernel-side
/// callers keep their own `Arc`s to the adapters.
pub struct RxPoller {
    registry: Registry,
    env: Arc<dyn MapRefresh + Send + Sync>,
    cancel: CancelToken,
}

impl RxPoller {
    /// Builds the poller over a fully-populated registry.
    pub fn new(
        registry: Registry,
        env: Arc<dyn MapRefresh + Send + Sync>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            registry,
            env,
            cancel,
        }
    }

    /// Runs one poll tick.
    ///
    /// Returns the delay until the next tick, or `None` once the token was
    /// cancelled and the task must not be re-armed. Rescheduling is
    /// otherwise unconditional: an idle tick and a busy tick both come back
    /// after [`POLL_INTERVAL`].
    pub fn tick(&self) -> Option<Duration> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.env.refresh_memory_map();

        for round in 0..DRAIN_ROUNDS {
            let mut delivered = 0usize;
            for adapter in self.registry.iter() {
                if adapter.poll_rx() == RxPoll::Delivered {
                    delivered += 1;
                }
            }
            if delivered == 0 {
                break;
            }
            trace!("poll round {round}: {delivered} frames");
        }
        Some(POLL_INTERVAL)
    }
}
