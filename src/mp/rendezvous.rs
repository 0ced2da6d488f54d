//! Rendezvous Coordinator
//!
//! A single INIT/STARTUP broadcast wakes every dormant core at once, so wake
//! latency does not grow with the core count. Each AP checks in by bumping
//! `ready` as the very first thing its entry procedure does.

use core::sync::atomic::{AtomicUsize, Ordering};

use super::platform::MpPlatform;
use super::types::{INIT_DEASSERT_DELAY_US, STARTUP_SIGNAL_DELAY_US};

pub struct RendezvousCoordinator {
    ready: AtomicUsize,
}

impl RendezvousCoordinator {
    pub const fn new() -> Self {
        Self {
            ready: AtomicUsize::new(0),
        }
    }

    pub fn reset(&self) {
        self.ready.store(0, Ordering::SeqCst);
    }

    /// Issue INIT followed by STARTUP to every core except the caller.
    ///
    /// Returns as soon as the signals are out; does not wait for any core.
    pub fn broadcast<P: MpPlatform>(&self, platform: &P, vector: u8) {
        crate::kinfo!("MP: Broadcasting INIT to all APs");
        platform.send_init_broadcast();
        platform.delay_us(INIT_DEASSERT_DELAY_US);

        crate::kinfo!("MP: Broadcasting STARTUP #1, vector {:#x}", vector);
        platform.send_startup_broadcast(vector);
        platform.delay_us(STARTUP_SIGNAL_DELAY_US);

        // Cores already running ignore the second STARTUP
        crate::kdebug!("MP: Broadcasting STARTUP #2");
        platform.send_startup_broadcast(vector);
    }

    /// Called once per AP at entry. Returns the AP's record index.
    pub fn check_in(&self) -> usize {
        self.ready.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn ready_count(&self) -> usize {
        self.ready.load(Ordering::Acquire)
    }

    /// Poll until `expected` APs checked in or the budget runs out.
    /// Returns the last observed count.
    pub fn wait_for<P: MpPlatform>(
        &self,
        platform: &P,
        expected: usize,
        delay_us: u64,
        retries: u32,
    ) -> usize {
        for _ in 0..retries {
            let ready = self.ready_count();
            if ready >= expected {
                return ready;
            }
            platform.delay_us(delay_us);
        }
        self.ready_count()
    }
}
