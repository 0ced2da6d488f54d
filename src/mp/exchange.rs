//! Shared Exchange Block
//!
//! The one record every core may mutate. All fields sit behind a spin lock;
//! acquisition is a plain try/retry loop with no fairness.

use core::cell::UnsafeCell;
use core::ptr;

use spin::{Mutex, MutexGuard};

use super::platform::MpPlatform;
use super::types::{StackReservation, AP_STACK_SIZE, MAX_CPUS};

/// Counters guarded by the exchange lock
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeData {
    pub rebase_ack_count: usize,
    /// Cores that passed the gate without running the privileged operation
    pub rebase_skipped: usize,
}

impl ExchangeData {
    pub const fn new() -> Self {
        Self {
            rebase_ack_count: 0,
            rebase_skipped: 0,
        }
    }
}

#[repr(C, align(64))]
pub struct SharedExchangeBlock {
    data: Mutex<ExchangeData>,
}

impl SharedExchangeBlock {
    pub const fn new() -> Self {
        Self {
            data: Mutex::new(ExchangeData::new()),
        }
    }

    /// Spin until the lock is ours
    pub fn acquire<P: MpPlatform>(&self, platform: &P) -> MutexGuard<'_, ExchangeData> {
        loop {
            if let Some(guard) = self.data.try_lock() {
                return guard;
            }
            platform.cpu_relax();
        }
    }

    pub fn reset<P: MpPlatform>(&self, platform: &P) {
        *self.acquire(platform) = ExchangeData::new();
    }

    pub fn read<P: MpPlatform>(&self, platform: &P) -> ExchangeData {
        *self.acquire(platform)
    }

    pub fn address(&self) -> u64 {
        self as *const Self as u64
    }
}

/// Aligned AP stack
#[repr(C, align(16))]
struct AlignedApStack([u8; AP_STACK_SIZE]);

/// Stack storage for every possible core, handed to the wake vector.
///
/// The bootstrap core never touches this memory; it only passes its
/// address on.
#[repr(C, align(4096))]
pub struct ApStackRegion(UnsafeCell<[AlignedApStack; MAX_CPUS]>);

unsafe impl Sync for ApStackRegion {}

impl ApStackRegion {
    const fn new() -> Self {
        const STACK: AlignedApStack = AlignedApStack([0; AP_STACK_SIZE]);
        Self(UnsafeCell::new([STACK; MAX_CPUS]))
    }

    pub fn reserve(&'static self) -> StackReservation {
        StackReservation {
            base: ptr::addr_of!(self.0) as u64,
            stack_size: AP_STACK_SIZE,
            count: MAX_CPUS,
        }
    }
}

/// AP stacks
pub static AP_STACKS: ApStackRegion = ApStackRegion::new();
