//! Platform Seam
//!
//! Everything the MP core needs from hardware or from the surrounding
//! firmware goes through [`MpPlatform`]. The x86_64 implementation lives in
//! `arch::x86_64`; tests drive the same code with a thread-backed mock.

use super::error::MpError;
use super::types::{DescriptorTables, WakeVectorParams};

pub trait MpPlatform: Sync + 'static {
    /// Hardware identifier of the calling core.
    fn topology_id(&self) -> u32;

    /// Number of cores the topology source expects, bootstrap included.
    fn present_cpu_count(&self) -> usize;

    /// Descriptor tables and selectors of the calling (bootstrap) core.
    fn descriptor_tables(&self) -> DescriptorTables;

    /// Place the wake vector image and return its startup vector.
    fn install_wake_vector(&self, params: &WakeVectorParams) -> Result<u8, MpError>;

    /// First step of the startup signal, sent to every core but the caller.
    fn send_init_broadcast(&self);

    /// Second step of the startup signal, sent to every core but the caller.
    fn send_startup_broadcast(&self, vector: u8);

    /// Privileged per-core rebase. Called with the exchange lock held.
    fn privileged_rebase(&self, cpu_index: usize, target: u64);

    /// Busy-wait for roughly `us` microseconds.
    fn delay_us(&self, us: u64);

    /// Stop the calling core for good.
    fn halt_cpu(&self) -> !;

    /// Stop the whole system after an unrecoverable error.
    fn halt_system(&self) -> !;

    /// Spin-loop hint used inside every polling loop.
    fn cpu_relax(&self) {
        core::hint::spin_loop();
    }
}
