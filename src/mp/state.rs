//! MP Shared State
//!
//! [`MpContext`] is the single fixed-size record reachable from every core.
//! The wake vector hands its address to each AP; the bootstrap core reaches
//! it through the [`MpController`] it claims once.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use super::config::MpConfig;
use super::dispatch::TaskDispatcher;
use super::error::MpError;
use super::exchange::SharedExchangeBlock;
use super::phase::MpController;
use super::platform::MpPlatform;
use super::rebase::SecureRebaseGate;
use super::registry::PerCpuRegistry;
use super::rendezvous::RendezvousCoordinator;
use super::types::MpPhase;

pub struct MpContext<P: MpPlatform> {
    pub(super) platform: P,
    pub(super) config: MpConfig,
    pub(super) phase: AtomicU8,
    claimed: AtomicBool,
    pub(super) exchange: SharedExchangeBlock,
    pub(super) registry: PerCpuRegistry,
    pub(super) rendezvous: RendezvousCoordinator,
    pub(super) dispatcher: TaskDispatcher,
}

impl<P: MpPlatform> MpContext<P> {
    pub const fn new(platform: P, config: MpConfig) -> Self {
        Self {
            platform,
            config,
            phase: AtomicU8::new(MpPhase::Null as u8),
            claimed: AtomicBool::new(false),
            exchange: SharedExchangeBlock::new(),
            registry: PerCpuRegistry::new(),
            rendezvous: RendezvousCoordinator::new(),
            dispatcher: TaskDispatcher::new(),
        }
    }

    /// Hand out the bootstrap-side controller. Only the first call succeeds.
    pub fn controller(&'static self) -> Result<MpController<P>, MpError> {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| MpError::AlreadyClaimed)?;
        Ok(MpController::new(self))
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn config(&self) -> &MpConfig {
        &self.config
    }

    pub fn phase(&self) -> MpPhase {
        MpPhase::from_atomic(self.phase.load(Ordering::Acquire))
    }

    /// APs that checked in since the last wakeup
    pub fn ready_count(&self) -> usize {
        self.rendezvous.ready_count()
    }

    /// Frozen CPU count (1 until the run phase completes)
    pub fn cpu_count(&self) -> usize {
        self.dispatcher.cpu_count()
    }

    /// Rebase acknowledgements recorded in the exchange block
    pub fn rebase_ack_count(&self) -> usize {
        self.exchange.read(&self.platform).rebase_ack_count
    }

    /// Record index of the calling core, looked up by its topology id
    pub fn current_cpu_index(&self) -> Option<usize> {
        self.registry.index_of(self.platform.topology_id())
    }

    pub(super) fn rebase_gate(&self) -> SecureRebaseGate<'_, P> {
        SecureRebaseGate::new(&self.platform, &self.exchange, &self.registry, &self.config)
    }

    pub fn address(&self) -> u64 {
        self as *const Self as u64
    }
}
