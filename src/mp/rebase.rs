//! Secure Rebase Gate
//!
//! Every core relocates its privileged region to `base + index * stride`
//! while holding the exchange lock, then acknowledges. This is the only step
//! of bring-up that needs true mutual exclusion across cores.
//!
//! Cores whose window would fall outside the reserved region skip the
//! privileged operation but still acknowledge, so platforms with more cores
//! than the region supports boot normally.

use super::config::MpConfig;
use super::exchange::SharedExchangeBlock;
use super::platform::MpPlatform;
use super::registry::PerCpuRegistry;

/// Outcome of one core's pass through the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebaseOutcome {
    Rebased(u64),
    Skipped,
}

pub struct SecureRebaseGate<'a, P: MpPlatform> {
    platform: &'a P,
    exchange: &'a SharedExchangeBlock,
    registry: &'a PerCpuRegistry,
    config: &'a MpConfig,
}

impl<'a, P: MpPlatform> SecureRebaseGate<'a, P> {
    pub fn new(
        platform: &'a P,
        exchange: &'a SharedExchangeBlock,
        registry: &'a PerCpuRegistry,
        config: &'a MpConfig,
    ) -> Self {
        Self {
            platform,
            exchange,
            registry,
            config,
        }
    }

    /// Target address for `index`, or `None` if its window does not fit
    pub fn target(config: &MpConfig, index: usize) -> Option<u64> {
        let offset = (index as u64).checked_mul(config.rebase_stride)?;
        let end = offset.checked_add(config.rebase_stride)?;
        if end > config.rebase_size {
            return None;
        }
        config.rebase_base.checked_add(offset)
    }

    /// Run the gate for the calling core
    pub fn pass(&self, index: usize) -> RebaseOutcome {
        let target = Self::target(self.config, index);

        let mut data = self.exchange.acquire(self.platform);
        let outcome = match target {
            Some(target) => {
                self.platform.privileged_rebase(index, target);
                self.registry.mark_rebased(index);
                RebaseOutcome::Rebased(target)
            }
            None => {
                data.rebase_skipped += 1;
                RebaseOutcome::Skipped
            }
        };
        data.rebase_ack_count += 1;
        drop(data);

        outcome
    }

    pub fn acknowledged(&self) -> usize {
        self.exchange.read(self.platform).rebase_ack_count
    }

    /// Poll until `expected` acknowledgements arrived or the budget runs out.
    /// Returns the last observed count.
    pub fn wait_for(&self, expected: usize, delay_us: u64, retries: u32) -> usize {
        for _ in 0..retries {
            let acked = self.acknowledged();
            if acked >= expected {
                return acked;
            }
            self.platform.delay_us(delay_us);
        }
        self.acknowledged()
    }
}
