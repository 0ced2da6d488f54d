//! AP (Application Processor) Entry
//!
//! The wake vector ends by calling [`ap_entry`] on the AP's own stack with
//! the address of the shared [`MpContext`]. From there the AP checks in,
//! records itself, optionally passes the secure rebase gate, and serves
//! tasks until the done phase parks it.

use core::ffi::c_void;

use super::platform::MpPlatform;
use super::rebase::RebaseOutcome;
use super::state::MpContext;
use super::types::MAX_CPUS;

/// Entry procedure for AP cores (called from the wake vector)
///
/// # Safety
/// `context` must point to the `MpContext<P>` whose address was placed in
/// the wake vector parameters, and must stay valid for the rest of boot.
pub unsafe extern "C" fn ap_entry<P: MpPlatform>(context: *const c_void) -> ! {
    if context.is_null() {
        loop {
            core::hint::spin_loop();
        }
    }
    let ctx = &*(context as *const MpContext<P>);
    let platform = ctx.platform();

    // Check in first: the returned ticket is this core's record index
    let index = ctx.rendezvous.check_in();
    if index >= MAX_CPUS {
        crate::kerror!("MP: AP arrival index {} exceeds capacity {}", index, MAX_CPUS);
        platform.halt_cpu();
    }

    let topology_id = platform.topology_id();
    ctx.registry.register(index, topology_id);
    crate::kdebug!("MP: AP {} checked in (topology {:#x})", index, topology_id);

    if ctx.config.secure_rebase {
        match ctx.rebase_gate().pass(index) {
            RebaseOutcome::Rebased(target) => {
                crate::kdebug!("MP: AP {} rebased to {:#x}", index, target)
            }
            RebaseOutcome::Skipped => {
                crate::kdebug!("MP: AP {} outside rebase region, skipped", index)
            }
        }
    }

    ctx.dispatcher.worker_loop(platform, index);

    crate::kdebug!("MP: AP {} parked", index);
    platform.halt_cpu()
}
