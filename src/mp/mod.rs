//! MP (Multi-Processor) Bring-up and Task Dispatch
//!
//! Wakes every secondary core with one broadcast, collects a record per
//! core, optionally runs the secure per-core rebase, then hands out jobs to
//! the woken cores until the done phase parks them.
//!
//! # Phases
//!
//! `Null -> Wakeup -> Run -> Done`, driven by [`MpController::advance`].
//! Task dispatch is only meaningful in Run.
//!
//! # Module Organization
//!
//! - `types`: Constants, phase/task enums, per-core record, wake parameters
//! - `error`: [`MpError`]
//! - `config`: Timing budgets, rebase region, command-line switches
//! - `platform`: The [`MpPlatform`] hardware seam
//! - `registry`: Per-core records indexed by arrival order
//! - `exchange`: Lock-protected exchange block and AP stack storage
//! - `rendezvous`: Startup broadcast and check-in counting
//! - `dispatch`: Per-worker task slots and the worker polling loop
//! - `rebase`: Secure rebase gate
//! - `state`: [`MpContext`], the record shared by all cores
//! - `ap_entry`: Entry procedure run by every AP
//! - `phase`: [`MpController`], the bootstrap-side phase machine
//!
//! # Usage
//!
//! ```ignore
//! static MP: MpContext<X86Platform> = MpContext::new(platform, MpConfig::new());
//!
//! let mut mp = MP.controller()?;
//! mp.advance(MpPhase::Wakeup)?;
//! mp.advance(MpPhase::Run)?;
//! mp.run_task(1, job, 42)?;
//! let result = mp.wait_task(1)?;
//! mp.advance(MpPhase::Done)?;
//! ```

mod ap_entry;
pub mod config;
mod dispatch;
pub mod error;
mod exchange;
mod phase;
pub mod platform;
mod rebase;
mod registry;
mod rendezvous;
mod state;
pub mod types;

// Re-export types
pub use types::{
    ApEntry, CpuRecord, DescriptorTables, MpPhase, StackReservation, TaskProc, TaskState,
    WakeVectorParams, AP_STACK_SIZE, BRINGUP_DELAY_US, BRINGUP_RETRY_MAX,
    INIT_DEASSERT_DELAY_US, MAX_CPUS, REBASE_REGION_BASE, REBASE_REGION_SIZE, REBASE_STRIDE,
    STARTUP_SIGNAL_DELAY_US, TASK_POLL_DELAY_US, TASK_POLL_RETRY_MAX,
};

pub use config::MpConfig;
pub use error::MpError;
pub use platform::MpPlatform;

// Re-export the shared-state components
pub use dispatch::{TaskDispatcher, TaskSlotView, TaskSlots};
pub use exchange::{ApStackRegion, ExchangeData, SharedExchangeBlock, AP_STACKS};
pub use rebase::{RebaseOutcome, SecureRebaseGate};
pub use registry::PerCpuRegistry;
pub use rendezvous::RendezvousCoordinator;

// Re-export the entry points
pub use ap_entry::ap_entry;
pub use phase::MpController;
pub use state::MpContext;
