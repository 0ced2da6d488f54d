//! MP Type Definitions
//!
//! Platform constants, the per-core record, phase and task-state enums, and
//! the parameter block handed to the wake-vector builder.

use core::ffi::c_void;
use core::fmt;

/// Maximum number of CPUs supported (array capacity bound)
pub const MAX_CPUS: usize = 16;

/// AP stack configuration
pub const AP_STACK_SIZE: usize = 8 * 4096;

/// Bring-up timing constants (delay unit x retry count)
pub const BRINGUP_DELAY_US: u64 = 100;
pub const BRINGUP_RETRY_MAX: u32 = 1_000;

/// Task completion polling (used by `wait_task`)
pub const TASK_POLL_DELAY_US: u64 = 10;
pub const TASK_POLL_RETRY_MAX: u32 = 100_000;

/// Startup signal timing, per the MP initialization protocol
pub const INIT_DEASSERT_DELAY_US: u64 = 10_000;
pub const STARTUP_SIGNAL_DELAY_US: u64 = 200;

/// Privileged region reserved for per-core rebasing
pub const REBASE_REGION_BASE: u64 = 0x7F00_0000;
pub const REBASE_REGION_SIZE: u64 = 0x0010_0000;
pub const REBASE_STRIDE: u64 = 0x2000;

/// Entry procedure executed by an AP once the wake vector hands over control.
///
/// The argument is the address of the shared `MpContext`.
pub type ApEntry = unsafe extern "C" fn(context: *const c_void) -> !;

/// A job dispatched to a worker core.
pub type TaskProc = fn(u64) -> u64;

/// Bring-up phase, advanced strictly in declaration order
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum MpPhase {
    Null = 0,
    Wakeup = 1,
    Run = 2,
    Done = 3,
}

impl MpPhase {
    pub fn from_atomic(val: u8) -> Self {
        match val {
            1 => MpPhase::Wakeup,
            2 => MpPhase::Run,
            3 => MpPhase::Done,
            _ => MpPhase::Null,
        }
    }

    /// The only phase that may follow this one
    pub const fn next(self) -> Option<Self> {
        match self {
            MpPhase::Null => Some(MpPhase::Wakeup),
            MpPhase::Wakeup => Some(MpPhase::Run),
            MpPhase::Run => Some(MpPhase::Done),
            MpPhase::Done => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            MpPhase::Null => "null",
            MpPhase::Wakeup => "wakeup",
            MpPhase::Run => "run",
            MpPhase::Done => "done",
        }
    }
}

impl fmt::Display for MpPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hand-off state of a task slot
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TaskState {
    /// Owned by the dispatcher; a new job may be published
    Ready = 0,
    /// Job published, waiting for the worker to pick it up
    Start = 1,
    /// Worker is executing the job
    Busy = 2,
}

impl TaskState {
    pub fn from_atomic(val: u8) -> Self {
        match val {
            1 => TaskState::Start,
            2 => TaskState::Busy,
            _ => TaskState::Ready,
        }
    }
}

/// Per-core record, immutable once the run phase completes
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct CpuRecord {
    /// 0 is always the bootstrap core
    pub index: usize,
    /// Opaque hardware identifier (APIC ID on x86)
    pub topology_id: u32,
    /// Whether the privileged rebase operation ran for this core
    pub rebased: bool,
}

impl CpuRecord {
    pub const fn empty() -> Self {
        Self {
            index: 0,
            topology_id: 0,
            rebased: false,
        }
    }

    pub const fn is_bootstrap(&self) -> bool {
        self.index == 0
    }
}

/// Descriptor tables and selectors cached from the bootstrap core
#[repr(C)]
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct DescriptorTables {
    pub gdt_base: u64,
    pub gdt_limit: u16,
    pub idt_base: u64,
    pub idt_limit: u16,
    pub code_selector: u16,
    pub data_selector: u16,
}

/// Fixed-size stack carve-out handed to the wake vector
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct StackReservation {
    /// Lowest address of the region
    pub base: u64,
    /// Size of each per-core stack
    pub stack_size: usize,
    /// Number of per-core stacks in the region
    pub count: usize,
}

impl StackReservation {
    /// Top of the stack for the core with the given arrival index,
    /// 16-byte aligned as the x86_64 ABI requires.
    pub fn stack_top(&self, index: usize) -> Option<u64> {
        if index >= self.count {
            return None;
        }
        let top = self.base + ((index + 1) * self.stack_size) as u64;
        Some(top & !0xF)
    }
}

/// Parameter block consumed by the wake-vector builder.
///
/// Once the image is placed, an AP receiving the startup signal must end up
/// calling `entry(context)` on its own stack carved from `stacks`.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct WakeVectorParams {
    pub entry: ApEntry,
    pub context: u64,
    pub exchange: u64,
    pub stacks: StackReservation,
    pub tables: DescriptorTables,
}

impl fmt::Debug for WakeVectorParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WakeVectorParams")
            .field("entry", &format_args!("{:#x}", self.entry as usize))
            .field("context", &format_args!("{:#x}", self.context))
            .field("exchange", &format_args!("{:#x}", self.exchange))
            .field("stacks", &self.stacks)
            .field("tables", &self.tables)
            .finish()
    }
}
