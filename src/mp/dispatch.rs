//! Task Dispatcher
//!
//! One slot per worker core. The slot state is the only synchronization point
//! between the bootstrap core and a worker:
//!
//! - `Ready`: the bootstrap core owns job/argument/result and may publish.
//! - `Start`: published with Release; the worker takes ownership on its
//!   Acquire load and immediately moves the slot to `Busy`.
//! - `Busy` -> `Ready`: the worker stores the result and hands the slot back
//!   with Release.
//!
//! There is no queue: a slot holds at most one outstanding job.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};

use super::error::MpError;
use super::platform::MpPlatform;
use super::types::{TaskProc, TaskState, MAX_CPUS};

pub struct TaskSlot {
    state: AtomicU8,
    job: UnsafeCell<Option<TaskProc>>,
    argument: AtomicU64,
    result: AtomicU64,
    /// Completed executions, for diagnostics
    runs: AtomicU64,
}

// The job cell is only written by the dispatcher while the slot is Ready and
// only read by the worker between its Acquire of Start and its Release of
// Ready.
unsafe impl Sync for TaskSlot {}

impl TaskSlot {
    const fn new() -> Self {
        Self {
            state: AtomicU8::new(TaskState::Ready as u8),
            job: UnsafeCell::new(None),
            argument: AtomicU64::new(0),
            result: AtomicU64::new(0),
            runs: AtomicU64::new(0),
        }
    }

    fn state(&self) -> TaskState {
        TaskState::from_atomic(self.state.load(Ordering::Acquire))
    }
}

pub struct TaskDispatcher {
    slots: [TaskSlot; MAX_CPUS],
    /// Frozen at the end of the run phase; 1 until then
    cpu_count: AtomicUsize,
    parked: AtomicBool,
}

impl TaskDispatcher {
    pub const fn new() -> Self {
        #[allow(clippy::declare_interior_mutable_const)]
        const SLOT: TaskSlot = TaskSlot::new();
        Self {
            slots: [SLOT; MAX_CPUS],
            cpu_count: AtomicUsize::new(1),
            parked: AtomicBool::new(false),
        }
    }

    pub fn reset(&self) {
        self.parked.store(false, Ordering::Release);
        self.cpu_count.store(1, Ordering::Release);
    }

    pub fn cpu_count(&self) -> usize {
        self.cpu_count.load(Ordering::Acquire)
    }

    /// Zero-initialize slots `1..cpu_count` and freeze the count.
    ///
    /// # Safety
    /// Only the bootstrap controller may call this, before any job has been
    /// published.
    pub unsafe fn init_slots(&self, cpu_count: usize) {
        let cpu_count = cpu_count.clamp(1, MAX_CPUS);
        for slot in self.slots.iter().take(cpu_count).skip(1) {
            *slot.job.get() = None;
            slot.argument.store(0, Ordering::Relaxed);
            slot.result.store(0, Ordering::Relaxed);
            slot.runs.store(0, Ordering::Relaxed);
            slot.state.store(TaskState::Ready as u8, Ordering::Release);
        }
        self.cpu_count.store(cpu_count, Ordering::Release);
    }

    pub fn check_index(&self, index: usize) -> Result<(), MpError> {
        if index == 0 || index >= self.cpu_count() {
            return Err(MpError::InvalidIndex(index));
        }
        Ok(())
    }

    /// Publish a job: job, then argument, then state = Start.
    ///
    /// # Safety
    /// The caller must be the single dispatcher for this context.
    pub unsafe fn publish(&self, index: usize, job: TaskProc, argument: u64) -> Result<(), MpError> {
        self.check_index(index)?;
        if self.is_parked() {
            return Err(MpError::WorkersParked);
        }
        let slot = &self.slots[index];
        if slot.state() != TaskState::Ready {
            return Err(MpError::NotReady(index));
        }
        *slot.job.get() = Some(job);
        slot.argument.store(argument, Ordering::Relaxed);
        slot.state.store(TaskState::Start as u8, Ordering::Release);
        Ok(())
    }

    pub fn state(&self, index: usize) -> Option<TaskState> {
        self.slots.get(index).map(TaskSlot::state)
    }

    /// Result of the last job, once the slot is back in Ready
    pub fn result(&self, index: usize) -> Option<u64> {
        let slot = self.slots.get(index)?;
        match slot.state() {
            TaskState::Ready => Some(slot.result.load(Ordering::Relaxed)),
            _ => None,
        }
    }

    /// Tell every worker to leave its polling loop. Does not wait.
    pub fn park(&self) {
        self.parked.store(true, Ordering::Release);
    }

    pub fn is_parked(&self) -> bool {
        self.parked.load(Ordering::Acquire)
    }

    /// Worker side: poll the slot for `index` until parked.
    pub fn worker_loop<P: MpPlatform>(&self, platform: &P, index: usize) {
        let Some(slot) = self.slots.get(index) else {
            return;
        };

        loop {
            if self.is_parked() {
                return;
            }

            if slot.state.load(Ordering::Acquire) == TaskState::Start as u8 {
                // Guard against a second publish overwriting job/argument
                slot.state.store(TaskState::Busy as u8, Ordering::Relaxed);

                let job = unsafe { *slot.job.get() };
                let argument = slot.argument.load(Ordering::Relaxed);
                let result = job.map_or(0, |job| job(argument));

                slot.result.store(result, Ordering::Relaxed);
                slot.runs.fetch_add(1, Ordering::Relaxed);
                slot.state.store(TaskState::Ready as u8, Ordering::Release);
                continue;
            }

            platform.cpu_relax();
        }
    }

    fn view(&self, index: usize) -> TaskSlotView {
        let slot = &self.slots[index];
        let state = slot.state();
        TaskSlotView {
            index,
            state,
            // Written only by the dispatcher, which cannot run while a view
            // borrows the controller
            job: unsafe { *slot.job.get() },
            argument: slot.argument.load(Ordering::Relaxed),
            result: match state {
                TaskState::Ready => Some(slot.result.load(Ordering::Relaxed)),
                _ => None,
            },
            runs: slot.runs.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of one slot
#[derive(Clone, Copy, Debug)]
pub struct TaskSlotView {
    pub index: usize,
    pub state: TaskState,
    pub job: Option<TaskProc>,
    pub argument: u64,
    /// Only meaningful once the slot is back in Ready
    pub result: Option<u64>,
    pub runs: u64,
}

/// Read-only view over the worker slots, indexed by CPU index (`1..cpu_count`)
#[derive(Clone, Copy)]
pub struct TaskSlots<'a> {
    dispatcher: &'a TaskDispatcher,
    cpu_count: usize,
}

impl<'a> TaskSlots<'a> {
    pub(super) fn new(dispatcher: &'a TaskDispatcher) -> Self {
        Self {
            dispatcher,
            cpu_count: dispatcher.cpu_count(),
        }
    }

    /// Number of worker slots (`cpu_count - 1`)
    pub fn len(&self) -> usize {
        self.cpu_count - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<TaskSlotView> {
        if index == 0 || index >= self.cpu_count {
            return None;
        }
        Some(self.dispatcher.view(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = TaskSlotView> + 'a {
        let dispatcher = self.dispatcher;
        (1..self.cpu_count).map(move |index| dispatcher.view(index))
    }
}
