//! Phase Controller
//!
//! Sequences bring-up through Null -> Wakeup -> Run -> Done. Phases advance
//! one step at a time and are never revisited; a rejected request leaves
//! everything untouched.
//!
//! The controller is the only dispatcher: publishing a task needs
//! `&mut self`, which is what keeps each slot single-writer on the
//! bootstrap side.

use core::mem;

use super::ap_entry::ap_entry;
use super::dispatch::TaskSlots;
use super::error::MpError;
use super::exchange::AP_STACKS;
use super::platform::MpPlatform;
use super::rebase::RebaseOutcome;
use super::state::MpContext;
use super::types::{
    CpuRecord, MpPhase, StackReservation, TaskProc, TaskState, WakeVectorParams, MAX_CPUS,
};

pub struct MpController<P: MpPlatform> {
    ctx: &'static MpContext<P>,
    phase: MpPhase,
    records: [CpuRecord; MAX_CPUS],
    record_count: usize,
    stacks: Option<StackReservation>,
}

impl<P: MpPlatform> MpController<P> {
    pub(super) fn new(ctx: &'static MpContext<P>) -> Self {
        Self {
            ctx,
            phase: MpPhase::Null,
            records: [CpuRecord::empty(); MAX_CPUS],
            record_count: 0,
            stacks: None,
        }
    }

    pub fn phase(&self) -> MpPhase {
        self.phase
    }

    pub fn context(&self) -> &'static MpContext<P> {
        self.ctx
    }

    /// Frozen CPU count, bootstrap core included
    pub fn cpu_count(&self) -> usize {
        self.ctx.dispatcher.cpu_count()
    }

    /// Stack carve-out handed to the wake vector, once wakeup ran
    pub fn stacks(&self) -> Option<StackReservation> {
        self.stacks
    }

    /// Advance to `target`, which must be the phase right after the current one
    pub fn advance(&mut self, target: MpPhase) -> Result<(), MpError> {
        let current = self.phase;
        if current.next() != Some(target) {
            crate::kwarn!("MP: Rejected phase change {} -> {}", current, target);
            return Err(MpError::Sequence {
                current,
                requested: target,
            });
        }

        match target {
            MpPhase::Wakeup => self.enter_wakeup()?,
            MpPhase::Run => self.enter_run(),
            MpPhase::Done => self.enter_done(),
            MpPhase::Null => {}
        }

        self.phase = target;
        self.ctx
            .phase
            .store(target as u8, core::sync::atomic::Ordering::Release);
        crate::kinfo!("MP: Phase {} -> {}", current, target);
        Ok(())
    }

    fn enter_wakeup(&mut self) -> Result<(), MpError> {
        let ctx = self.ctx;
        let platform = ctx.platform();

        ctx.exchange.reset(platform);
        ctx.registry.reset();
        ctx.rendezvous.reset();
        ctx.dispatcher.reset();

        let stacks = AP_STACKS.reserve();
        let params = WakeVectorParams {
            entry: ap_entry::<P>,
            context: ctx.address(),
            exchange: ctx.exchange.address(),
            stacks,
            tables: platform.descriptor_tables(),
        };
        crate::kdebug!("MP: Wake vector parameters {:?}", params);

        let vector = platform.install_wake_vector(&params).map_err(|err| {
            crate::kerror!("MP: Wake vector installation failed: {}", err);
            err
        })?;
        self.stacks = Some(stacks);

        ctx.rendezvous.broadcast(platform, vector);
        self.register_bootstrap();
        Ok(())
    }

    fn register_bootstrap(&mut self) {
        let ctx = self.ctx;
        let topology_id = ctx.platform().topology_id();
        ctx.registry.register(0, topology_id);
        crate::kinfo!("MP: Bootstrap core registered (topology {:#x})", topology_id);

        if ctx.config().secure_rebase {
            match ctx.rebase_gate().pass(0) {
                RebaseOutcome::Rebased(target) => {
                    crate::kinfo!("MP: Bootstrap core rebased to {:#x}", target)
                }
                RebaseOutcome::Skipped => {
                    crate::kwarn!("MP: Bootstrap core outside rebase region")
                }
            }
        }

        self.record_count = ctx.registry.snapshot(1, &mut self.records);
    }

    fn enter_run(&mut self) {
        let ctx = self.ctx;
        let platform = ctx.platform();
        let config = ctx.config();

        let present = platform.present_cpu_count();
        if present > MAX_CPUS {
            crate::kwarn!(
                "MP: Limiting CPU count to {} (platform reports {})",
                MAX_CPUS,
                present
            );
        }
        let expected_aps = present.clamp(1, MAX_CPUS) - 1;

        let observed = ctx.rendezvous.wait_for(
            platform,
            expected_aps,
            config.bringup_delay_us,
            config.bringup_retries,
        );
        if observed < expected_aps {
            crate::kwarn!(
                "MP: Bring-up timeout after {}us, {} / {} APs checked in",
                config.bringup_budget_us(),
                observed,
                expected_aps
            );
        }

        let aps = observed.min(MAX_CPUS - 1);
        if aps < observed {
            crate::kwarn!("MP: {} APs beyond capacity were halted", observed - aps);
        }
        let cpu_count = aps + 1;
        self.settle_records(cpu_count);

        if config.secure_rebase {
            let acked = ctx.rebase_gate().wait_for(
                cpu_count,
                config.bringup_delay_us,
                config.bringup_retries,
            );
            if acked != cpu_count {
                crate::kfatal!(
                    "MP: Secure rebase acknowledged by {} of {} CPUs, halting",
                    acked,
                    cpu_count
                );
                platform.halt_system();
            }
            crate::kinfo!("MP: Secure rebase acknowledged by all {} CPUs", acked);
        }

        // SAFETY: the controller is the only dispatcher and nothing has been
        // published yet
        unsafe { ctx.dispatcher.init_slots(cpu_count) };
        self.record_count = cpu_count;
        let registered = ctx.registry.snapshot(cpu_count, &mut self.records);

        crate::kinfo!(
            "MP: {} CPUs online ({} registered, {} task slots)",
            cpu_count,
            registered,
            cpu_count - 1
        );
    }

    /// Each AP writes its record right after checking in; give stragglers
    /// the bring-up budget to finish that store.
    fn settle_records(&self, cpu_count: usize) {
        let ctx = self.ctx;
        let config = ctx.config();
        for _ in 0..config.bringup_retries {
            if ctx.registry.online_count(cpu_count) >= cpu_count {
                return;
            }
            ctx.platform().delay_us(config.bringup_delay_us);
        }
        crate::kwarn!(
            "MP: Only {} of {} CPU records were written",
            ctx.registry.online_count(cpu_count),
            cpu_count
        );
    }

    fn enter_done(&mut self) {
        let mut stuck = 0;
        for slot in self.task_slots().iter() {
            if slot.state != TaskState::Ready {
                stuck += 1;
                crate::kwarn!(
                    "MP: CPU {} still {:?} at done, abandoning its task",
                    slot.index,
                    slot.state
                );
            }
        }
        self.ctx.dispatcher.park();
        crate::kinfo!("MP: Park signal sent ({} workers busy)", stuck);
    }

    /// Publish `job(argument)` to worker `index`. Does not wait.
    pub fn run_task(&mut self, index: usize, job: TaskProc, argument: u64) -> Result<(), MpError> {
        // SAFETY: `&mut self` makes this controller the single dispatcher
        unsafe { self.ctx.dispatcher.publish(index, job, argument) }.map_err(|err| {
            crate::ktrace!("MP: run_task({}) rejected: {}", index, err);
            err
        })
    }

    /// Publish a job given as a raw entry address, rejecting null.
    ///
    /// # Safety
    /// A non-zero `entry` must be the address of a function with the
    /// `TaskProc` signature.
    pub unsafe fn run_task_at(
        &mut self,
        index: usize,
        entry: usize,
        argument: u64,
    ) -> Result<(), MpError> {
        self.ctx.dispatcher.check_index(index)?;
        if entry == 0 {
            return Err(MpError::InvalidTask);
        }
        let job = mem::transmute::<usize, TaskProc>(entry);
        self.run_task(index, job, argument)
    }

    pub fn task_state(&self, index: usize) -> Result<TaskState, MpError> {
        self.ctx.dispatcher.check_index(index)?;
        self.ctx
            .dispatcher
            .state(index)
            .ok_or(MpError::InvalidIndex(index))
    }

    /// Poll worker `index` until its slot is Ready again and return the result
    pub fn wait_task(&self, index: usize) -> Result<u64, MpError> {
        let dispatcher = &self.ctx.dispatcher;
        dispatcher.check_index(index)?;

        let config = self.ctx.config();
        for _ in 0..config.task_poll_retries {
            if let Some(result) = dispatcher.result(index) {
                return Ok(result);
            }
            self.ctx.platform().delay_us(config.task_poll_delay_us);
        }
        dispatcher.result(index).ok_or(MpError::Timeout(index))
    }

    /// Records of all known cores; a stable snapshot once Run completed
    pub fn cpu_info(&self) -> &[CpuRecord] {
        &self.records[..self.record_count]
    }

    pub fn task_slots(&self) -> TaskSlots<'_> {
        TaskSlots::new(&self.ctx.dispatcher)
    }

    /// Log the full MP state
    pub fn dump(&self) {
        let ctx = self.ctx;
        crate::kinfo!(
            "MP: phase={} cpu_count={} ready={} secure_rebase={}",
            self.phase,
            self.cpu_count(),
            ctx.ready_count(),
            ctx.config().secure_rebase
        );
        if ctx.config().secure_rebase {
            let data = ctx.exchange.read(ctx.platform());
            crate::kinfo!(
                "MP:   rebase acks={} skipped={}",
                data.rebase_ack_count,
                data.rebase_skipped
            );
        }
        for record in self.cpu_info() {
            crate::kinfo!(
                "MP:   CPU {} topology={:#x} rebased={}{}",
                record.index,
                record.topology_id,
                record.rebased,
                if record.is_bootstrap() { " (bootstrap)" } else { "" }
            );
        }
        for slot in self.task_slots().iter() {
            crate::kinfo!(
                "MP:   slot {} state={:?} arg={:#x} result={:?} runs={}",
                slot.index,
                slot.state,
                slot.argument,
                slot.result,
                slot.runs
            );
        }
    }
}
