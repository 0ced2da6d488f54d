use x86_64::instructions::tables::{sgdt, sidt};
use x86_64::instructions::{hlt, interrupts};
use x86_64::registers::segmentation::{Segment, CS, DS};

use crate::logger;
use crate::mp::{DescriptorTables, MpError, MpPlatform, WakeVectorParams};

use super::wake_vector::WakeVectorBuilder;
use super::{lapic, topology};

/// Per-core privileged rebase, supplied by the firmware that owns the
/// privileged region.
pub type RebaseHook = fn(cpu_index: usize, target: u64);

pub struct X86Platform {
    wake_vector: &'static dyn WakeVectorBuilder,
    cpu_count: Option<usize>,
    rebase: Option<RebaseHook>,
}

impl X86Platform {
    pub const fn new(wake_vector: &'static dyn WakeVectorBuilder) -> Self {
        Self {
            wake_vector,
            cpu_count: None,
            rebase: None,
        }
    }

    /// Use an authoritative core count (MADT) instead of the CPUID hint
    pub const fn with_cpu_count(mut self, count: usize) -> Self {
        self.cpu_count = Some(count);
        self
    }

    pub const fn with_rebase_hook(mut self, hook: RebaseHook) -> Self {
        self.rebase = Some(hook);
        self
    }
}

impl MpPlatform for X86Platform {
    fn topology_id(&self) -> u32 {
        topology::current_id()
    }

    fn present_cpu_count(&self) -> usize {
        self.cpu_count
            .unwrap_or_else(topology::logical_cpu_count)
            .max(1)
    }

    fn descriptor_tables(&self) -> DescriptorTables {
        let gdt = sgdt();
        let idt = sidt();
        DescriptorTables {
            gdt_base: gdt.base.as_u64(),
            gdt_limit: gdt.limit,
            idt_base: idt.base.as_u64(),
            idt_limit: idt.limit,
            code_selector: CS::get_reg().0,
            data_selector: DS::get_reg().0,
        }
    }

    fn install_wake_vector(&self, params: &WakeVectorParams) -> Result<u8, MpError> {
        if !lapic::is_ready() {
            lapic::init(None);
        }
        self.wake_vector.install(params).map_err(MpError::WakeVector)
    }

    fn send_init_broadcast(&self) {
        lapic::broadcast_init();
    }

    fn send_startup_broadcast(&self, vector: u8) {
        lapic::broadcast_startup(vector);
    }

    fn privileged_rebase(&self, cpu_index: usize, target: u64) {
        match self.rebase {
            Some(hook) => hook(cpu_index, target),
            None => crate::kwarn!(
                "MP: No rebase hook installed, CPU {} keeps its region ({:#x} requested)",
                cpu_index,
                target
            ),
        }
    }

    fn delay_us(&self, us: u64) {
        let ticks = logger::tsc_frequency_hz().saturating_mul(us) / 1_000_000;
        let start = unsafe { core::arch::x86_64::_rdtsc() };
        while unsafe { core::arch::x86_64::_rdtsc() }.wrapping_sub(start) < ticks {
            core::hint::spin_loop();
        }
    }

    fn halt_cpu(&self) -> ! {
        halt_loop()
    }

    fn halt_system(&self) -> ! {
        // Put every other core back into wait-for-startup before stopping
        lapic::broadcast_init();
        halt_loop()
    }
}

pub fn halt_loop() -> ! {
    interrupts::disable();
    loop {
        hlt();
    }
}
