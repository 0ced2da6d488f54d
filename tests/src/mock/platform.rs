//! Virtual MP Platform
//!
//! Emulates the pieces of hardware bring-up depends on:
//!
//! - Topology IDs (per-thread; the test thread is the bootstrap core)
//! - The wake vector (parameters are stored, the vector is a fixed page)
//! - INIT/STARTUP broadcasts (the first STARTUP spawns one thread per
//!   responsive AP, each jumping straight into the entry procedure)
//! - Halting (parked threads for single cores, abort for the system)

use std::cell::Cell;
use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use crate::mp::{DescriptorTables, MpError, MpPlatform, WakeVectorParams};

pub const BOOTSTRAP_TOPOLOGY_ID: u32 = 0;
/// APs get `AP_TOPOLOGY_BASE + n` for n in 1..=responsive
pub const AP_TOPOLOGY_BASE: u32 = 0x10;
pub const MOCK_WAKE_VECTOR: u8 = 0x08;

thread_local! {
    static TOPOLOGY_ID: Cell<u32> = const { Cell::new(BOOTSTRAP_TOPOLOGY_ID) };
    static STALLED: Cell<bool> = const { Cell::new(false) };
}

pub struct MockPlatform {
    present: usize,
    responsive: usize,
    /// AP ordinal (1-based) that hangs before registering itself
    stalled_ap: Option<usize>,
    wake_vector_error: Option<&'static str>,
    tables: DescriptorTables,

    wake_params: Mutex<Option<WakeVectorParams>>,
    init_signals: AtomicUsize,
    startup_signals: AtomicUsize,
    spawned: AtomicBool,
    halted: AtomicUsize,
    rebases: Mutex<Vec<(usize, u64)>>,
}

pub struct MockPlatformBuilder {
    present: usize,
    responsive: Option<usize>,
    stalled_ap: Option<usize>,
    wake_vector_error: Option<&'static str>,
}

impl MockPlatformBuilder {
    /// APs that actually wake up; defaults to every present core
    pub fn responsive(mut self, count: usize) -> Self {
        self.responsive = Some(count);
        self
    }

    pub fn stall_ap(mut self, ordinal: usize) -> Self {
        self.stalled_ap = Some(ordinal);
        self
    }

    pub fn fail_wake_vector(mut self, reason: &'static str) -> Self {
        self.wake_vector_error = Some(reason);
        self
    }

    pub fn build(self) -> MockPlatform {
        MockPlatform {
            present: self.present,
            responsive: self
                .responsive
                .unwrap_or_else(|| self.present.saturating_sub(1)),
            stalled_ap: self.stalled_ap,
            wake_vector_error: self.wake_vector_error,
            tables: DescriptorTables {
                gdt_base: 0xFFFF_8000_0010_0000,
                gdt_limit: 0x37,
                idt_base: 0xFFFF_8000_0010_1000,
                idt_limit: 0xFFF,
                code_selector: 0x08,
                data_selector: 0x10,
            },
            wake_params: Mutex::new(None),
            init_signals: AtomicUsize::new(0),
            startup_signals: AtomicUsize::new(0),
            spawned: AtomicBool::new(false),
            halted: AtomicUsize::new(0),
            rebases: Mutex::new(Vec::new()),
        }
    }
}

impl MockPlatform {
    /// Platform reporting `present` cores, bootstrap included
    pub fn builder(present: usize) -> MockPlatformBuilder {
        MockPlatformBuilder {
            present,
            responsive: None,
            stalled_ap: None,
            wake_vector_error: None,
        }
    }

    pub fn init_signals(&self) -> usize {
        self.init_signals.load(Ordering::SeqCst)
    }

    pub fn startup_signals(&self) -> usize {
        self.startup_signals.load(Ordering::SeqCst)
    }

    pub fn wake_params(&self) -> Option<WakeVectorParams> {
        *self.wake_params.lock().unwrap()
    }

    /// APs that reached `halt_cpu`
    pub fn halted(&self) -> usize {
        self.halted.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` APs halted, up to `timeout`
    pub fn wait_halted(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.halted() >= count {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        self.halted() >= count
    }

    /// `(cpu_index, target)` pairs in the order the rebase ran
    pub fn rebases(&self) -> Vec<(usize, u64)> {
        self.rebases.lock().unwrap().clone()
    }

    fn spawn_aps(&self, params: WakeVectorParams) {
        for ordinal in 1..=self.responsive {
            let topology_id = AP_TOPOLOGY_BASE + ordinal as u32;
            let stalled = self.stalled_ap == Some(ordinal);
            thread::Builder::new()
                .name(format!("ap-{}", ordinal))
                .spawn(move || {
                    TOPOLOGY_ID.with(|id| id.set(topology_id));
                    STALLED.with(|flag| flag.set(stalled));
                    unsafe { (params.entry)(params.context as *const c_void) }
                })
                .expect("spawn AP thread");
        }
    }
}

impl MpPlatform for MockPlatform {
    fn topology_id(&self) -> u32 {
        if STALLED.with(Cell::get) {
            loop {
                thread::park();
            }
        }
        TOPOLOGY_ID.with(Cell::get)
    }

    fn present_cpu_count(&self) -> usize {
        self.present
    }

    fn descriptor_tables(&self) -> DescriptorTables {
        self.tables
    }

    fn install_wake_vector(&self, params: &WakeVectorParams) -> Result<u8, MpError> {
        if let Some(reason) = self.wake_vector_error {
            return Err(MpError::WakeVector(reason));
        }
        *self.wake_params.lock().unwrap() = Some(*params);
        Ok(MOCK_WAKE_VECTOR)
    }

    fn send_init_broadcast(&self) {
        self.init_signals.fetch_add(1, Ordering::SeqCst);
    }

    fn send_startup_broadcast(&self, vector: u8) {
        self.startup_signals.fetch_add(1, Ordering::SeqCst);
        assert_eq!(vector, MOCK_WAKE_VECTOR);

        // Cores already running ignore further STARTUP signals
        if self.spawned.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(params) = self.wake_params() {
            self.spawn_aps(params);
        }
    }

    fn privileged_rebase(&self, cpu_index: usize, target: u64) {
        self.rebases.lock().unwrap().push((cpu_index, target));
    }

    fn delay_us(&self, us: u64) {
        thread::sleep(Duration::from_micros(us));
    }

    fn halt_cpu(&self) -> ! {
        self.halted.fetch_add(1, Ordering::SeqCst);
        loop {
            thread::park();
        }
    }

    fn halt_system(&self) -> ! {
        eprintln!("[MOCK] system halt requested");
        std::process::abort()
    }

    fn cpu_relax(&self) {
        thread::yield_now();
    }
}
