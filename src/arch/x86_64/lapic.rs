use core::ptr::{read_volatile, write_volatile};
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use x86_64::registers::model_specific::Msr;

const IA32_APIC_BASE: u32 = 0x1B;
const APIC_ENABLE: u64 = 1 << 11;
const APIC_BASE_MASK: u64 = 0xFFFF_F000;
const DEFAULT_SPURIOUS_VECTOR: u8 = 0xFF;

const REG_ID: u32 = 0x20;
const REG_SVR: u32 = 0x0F0;
const REG_ICR_LOW: u32 = 0x300;
const REG_ICR_HIGH: u32 = 0x310;

const ICR_DELIVERY_PENDING: u32 = 1 << 12;
/// Destination shorthand 0b11: all cores excluding self
const ICR_ALL_EXCLUDING_SELF: u32 = 0b11 << 18;
/// Level assert, delivery mode INIT
const ICR_INIT: u32 = 0x4500;
/// Level assert, delivery mode STARTUP; low byte carries the vector
const ICR_STARTUP: u32 = 0x4600;

/// Architectural default when firmware did not relocate the APIC
pub const DEFAULT_LAPIC_BASE: u64 = 0xFEE0_0000;

static LAPIC_BASE: AtomicU64 = AtomicU64::new(0);
static LAPIC_READY: AtomicBool = AtomicBool::new(false);

/// Enable the calling core's local APIC at `lapic_base`, or at the address
/// firmware programmed into IA32_APIC_BASE when `None`.
pub fn init(lapic_base: Option<u64>) {
    let base = lapic_base.unwrap_or_else(|| {
        let msr = Msr::new(IA32_APIC_BASE);
        match unsafe { msr.read() } & APIC_BASE_MASK {
            0 => DEFAULT_LAPIC_BASE,
            base => base,
        }
    });
    LAPIC_BASE.store(base & APIC_BASE_MASK, Ordering::SeqCst);
    enable_apic();
    LAPIC_READY.store(true, Ordering::SeqCst);
    crate::kinfo!(
        "LAPIC: Enabled local APIC at {:#x} (ID {:#x})",
        base,
        current_apic_id()
    );
}

pub fn base() -> Option<u64> {
    if !LAPIC_READY.load(Ordering::SeqCst) {
        return None;
    }
    Some(LAPIC_BASE.load(Ordering::SeqCst))
}

pub fn is_ready() -> bool {
    LAPIC_READY.load(Ordering::SeqCst)
}

pub fn current_apic_id() -> u32 {
    unsafe { read_register(REG_ID) >> 24 }
}

/// INIT to every core but the caller
pub fn broadcast_init() {
    send_broadcast(ICR_ALL_EXCLUDING_SELF | ICR_INIT);
}

/// STARTUP to every core but the caller; cores begin at `vector << 12`
pub fn broadcast_startup(vector: u8) {
    send_broadcast(ICR_ALL_EXCLUDING_SELF | ICR_STARTUP | vector as u32);
}

fn send_broadcast(command: u32) {
    if !is_ready() {
        crate::kerror!("LAPIC: Broadcast {:#x} before init, dropped", command);
        return;
    }
    unsafe {
        wait_for_icr();
        write_register(REG_ICR_HIGH, 0);
        write_register(REG_ICR_LOW, command);
        wait_for_icr();
    }
}

unsafe fn wait_for_icr() {
    while (read_register(REG_ICR_LOW) & ICR_DELIVERY_PENDING) != 0 {
        core::hint::spin_loop();
    }
}

unsafe fn read_register(offset: u32) -> u32 {
    let base = LAPIC_BASE.load(Ordering::SeqCst);
    let ptr = (base + offset as u64) as *const u32;
    read_volatile(ptr)
}

unsafe fn write_register(offset: u32, value: u32) {
    let base = LAPIC_BASE.load(Ordering::SeqCst);
    let ptr = (base + offset as u64) as *mut u32;
    write_volatile(ptr, value);
}

fn enable_apic() {
    unsafe {
        let mut msr = Msr::new(IA32_APIC_BASE);
        let mut value = msr.read();
        let base = LAPIC_BASE.load(Ordering::SeqCst);
        value &= !APIC_BASE_MASK;
        value |= base & APIC_BASE_MASK;
        value |= APIC_ENABLE;
        msr.write(value);

        let mut svr = read_register(REG_SVR);
        svr &= !0xFF;
        svr |= DEFAULT_SPURIOUS_VECTOR as u32;
        svr |= 1 << 8; // APIC software enable
        write_register(REG_SVR, svr);
    }
}
