//! x86_64 support
//!
//! - `lapic`: local APIC enable and all-excluding-self INIT/STARTUP broadcasts
//! - `topology`: APIC IDs and core counts from CPUID
//! - `wake_vector`: placement of the real-mode wake vector image
//! - `platform`: [`X86Platform`], the `MpPlatform` built from the above

pub mod lapic;
mod platform;
pub mod topology;
mod wake_vector;

pub use platform::{halt_loop, RebaseHook, X86Platform};
pub use wake_vector::{ImageWakeVector, WakeVectorBuilder};
