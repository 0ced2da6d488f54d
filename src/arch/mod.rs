//! Architecture-specific code
//!
//! Each supported architecture provides an [`MpPlatform`](crate::mp::MpPlatform)
//! implementation plus the low-level pieces it is built from:
//! - x86_64: local APIC broadcast signalling, CPUID topology, TSC delays

#[cfg(target_arch = "x86_64")]
pub mod x86_64;

#[cfg(target_arch = "x86_64")]
pub use self::x86_64::{halt_loop, ImageWakeVector, WakeVectorBuilder, X86Platform};
