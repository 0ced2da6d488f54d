//! CPUID-based topology queries.

use core::arch::x86_64::{__cpuid, __cpuid_count};

const LEAF_EXTENDED_TOPOLOGY: u32 = 0x0B;

fn max_leaf() -> u32 {
    unsafe { __cpuid(0).eax }
}

/// x2APIC ID from the extended topology leaf, falling back to the 8-bit
/// initial APIC ID.
pub fn current_id() -> u32 {
    if max_leaf() >= LEAF_EXTENDED_TOPOLOGY {
        let leaf = unsafe { __cpuid_count(LEAF_EXTENDED_TOPOLOGY, 0) };
        // EBX == 0 means the leaf is not implemented
        if leaf.ebx != 0 {
            return leaf.edx;
        }
    }
    unsafe { __cpuid(1).ebx >> 24 }
}

/// Logical processors in the package as reported by CPUID.
///
/// Only a hint: firmware may have disabled some of them. Platforms with an
/// authoritative source (MADT) should pass that count instead.
pub fn logical_cpu_count() -> usize {
    if max_leaf() >= LEAF_EXTENDED_TOPOLOGY {
        // Walk the levels; the last valid one covers the package
        let mut count = 0;
        for level in 0..8 {
            let leaf = unsafe { __cpuid_count(LEAF_EXTENDED_TOPOLOGY, level) };
            let level_type = (leaf.ecx >> 8) & 0xFF;
            if level_type == 0 {
                break;
            }
            count = (leaf.ebx & 0xFFFF) as usize;
        }
        if count != 0 {
            return count;
        }
    }

    let leaf = unsafe { __cpuid(1) };
    let htt = leaf.edx & (1 << 28) != 0;
    if htt {
        (((leaf.ebx >> 16) & 0xFF) as usize).max(1)
    } else {
        1
    }
}
