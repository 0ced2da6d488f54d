//! Wake Vector Installation
//!
//! A woken AP starts in real mode at `vector << 12`. The image placed there
//! has to climb to long mode, load the bootstrap core's descriptor tables,
//! pick its stack from the reservation and call the entry procedure. Writing
//! that code is the firmware's business; this module only places a
//! prebuilt image and patches the parameter block into it.

use core::mem;
use core::ptr;

use crate::mp::WakeVectorParams;

/// Builds the low-memory wake vector for a given parameter block.
pub trait WakeVectorBuilder: Sync {
    /// Place the image and return the startup vector (page number).
    fn install(&self, params: &WakeVectorParams) -> Result<u8, &'static str>;
}

/// Startup vectors can only address the first megabyte
const WAKE_VECTOR_LIMIT: u64 = 0x10_0000;
const PAGE_SIZE: u64 = 0x1000;

/// Prebuilt image copied to `base`, with the parameters written at
/// `params_offset` inside it.
pub struct ImageWakeVector {
    image: &'static [u8],
    base: u64,
    params_offset: usize,
}

impl ImageWakeVector {
    pub const fn new(image: &'static [u8], base: u64, params_offset: usize) -> Self {
        Self {
            image,
            base,
            params_offset,
        }
    }

    fn validate(&self) -> Result<u8, &'static str> {
        if self.image.is_empty() {
            return Err("wake vector image is empty");
        }
        if self.base % PAGE_SIZE != 0 {
            return Err("wake vector base is not page aligned");
        }
        let end = self.base + self.image.len() as u64;
        if self.base == 0 || end > WAKE_VECTOR_LIMIT {
            return Err("wake vector does not fit below 1 MiB");
        }
        let params_end = self
            .params_offset
            .checked_add(mem::size_of::<WakeVectorParams>())
            .ok_or("wake vector parameter offset overflows")?;
        if params_end > self.image.len() {
            return Err("wake vector parameter block exceeds image");
        }
        if self.params_offset % mem::align_of::<u64>() != 0 {
            return Err("wake vector parameter block is misaligned");
        }
        Ok((self.base / PAGE_SIZE) as u8)
    }
}

impl WakeVectorBuilder for ImageWakeVector {
    fn install(&self, params: &WakeVectorParams) -> Result<u8, &'static str> {
        let vector = self.validate()?;

        crate::kinfo!(
            "MP: Installing wake vector at {:#x} (size {} bytes, vector {:#x})",
            self.base,
            self.image.len(),
            vector
        );

        // The low megabyte is identity mapped during early boot
        unsafe {
            let dest = self.base as *mut u8;
            ptr::copy_nonoverlapping(self.image.as_ptr(), dest, self.image.len());
            let block = dest.add(self.params_offset) as *mut WakeVectorParams;
            ptr::write_volatile(block, *params);
        }

        Ok(vector)
    }
}
