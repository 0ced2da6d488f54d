//! MP Runtime Configuration
//!
//! Defaults come from the fixed platform constants and Cargo features; the
//! boot command line may override them with `mp.*` tokens.

use super::types::{
    BRINGUP_DELAY_US, BRINGUP_RETRY_MAX, REBASE_REGION_BASE, REBASE_REGION_SIZE, REBASE_STRIDE,
    TASK_POLL_DELAY_US, TASK_POLL_RETRY_MAX,
};

/// Runtime configuration for bring-up and dispatch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MpConfig {
    /// Run the secure rebase gate and check its acknowledgement count
    pub secure_rebase: bool,
    /// Delay unit for the bring-up poll loop
    pub bringup_delay_us: u64,
    /// Retry count for the bring-up poll loop
    pub bringup_retries: u32,
    /// Delay unit for `wait_task`
    pub task_poll_delay_us: u64,
    /// Retry count for `wait_task`
    pub task_poll_retries: u32,
    pub rebase_base: u64,
    pub rebase_size: u64,
    pub rebase_stride: u64,
}

impl MpConfig {
    pub const fn new() -> Self {
        Self {
            secure_rebase: cfg!(feature = "secure_rebase"),
            bringup_delay_us: BRINGUP_DELAY_US,
            bringup_retries: BRINGUP_RETRY_MAX,
            task_poll_delay_us: TASK_POLL_DELAY_US,
            task_poll_retries: TASK_POLL_RETRY_MAX,
            rebase_base: REBASE_REGION_BASE,
            rebase_size: REBASE_REGION_SIZE,
            rebase_stride: REBASE_STRIDE,
        }
    }

    pub const fn with_secure_rebase(mut self, enabled: bool) -> Self {
        self.secure_rebase = enabled;
        self
    }

    pub const fn with_bringup_poll(mut self, delay_us: u64, retries: u32) -> Self {
        self.bringup_delay_us = delay_us;
        self.bringup_retries = retries;
        self
    }

    pub const fn with_task_poll(mut self, delay_us: u64, retries: u32) -> Self {
        self.task_poll_delay_us = delay_us;
        self.task_poll_retries = retries;
        self
    }

    pub const fn with_rebase_region(mut self, base: u64, size: u64, stride: u64) -> Self {
        self.rebase_base = base;
        self.rebase_size = size;
        self.rebase_stride = stride;
        self
    }

    /// Worst-case bring-up wait in microseconds
    pub const fn bringup_budget_us(&self) -> u64 {
        self.bringup_delay_us * self.bringup_retries as u64
    }

    /// Apply `mp.*` overrides from a boot command line
    pub fn apply_cmdline(&mut self, cmdline: &str) {
        for token in cmdline.split_whitespace() {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            match key {
                "mp.rebase" => match parse_switch(value) {
                    Some(enabled) => self.secure_rebase = enabled,
                    None => crate::kwarn!("MP: ignoring malformed {}", token),
                },
                "mp.poll_us" => match value.parse::<u64>() {
                    Ok(us) if us > 0 => self.bringup_delay_us = us,
                    _ => crate::kwarn!("MP: ignoring malformed {}", token),
                },
                "mp.retries" => match value.parse::<u32>() {
                    Ok(n) if n > 0 => self.bringup_retries = n,
                    _ => crate::kwarn!("MP: ignoring malformed {}", token),
                },
                "mp.task_poll_us" => match value.parse::<u64>() {
                    Ok(us) if us > 0 => self.task_poll_delay_us = us,
                    _ => crate::kwarn!("MP: ignoring malformed {}", token),
                },
                "mp.task_retries" => match value.parse::<u32>() {
                    Ok(n) if n > 0 => self.task_poll_retries = n,
                    _ => crate::kwarn!("MP: ignoring malformed {}", token),
                },
                _ => {}
            }
        }
    }
}

impl Default for MpConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("on")
        || value.eq_ignore_ascii_case("true")
        || value == "1"
    {
        Some(true)
    } else if value.eq_ignore_ascii_case("off")
        || value.eq_ignore_ascii_case("false")
        || value == "0"
    {
        Some(false)
    } else {
        None
    }
}
