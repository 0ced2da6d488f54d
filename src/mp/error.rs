use core::fmt;

use super::types::MpPhase;

/// Recoverable MP errors.
///
/// Fatal conditions (rebase acknowledgement mismatch) never surface here;
/// they halt the system instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpError {
    /// `advance` called out of order; the phase was left unchanged.
    Sequence { current: MpPhase, requested: MpPhase },
    /// Dispatch target is the bootstrap core or beyond the frozen CPU count.
    InvalidIndex(usize),
    /// Target core still owns its slot (Start or Busy).
    NotReady(usize),
    /// Job entry address is null.
    InvalidTask,
    /// Workers were parked by the done phase.
    WorkersParked,
    /// Bounded completion poll expired for the given core.
    Timeout(usize),
    /// The wake-vector builder rejected the parameter block.
    WakeVector(&'static str),
    /// The bootstrap controller for this context was already handed out.
    AlreadyClaimed,
}

impl fmt::Display for MpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MpError::Sequence { current, requested } => {
                write!(f, "cannot advance from {} to {}", current, requested)
            }
            MpError::InvalidIndex(index) => write!(f, "invalid CPU index {}", index),
            MpError::NotReady(index) => write!(f, "CPU {} still has a task in flight", index),
            MpError::InvalidTask => f.write_str("null task entry"),
            MpError::WorkersParked => f.write_str("workers are parked"),
            MpError::Timeout(index) => write!(f, "timed out waiting for CPU {}", index),
            MpError::WakeVector(reason) => write!(f, "wake vector: {}", reason),
            MpError::AlreadyClaimed => f.write_str("controller already claimed"),
        }
    }
}
