use tempo_time::DeviceError;
use thiserror::Error;

use crate::errno;
use crate::TimerId;

pub type Result<T> = std::result::Result<T, TimerError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    /// An absolute deadline at or before the current time.
    #[error("deadline {deadline_ns}ns is not after the current time {now_ns}ns")]
    PastDeadline { deadline_ns: u64, now_ns: u64 },

    #[error("timer id {0} is not allocated")]
    UnknownId(TimerId),

    #[error("timer id {0} is already allocated")]
    DuplicateId(TimerId),

    #[error("timer id {id} is outside the table (max {max})")]
    IdOutOfRange { id: TimerId, max: u32 },

    #[error("no free timer ids")]
    NoFreeIds,

    #[error("periodic timeouts need a non-zero period")]
    InvalidPeriod,

    #[error("failed to program timer hardware: {0}")]
    Hardware(#[from] DeviceError),
}

impl TimerError {
    /// The errno-style code for this error.
    ///
    /// Unknown and duplicate ids map to distinct codes, and a past deadline is always `ETIME`.
    pub fn code(&self) -> i32 {
        match self {
            Self::PastDeadline { .. } => errno::ETIME,
            Self::UnknownId(_) | Self::InvalidPeriod => errno::EINVAL,
            Self::DuplicateId(_) => errno::EADDRINUSE,
            Self::IdOutOfRange { .. } => errno::ERANGE,
            Self::NoFreeIds => errno::ENOMEM,
            Self::Hardware(_) => errno::EIO,
        }
    }
}

/// Failure reported by a timer callback. Logged by the manager, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CallbackError(pub String);

impl CallbackError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_distinguish_id_misuse() {
        let id = TimerId(3);
        assert_ne!(
            TimerError::UnknownId(id).code(),
            TimerError::DuplicateId(id).code()
        );
        assert_eq!(
            TimerError::PastDeadline {
                deadline_ns: 1,
                now_ns: 2
            }
            .code(),
            errno::ETIME
        );
        assert_eq!(
            TimerError::from(DeviceError::NotArmed).code(),
            errno::EIO
        );
    }
}
