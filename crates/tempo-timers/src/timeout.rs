use std::fmt;

/// Caller-chosen handle for one logical timeout slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u32);

impl TimerId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TimerId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutMode {
    /// Fire once, `value` nanoseconds from now.
    Relative,
    /// Fire once when the clock reaches `value`.
    Absolute,
    /// Fire every `value` nanoseconds, first one period from now.
    Periodic,
}

/// A timeout request as handed to [`TimeManager::register_cb`](crate::TimeManager::register_cb).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    Relative(u64),
    Absolute(u64),
    Periodic {
        period_ns: u64,
        /// Absolute time of the first fire. `None` starts one period from now.
        start_ns: Option<u64>,
    },
}

impl Timeout {
    pub fn new(mode: TimeoutMode, value_ns: u64) -> Self {
        match mode {
            TimeoutMode::Relative => Self::Relative(value_ns),
            TimeoutMode::Absolute => Self::Absolute(value_ns),
            TimeoutMode::Periodic => Self::periodic(value_ns),
        }
    }

    pub fn periodic(period_ns: u64) -> Self {
        Self::Periodic {
            period_ns,
            start_ns: None,
        }
    }

    pub fn mode(&self) -> TimeoutMode {
        match self {
            Self::Relative(_) => TimeoutMode::Relative,
            Self::Absolute(_) => TimeoutMode::Absolute,
            Self::Periodic { .. } => TimeoutMode::Periodic,
        }
    }

    pub fn period_ns(&self) -> Option<u64> {
        match self {
            Self::Periodic { period_ns, .. } => Some(*period_ns),
            _ => None,
        }
    }
}
