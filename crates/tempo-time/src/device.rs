use thiserror::Error;

/// What a hardware timer can be programmed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCaps {
    /// The comparator accepts an absolute counter value ([`Countdown::At`]).
    pub absolute: bool,
    /// The device re-arms itself at a fixed period ([`Countdown::Every`]).
    pub periodic: bool,
    /// Longest single countdown the device can hold, if bounded.
    pub max_countdown_ns: Option<u64>,
}

/// A single hardware countdown program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    /// Fire once, `ns` nanoseconds from now.
    After { ns: u64 },
    /// Fire once when the counter reaches `deadline_ns`. Requires [`DeviceCaps::absolute`].
    At { deadline_ns: u64 },
    /// Fire every `period_ns`, first one period from now. Requires [`DeviceCaps::periodic`].
    Every { period_ns: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("no countdown is armed")]
    NotArmed,

    #[error("unsupported countdown: {0}")]
    Unsupported(&'static str),

    #[error("countdown of {requested_ns}ns exceeds the device limit of {max_ns}ns")]
    CountdownTooLong { requested_ns: u64, max_ns: u64 },

    #[error("device fault: {0}")]
    Fault(String),
}

/// A hardware timer: one monotonic counter plus one countdown that latches an interrupt.
pub trait TimerDevice {
    fn caps(&self) -> DeviceCaps;

    /// Current counter value in nanoseconds.
    fn now_ns(&self) -> u64;

    /// Replaces the current program with `countdown`.
    ///
    /// On error the device is left disarmed.
    fn arm(&mut self, countdown: Countdown) -> Result<(), DeviceError>;

    fn disarm(&mut self);

    /// Acknowledges a latched interrupt. Returns `false` if none was pending.
    fn take_irq(&mut self) -> bool;

    /// Blocks until the armed countdown raises its interrupt.
    ///
    /// The interrupt stays latched until [`TimerDevice::take_irq`]. Returns
    /// [`DeviceError::NotArmed`] rather than blocking forever when nothing is armed and no
    /// interrupt is pending.
    fn wait_for_irq(&mut self) -> Result<(), DeviceError>;
}

impl<T: TimerDevice + ?Sized> TimerDevice for Box<T> {
    fn caps(&self) -> DeviceCaps {
        (**self).caps()
    }

    fn now_ns(&self) -> u64 {
        (**self).now_ns()
    }

    fn arm(&mut self, countdown: Countdown) -> Result<(), DeviceError> {
        (**self).arm(countdown)
    }

    fn disarm(&mut self) {
        (**self).disarm()
    }

    fn take_irq(&mut self) -> bool {
        (**self).take_irq()
    }

    fn wait_for_irq(&mut self) -> Result<(), DeviceError> {
        (**self).wait_for_irq()
    }
}
