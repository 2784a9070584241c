use tempo_time::{Countdown, DeviceError, TimerDevice};
use tracing::{debug, trace};

use crate::{Result, TimeoutMode, TimerError};

/// The logical timeout currently programmed into a [`LogicalTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Program {
    pub mode: TimeoutMode,
    /// Next logical expiry, in device time.
    pub deadline_ns: u64,
    /// Set for periodic programs.
    pub period_ns: Option<u64>,
}

/// Uniform relative/absolute/periodic timeouts over one [`TimerDevice`].
///
/// Whatever the device lacks is emulated:
/// - absolute deadlines on relative-only hardware become countdowns from now;
/// - periodic programs on one-shot hardware are re-armed from [`LogicalTimer::handle_irq`], each
///   period measured from the previous deadline so call latency never accumulates;
/// - countdowns longer than the device can hold are split, with the intermediate interrupts
///   swallowed by `handle_irq`.
///
/// An absolute deadline that has already passed arms the shortest countdown the device
/// supports, so the interrupt fires essentially immediately instead of never.
#[derive(Debug)]
pub struct LogicalTimer<D: TimerDevice> {
    device: D,
    program: Option<Program>,
    /// The device reloads itself for the current periodic program.
    native_periodic: bool,
}

impl<D: TimerDevice> LogicalTimer<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            program: None,
            native_periodic: false,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }

    pub fn program(&self) -> Option<Program> {
        self.program
    }

    /// Current monotonic timestamp, in nanoseconds.
    #[inline]
    pub fn get_time(&self) -> u64 {
        self.device.now_ns()
    }

    /// Replaces the current program.
    ///
    /// On failure the timer is left idle.
    pub fn set_timeout(&mut self, value_ns: u64, mode: TimeoutMode) -> Result<()> {
        let now = self.device.now_ns();
        let program = match mode {
            TimeoutMode::Relative => Program {
                mode,
                deadline_ns: now.saturating_add(value_ns),
                period_ns: None,
            },
            TimeoutMode::Absolute => Program {
                mode,
                deadline_ns: value_ns,
                period_ns: None,
            },
            TimeoutMode::Periodic => {
                if value_ns == 0 {
                    return Err(TimerError::InvalidPeriod);
                }
                Program {
                    mode,
                    deadline_ns: now.saturating_add(value_ns),
                    period_ns: Some(value_ns),
                }
            }
        };

        self.program = None;
        self.native_periodic = false;
        match self.arm(program, now) {
            Ok(native_periodic) => {
                debug!(?program, now_ns = now, native_periodic, "logical timer armed");
                self.program = Some(program);
                self.native_periodic = native_periodic;
                Ok(())
            }
            Err(err) => {
                self.device.disarm();
                Err(err.into())
            }
        }
    }

    /// Cancels any program. Idle timers stay idle.
    pub fn reset(&mut self) -> Result<()> {
        self.device.disarm();
        // Drop an interrupt that was latched before the reset.
        self.device.take_irq();
        if self.program.take().is_some() {
            debug!("logical timer reset");
        }
        self.native_periodic = false;
        Ok(())
    }

    /// Acknowledges a device interrupt.
    ///
    /// Returns `true` if the programmed timeout expired, `false` for spurious interrupts and the
    /// intermediate interrupts of a split countdown. Periodic programs stay armed.
    pub fn handle_irq(&mut self) -> Result<bool> {
        if !self.device.take_irq() {
            return Ok(false);
        }
        let Some(mut program) = self.program else {
            return Ok(false);
        };

        let now = self.device.now_ns();
        if now < program.deadline_ns {
            if !self.native_periodic {
                trace!(
                    deadline_ns = program.deadline_ns,
                    now_ns = now,
                    "re-arming split countdown"
                );
                self.rearm_oneshot(program.deadline_ns, now)?;
            }
            return Ok(false);
        }

        match program.period_ns {
            Some(period) => {
                let missed = (now - program.deadline_ns) / period;
                program.deadline_ns = program
                    .deadline_ns
                    .saturating_add(period.saturating_mul(missed + 1));
                self.program = Some(program);
                if !self.native_periodic {
                    self.rearm_oneshot(program.deadline_ns, now)?;
                }
            }
            None => {
                self.program = None;
            }
        }
        Ok(true)
    }

    fn rearm_oneshot(&mut self, deadline_ns: u64, now: u64) -> Result<()> {
        if let Err(err) = self.arm_oneshot(deadline_ns, now) {
            self.device.disarm();
            self.program = None;
            return Err(err.into());
        }
        Ok(())
    }

    /// Returns whether the device runs the periodic program by itself.
    fn arm(&mut self, program: Program, now: u64) -> std::result::Result<bool, DeviceError> {
        let caps = self.device.caps();
        if let Some(period_ns) = program.period_ns {
            let fits = caps.max_countdown_ns.map_or(true, |max| period_ns <= max);
            if caps.periodic && fits {
                self.device.arm(Countdown::Every { period_ns })?;
                return Ok(true);
            }
        }
        self.arm_oneshot(program.deadline_ns, now)?;
        Ok(false)
    }

    fn arm_oneshot(&mut self, deadline_ns: u64, now: u64) -> std::result::Result<(), DeviceError> {
        let caps = self.device.caps();
        let remaining = deadline_ns.saturating_sub(now);

        let countdown = match caps.max_countdown_ns {
            Some(max) if remaining > max => Countdown::After { ns: max },
            _ if remaining == 0 => Countdown::After { ns: 0 },
            _ if caps.absolute => Countdown::At { deadline_ns },
            _ => Countdown::After { ns: remaining },
        };
        self.device.arm(countdown)
    }
}
