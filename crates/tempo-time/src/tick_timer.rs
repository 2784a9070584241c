use tracing::trace;

use crate::{Clock, Countdown, DeviceCaps, DeviceError, TickConverter, TimerDevice};

pub const PIT_INPUT_HZ: u64 = 1_193_182;
pub const DEFAULT_HPET_FREQ_HZ: u64 = 10_000_000;

/// Shape of the modelled hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTimerConfig {
    pub freq_hz: u64,
    /// Comparator takes absolute counter values.
    pub absolute: bool,
    /// Comparator reloads itself after firing.
    pub periodic: bool,
    /// Widest countdown the reload register can hold, in ticks.
    pub max_countdown_ticks: Option<u64>,
}

impl TickTimerConfig {
    /// 64-bit main counter with an absolute, periodic-capable comparator.
    pub const fn hpet() -> Self {
        Self {
            freq_hz: DEFAULT_HPET_FREQ_HZ,
            absolute: true,
            periodic: true,
            max_countdown_ticks: None,
        }
    }

    /// 16-bit reload counter: relative countdowns only, at most 65536 ticks (~55ms).
    pub const fn pit() -> Self {
        Self {
            freq_hz: PIT_INPUT_HZ,
            absolute: false,
            periodic: true,
            max_countdown_ticks: Some(65_536),
        }
    }

    /// Nanosecond deadline register without a periodic mode.
    pub const fn oneshot() -> Self {
        Self {
            freq_hz: 1_000_000_000,
            absolute: true,
            periodic: false,
            max_countdown_ticks: None,
        }
    }

    /// Same as [`TickTimerConfig::hpet`] but counting whole nanoseconds.
    pub const fn nanosecond() -> Self {
        Self {
            freq_hz: 1_000_000_000,
            ..Self::hpet()
        }
    }
}

impl Default for TickTimerConfig {
    fn default() -> Self {
        Self::hpet()
    }
}

#[derive(Debug, Clone, Copy)]
struct Comparator {
    target_tick: u64,
    /// Zero for one-shot programs.
    period_ticks: u64,
}

/// A free-running counter with a single comparator, driven by a [`Clock`].
///
/// The comparator fires once the counter reaches its target; a target already behind the
/// counter fires on the next service. Periodic programs advance the target by whole periods,
/// skipping any that were missed.
#[derive(Debug)]
pub struct TickTimer<C: Clock> {
    clock: C,
    cfg: TickTimerConfig,
    conv: TickConverter,
    comparator: Option<Comparator>,
    irq_pending: bool,
    irqs_raised: u64,
    fail_next_arm: Option<String>,
}

impl<C: Clock> TickTimer<C> {
    pub fn new(clock: C, cfg: TickTimerConfig) -> Self {
        Self {
            clock,
            conv: TickConverter::new(cfg.freq_hz),
            cfg,
            comparator: None,
            irq_pending: false,
            irqs_raised: 0,
            fail_next_arm: None,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &TickTimerConfig {
        &self.cfg
    }

    /// Makes the next [`TimerDevice::arm`] fail with [`DeviceError::Fault`].
    pub fn fail_next_arm(&mut self, reason: impl Into<String>) {
        self.fail_next_arm = Some(reason.into());
    }

    /// Total number of interrupts raised since creation.
    pub fn irqs_raised(&self) -> u64 {
        self.irqs_raised
    }

    /// Time at which the comparator will next fire, if armed.
    pub fn armed_deadline_ns(&self) -> Option<u64> {
        self.comparator.map(|cmp| self.conv.ns_from_ticks_ceil(cmp.target_tick))
    }

    pub fn is_armed(&self) -> bool {
        self.comparator.is_some()
    }

    fn counter_ticks(&self) -> u64 {
        self.conv.ticks_from_ns(self.clock.now_ns())
    }

    fn check_countdown(&self, ticks: u64) -> Result<(), DeviceError> {
        match self.cfg.max_countdown_ticks {
            Some(max) if ticks > max => Err(DeviceError::CountdownTooLong {
                requested_ns: self.conv.ns_from_ticks(ticks),
                max_ns: self.conv.ns_from_ticks(max),
            }),
            _ => Ok(()),
        }
    }

    fn program(&self, countdown: Countdown) -> Result<Comparator, DeviceError> {
        let now_tick = self.counter_ticks();
        match countdown {
            Countdown::After { ns } => {
                let ticks = self.conv.ticks_from_ns_ceil(ns).max(1);
                self.check_countdown(ticks)?;
                Ok(Comparator {
                    target_tick: now_tick.saturating_add(ticks),
                    period_ticks: 0,
                })
            }
            Countdown::At { deadline_ns } => {
                if !self.cfg.absolute {
                    return Err(DeviceError::Unsupported("absolute comparator"));
                }
                let target_tick = self.conv.ticks_from_ns_ceil(deadline_ns);
                self.check_countdown(target_tick.saturating_sub(now_tick))?;
                Ok(Comparator {
                    target_tick,
                    period_ticks: 0,
                })
            }
            Countdown::Every { period_ns } => {
                if !self.cfg.periodic {
                    return Err(DeviceError::Unsupported("periodic mode"));
                }
                let period_ticks = self.conv.ticks_from_ns_ceil(period_ns).max(1);
                self.check_countdown(period_ticks)?;
                Ok(Comparator {
                    target_tick: now_tick.saturating_add(period_ticks),
                    period_ticks,
                })
            }
        }
    }

    fn service(&mut self) {
        let Some(cmp) = self.comparator.as_mut() else {
            return;
        };
        let counter = self.conv.ticks_from_ns(self.clock.now_ns());
        if counter < cmp.target_tick {
            return;
        }

        self.irq_pending = true;
        self.irqs_raised += 1;

        if cmp.period_ticks != 0 {
            let delta = counter - cmp.target_tick;
            let skips = delta / cmp.period_ticks + 1;
            cmp.target_tick = cmp
                .target_tick
                .saturating_add(cmp.period_ticks.saturating_mul(skips));
        } else {
            self.comparator = None;
        }
    }
}

impl<C: Clock> TimerDevice for TickTimer<C> {
    fn caps(&self) -> DeviceCaps {
        DeviceCaps {
            absolute: self.cfg.absolute,
            periodic: self.cfg.periodic,
            max_countdown_ns: self
                .cfg
                .max_countdown_ticks
                .map(|ticks| self.conv.ns_from_ticks(ticks)),
        }
    }

    fn now_ns(&self) -> u64 {
        self.conv.ns_from_ticks(self.counter_ticks())
    }

    fn arm(&mut self, countdown: Countdown) -> Result<(), DeviceError> {
        self.comparator = None;
        if let Some(reason) = self.fail_next_arm.take() {
            return Err(DeviceError::Fault(reason));
        }
        let cmp = self.program(countdown)?;
        trace!(?countdown, target_tick = cmp.target_tick, "comparator armed");
        self.comparator = Some(cmp);
        Ok(())
    }

    fn disarm(&mut self) {
        self.comparator = None;
    }

    fn take_irq(&mut self) -> bool {
        self.service();
        std::mem::take(&mut self.irq_pending)
    }

    fn wait_for_irq(&mut self) -> Result<(), DeviceError> {
        loop {
            self.service();
            if self.irq_pending {
                return Ok(());
            }
            let Some(cmp) = self.comparator else {
                return Err(DeviceError::NotArmed);
            };
            self.clock
                .wait_until(self.conv.ns_from_ticks_ceil(cmp.target_tick));
        }
    }
}
