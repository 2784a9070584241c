use tempo_time::TimerDevice;
use tempo_timers::{LogicalTimer, Result, TimeManager, Timeout, TimeoutMode, TimerError, TimerId};

/// Id the convenience helpers operate on.
pub const TIMER_ID: TimerId = TimerId(0);

/// What a timer test case runs against: a timer manager over one hardware timer.
pub struct DriverEnv<D: TimerDevice> {
    tm: TimeManager<D>,
}

impl<D: TimerDevice> DriverEnv<D> {
    pub fn new(tm: TimeManager<D>) -> Self {
        Self { tm }
    }

    pub fn with_device(device: D) -> Self {
        Self::new(TimeManager::with_device(device))
    }

    pub fn tm(&self) -> &TimeManager<D> {
        &self.tm
    }

    pub fn tm_mut(&mut self) -> &mut TimeManager<D> {
        &mut self.tm
    }

    pub fn ltimer(&self) -> &LogicalTimer<D> {
        self.tm.ltimer()
    }

    pub fn ltimer_mut(&mut self) -> &mut LogicalTimer<D> {
        self.tm.ltimer_mut()
    }

    #[inline]
    pub fn timestamp(&self) -> u64 {
        self.tm.get_time()
    }

    /// Registers a callback-less timeout on [`TIMER_ID`].
    pub fn timeout(&mut self, value_ns: u64, mode: TimeoutMode) -> Result<()> {
        self.tm.register(TIMER_ID, Timeout::new(mode, value_ns))
    }

    /// Blocks until the logical timer's program expires.
    ///
    /// Intermediate interrupts (split countdowns) are acknowledged and waited through.
    pub fn wait_for_timer_interrupt(&mut self) -> Result<()> {
        loop {
            self.ltimer_mut()
                .device_mut()
                .wait_for_irq()
                .map_err(TimerError::from)?;
            if self.ltimer_mut().handle_irq()? {
                return Ok(());
            }
        }
    }

    /// Cancels the [`TIMER_ID`] request and idles the logical timer.
    pub fn timer_reset(&mut self) -> Result<()> {
        self.tm.deregister_cb(TIMER_ID)?;
        self.ltimer_mut().reset()
    }
}
