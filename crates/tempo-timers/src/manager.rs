use tempo_time::TimerDevice;
use tracing::{debug, trace, warn};

use crate::table::IdTable;
use crate::{CallbackError, LogicalTimer, Result, Timeout, TimeoutMode, TimerError, TimerId};

/// Callback invoked by [`TimeManager::update`] when a request matures.
///
/// It receives the manager itself, so it may free its own id or register new timeouts. Whatever
/// context it needs travels in its captured state. An `Err` is logged and otherwise ignored.
pub type TimerCallback<D> =
    Box<dyn FnMut(&mut TimeManager<D>, TimerId) -> std::result::Result<(), CallbackError> + Send>;

/// Most fires a single periodic request gets from one [`TimeManager::update`] pass.
pub const MAX_CATCH_UP_FIRES: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeManagerConfig {
    /// Ids are taken from `0..max_ids`.
    pub max_ids: u32,
}

impl Default for TimeManagerConfig {
    fn default() -> Self {
        Self { max_ids: 64 }
    }
}

struct Pending<D: TimerDevice> {
    mode: TimeoutMode,
    deadline_ns: u64,
    period_ns: Option<u64>,
    callback: Option<TimerCallback<D>>,
    /// Registration order; requests registered during an `update` pass wait for the next one.
    seq: u64,
}

/// An allocated id and its pending request, if any.
type Slot<D> = Option<Pending<D>>;

/// Multiplexes [`TimerId`]-keyed timeout requests onto one [`LogicalTimer`].
///
/// The logical timer is only ever armed for the earliest pending deadline. After the device
/// interrupts, [`TimeManager::update`] fires every matured request and re-arms for whatever is
/// next.
pub struct TimeManager<D: TimerDevice> {
    ltimer: LogicalTimer<D>,
    table: IdTable<Slot<D>>,
    /// Deadline last handed to the logical timer.
    programmed: Option<u64>,
    next_seq: u64,
}

impl<D: TimerDevice> TimeManager<D> {
    pub fn new(ltimer: LogicalTimer<D>, config: TimeManagerConfig) -> Self {
        Self {
            ltimer,
            table: IdTable::new(config.max_ids),
            programmed: None,
            next_seq: 0,
        }
    }

    pub fn with_device(device: D) -> Self {
        Self::new(LogicalTimer::new(device), TimeManagerConfig::default())
    }

    pub fn ltimer(&self) -> &LogicalTimer<D> {
        &self.ltimer
    }

    pub fn ltimer_mut(&mut self) -> &mut LogicalTimer<D> {
        &mut self.ltimer
    }

    #[inline]
    pub fn get_time(&self) -> u64 {
        self.ltimer.get_time()
    }

    /// Deadline the logical timer is currently armed for, as far as the manager knows.
    pub fn programmed_deadline(&self) -> Option<u64> {
        self.programmed
    }

    pub fn is_allocated(&self, id: TimerId) -> bool {
        self.table.get(id).is_some()
    }

    /// Next fire time of `id`'s request, if it has an active one.
    pub fn pending_deadline(&self, id: TimerId) -> Option<u64> {
        self.table.get(id)?.as_ref().map(|p| p.deadline_ns)
    }

    /// Earliest deadline among all active requests.
    pub fn next_deadline(&self) -> Option<u64> {
        self.table
            .iter()
            .filter_map(|(_, slot)| slot.as_ref().map(|p| p.deadline_ns))
            .min()
    }

    pub fn allocated_ids(&self) -> usize {
        self.table.len()
    }

    /// Reserves `id`.
    pub fn alloc_id_at(&mut self, id: TimerId) -> Result<()> {
        self.table.insert_at(id, None)?;
        trace!(%id, "timer id allocated");
        Ok(())
    }

    /// Reserves any free id.
    pub fn alloc_id(&mut self) -> Result<TimerId> {
        let id = self.table.alloc(None)?;
        trace!(%id, "timer id allocated");
        Ok(id)
    }

    /// Cancels `id`'s pending request and releases the id.
    pub fn free_id(&mut self, id: TimerId) -> Result<()> {
        let slot = self.table.remove(id).ok_or(TimerError::UnknownId(id))?;
        trace!(%id, "timer id freed");
        if slot.is_some() {
            self.reprogram()?;
        }
        Ok(())
    }

    /// Registers a request without a callback. It still counts when arming the timer.
    pub fn register(&mut self, id: TimerId, timeout: Timeout) -> Result<()> {
        self.register_cb(id, timeout, None)
    }

    /// Registers a request whose callback is `f`.
    pub fn register_with<F>(&mut self, id: TimerId, timeout: Timeout, f: F) -> Result<()>
    where
        F: FnMut(&mut TimeManager<D>, TimerId) -> std::result::Result<(), CallbackError>
            + Send
            + 'static,
    {
        self.register_cb(id, timeout, Some(Box::new(f)))
    }

    /// Stores `timeout` as `id`'s request, replacing any previous one.
    ///
    /// Absolute deadlines (and periodic start times) at or before the current time are rejected
    /// with [`TimerError::PastDeadline`]. On any error the previous request is left in place.
    pub fn register_cb(
        &mut self,
        id: TimerId,
        timeout: Timeout,
        callback: Option<TimerCallback<D>>,
    ) -> Result<()> {
        if !self.is_allocated(id) {
            return Err(TimerError::UnknownId(id));
        }

        let now = self.ltimer.get_time();
        let (deadline_ns, period_ns) = match timeout {
            Timeout::Relative(ns) => (now.saturating_add(ns), None),
            Timeout::Absolute(deadline_ns) => {
                if deadline_ns <= now {
                    return Err(TimerError::PastDeadline {
                        deadline_ns,
                        now_ns: now,
                    });
                }
                (deadline_ns, None)
            }
            Timeout::Periodic { period_ns, start_ns } => {
                if period_ns == 0 {
                    return Err(TimerError::InvalidPeriod);
                }
                match start_ns {
                    Some(start) if start <= now => {
                        return Err(TimerError::PastDeadline {
                            deadline_ns: start,
                            now_ns: now,
                        })
                    }
                    Some(start) => (start, Some(period_ns)),
                    None => (now.saturating_add(period_ns), Some(period_ns)),
                }
            }
        };

        let seq = self.next_seq;
        self.next_seq += 1;
        let pending = Pending {
            mode: timeout.mode(),
            deadline_ns,
            period_ns,
            callback,
            seq,
        };

        let prev = self.slot_mut(id)?.replace(pending);
        if let Err(err) = self.reprogram() {
            *self.slot_mut(id)? = prev;
            if let Err(restore_err) = self.reprogram() {
                warn!(%id, error = %restore_err, "failed to restore timer program");
            }
            return Err(err);
        }
        debug!(%id, ?timeout, deadline_ns, "timeout registered");
        Ok(())
    }

    /// Cancels `id`'s pending request, keeping the id allocated.
    pub fn deregister_cb(&mut self, id: TimerId) -> Result<()> {
        if self.slot_mut(id)?.take().is_some() {
            self.reprogram()?;
        }
        Ok(())
    }

    /// Fires every matured request, then re-arms the logical timer for the earliest remaining
    /// deadline (or resets it if nothing is pending).
    ///
    /// Requests fire in deadline order. A periodic request advances by exactly one period per
    /// fire, so one that fell several periods behind fires once for each of them, up to
    /// [`MAX_CATCH_UP_FIRES`] per pass. Older missed periods are dropped.
    pub fn update(&mut self) -> Result<()> {
        let now = self.ltimer.get_time();
        let pass = self.next_seq;

        self.skip_excess_periods(now);
        while let Some(id) = self.next_matured(now, pass) {
            self.fire(id);
        }

        // The logical timer may have been driven directly since the last reprogram.
        self.programmed = None;
        self.reprogram()
    }

    /// Resets the logical timer. Pending requests are kept and re-armed by the next `update`,
    /// `register_cb` or `free_id`.
    pub fn reset(&mut self) -> Result<()> {
        self.programmed = None;
        self.ltimer.reset()
    }

    fn skip_excess_periods(&mut self, now: u64) {
        for (id, slot) in self.table.iter_mut() {
            let Some(p) = slot.as_mut() else { continue };
            let Some(period) = p.period_ns else { continue };
            if p.deadline_ns > now {
                continue;
            }
            let missed = (now - p.deadline_ns) / period + 1;
            if missed > MAX_CATCH_UP_FIRES {
                let skipped = missed - MAX_CATCH_UP_FIRES;
                p.deadline_ns += skipped * period;
                warn!(%id, skipped, period_ns = period, "periodic timeout fell behind");
            }
        }
    }

    fn slot_mut(&mut self, id: TimerId) -> Result<&mut Slot<D>> {
        self.table.get_mut(id).ok_or(TimerError::UnknownId(id))
    }

    fn next_matured(&self, now: u64, pass: u64) -> Option<TimerId> {
        self.table
            .iter()
            .filter_map(|(id, slot)| {
                let p = slot.as_ref()?;
                (p.seq < pass && p.deadline_ns <= now).then_some((p.deadline_ns, id))
            })
            .min()
            .map(|(_, id)| id)
    }

    fn fire(&mut self, id: TimerId) {
        let Some(slot) = self.table.get_mut(id) else {
            return;
        };
        let Some(pending) = slot.as_mut() else {
            return;
        };

        let seq = pending.seq;
        let mode = pending.mode;
        let deadline_ns = pending.deadline_ns;
        let mut callback = pending.callback.take();

        match pending
            .period_ns
            .and_then(|period| deadline_ns.checked_add(period))
        {
            Some(next) => pending.deadline_ns = next,
            None => *slot = None,
        }
        trace!(%id, ?mode, deadline_ns, "timeout fired");

        let Some(cb) = callback.as_mut() else {
            return;
        };
        if let Err(err) = cb(self, id) {
            warn!(%id, error = %err, "timer callback failed");
        }

        // Hand the callback back unless the request was replaced, freed or has finished.
        if let Some(Some(pending)) = self.table.get_mut(id) {
            if pending.seq == seq && pending.callback.is_none() {
                pending.callback = callback;
            }
        }
    }

    fn reprogram(&mut self) -> Result<()> {
        let next = self.next_deadline();
        let armed = self.ltimer.program().map(|p| p.deadline_ns);
        if next == self.programmed && armed == next {
            return Ok(());
        }

        self.programmed = None;
        match next {
            Some(deadline_ns) => {
                self.ltimer.set_timeout(deadline_ns, TimeoutMode::Absolute)?;
                self.programmed = Some(deadline_ns);
                trace!(deadline_ns, "logical timer reprogrammed");
            }
            None => {
                self.ltimer.reset()?;
            }
        }
        Ok(())
    }
}
