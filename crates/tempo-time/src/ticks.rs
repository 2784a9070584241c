/// Converts between nanoseconds and ticks of a fixed-frequency counter.
///
/// Conversions towards ticks round down (a counter has not reached the next tick until it has),
/// conversions of deadlines round up so an interrupt never fires before the requested time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickConverter {
    freq_hz: u64,
}

impl TickConverter {
    const NS_PER_SEC: u128 = 1_000_000_000;

    /// # Panics
    ///
    /// Panics if `freq_hz` is zero.
    pub fn new(freq_hz: u64) -> Self {
        assert!(freq_hz != 0, "counter frequency must be non-zero");
        Self { freq_hz }
    }

    pub fn freq_hz(&self) -> u64 {
        self.freq_hz
    }

    pub fn ticks_from_ns(&self, ns: u64) -> u64 {
        saturate((ns as u128) * (self.freq_hz as u128) / Self::NS_PER_SEC)
    }

    pub fn ticks_from_ns_ceil(&self, ns: u64) -> u64 {
        let numer = (ns as u128) * (self.freq_hz as u128);
        saturate(numer.div_ceil(Self::NS_PER_SEC))
    }

    pub fn ns_from_ticks(&self, ticks: u64) -> u64 {
        saturate((ticks as u128) * Self::NS_PER_SEC / (self.freq_hz as u128))
    }

    pub fn ns_from_ticks_ceil(&self, ticks: u64) -> u64 {
        let numer = (ticks as u128) * Self::NS_PER_SEC;
        saturate(numer.div_ceil(self.freq_hz as u128))
    }
}

fn saturate(v: u128) -> u64 {
    u64::try_from(v).unwrap_or(u64::MAX)
}
