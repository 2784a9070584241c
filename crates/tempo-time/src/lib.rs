//! Monotonic time sources and the hardware timer device contract.
//!
//! Everything above this crate sees time as **monotonic nanoseconds since an arbitrary fixed
//! epoch**. A [`Clock`] supplies that counter; a [`TimerDevice`] adds a single countdown that
//! latches an interrupt when it expires, either once or repeating at a fixed period.
//!
//! [`TickTimer`] is a comparator-style model of such a device. It runs against any [`Clock`], so
//! the same code path serves deterministic tests ([`ManualClock`]) and real-time runs
//! ([`StdClock`]).

mod clock;
mod device;
mod tick_timer;
mod ticks;

pub use clock::{Clock, ManualClock, StdClock};
pub use device::{Countdown, DeviceCaps, DeviceError, TimerDevice};
pub use tick_timer::{TickTimer, TickTimerConfig, PIT_INPUT_HZ};
pub use ticks::TickConverter;

pub const NS_IN_US: u64 = 1_000;
pub const NS_IN_MS: u64 = 1_000_000;
pub const NS_IN_S: u64 = 1_000_000_000;
