//! Logical timers and the timer manager.
//!
//! [`LogicalTimer`] puts a uniform relative/absolute/periodic interface over a single
//! [`TimerDevice`](tempo_time::TimerDevice), whatever that device natively supports.
//! [`TimeManager`] multiplexes any number of [`TimerId`]-keyed timeout requests onto one logical
//! timer, keeping it armed for the earliest pending deadline and dispatching callbacks from
//! [`TimeManager::update`].

mod error;
mod ltimer;
mod manager;
mod table;
mod timeout;

pub use error::{CallbackError, Result, TimerError};
pub use ltimer::{LogicalTimer, Program};
pub use manager::{TimeManager, TimeManagerConfig, TimerCallback, MAX_CATCH_UP_FIRES};
pub use timeout::{Timeout, TimeoutMode, TimerId};

/// errno-style codes returned by [`TimerError::code`].
pub mod errno {
    pub const EIO: i32 = 5;
    pub const ENOMEM: i32 = 12;
    pub const EINVAL: i32 = 22;
    pub const ERANGE: i32 = 34;
    pub const ETIME: i32 = 62;
    pub const EADDRINUSE: i32 = 98;
}
