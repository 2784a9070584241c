#![forbid(unsafe_code)]

//! Driver environment and timer test cases.
//!
//! [`DriverEnv`] wraps a [`TimeManager`](tempo_timers::TimeManager) with the small helpers test
//! code is written against (`timestamp`, `timeout`, `wait_for_timer_interrupt`, `timer_reset`).
//! [`timer_tests`] lists the timer test cases; [`run_tests`] executes a selection of them, each on
//! a freshly built environment.

mod cases;
mod config;
mod env;
mod runner;

pub use cases::{
    test_ltimer_alert_in_the_past, test_ltimer_periodic, test_time_manager_alert_in_the_past,
    test_timer_increment, test_timer_periodic_callback, test_timer_timeouts, timer_tests,
    GoalCounter, TestCase,
};
pub use config::{ClockKind, ConfigError, DeviceKind, HarnessConfig};
pub use env::{DriverEnv, TIMER_ID};
pub use runner::{run_tests, CaseReport, RunSummary};
