use clap::{Parser, ValueEnum};
use tempo_time::{ManualClock, StdClock, TickTimer, TickTimerConfig, TimerDevice};
use tempo_timers::{LogicalTimer, TimeManager, TimeManagerConfig};

use crate::DriverEnv;

/// Timer hardware model the harness drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeviceKind {
    /// Absolute comparator with native periodic mode.
    Hpet,
    /// Relative-only countdown with a 16-bit reload register.
    Pit,
    /// Absolute one-shot comparator; periodic mode is emulated.
    Oneshot,
}

impl DeviceKind {
    fn timer_config(self) -> TickTimerConfig {
        match self {
            Self::Hpet => TickTimerConfig::hpet(),
            Self::Pit => TickTimerConfig::pit(),
            Self::Oneshot => TickTimerConfig::oneshot(),
        }
    }
}

/// Time source behind the timer device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClockKind {
    /// Simulated clock; waiting jumps straight to the deadline.
    Manual,
    /// Monotonic host clock; waiting sleeps.
    Host,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Args(#[from] clap::Error),
    #[error("--freq-hz must be non-zero")]
    ZeroFrequency,
    #[error("--max-ids must be non-zero")]
    ZeroMaxIds,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "tempo-harness", version, about = "Runs the timer test cases")]
struct Args {
    /// Timer hardware model.
    ///
    /// Environment variable: `TEMPO_DEVICE`.
    #[arg(long, value_enum, default_value_t = DeviceKind::Hpet, env = "TEMPO_DEVICE")]
    device: DeviceKind,

    /// Time source driving the device.
    ///
    /// Environment variable: `TEMPO_CLOCK`.
    #[arg(long, value_enum, default_value_t = ClockKind::Manual, env = "TEMPO_CLOCK")]
    clock: ClockKind,

    /// Override the device counter frequency.
    ///
    /// Environment variable: `TEMPO_FREQ_HZ`.
    #[arg(long, env = "TEMPO_FREQ_HZ")]
    freq_hz: Option<u64>,

    /// Nanoseconds the manual clock advances on every read.
    ///
    /// Environment variable: `TEMPO_READ_STEP_NS`.
    #[arg(long, default_value_t = 50, env = "TEMPO_READ_STEP_NS")]
    read_step_ns: u64,

    /// Number of timer ids the manager hands out.
    ///
    /// Environment variable: `TEMPO_MAX_IDS`.
    #[arg(long, env = "TEMPO_MAX_IDS")]
    max_ids: Option<u32>,

    /// Only run cases whose name contains this string.
    ///
    /// Environment variable: `TEMPO_FILTER`.
    #[arg(long, env = "TEMPO_FILTER")]
    filter: Option<String>,

    /// List the test cases and exit.
    #[arg(long)]
    list: bool,

    /// Log filter (tracing-subscriber EnvFilter syntax).
    ///
    /// Environment variable: `TEMPO_LOG_LEVEL`.
    #[arg(long, default_value = "info", env = "TEMPO_LOG_LEVEL")]
    log_level: String,
}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub device: DeviceKind,
    pub clock: ClockKind,
    pub timer: TickTimerConfig,
    pub read_step_ns: u64,
    pub manager: TimeManagerConfig,
    pub filter: Option<String>,
    pub list: bool,
    pub log_level: String,
}

impl HarnessConfig {
    /// Parses the process arguments and `TEMPO_*` environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::try_parse_from(std::env::args_os())
    }

    pub fn try_parse_from<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let args = Args::try_parse_from(args)?;

        let mut timer = args.device.timer_config();
        if let Some(freq_hz) = args.freq_hz {
            if freq_hz == 0 {
                return Err(ConfigError::ZeroFrequency);
            }
            timer.freq_hz = freq_hz;
        }

        let mut manager = TimeManagerConfig::default();
        if let Some(max_ids) = args.max_ids {
            if max_ids == 0 {
                return Err(ConfigError::ZeroMaxIds);
            }
            manager.max_ids = max_ids;
        }

        let filter = args.filter.and_then(|v| {
            let v = v.trim().to_string();
            (!v.is_empty()).then_some(v)
        });

        Ok(Self {
            device: args.device,
            clock: args.clock,
            timer,
            read_step_ns: args.read_step_ns,
            manager,
            filter,
            list: args.list,
            log_level: args.log_level,
        })
    }

    /// Builds a fresh environment on a new clock and device.
    pub fn make_env(&self) -> DriverEnv<Box<dyn TimerDevice + Send>> {
        let device: Box<dyn TimerDevice + Send> = match self.clock {
            ClockKind::Manual => Box::new(TickTimer::new(
                ManualClock::with_read_step(self.read_step_ns),
                self.timer,
            )),
            ClockKind::Host => Box::new(TickTimer::new(StdClock::new(), self.timer)),
        };
        DriverEnv::new(TimeManager::new(LogicalTimer::new(device), self.manager))
    }
}
