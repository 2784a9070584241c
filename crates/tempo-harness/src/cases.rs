use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::{bail, ensure, Context, Result};
use tempo_time::{TimerDevice, NS_IN_MS, NS_IN_S};
use tempo_timers::{errno, Timeout, TimeoutMode};
use tracing::{debug, info};

use crate::{DriverEnv, TIMER_ID};

/// Reads of the timestamp allowed before declaring the counter stuck.
const INCREMENT_POLL_LIMIT: u32 = 100_000;

/// Interrupts waited for before giving up on a callback goal.
const MAX_CALLBACK_WAITS: u32 = 64;

pub struct TestCase<D: TimerDevice> {
    pub name: &'static str,
    pub description: &'static str,
    pub run: fn(&mut DriverEnv<D>) -> Result<()>,
}

impl<D: TimerDevice> Clone for TestCase<D> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            description: self.description,
            run: self.run,
        }
    }
}

/// All timer test cases, in execution order.
pub fn timer_tests<D: TimerDevice>() -> Vec<TestCase<D>> {
    vec![
        TestCase {
            name: "TIMER0001",
            description: "Test basic timer increment",
            run: test_timer_increment::<D>,
        },
        TestCase {
            name: "TIMER0002",
            description: "Test various timeouts",
            run: test_timer_timeouts::<D>,
        },
        TestCase {
            name: "TIMER0003",
            description: "Test periodic ltimer",
            run: test_ltimer_periodic::<D>,
        },
        TestCase {
            name: "TIMER0004",
            description: "Test periodic timer callback",
            run: test_timer_periodic_callback::<D>,
        },
        TestCase {
            name: "TIMER0005",
            description: "Setting a time manager alert in the past fails",
            run: test_time_manager_alert_in_the_past::<D>,
        },
        TestCase {
            name: "TIMER0006",
            description: "Set logical timer alert in the past",
            run: test_ltimer_alert_in_the_past::<D>,
        },
    ]
}

/// Counts callback invocations until a goal is reached.
///
/// Shared between a timer callback and the code waiting on it.
#[derive(Debug)]
pub struct GoalCounter {
    count: AtomicU32,
    goal: u32,
}

impl GoalCounter {
    pub fn new(goal: u32) -> Self {
        Self {
            count: AtomicU32::new(0),
            goal,
        }
    }

    /// Records one invocation.
    pub fn tick(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn reached(&self) -> bool {
        self.count() >= self.goal
    }
}

fn ms(ns: u64) -> String {
    format!("{}.{:06}", ns / NS_IN_MS, ns % NS_IN_MS)
}

fn secs(ns: u64) -> String {
    format!("{}.{:09}", ns / NS_IN_S, ns % NS_IN_S)
}

pub fn test_timer_increment<D: TimerDevice>(env: &mut DriverEnv<D>) -> Result<()> {
    let start = env.timestamp();
    let mut end = start;
    for _ in 0..INCREMENT_POLL_LIMIT {
        end = env.timestamp();
        if end > start {
            break;
        }
    }

    ensure!(
        end > start,
        "timestamp stuck at {start}ns after {INCREMENT_POLL_LIMIT} reads"
    );
    Ok(())
}

pub fn test_timer_timeouts<D: TimerDevice>(env: &mut DriverEnv<D>) -> Result<()> {
    const TIMEOUTS_MS: [u64; 9] = [500, 200, 100, 50, 20, 10, 5, 2, 1];

    env.tm_mut()
        .alloc_id_at(TIMER_ID)
        .context("allocating timer id")?;

    for timeout_ms in TIMEOUTS_MS {
        let start = env.timestamp();
        env.timeout(timeout_ms * NS_IN_MS, TimeoutMode::Relative)?;
        env.wait_for_timer_interrupt()?;
        let end = env.timestamp();
        env.timer_reset()?;

        let delta = end - start;
        debug!("timeout of {timeout_ms} ms took {} ms", ms(delta));
        ensure!(
            delta >= timeout_ms * NS_IN_MS,
            "timeout of {timeout_ms} ms fired early, after {} ms",
            ms(delta)
        );
    }

    env.tm_mut().free_id(TIMER_ID).context("freeing timer id")?;
    env.ltimer_mut().reset()?;
    Ok(())
}

pub fn test_ltimer_periodic<D: TimerDevice>(env: &mut DriverEnv<D>) -> Result<()> {
    let timeout_ms = 100;
    let start = env.timestamp();
    env.ltimer_mut()
        .set_timeout(timeout_ms * NS_IN_MS, TimeoutMode::Periodic)
        .context("arming periodic ltimer")?;

    for tick in 1..=10u64 {
        env.wait_for_timer_interrupt()?;
        let now_ns = env.timestamp();
        debug!("{timeout_ms} ms tick, timestamp {} sec", secs(now_ns));
        ensure!(
            now_ns - start >= tick * timeout_ms * NS_IN_MS,
            "tick {tick} arrived early at {} sec",
            secs(now_ns)
        );
    }

    env.ltimer_mut().reset()?;
    Ok(())
}

pub fn test_timer_periodic_callback<D: TimerDevice>(env: &mut DriverEnv<D>) -> Result<()> {
    let counter = Arc::new(GoalCounter::new(5));

    env.tm_mut()
        .alloc_id_at(TIMER_ID)
        .context("allocating timer id")?;

    let seen = counter.clone();
    env.tm_mut()
        .register_with(TIMER_ID, Timeout::periodic(NS_IN_S), move |_, _| {
            seen.tick();
            Ok(())
        })
        .context("registering periodic callback")?;

    let mut waits = 0;
    while !counter.reached() {
        ensure!(
            waits < MAX_CALLBACK_WAITS,
            "only {} of 5 callbacks after {waits} interrupts",
            counter.count()
        );
        waits += 1;

        env.wait_for_timer_interrupt()?;
        let now_ns = env.timestamp();
        env.tm_mut().update()?;
        debug!("tick, timestamp {} sec", secs(now_ns));
    }
    ensure!(counter.count() == 5, "expected 5 callbacks, saw {}", counter.count());

    env.tm_mut().free_id(TIMER_ID).context("freeing timer id")?;
    env.ltimer_mut().reset()?;
    Ok(())
}

pub fn test_time_manager_alert_in_the_past<D: TimerDevice>(env: &mut DriverEnv<D>) -> Result<()> {
    env.tm_mut()
        .alloc_id_at(TIMER_ID)
        .context("allocating timer id")?;

    let start = env.timestamp();
    let mut reads = 0;
    while env.timestamp() <= start {
        reads += 1;
        ensure!(reads < INCREMENT_POLL_LIMIT, "timestamp stuck at {start}ns");
    }

    match env.tm_mut().register(TIMER_ID, Timeout::Absolute(start)) {
        Err(err) if err.code() == errno::ETIME => {}
        other => bail!("expected ETIME for a deadline in the past, got {other:?}"),
    }

    env.tm_mut().free_id(TIMER_ID).context("freeing timer id")?;
    env.ltimer_mut().reset()?;
    Ok(())
}

pub fn test_ltimer_alert_in_the_past<D: TimerDevice>(env: &mut DriverEnv<D>) -> Result<()> {
    let start = env.timestamp();
    let mut reads = 0;
    while env.timestamp() <= start {
        reads += 1;
        ensure!(reads < INCREMENT_POLL_LIMIT, "timestamp stuck at {start}ns");
    }

    match env.ltimer_mut().set_timeout(start, TimeoutMode::Absolute) {
        Err(err) if err.code() == errno::ETIME => {
            info!("ltimer implementation does not support setting timestamp in the past");
        }
        Err(err) => return Err(err).context("arming ltimer in the past"),
        Ok(()) => {
            let start = env.timestamp();
            env.wait_for_timer_interrupt()?;
            let end = env.timestamp();
            env.tm_mut().update()?;
            debug!("waiting time {} ms", ms(end - start));
        }
    }

    env.ltimer_mut().reset()?;
    Ok(())
}
