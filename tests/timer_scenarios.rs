use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tempo_harness::{DriverEnv, GoalCounter, TIMER_ID};
use tempo_time::{ManualClock, StdClock, TickTimer, TickTimerConfig, NS_IN_MS, NS_IN_S};
use tempo_timers::{
    errno, CallbackError, TimeManager, Timeout, TimeoutMode, TimerCallback, TimerError, TimerId,
};

type Device = TickTimer<ManualClock>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn manual_env(cfg: TickTimerConfig) -> (ManualClock, DriverEnv<Device>) {
    let clock = ManualClock::with_read_step(50);
    let env = DriverEnv::with_device(TickTimer::new(clock.clone(), cfg));
    (clock, env)
}

#[test]
fn periodic_callback_reaches_goal_on_relative_only_hardware() -> Result<()> {
    init_tracing();
    let (_clock, mut env) = manual_env(TickTimerConfig::pit());
    let counter = Arc::new(GoalCounter::new(5));

    env.tm_mut().alloc_id_at(TIMER_ID)?;
    let start = env.timestamp();
    let seen = counter.clone();
    env.tm_mut()
        .register_with(TIMER_ID, Timeout::periodic(NS_IN_S), move |_, _| {
            seen.tick();
            Ok(())
        })?;

    let mut interrupts = 0;
    while !counter.reached() {
        env.wait_for_timer_interrupt()?;
        env.tm_mut().update()?;
        interrupts += 1;
        assert!(interrupts <= 5, "callback missed an expiry");
    }

    assert_eq!(counter.count(), 5);
    assert!(env.timestamp() - start >= 5 * NS_IN_S);
    tracing::info!(elapsed_ns = env.timestamp() - start, "goal reached");
    Ok(())
}

#[test]
fn absolute_deadline_at_current_time_is_etime() -> Result<()> {
    let (_clock, mut env) = manual_env(TickTimerConfig::hpet());
    env.tm_mut().alloc_id_at(TIMER_ID)?;

    let now = env.tm().get_time();
    let err = env
        .tm_mut()
        .register(TIMER_ID, Timeout::Absolute(now))
        .unwrap_err();

    assert!(matches!(err, TimerError::PastDeadline { .. }));
    assert_eq!(err.code(), errno::ETIME);
    assert_eq!(env.tm().pending_deadline(TIMER_ID), None);
    Ok(())
}

/// A one-shot callback that re-arms itself `left - 1` more times.
fn chained(seen: Arc<AtomicU32>, left: u32) -> TimerCallback<Device> {
    Box::new(move |tm: &mut TimeManager<Device>, id: TimerId| {
        seen.fetch_add(1, Ordering::SeqCst);
        if left > 1 {
            let next = chained(seen.clone(), left - 1);
            tm.register_cb(id, Timeout::Relative(10 * NS_IN_MS), Some(next))
                .map_err(|e| CallbackError::new(e.to_string()))?;
        }
        Ok(())
    })
}

#[test]
fn callback_chains_one_shot_timeouts() -> Result<()> {
    let (_clock, mut env) = manual_env(TickTimerConfig::oneshot());
    let fired = Arc::new(AtomicU32::new(0));

    let id = env.tm_mut().alloc_id()?;
    env.tm_mut().register_cb(
        id,
        Timeout::Relative(10 * NS_IN_MS),
        Some(chained(fired.clone(), 3)),
    )?;

    for _ in 0..3 {
        env.wait_for_timer_interrupt()?;
        env.tm_mut().update()?;
    }

    assert_eq!(fired.load(Ordering::SeqCst), 3);
    assert_eq!(env.tm().next_deadline(), None);
    assert_eq!(env.ltimer().program(), None);
    assert!(env.tm().is_allocated(id));
    Ok(())
}

#[test]
fn hardware_failure_is_reported_and_previous_request_survives() -> Result<()> {
    let (_clock, mut env) = manual_env(TickTimerConfig::hpet());
    env.tm_mut().alloc_id_at(TIMER_ID)?;
    env.timeout(NS_IN_S, TimeoutMode::Relative)?;
    let before = env.tm().pending_deadline(TIMER_ID);

    env.ltimer_mut().device_mut().fail_next_arm("comparator write rejected");
    let err = env.timeout(NS_IN_MS, TimeoutMode::Relative).unwrap_err();

    assert_eq!(err.code(), errno::EIO);
    assert_eq!(env.tm().pending_deadline(TIMER_ID), before);
    assert_eq!(env.tm().programmed_deadline(), before);
    assert!(env.ltimer().device().is_armed());
    Ok(())
}

#[test]
fn short_timeout_on_host_clock() -> Result<()> {
    let mut env = DriverEnv::with_device(TickTimer::new(StdClock::new(), TickTimerConfig::hpet()));
    env.tm_mut().alloc_id_at(TIMER_ID)?;

    let start = env.timestamp();
    env.timeout(2 * NS_IN_MS, TimeoutMode::Relative)?;
    env.wait_for_timer_interrupt()?;
    let elapsed = env.timestamp() - start;
    env.timer_reset()?;

    assert!(elapsed >= 2 * NS_IN_MS, "woke after {elapsed}ns");
    assert!(!env.ltimer().device().is_armed());
    Ok(())
}
