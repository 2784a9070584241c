use tempo_harness::{
    run_tests, test_timer_timeouts, timer_tests, DriverEnv, GoalCounter, HarnessConfig, TIMER_ID,
};
use tempo_time::{ManualClock, TickTimer, TickTimerConfig, TimerDevice, NS_IN_S};

fn run_on(device: &str) {
    let cfg = HarnessConfig::try_parse_from(["tempo-harness", "--device", device]).unwrap();
    let summary = run_tests(|| cfg.make_env(), None);

    assert_eq!(summary.cases.len(), 6);
    for case in &summary.cases {
        assert!(case.passed(), "{device}: {} failed: {:?}", case.name, case.failure);
    }
    assert!(summary.all_passed());
}

#[test]
fn all_cases_pass_on_hpet() {
    run_on("hpet");
}

#[test]
fn all_cases_pass_on_pit() {
    run_on("pit");
}

#[test]
fn all_cases_pass_on_oneshot_comparator() {
    run_on("oneshot");
}

#[test]
fn filter_selects_by_name() {
    let cfg = HarnessConfig::try_parse_from(["tempo-harness", "--filter", "TIMER0005"]).unwrap();
    let summary = run_tests(|| cfg.make_env(), cfg.filter.as_deref());

    assert_eq!(summary.cases.len(), 1);
    assert_eq!(summary.cases[0].name, "TIMER0005");
    assert_eq!(summary.passed(), 1);
    assert_eq!(summary.failed(), 0);
}

#[test]
fn case_names_are_unique_and_ordered() {
    let names: Vec<_> = timer_tests::<Box<dyn TimerDevice + Send>>()
        .iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(
        names,
        ["TIMER0001", "TIMER0002", "TIMER0003", "TIMER0004", "TIMER0005", "TIMER0006"]
    );
}

#[test]
fn timeouts_case_leaves_the_id_free() {
    let clock = ManualClock::with_read_step(50);
    let mut env = DriverEnv::with_device(TickTimer::new(clock.clone(), TickTimerConfig::hpet()));

    test_timer_timeouts(&mut env).unwrap();

    assert!(!env.tm().is_allocated(TIMER_ID));
    assert_eq!(env.ltimer().program(), None);
    assert!(!env.ltimer().device().is_armed());
    // 500 + 200 + 100 + 50 + 20 + 10 + 5 + 2 + 1 ms of simulated waiting.
    assert!(clock.peek_ns() >= 888_000_000);
}

#[test]
fn unarmed_wait_reports_an_error() {
    let mut env = DriverEnv::with_device(TickTimer::new(ManualClock::new(), TickTimerConfig::hpet()));
    assert!(env.wait_for_timer_interrupt().is_err());
}

#[test]
fn goal_counter_reaches_goal() {
    let counter = GoalCounter::new(2);
    assert!(!counter.reached());
    counter.tick();
    counter.tick();
    assert!(counter.reached());
    assert_eq!(counter.count(), 2);
}

#[test]
fn timeout_helper_arms_the_shared_id() {
    let mut env = DriverEnv::with_device(TickTimer::new(ManualClock::new(), TickTimerConfig::hpet()));
    env.tm_mut().alloc_id_at(TIMER_ID).unwrap();

    env.timeout(NS_IN_S, tempo_timers::TimeoutMode::Relative).unwrap();
    assert_eq!(env.tm().pending_deadline(TIMER_ID), Some(NS_IN_S));

    env.wait_for_timer_interrupt().unwrap();
    assert!(env.timestamp() >= NS_IN_S);

    env.timer_reset().unwrap();
    assert_eq!(env.tm().pending_deadline(TIMER_ID), None);
    assert!(env.tm().is_allocated(TIMER_ID));
}
