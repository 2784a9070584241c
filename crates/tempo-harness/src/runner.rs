use tempo_time::TimerDevice;
use tracing::{error, info, info_span};

use crate::{timer_tests, DriverEnv};

#[derive(Debug, Clone)]
pub struct CaseReport {
    pub name: &'static str,
    pub description: &'static str,
    /// `None` on success, otherwise the rendered error chain.
    pub failure: Option<String>,
}

impl CaseReport {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub cases: Vec<CaseReport>,
}

impl RunSummary {
    pub fn passed(&self) -> usize {
        self.cases.iter().filter(|c| c.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.cases.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }
}

/// Runs every case whose name contains `filter`, each on an environment from `make_env`.
pub fn run_tests<D, F>(mut make_env: F, filter: Option<&str>) -> RunSummary
where
    D: TimerDevice,
    F: FnMut() -> DriverEnv<D>,
{
    let mut summary = RunSummary::default();
    for case in timer_tests::<D>() {
        if filter.is_some_and(|f| !case.name.contains(f)) {
            continue;
        }

        let span = info_span!("case", name = case.name);
        let _guard = span.enter();

        let mut env = make_env();
        let failure = match (case.run)(&mut env) {
            Ok(()) => {
                info!("{}: {} passed", case.name, case.description);
                None
            }
            Err(err) => {
                error!("{}: {} failed: {err:#}", case.name, case.description);
                Some(format!("{err:#}"))
            }
        };
        summary.cases.push(CaseReport {
            name: case.name,
            description: case.description,
            failure,
        });
    }
    summary
}
