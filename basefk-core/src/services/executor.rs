//! Runs the steps of a `StagePlan` against the port

use crate::domain::result::{Error, Result};
use crate::domain::{StagePlan, StageReport, StepOutcome, StepResult};
use crate::ports::SchemaPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnFailure {
    /// Record the failure and run the remaining steps
    Continue,
    /// Stop at the first failed step
    Stop,
}

/// Execute each step in order.
///
/// Benign "already exists" server errors become `AlreadyExists` outcomes.
/// Other statement errors become `Failed` outcomes; connection errors abort
/// the whole stage.
pub(crate) fn run_plan(
    port: &dyn SchemaPort,
    plan: &StagePlan,
    on_failure: OnFailure,
) -> Result<StageReport> {
    let mut results = Vec::with_capacity(plan.steps.len());

    for step in &plan.steps {
        tracing::info!(stage = %plan.stage, step = %step.name, "running step");
        let outcome = match port.execute(&step.sql) {
            Ok(rows) => StepOutcome::Applied { rows },
            Err(e) if e.is_already_exists() => {
                tracing::warn!(step = %step.name, error = %e, "already exists");
                StepOutcome::AlreadyExists {
                    message: e.to_string(),
                }
            }
            Err(e @ Error::Connection(_)) => return Err(e),
            Err(e) => {
                tracing::debug!(step = %step.name, error = %e, "step failed");
                StepOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        let failed = matches!(outcome, StepOutcome::Failed { .. });
        results.push(StepResult {
            step: step.clone(),
            outcome,
        });
        if failed && on_failure == OnFailure::Stop {
            break;
        }
    }

    Ok(StageReport {
        stage: plan.stage,
        results,
        satisfied: plan.satisfied.clone(),
        warnings: plan.warnings.clone(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::adapters::fake::FakeSchema;
    use crate::domain::{PlannedStep, Stage};

    fn plan() -> StagePlan {
        let mut plan = StagePlan::new(Stage::Extend);
        plan.push(PlannedStep::new("a", "first", "ALTER a"));
        plan.push(PlannedStep::new("b", "second", "ALTER b"));
        plan.push(PlannedStep::new("c", "third", "ALTER c"));
        plan
    }

    #[test]
    fn test_duplicate_errors_are_reported_as_already_exists() {
        let fake = FakeSchema::new().failing("ALTER a", 1060);
        let report = run_plan(&fake, &plan(), OnFailure::Continue).unwrap();

        assert!(report.is_success());
        assert!(matches!(
            report.results[0].outcome,
            StepOutcome::AlreadyExists { .. }
        ));
        assert_eq!(report.applied_count(), 2);
    }

    #[test]
    fn test_continue_runs_remaining_steps() {
        let fake = FakeSchema::new().failing("ALTER b", 1146);
        let report = run_plan(&fake, &plan(), OnFailure::Continue).unwrap();

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(fake.executed(), vec!["ALTER a", "ALTER b", "ALTER c"]);
    }

    #[test]
    fn test_stop_halts_at_first_failure() {
        let fake = FakeSchema::new().failing("ALTER b", 1452);
        let report = run_plan(&fake, &plan(), OnFailure::Stop).unwrap();

        assert_eq!(report.results.len(), 2);
        assert!(!report.is_success());
        assert_eq!(fake.executed(), vec!["ALTER a", "ALTER b"]);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_step_is_not_logged_at_warn() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let fake = FakeSchema::new().failing("ALTER b", 1146);
        let report = tracing::subscriber::with_default(subscriber, || {
            run_plan(&fake, &plan(), OnFailure::Continue).unwrap()
        });

        assert_eq!(report.failures().count(), 1);
        let logged = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(!logged.contains("step failed"), "unexpected log: {}", logged);
    }
}
