//! Stage plans and execution reports

use std::fmt;

use serde::Serialize;

/// Pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Inspect,
    Extend,
    Backfill,
    Verify,
    Finalize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Inspect => "inspect",
            Stage::Extend => "extend",
            Stage::Backfill => "backfill",
            Stage::Verify => "verify",
            Stage::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One statement a stage intends to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    pub name: String,
    pub description: String,
    pub sql: String,
    pub destructive: bool,
}

impl PlannedStep {
    pub fn new(name: impl Into<String>, description: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            sql: sql.into(),
            destructive: false,
        }
    }

    /// Mark the step as irreversible (dropping data)
    pub fn destructive(mut self) -> Self {
        self.destructive = true;
        self
    }
}

/// Steps a DDL stage would run, computed from the current schema
#[derive(Debug, Clone, Serialize)]
pub struct StagePlan {
    pub stage: Stage,
    pub steps: Vec<PlannedStep>,
    /// Targets already in place (reported as "already exists")
    pub satisfied: Vec<String>,
    pub warnings: Vec<String>,
}

impl StagePlan {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            steps: Vec::new(),
            satisfied: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn push(&mut self, step: PlannedStep) {
        self.steps.push(step);
    }

    pub fn satisfied(&mut self, what: impl Into<String>) {
        self.satisfied.push(what.into());
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn has_destructive_steps(&self) -> bool {
        self.steps.iter().any(|s| s.destructive)
    }

    pub fn destructive_steps(&self) -> impl Iterator<Item = &PlannedStep> {
        self.steps.iter().filter(|s| s.destructive)
    }
}

/// What happened when a planned step ran
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Applied { rows: u64 },
    AlreadyExists { message: String },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub step: PlannedStep,
    pub outcome: StepOutcome,
}

/// Result of executing a `StagePlan`
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub results: Vec<StepResult>,
    pub satisfied: Vec<String>,
    pub warnings: Vec<String>,
}

impl StageReport {
    pub fn failures(&self) -> impl Iterator<Item = &StepResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, StepOutcome::Failed { .. }))
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn applied_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, StepOutcome::Applied { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destructive_steps_are_flagged() {
        let mut plan = StagePlan::new(Stage::Finalize);
        plan.push(PlannedStep::new("fk", "add fk", "ALTER TABLE t ADD CONSTRAINT c"));
        assert!(!plan.has_destructive_steps());

        plan.push(PlannedStep::new("drop", "drop base", "ALTER TABLE t DROP COLUMN base").destructive());
        assert!(plan.has_destructive_steps());
        assert_eq!(plan.destructive_steps().count(), 1);
    }

    #[test]
    fn test_report_success_ignores_benign_outcomes() {
        let step = PlannedStep::new("a", "a", "SELECT 1");
        let mut report = StageReport {
            stage: Stage::Extend,
            results: vec![
                StepResult { step: step.clone(), outcome: StepOutcome::Applied { rows: 0 } },
                StepResult {
                    step: step.clone(),
                    outcome: StepOutcome::AlreadyExists { message: "dup".into() },
                },
            ],
            satisfied: vec![],
            warnings: vec![],
        };
        assert!(report.is_success());
        assert_eq!(report.applied_count(), 1);

        report.results.push(StepResult {
            step,
            outcome: StepOutcome::Failed { error: "nope".into() },
        });
        assert!(!report.is_success());
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(StepOutcome::Applied { rows: 3 }).unwrap();
        assert_eq!(json["status"], "applied");
        assert_eq!(json["rows"], 3);
    }
}
