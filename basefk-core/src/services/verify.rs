//! Verify service - referential integrity checks gating Finalize

use std::sync::Arc;

use serde::Serialize;

use crate::domain::result::Result;
use crate::domain::schema::{BASES, CATEGORY, EXPENSE_CATEGORIES, FACT_TABLES, USERS, USER_BASES};
use crate::domain::FactTable;
use crate::ports::SchemaPort;
use crate::sql::{self, ViolationQuery};

/// Sample rows shown per failing check
pub const SAMPLE_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    /// Whether a violation blocks Finalize
    pub blocking: bool,
    pub violations: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<String>,
}

impl CheckResult {
    fn skipped(name: impl Into<String>, blocking: bool, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Pass,
            blocking,
            violations: 0,
            message: message.into(),
            samples: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationSummary {
    pub passed: i64,
    pub warnings: i64,
    pub blocking: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub checks: Vec<CheckResult>,
    pub summary: VerificationSummary,
}

impl VerificationReport {
    fn from_checks(checks: Vec<CheckResult>) -> Self {
        let count = |status: CheckStatus| checks.iter().filter(|c| c.status == status).count() as i64;
        let summary = VerificationSummary {
            passed: count(CheckStatus::Pass),
            warnings: count(CheckStatus::Warning),
            blocking: count(CheckStatus::Error),
        };
        Self { checks, summary }
    }

    /// True when any blocking check found violations
    pub fn is_blocked(&self) -> bool {
        self.summary.blocking > 0
    }

    pub fn blocking_failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| c.status == CheckStatus::Error)
    }

    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }
}

/// Verify service for post-migration invariants
pub struct VerifyService {
    port: Arc<dyn SchemaPort>,
}

impl VerifyService {
    pub fn new(port: Arc<dyn SchemaPort>) -> Self {
        Self { port }
    }

    /// Run all checks
    pub fn run_checks(&self) -> Result<VerificationReport> {
        let mut checks = Vec::new();

        for fact in FACT_TABLES {
            self.fact_checks(&fact, &mut checks)?;
        }
        self.category_checks(&mut checks)?;
        self.user_bases_checks(&mut checks)?;

        let report = VerificationReport::from_checks(checks);
        tracing::info!(
            passed = report.summary.passed,
            warnings = report.summary.warnings,
            blocking = report.summary.blocking,
            "verification finished"
        );
        Ok(report)
    }

    fn fact_checks(&self, fact: &FactTable, checks: &mut Vec<CheckResult>) -> Result<()> {
        let mismatch = format!("{}_base_mismatch", fact.table);
        let dangling = format!("{}_dangling_base_id", fact.table);
        let unmatched = format!("{}_unmatched_base", fact.table);

        if !self.port.table_exists(fact.table)? {
            let message = format!("Table {} does not exist", fact.table);
            checks.push(CheckResult::skipped(mismatch, true, &message));
            checks.push(CheckResult::skipped(dangling, true, &message));
            checks.push(CheckResult::skipped(unmatched, false, message));
            return Ok(());
        }

        let has_legacy = self.port.column_exists(fact.table, fact.legacy_column)?;
        let has_fk = self.port.column_exists(fact.table, fact.fk_column)?;

        if has_fk {
            checks.push(self.run(
                dangling,
                true,
                sql::dangling_base_id(fact),
                &format!("{} row(s) reference a missing base", fact.table),
            )?);
        } else {
            checks.push(CheckResult::skipped(
                dangling,
                true,
                format!("{}.{} does not exist", fact.table, fact.fk_column),
            ));
        }

        match (has_legacy, has_fk) {
            (false, _) => {
                let message = format!("{}.{} has been dropped", fact.table, fact.legacy_column);
                checks.push(CheckResult::skipped(mismatch, true, &message));
                checks.push(CheckResult::skipped(unmatched, false, message));
            }
            (true, false) => {
                // Legacy text would be dropped with nowhere to carry it
                checks.push(CheckResult {
                    name: mismatch,
                    status: CheckStatus::Error,
                    blocking: true,
                    violations: 0,
                    message: format!(
                        "{}.{} does not exist; run extend and backfill first",
                        fact.table, fact.fk_column
                    ),
                    samples: Vec::new(),
                });
                checks.push(CheckResult::skipped(
                    unmatched,
                    false,
                    format!("{}.{} does not exist", fact.table, fact.fk_column),
                ));
            }
            (true, true) => {
                checks.push(self.run(
                    mismatch,
                    true,
                    sql::base_mismatch(fact),
                    &format!(
                        "{} row(s) whose {} text does not match bases.name[{}]",
                        fact.table, fact.legacy_column, fact.fk_column
                    ),
                )?);
                checks.push(self.run(
                    unmatched,
                    false,
                    sql::unmatched_legacy(fact),
                    &format!(
                        "{} row(s) with {} text and no {}",
                        fact.table, fact.legacy_column, fact.fk_column
                    ),
                )?);
            }
        }
        Ok(())
    }

    fn category_checks(&self, checks: &mut Vec<CheckResult>) -> Result<()> {
        if !self.port.column_exists(CATEGORY.table, CATEGORY.fk_column)? {
            let message = format!("{}.{} does not exist", CATEGORY.table, CATEGORY.fk_column);
            checks.push(CheckResult::skipped("category_id_zero", true, &message));
            checks.push(CheckResult::skipped("category_id_dangling", true, message));
            return Ok(());
        }

        checks.push(self.run(
            "category_id_zero",
            true,
            sql::category_zero(),
            "base_expenses row(s) with category_id = 0 (run backfill)",
        )?);

        if self.port.table_exists(EXPENSE_CATEGORIES)? {
            checks.push(self.run(
                "category_id_dangling",
                true,
                sql::dangling_category(),
                "base_expenses row(s) reference a missing expense category",
            )?);
        } else {
            checks.push(CheckResult::skipped(
                "category_id_dangling",
                true,
                format!("Table {} does not exist", EXPENSE_CATEGORIES),
            ));
        }
        Ok(())
    }

    fn user_bases_checks(&self, checks: &mut Vec<CheckResult>) -> Result<()> {
        if !self.port.table_exists(USER_BASES)? {
            let message = format!("Table {} does not exist", USER_BASES);
            checks.push(CheckResult::skipped("user_bases_orphans", true, &message));
            checks.push(CheckResult::skipped("user_bases_duplicates", false, message));
            return Ok(());
        }

        if self.port.table_exists(USERS)? && self.port.table_exists(BASES)? {
            checks.push(self.run(
                "user_bases_orphans",
                true,
                sql::user_bases_orphans(),
                "user_bases row(s) reference a missing user or base",
            )?);
        } else {
            checks.push(CheckResult::skipped(
                "user_bases_orphans",
                true,
                format!("Tables {} and {} are required", USERS, BASES),
            ));
        }

        checks.push(self.run(
            "user_bases_duplicates",
            false,
            sql::user_bases_duplicates(),
            "duplicated (user_id, base_id) pair(s) in user_bases",
        )?);
        Ok(())
    }

    fn run(
        &self,
        name: impl Into<String>,
        blocking: bool,
        query: ViolationQuery,
        what: &str,
    ) -> Result<CheckResult> {
        let name = name.into();
        let violations = self.port.count(&query.count_sql())?;
        if violations == 0 {
            return Ok(CheckResult {
                name,
                status: CheckStatus::Pass,
                blocking,
                violations,
                message: format!("No {}", what.replacen(" row(s)", " rows", 1)),
                samples: Vec::new(),
            });
        }

        let samples = self.port.strings(&query.sample_sql(SAMPLE_LIMIT))?;
        tracing::warn!(check = %name, violations, "check failed");
        Ok(CheckResult {
            name,
            status: if blocking {
                CheckStatus::Error
            } else {
                CheckStatus::Warning
            },
            blocking,
            violations,
            message: format!("{} {}", violations, what),
            samples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fake::FakeSchema;
    use crate::domain::schema::{BASE_EXPENSES, PURCHASE_ENTRIES};

    #[test]
    fn test_clean_schema_passes() {
        let service = VerifyService::new(Arc::new(FakeSchema::extended()));
        let report = service.run_checks().unwrap();

        assert!(!report.is_blocked());
        assert_eq!(report.summary.warnings, 0);
        assert_eq!(report.summary.passed, report.checks.len() as i64);
    }

    #[test]
    fn test_mismatch_blocks_with_samples() {
        let query = sql::base_mismatch(&PURCHASE_ENTRIES);
        let fake = FakeSchema::extended()
            .with_count(&query.count_sql(), 1)
            .with_strings(&query.sample_sql(SAMPLE_LIMIT), &["21: B3"]);
        let report = VerifyService::new(Arc::new(fake)).run_checks().unwrap();

        assert!(report.is_blocked());
        let check = report.check("purchase_entries_base_mismatch").unwrap();
        assert_eq!(check.status, CheckStatus::Error);
        assert_eq!(check.violations, 1);
        assert_eq!(check.samples, vec!["21: B3"]);
        assert_eq!(report.blocking_failures().count(), 1);
    }

    #[test]
    fn test_orphan_user_bases_block() {
        let query = sql::user_bases_orphans();
        let fake = FakeSchema::extended()
            .with_count(&query.count_sql(), 1)
            .with_strings(&query.sample_sql(SAMPLE_LIMIT), &["user_id=999, base_id=1"]);
        let report = VerifyService::new(Arc::new(fake)).run_checks().unwrap();

        assert!(report.is_blocked());
        let check = report.check("user_bases_orphans").unwrap();
        assert_eq!(check.status, CheckStatus::Error);
        assert!(check.blocking);
        assert_eq!(check.samples.len(), 1);
    }

    #[test]
    fn test_dangling_base_id_blocks() {
        let fake = FakeSchema::extended()
            .with_count(&sql::dangling_base_id(&BASE_EXPENSES).count_sql(), 4);
        let report = VerifyService::new(Arc::new(fake)).run_checks().unwrap();

        assert!(report.is_blocked());
        let failing: Vec<_> = report.blocking_failures().map(|c| c.name.as_str()).collect();
        assert_eq!(failing, vec!["base_expenses_dangling_base_id"]);
        assert_eq!(
            report.check("base_expenses_dangling_base_id").unwrap().violations,
            4
        );
    }

    #[test]
    fn test_dangling_category_blocks_only_when_categories_exist() {
        let count_sql = sql::dangling_category().count_sql();
        let fake = FakeSchema::extended().with_count(&count_sql, 2);
        let report = VerifyService::new(Arc::new(fake)).run_checks().unwrap();
        assert!(report.is_blocked());
        assert_eq!(
            report.check("category_id_dangling").unwrap().status,
            CheckStatus::Error
        );

        let fake = FakeSchema::extended()
            .without_table("expense_categories")
            .with_count(&count_sql, 2);
        let report = VerifyService::new(Arc::new(fake)).run_checks().unwrap();
        assert!(!report.is_blocked());
        assert!(report
            .check("category_id_dangling")
            .unwrap()
            .message
            .contains("does not exist"));
    }

    #[test]
    fn test_duplicates_and_unmatched_only_warn() {
        let fake = FakeSchema::extended()
            .with_count(&sql::user_bases_duplicates().count_sql(), 2)
            .with_count(&sql::unmatched_legacy(&BASE_EXPENSES).count_sql(), 3);
        let report = VerifyService::new(Arc::new(fake)).run_checks().unwrap();

        assert!(!report.is_blocked());
        assert_eq!(report.summary.warnings, 2);
        assert_eq!(
            report.check("user_bases_duplicates").unwrap().status,
            CheckStatus::Warning
        );
    }

    #[test]
    fn test_category_zero_blocks() {
        let fake = FakeSchema::extended().with_count(&sql::category_zero().count_sql(), 50);
        let report = VerifyService::new(Arc::new(fake)).run_checks().unwrap();

        assert!(report.is_blocked());
        assert_eq!(report.check("category_id_zero").unwrap().violations, 50);
    }

    #[test]
    fn test_dropped_legacy_columns_pass_with_message() {
        let fake = FakeSchema::extended()
            .without_column("base_expenses", "base")
            .without_column("purchase_entries", "base");
        let report = VerifyService::new(Arc::new(fake)).run_checks().unwrap();

        let check = report.check("base_expenses_base_mismatch").unwrap();
        assert_eq!(check.status, CheckStatus::Pass);
        assert!(check.message.contains("has been dropped"));
        assert!(!report.is_blocked());
    }

    #[test]
    fn test_missing_fk_column_blocks() {
        let report = VerifyService::new(Arc::new(FakeSchema::legacy()))
            .run_checks()
            .unwrap();

        assert!(report.is_blocked());
        assert_eq!(report.summary.blocking, 2);
        assert_eq!(
            report.check("user_bases_orphans").unwrap().status,
            CheckStatus::Pass
        );
    }
}
