//! Finalize service - FK constraints and legacy column removal

use std::sync::Arc;

use crate::domain::result::{Error, Result};
use crate::domain::schema::{
    user_bases_foreign_keys, BASES, CATEGORY, EXPENSE_CATEGORIES, FACT_TABLES, USER_BASES,
};
use crate::domain::{ColumnType, ForeignKeySpec, PlannedStep, Stage, StagePlan, StageReport};
use crate::ports::SchemaPort;
use crate::services::executor::{run_plan, OnFailure};
use crate::services::extend::type_mismatch;
use crate::services::{InspectService, VerificationReport, VerifyService};
use crate::sql;

/// Finalize service for the irreversible part of the migration
pub struct FinalizeService {
    port: Arc<dyn SchemaPort>,
    inspect: InspectService,
    verify: VerifyService,
}

impl FinalizeService {
    pub fn new(port: Arc<dyn SchemaPort>) -> Self {
        let inspect = InspectService::new(Arc::clone(&port));
        let verify = VerifyService::new(Arc::clone(&port));
        Self {
            port,
            inspect,
            verify,
        }
    }

    /// Verify, then compute the remaining steps.
    ///
    /// Fails with `Error::Consistency` when any blocking check has violations.
    pub fn plan(&self) -> Result<StagePlan> {
        let report = self.verify.run_checks()?;
        if report.is_blocked() {
            return Err(blocked(&report));
        }
        self.plan_unchecked()
    }

    fn plan_unchecked(&self) -> Result<StagePlan> {
        let mut plan = StagePlan::new(Stage::Finalize);

        if self.port.column_exists(CATEGORY.table, CATEGORY.fk_column)? {
            let category_ty = self.inspect.id_type(EXPENSE_CATEGORIES)?;
            self.plan_widen(&mut plan, CATEGORY.table, CATEGORY.fk_column, &category_ty)?;
            if self.port.table_exists(EXPENSE_CATEGORIES)? {
                self.plan_foreign_key(&mut plan, &CATEGORY.foreign_key())?;
            } else {
                plan.warn(format!(
                    "table {} is missing; {} not added",
                    EXPENSE_CATEGORIES, CATEGORY.fk_constraint
                ));
            }
        } else {
            plan.warn(format!(
                "{}.{} does not exist; run extend first",
                CATEGORY.table, CATEGORY.fk_column
            ));
        }

        let base_ty = self.inspect.id_type(BASES)?;
        for fact in FACT_TABLES {
            if !self.port.column_exists(fact.table, fact.fk_column)? {
                plan.warn(format!(
                    "{}.{} does not exist; run extend first",
                    fact.table, fact.fk_column
                ));
                continue;
            }
            self.plan_widen(&mut plan, fact.table, fact.fk_column, &base_ty)?;
            self.plan_foreign_key(&mut plan, &fact.foreign_key())?;
        }

        if self.port.table_exists(USER_BASES)? {
            for fk in user_bases_foreign_keys() {
                self.plan_foreign_key(&mut plan, &fk)?;
            }
        }

        for fact in FACT_TABLES {
            if !self.port.column_exists(fact.table, fact.legacy_column)? {
                plan.satisfied(format!("column {}.{} dropped", fact.table, fact.legacy_column));
            } else if self.port.column_exists(fact.table, fact.fk_column)? {
                plan.push(
                    PlannedStep::new(
                        format!("drop_{}_{}", fact.table, fact.legacy_column),
                        format!("drop legacy column {}.{}", fact.table, fact.legacy_column),
                        sql::drop_column(fact.table, fact.legacy_column),
                    )
                    .destructive(),
                );
            }
        }

        Ok(plan)
    }

    /// Run the planned steps, stopping at the first failure
    pub fn execute(&self, plan: &StagePlan) -> Result<StageReport> {
        run_plan(self.port.as_ref(), plan, OnFailure::Stop)
    }

    fn plan_widen(
        &self,
        plan: &mut StagePlan,
        table: &str,
        column: &str,
        target: &ColumnType,
    ) -> Result<()> {
        if let Some(actual) = self.port.column_type(table, column)? {
            if type_mismatch(&actual, target) {
                plan.push(PlannedStep::new(
                    format!("widen_{}_{}", table, column),
                    format!("change {}.{} from {} to {}", table, column, actual, target),
                    sql::modify_column(table, column, target),
                ));
            }
        }
        Ok(())
    }

    fn plan_foreign_key(&self, plan: &mut StagePlan, fk: &ForeignKeySpec) -> Result<()> {
        match self
            .port
            .foreign_key_for(fk.table, fk.column, fk.referenced_table)?
        {
            Some(existing) => plan.satisfied(format!("foreign key {}.{}", fk.table, existing)),
            None => plan.push(PlannedStep::new(
                format!("fk_{}", fk.name),
                format!(
                    "add {} on {}({}) -> {}({})",
                    fk.name, fk.table, fk.column, fk.referenced_table, fk.referenced_column
                ),
                sql::add_foreign_key(fk),
            )),
        }
        Ok(())
    }
}

fn blocked(report: &VerificationReport) -> Error {
    let names: Vec<&str> = report
        .blocking_failures()
        .map(|c| c.name.as_str())
        .collect();
    Error::Consistency(format!(
        "{} blocking check(s) failed: {}",
        names.len(),
        names.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fake::FakeSchema;
    use crate::domain::StepOutcome;

    fn step_names(plan: &StagePlan) -> Vec<&str> {
        plan.steps.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_plan_order() {
        let service = FinalizeService::new(Arc::new(FakeSchema::extended()));
        let plan = service.plan().unwrap();

        assert_eq!(
            step_names(&plan),
            vec![
                "fk_fk_base_expenses_category_id",
                "fk_fk_base_expenses_base_id",
                "fk_fk_purchase_entries_base_id",
                "drop_base_expenses_base",
                "drop_purchase_entries_base",
            ]
        );
        assert_eq!(plan.destructive_steps().count(), 2);
        assert!(plan.satisfied.iter().any(|s| s.contains("fk_user_bases_user_id")));
    }

    #[test]
    fn test_narrow_category_id_widened_before_fk() {
        let fake = FakeSchema::extended().with_column("base_expenses", "category_id", "int(11)");
        let plan = FinalizeService::new(Arc::new(fake)).plan().unwrap();

        assert_eq!(plan.steps[0].name, "widen_base_expenses_category_id");
        assert_eq!(plan.steps[1].name, "fk_fk_base_expenses_category_id");
    }

    #[test]
    fn test_blocked_verification_refuses() {
        let fake = FakeSchema::extended()
            .with_count(&sql::category_zero().count_sql(), 3);
        let err = FinalizeService::new(Arc::new(fake)).plan().unwrap_err();

        match err {
            Error::Consistency(msg) => assert!(msg.contains("category_id_zero")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let fake = FakeSchema::extended()
            .without_column("base_expenses", "base")
            .without_column("purchase_entries", "base")
            .with_foreign_key("base_expenses", "category_id", "expense_categories", "fk_base_expenses_category_id")
            .with_foreign_key("base_expenses", "base_id", "bases", "fk_base_expenses_base_id")
            .with_foreign_key("purchase_entries", "base_id", "bases", "fk_purchase_entries_base_id");
        let plan = FinalizeService::new(Arc::new(fake)).plan().unwrap();

        assert!(plan.is_empty());
        assert_eq!(plan.satisfied.len(), 7);
    }

    #[test]
    fn test_user_bases_fks_added_when_missing() {
        let fake = FakeSchema::legacy()
            .with_column("base_expenses", "base_id", "bigint unsigned")
            .with_column("base_expenses", "category_id", "bigint unsigned")
            .with_column("purchase_entries", "base_id", "bigint unsigned")
            .with_table("user_bases");
        let plan = FinalizeService::new(Arc::new(fake)).plan().unwrap();

        let names = step_names(&plan);
        assert!(names.contains(&"fk_fk_user_bases_user_id"));
        assert!(names.contains(&"fk_fk_user_bases_base_id"));
    }

    #[test]
    fn test_execute_stops_before_drop_on_fk_failure() {
        let fk_sql = sql::add_foreign_key(&crate::domain::schema::PURCHASE_ENTRIES.foreign_key());
        let fake = Arc::new(FakeSchema::extended().failing(&fk_sql, 1452));
        let service = FinalizeService::new(fake.clone());
        let plan = service.plan().unwrap();
        let report = service.execute(&plan).unwrap();

        assert!(!report.is_success());
        assert!(matches!(
            report.results.last().map(|r| &r.outcome),
            Some(StepOutcome::Failed { .. })
        ));
        assert!(!fake.executed().iter().any(|s| s.contains("DROP COLUMN")));
    }
}
