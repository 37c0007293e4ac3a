//! Extend service - add FK columns, supporting indexes and `user_bases`

use std::sync::Arc;

use crate::domain::result::Result;
use crate::domain::schema::{BASES, CATEGORY, EXPENSE_CATEGORIES, FACT_TABLES, USERS, USER_BASES};
use crate::domain::{ColumnType, PlannedStep, Stage, StagePlan, StageReport};
use crate::ports::SchemaPort;
use crate::services::executor::{run_plan, OnFailure};
use crate::services::InspectService;
use crate::sql;

/// Extend service for additive schema changes
pub struct ExtendService {
    port: Arc<dyn SchemaPort>,
    inspect: InspectService,
}

/// Whether a column of `actual` type (raw `COLUMN_TYPE`) can reference `target`
pub(crate) fn type_mismatch(actual: &str, target: &ColumnType) -> bool {
    ColumnType::parse(actual).map_or(true, |ty| !ty.matches(target))
}

impl ExtendService {
    pub fn new(port: Arc<dyn SchemaPort>) -> Self {
        let inspect = InspectService::new(Arc::clone(&port));
        Self { port, inspect }
    }

    /// Compute the DDL needed to bring the schema to the extended shape
    pub fn plan(&self) -> Result<StagePlan> {
        let mut plan = StagePlan::new(Stage::Extend);

        if !self.port.table_exists(BASES)? {
            plan.warn(format!("table {} is missing; new base_id columns default to BIGINT UNSIGNED", BASES));
        }
        let base_ty = self.inspect.id_type(BASES)?;

        for fact in FACT_TABLES {
            if !self.port.table_exists(fact.table)? {
                plan.warn(format!("table {} is missing; skipped", fact.table));
                continue;
            }
            self.plan_reference_column(&mut plan, fact.table, fact.fk_column, &base_ty, None)?;
            self.plan_index(&mut plan, fact.table, fact.index, fact.fk_column)?;
        }

        if self.port.table_exists(CATEGORY.table)? {
            let category_ty = self.inspect.id_type(EXPENSE_CATEGORIES)?;
            let after = if self.port.column_exists(CATEGORY.table, CATEGORY.legacy_column)? {
                Some(CATEGORY.legacy_column)
            } else {
                None
            };
            self.plan_reference_column(&mut plan, CATEGORY.table, CATEGORY.fk_column, &category_ty, after)?;
            self.plan_index(&mut plan, CATEGORY.table, CATEGORY.index, CATEGORY.fk_column)?;
        }

        if self.port.table_exists(USER_BASES)? {
            plan.satisfied(format!("table {}", USER_BASES));
        } else if !self.port.table_exists(USERS)? || !self.port.table_exists(BASES)? {
            plan.warn(format!(
                "table {} not created: it needs both {} and {}",
                USER_BASES, USERS, BASES
            ));
        } else {
            let user_ty = self.inspect.id_type(USERS)?;
            plan.push(PlannedStep::new(
                "create_user_bases",
                format!("create table {}", USER_BASES),
                sql::create_user_bases(&user_ty, &base_ty),
            ));
        }

        Ok(plan)
    }

    /// Run the planned steps; failures are recorded and the rest still run
    pub fn execute(&self, plan: &StagePlan) -> Result<StageReport> {
        run_plan(self.port.as_ref(), plan, OnFailure::Continue)
    }

    fn plan_reference_column(
        &self,
        plan: &mut StagePlan,
        table: &str,
        column: &str,
        target: &ColumnType,
        after: Option<&str>,
    ) -> Result<()> {
        match self.port.column_type(table, column)? {
            None => plan.push(PlannedStep::new(
                format!("add_{}_{}", table, column),
                format!("add column {}.{} {}", table, column, target),
                sql::add_column(table, column, target, after),
            )),
            Some(actual) if type_mismatch(&actual, target) => plan.push(PlannedStep::new(
                format!("widen_{}_{}", table, column),
                format!("change {}.{} from {} to {}", table, column, actual, target),
                sql::modify_column(table, column, target),
            )),
            Some(_) => plan.satisfied(format!("column {}.{}", table, column)),
        }
        Ok(())
    }

    fn plan_index(&self, plan: &mut StagePlan, table: &str, index: &str, column: &str) -> Result<()> {
        if self.port.index_exists(table, index)? {
            plan.satisfied(format!("index {}.{}", table, index));
        } else {
            plan.push(PlannedStep::new(
                format!("index_{}", index),
                format!("add index {} on {}({})", index, table, column),
                sql::add_index(table, index, column),
            ));
        }
        Ok(())
    }
}
