//! Backfill service - derive `base_id` from legacy base text
//!
//! Missing `bases` rows are created first (one transaction), then each fact
//! table is updated by joining on `bases.name` (one transaction per table),
//! then `category_id = 0` is normalized to NULL.

use std::sync::Arc;

use serde::Serialize;

use crate::config::Config;
use crate::domain::result::Result;
use crate::domain::schema::{CATEGORY, FACT_TABLES};
use crate::domain::FactTable;
use crate::ports::{in_transaction, SchemaPort};
use crate::sql;

/// What a backfill run would do
#[derive(Debug, Clone, Serialize)]
pub struct BackfillPlan {
    /// Legacy values with no `bases` row, in the order they will be created
    pub missing_bases: Vec<String>,
    /// Legacy values with no `bases` row whose text is already another
    /// base's code; not created, their rows stay unmatched
    pub code_conflicts: Vec<String>,
    /// Fact tables with both the legacy column and `base_id`
    pub fact_tables: Vec<FactTable>,
    /// Whether `base_expenses.category_id` exists and gets normalized
    pub normalize_category: bool,
    /// Rows currently holding `category_id = 0`
    pub category_zero_rows: i64,
    pub warnings: Vec<String>,
}

impl BackfillPlan {
    pub fn is_empty(&self) -> bool {
        self.missing_bases.is_empty() && self.fact_tables.is_empty() && !self.normalize_category
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedBase {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableBackfill {
    pub table: String,
    pub rows_updated: u64,
    /// Rows with legacy text that still have no `base_id`
    pub unmatched: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackfillReport {
    pub created_bases: Vec<CreatedBase>,
    pub tables: Vec<TableBackfill>,
    pub category_rows_normalized: u64,
    pub warnings: Vec<String>,
}

impl BackfillReport {
    pub fn unmatched_total(&self) -> i64 {
        self.tables.iter().map(|t| t.unmatched).sum()
    }
}

/// Backfill service for populating FK columns from legacy text
pub struct BackfillService {
    port: Arc<dyn SchemaPort>,
    config: Config,
}

impl BackfillService {
    pub fn new(port: Arc<dyn SchemaPort>, config: Config) -> Self {
        Self { port, config }
    }

    pub fn plan(&self) -> Result<BackfillPlan> {
        let mut warnings = Vec::new();
        let mut sources = Vec::new();
        let mut fact_tables = Vec::new();

        for fact in FACT_TABLES {
            if !self.port.column_exists(fact.table, fact.legacy_column)? {
                tracing::info!(table = fact.table, "legacy column absent, nothing to backfill");
                continue;
            }
            sources.push(fact);
            if self.port.column_exists(fact.table, fact.fk_column)? {
                fact_tables.push(fact);
            } else {
                warnings.push(format!(
                    "{}.{} does not exist; run extend first",
                    fact.table, fact.fk_column
                ));
            }
        }

        let mut missing_bases = match sql::missing_base_names(&sources) {
            Some(query) => self.port.strings(&query)?,
            None => Vec::new(),
        };
        let code_conflicts = match sql::base_code_collisions(&sources) {
            Some(query) if !missing_bases.is_empty() => self.port.strings(&query)?,
            _ => Vec::new(),
        };
        if !code_conflicts.is_empty() {
            missing_bases.retain(|name| !code_conflicts.contains(name));
            tracing::warn!(conflicts = ?code_conflicts, "legacy values collide with bases.code");
            warnings.push(format!(
                "{} legacy value(s) already used as a base code and will not be created: {}",
                code_conflicts.len(),
                code_conflicts.join(", ")
            ));
        }

        let normalize_category = self.port.column_exists(CATEGORY.table, CATEGORY.fk_column)?;
        let category_zero_rows = if normalize_category {
            self.port.count(&sql::category_zero().count_sql())?
        } else {
            0
        };

        Ok(BackfillPlan {
            missing_bases,
            code_conflicts,
            fact_tables,
            normalize_category,
            category_zero_rows,
            warnings,
        })
    }

    /// Apply the plan. A failing pass is rolled back and the error returned;
    /// passes committed before it stay applied.
    pub fn execute(&self, plan: &BackfillPlan) -> Result<BackfillReport> {
        let port = self.port.as_ref();
        let mut warnings = plan.warnings.clone();

        let created_bases = if plan.missing_bases.is_empty() {
            Vec::new()
        } else {
            in_transaction(port, || {
                plan.missing_bases
                    .iter()
                    .map(|name| -> Result<CreatedBase> {
                        let id = port.insert_base(&self.config.new_base(name))?;
                        tracing::info!(id, name = %name, "created base");
                        Ok(CreatedBase {
                            id,
                            name: name.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })?
        };

        let mut tables = Vec::new();
        for fact in &plan.fact_tables {
            let rows_updated = in_transaction(port, || port.execute(&sql::backfill_base_ids(fact)))?;
            let unmatched = port.count(&sql::count_unmatched(fact))?;
            tracing::info!(table = fact.table, rows_updated, unmatched, "backfilled base_id");
            if unmatched > 0 {
                warnings.push(format!(
                    "{} row(s) in {} have {} text with no matching base",
                    unmatched, fact.table, fact.legacy_column
                ));
            }
            tables.push(TableBackfill {
                table: fact.table.to_string(),
                rows_updated,
                unmatched,
            });
        }

        let category_rows_normalized = if plan.normalize_category {
            in_transaction(port, || port.execute(&sql::normalize_category_zero()))?
        } else {
            0
        };

        Ok(BackfillReport {
            created_bases,
            tables,
            category_rows_normalized,
            warnings,
        })
    }
}
