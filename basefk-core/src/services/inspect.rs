//! Inspect service - existence lookups and a snapshot of the tracked schema

use std::sync::Arc;

use serde::Serialize;

use crate::domain::result::Result;
use crate::domain::schema::{
    user_bases_foreign_keys, BASES, BASE_EXPENSES, CATEGORY, EXPENSE_CATEGORIES, FACT_TABLES,
    PURCHASE_ENTRIES, USERS, USER_BASES,
};
use crate::domain::{ColumnType, ForeignKeySpec};
use crate::ports::SchemaPort;
use crate::sql;

/// Tables whose presence and row counts the snapshot reports
const TRACKED_TABLES: [&str; 6] = [
    BASES,
    EXPENSE_CATEGORIES,
    USERS,
    USER_BASES,
    BASE_EXPENSES.table,
    PURCHASE_ENTRIES.table,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Table,
    Column,
    Index,
    ForeignKey,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectStatus {
    pub kind: ObjectKind,
    pub table: String,
    pub name: String,
    pub present: bool,
    /// Column type, or the actual constraint name of a foreign key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowCount {
    pub table: String,
    pub rows: i64,
}

/// Current state of every table, column, index and foreign key the
/// pipeline touches
#[derive(Debug, Clone, Serialize)]
pub struct SchemaSnapshot {
    pub database: String,
    pub objects: Vec<ObjectStatus>,
    pub row_counts: Vec<RowCount>,
}

impl SchemaSnapshot {
    pub fn missing(&self) -> impl Iterator<Item = &ObjectStatus> {
        self.objects.iter().filter(|o| !o.present)
    }

    pub fn find(&self, kind: ObjectKind, table: &str, name: &str) -> Option<&ObjectStatus> {
        self.objects
            .iter()
            .find(|o| o.kind == kind && o.table == table && o.name == name)
    }
}

/// Inspect service for schema lookups
pub struct InspectService {
    port: Arc<dyn SchemaPort>,
}

impl InspectService {
    pub fn new(port: Arc<dyn SchemaPort>) -> Self {
        Self { port }
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        self.port.table_exists(table)
    }

    pub fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        self.port.column_exists(table, column)
    }

    pub fn column_type(&self, table: &str, column: &str) -> Result<Option<String>> {
        self.port.column_type(table, column)
    }

    pub fn index_exists(&self, table: &str, index: &str) -> Result<bool> {
        self.port.index_exists(table, index)
    }

    pub fn constraint_exists(&self, table: &str, constraint: &str) -> Result<bool> {
        self.port.constraint_exists(table, constraint)
    }

    pub fn foreign_key_for(
        &self,
        table: &str,
        column: &str,
        referenced_table: &str,
    ) -> Result<Option<String>> {
        self.port.foreign_key_for(table, column, referenced_table)
    }

    /// Type of `table.id`, falling back to `BIGINT UNSIGNED` when the table or
    /// column is missing or the type is not an integer spelling
    pub fn id_type(&self, table: &str) -> Result<ColumnType> {
        Ok(self
            .port
            .column_type(table, "id")?
            .as_deref()
            .and_then(ColumnType::parse)
            .unwrap_or_else(ColumnType::bigint_unsigned))
    }

    /// Collect presence of every tracked object plus row counts
    pub fn snapshot(&self) -> Result<SchemaSnapshot> {
        let database = self.port.database_name()?;
        let mut objects = Vec::new();
        let mut row_counts = Vec::new();

        for table in TRACKED_TABLES {
            let present = self.port.table_exists(table)?;
            objects.push(ObjectStatus {
                kind: ObjectKind::Table,
                table: table.to_string(),
                name: table.to_string(),
                present,
                detail: None,
            });
            if present {
                row_counts.push(RowCount {
                    table: table.to_string(),
                    rows: self.port.count(&sql::count_rows(table))?,
                });
            }
        }

        for table in [BASES, EXPENSE_CATEGORIES, USERS] {
            objects.push(self.column_status(table, "id")?);
        }
        for fact in FACT_TABLES {
            objects.push(self.column_status(fact.table, fact.legacy_column)?);
            objects.push(self.column_status(fact.table, fact.fk_column)?);
        }
        objects.push(self.column_status(CATEGORY.table, CATEGORY.legacy_column)?);
        objects.push(self.column_status(CATEGORY.table, CATEGORY.fk_column)?);

        for fact in FACT_TABLES {
            objects.push(self.index_status(fact.table, fact.index)?);
        }
        objects.push(self.index_status(CATEGORY.table, CATEGORY.index)?);

        let mut foreign_keys: Vec<ForeignKeySpec> =
            FACT_TABLES.iter().map(|fact| fact.foreign_key()).collect();
        foreign_keys.push(CATEGORY.foreign_key());
        foreign_keys.extend(user_bases_foreign_keys());
        for fk in &foreign_keys {
            let actual = self
                .port
                .foreign_key_for(fk.table, fk.column, fk.referenced_table)?;
            objects.push(ObjectStatus {
                kind: ObjectKind::ForeignKey,
                table: fk.table.to_string(),
                name: fk.name.to_string(),
                present: actual.is_some(),
                detail: actual,
            });
        }

        Ok(SchemaSnapshot {
            database,
            objects,
            row_counts,
        })
    }

    fn column_status(&self, table: &str, column: &str) -> Result<ObjectStatus> {
        let ty = self.port.column_type(table, column)?;
        Ok(ObjectStatus {
            kind: ObjectKind::Column,
            table: table.to_string(),
            name: column.to_string(),
            present: ty.is_some(),
            detail: ty,
        })
    }

    fn index_status(&self, table: &str, index: &str) -> Result<ObjectStatus> {
        Ok(ObjectStatus {
            kind: ObjectKind::Index,
            table: table.to_string(),
            name: index.to_string(),
            present: self.port.index_exists(table, index)?,
            detail: None,
        })
    }
}
