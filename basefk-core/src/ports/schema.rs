//! Schema port - database abstraction used by every stage

use crate::domain::result::Result;

/// A row to insert into `bases` for a legacy value with no match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBase {
    pub name: String,
    pub code: String,
    pub status: String,
    pub location: String,
    pub description: String,
    pub created_by: u64,
}

/// Database access needed by the migration stages
///
/// Lookups are scoped to the connection's current database. Implementations
/// (adapters) run each call as one blocking round trip on a single connection.
pub trait SchemaPort: Send + Sync {
    // === Inspection ===

    /// Name of the current database (`DATABASE()`)
    fn database_name(&self) -> Result<String>;

    fn table_exists(&self, table: &str) -> Result<bool>;

    /// `COLUMN_TYPE` of a column, or `None` when the column does not exist
    fn column_type(&self, table: &str, column: &str) -> Result<Option<String>>;

    fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        Ok(self.column_type(table, column)?.is_some())
    }

    fn index_exists(&self, table: &str, index: &str) -> Result<bool>;

    fn constraint_exists(&self, table: &str, constraint: &str) -> Result<bool>;

    /// Name of any foreign key on `table.column` referencing `referenced_table`
    fn foreign_key_for(
        &self,
        table: &str,
        column: &str,
        referenced_table: &str,
    ) -> Result<Option<String>>;

    // === Statements ===

    /// Execute a statement, returning affected rows
    fn execute(&self, sql: &str) -> Result<u64>;

    /// Run a `SELECT COUNT(*)`-shaped query
    fn count(&self, sql: &str) -> Result<i64>;

    /// Run a single-column query, rendering each value as a string
    fn strings(&self, sql: &str) -> Result<Vec<String>>;

    /// Insert a `bases` row, returning its id
    fn insert_base(&self, base: &NewBase) -> Result<u64>;

    // === Transactions ===

    fn begin(&self) -> Result<()>;
    fn commit(&self) -> Result<()>;
    fn rollback(&self) -> Result<()>;
}

/// Run `f` inside a transaction: commit on success, roll back on error.
///
/// Only DML is transactional in MySQL; DDL inside `f` commits implicitly.
pub fn in_transaction<T>(port: &dyn SchemaPort, f: impl FnOnce() -> Result<T>) -> Result<T> {
    port.begin()?;
    match f() {
        Ok(value) => {
            port.commit()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = port.rollback() {
                tracing::error!(error = %rollback_err, "rollback failed");
            }
            Err(e)
        }
    }
}
