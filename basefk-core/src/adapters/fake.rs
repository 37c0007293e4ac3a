//! In-memory SchemaPort for service tests
//!
//! Holds a declared catalog (tables, columns, indexes, constraints) and
//! canned answers keyed by the exact SQL the services build. Statements are
//! recorded, not interpreted.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::domain::result::{Error, Result};
use crate::ports::{NewBase, SchemaPort};

#[derive(Default)]
struct FakeState {
    tables: HashSet<String>,
    columns: HashMap<(String, String), String>,
    indexes: HashSet<(String, String)>,
    constraints: HashSet<(String, String)>,
    foreign_keys: HashMap<(String, String, String), String>,
    counts: HashMap<String, i64>,
    strings: HashMap<String, Vec<String>>,
    affected: HashMap<String, u64>,
    failures: HashMap<String, u16>,
    fail_insert: Option<u16>,
    executed: Vec<String>,
    inserted: Vec<NewBase>,
    next_base_id: u64,
}

pub struct FakeSchema {
    state: Mutex<FakeState>,
}

impl FakeSchema {
    pub fn new() -> Self {
        let state = FakeState {
            next_base_id: 100,
            ..Default::default()
        };
        Self { state: Mutex::new(state) }
    }

    /// Schema before any migration: reference tables plus fact tables with
    /// their legacy text columns only
    pub fn legacy() -> Self {
        Self::new()
            .with_column("bases", "id", "bigint unsigned")
            .with_column("bases", "name", "varchar(255)")
            .with_column("expense_categories", "id", "bigint unsigned")
            .with_column("users", "id", "bigint unsigned")
            .with_column("base_expenses", "id", "bigint unsigned")
            .with_column("base_expenses", "base", "varchar(255)")
            .with_column("base_expenses", "category", "varchar(255)")
            .with_column("purchase_entries", "id", "bigint unsigned")
            .with_column("purchase_entries", "base", "varchar(255)")
    }

    /// Schema after Extend: new columns, indexes and `user_bases` in place
    pub fn extended() -> Self {
        Self::legacy()
            .with_column("base_expenses", "base_id", "bigint unsigned")
            .with_column("base_expenses", "category_id", "bigint unsigned")
            .with_column("purchase_entries", "base_id", "bigint unsigned")
            .with_index("base_expenses", "idx_base_expenses_category_id")
            .with_index("base_expenses", "idx_base_expenses_base_id")
            .with_index("purchase_entries", "idx_purchase_entries_base_id")
            .with_foreign_key("user_bases", "user_id", "users", "fk_user_bases_user_id")
            .with_foreign_key("user_bases", "base_id", "bases", "fk_user_bases_base_id")
    }

    fn update(self, f: impl FnOnce(&mut FakeState)) -> Self {
        {
            let mut guard = self.state.lock().unwrap();
            f(&mut *guard);
        }
        self
    }

    pub fn with_table(self, table: &str) -> Self {
        self.update(|s| {
            s.tables.insert(table.to_string());
        })
    }

    pub fn with_column(self, table: &str, column: &str, ty: &str) -> Self {
        self.update(|s| {
            s.tables.insert(table.to_string());
            s.columns
                .insert((table.to_string(), column.to_string()), ty.to_string());
        })
    }

    pub fn without_column(self, table: &str, column: &str) -> Self {
        self.update(|s| {
            s.columns.remove(&(table.to_string(), column.to_string()));
        })
    }

    pub fn without_table(self, table: &str) -> Self {
        self.update(|s| {
            s.tables.remove(table);
            s.columns.retain(|(t, _), _| t != table);
        })
    }

    pub fn with_index(self, table: &str, index: &str) -> Self {
        self.update(|s| {
            s.indexes.insert((table.to_string(), index.to_string()));
        })
    }

    pub fn with_foreign_key(self, table: &str, column: &str, referenced: &str, name: &str) -> Self {
        self.update(|s| {
            s.tables.insert(table.to_string());
            s.constraints.insert((table.to_string(), name.to_string()));
            s.foreign_keys.insert(
                (table.to_string(), column.to_string(), referenced.to_string()),
                name.to_string(),
            );
        })
    }

    pub fn with_count(self, sql: &str, n: i64) -> Self {
        self.update(|s| {
            s.counts.insert(sql.to_string(), n);
        })
    }

    pub fn with_strings(self, sql: &str, values: &[&str]) -> Self {
        self.update(|s| {
            s.strings
                .insert(sql.to_string(), values.iter().map(|v| v.to_string()).collect());
        })
    }

    pub fn affecting(self, sql: &str, rows: u64) -> Self {
        self.update(|s| {
            s.affected.insert(sql.to_string(), rows);
        })
    }

    /// Make `sql` fail with the given server error code
    pub fn failing(self, sql: &str, code: u16) -> Self {
        self.update(|s| {
            s.failures.insert(sql.to_string(), code);
        })
    }

    pub fn failing_insert(self, code: u16) -> Self {
        self.update(|s| s.fail_insert = Some(code))
    }

    pub fn executed(&self) -> Vec<String> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn inserted(&self) -> Vec<NewBase> {
        self.state.lock().unwrap().inserted.clone()
    }
}

fn server_error(code: u16) -> Error {
    Error::Server {
        code,
        message: format!("simulated server error {}", code),
    }
}

impl SchemaPort for FakeSchema {
    fn database_name(&self) -> Result<String> {
        Ok("fake".to_string())
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().tables.contains(table))
    }

    fn column_type(&self, table: &str, column: &str) -> Result<Option<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .columns
            .get(&(table.to_string(), column.to_string()))
            .cloned())
    }

    fn index_exists(&self, table: &str, index: &str) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .indexes
            .contains(&(table.to_string(), index.to_string())))
    }

    fn constraint_exists(&self, table: &str, constraint: &str) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .constraints
            .contains(&(table.to_string(), constraint.to_string())))
    }

    fn foreign_key_for(
        &self,
        table: &str,
        column: &str,
        referenced_table: &str,
    ) -> Result<Option<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .foreign_keys
            .get(&(
                table.to_string(),
                column.to_string(),
                referenced_table.to_string(),
            ))
            .cloned())
    }

    fn execute(&self, sql: &str) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        state.executed.push(sql.to_string());
        if let Some(code) = state.failures.get(sql) {
            return Err(server_error(*code));
        }
        Ok(state.affected.get(sql).copied().unwrap_or(0))
    }

    fn count(&self, sql: &str) -> Result<i64> {
        Ok(self.state.lock().unwrap().counts.get(sql).copied().unwrap_or(0))
    }

    fn strings(&self, sql: &str) -> Result<Vec<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .strings
            .get(sql)
            .cloned()
            .unwrap_or_default())
    }

    fn insert_base(&self, base: &NewBase) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        state.executed.push(format!("INSERT bases {}", base.name));
        if let Some(code) = state.fail_insert {
            return Err(server_error(code));
        }
        state.inserted.push(base.clone());
        let id = state.next_base_id;
        state.next_base_id += 1;
        Ok(id)
    }

    fn begin(&self) -> Result<()> {
        self.state.lock().unwrap().executed.push("BEGIN".to_string());
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.state.lock().unwrap().executed.push("COMMIT".to_string());
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.state.lock().unwrap().executed.push("ROLLBACK".to_string());
        Ok(())
    }
}
