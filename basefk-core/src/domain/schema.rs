//! Schema targets of the base/category migration
//!
//! Every table, column, index and constraint the pipeline touches is declared
//! here once. Services read these records instead of spelling names inline.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

pub const BASES: &str = "bases";
pub const EXPENSE_CATEGORIES: &str = "expense_categories";
pub const USERS: &str = "users";
pub const USER_BASES: &str = "user_bases";

/// Natural key of `bases` used to match legacy text
pub const BASE_NAME_COLUMN: &str = "name";
/// Unique code of `bases`; created bases reuse the legacy text here too
pub const BASE_CODE_COLUMN: &str = "code";

/// A fact table carrying a legacy `base` text column that becomes `base_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FactTable {
    pub table: &'static str,
    pub legacy_column: &'static str,
    pub fk_column: &'static str,
    pub fk_constraint: &'static str,
    pub index: &'static str,
}

pub const BASE_EXPENSES: FactTable = FactTable {
    table: "base_expenses",
    legacy_column: "base",
    fk_column: "base_id",
    fk_constraint: "fk_base_expenses_base_id",
    index: "idx_base_expenses_base_id",
};

pub const PURCHASE_ENTRIES: FactTable = FactTable {
    table: "purchase_entries",
    legacy_column: "base",
    fk_column: "base_id",
    fk_constraint: "fk_purchase_entries_base_id",
    index: "idx_purchase_entries_base_id",
};

pub const FACT_TABLES: [FactTable; 2] = [BASE_EXPENSES, PURCHASE_ENTRIES];

/// The `category_id` reference on `base_expenses`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryReference {
    pub table: &'static str,
    pub legacy_column: &'static str,
    pub fk_column: &'static str,
    pub fk_constraint: &'static str,
    pub index: &'static str,
}

pub const CATEGORY: CategoryReference = CategoryReference {
    table: "base_expenses",
    legacy_column: "category",
    fk_column: "category_id",
    fk_constraint: "fk_base_expenses_category_id",
    index: "idx_base_expenses_category_id",
};

/// `user_bases` link table names
pub const USER_BASES_UNIQUE_KEY: &str = "uk_user_bases_user_base";
pub const USER_BASES_USER_INDEX: &str = "idx_user_bases_user_id";
pub const USER_BASES_BASE_INDEX: &str = "idx_user_bases_base_id";
pub const USER_BASES_USER_FK: &str = "fk_user_bases_user_id";
pub const USER_BASES_BASE_FK: &str = "fk_user_bases_base_id";

/// Referential action for `ON DELETE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OnDelete {
    Restrict,
    SetNull,
    Cascade,
}

impl OnDelete {
    pub fn as_sql(&self) -> Option<&'static str> {
        match self {
            OnDelete::Restrict => None,
            OnDelete::SetNull => Some("SET NULL"),
            OnDelete::Cascade => Some("CASCADE"),
        }
    }
}

/// A foreign key the pipeline ensures
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeySpec {
    pub name: &'static str,
    pub table: &'static str,
    pub column: &'static str,
    pub referenced_table: &'static str,
    pub referenced_column: &'static str,
    pub on_delete: OnDelete,
}

impl FactTable {
    pub fn foreign_key(&self) -> ForeignKeySpec {
        ForeignKeySpec {
            name: self.fk_constraint,
            table: self.table,
            column: self.fk_column,
            referenced_table: BASES,
            referenced_column: "id",
            on_delete: OnDelete::Restrict,
        }
    }
}

impl CategoryReference {
    pub fn foreign_key(&self) -> ForeignKeySpec {
        ForeignKeySpec {
            name: self.fk_constraint,
            table: self.table,
            column: self.fk_column,
            referenced_table: EXPENSE_CATEGORIES,
            referenced_column: "id",
            on_delete: OnDelete::SetNull,
        }
    }
}

/// Foreign keys of the `user_bases` link table
pub fn user_bases_foreign_keys() -> [ForeignKeySpec; 2] {
    [
        ForeignKeySpec {
            name: USER_BASES_USER_FK,
            table: USER_BASES,
            column: "user_id",
            referenced_table: USERS,
            referenced_column: "id",
            on_delete: OnDelete::Cascade,
        },
        ForeignKeySpec {
            name: USER_BASES_BASE_FK,
            table: USER_BASES,
            column: "base_id",
            referenced_table: BASES,
            referenced_column: "id",
            on_delete: OnDelete::Cascade,
        },
    ]
}

/// Integer column type as reported by `information_schema.columns.COLUMN_TYPE`
///
/// Display width (`bigint(20)`) is dropped: MySQL 8 no longer reports it and it
/// has no effect on FK compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnType {
    pub base: String,
    pub unsigned: bool,
}

fn column_type_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*([a-z]+)\s*(?:\(\s*\d+\s*(?:,\s*\d+\s*)?\))?((?:\s+unsigned)?)(?:\s+zerofill)?\s*$")
            .expect("column type pattern is valid")
    })
}

impl ColumnType {
    /// The type used for new reference columns when the referenced id type is unknown
    pub fn bigint_unsigned() -> Self {
        Self {
            base: "bigint".to_string(),
            unsigned: true,
        }
    }

    /// Parse a `COLUMN_TYPE` string such as `bigint(20) unsigned`
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = column_type_regex().captures(raw)?;
        Some(Self {
            base: caps[1].to_lowercase(),
            unsigned: !caps[2].trim().is_empty(),
        })
    }

    /// Whether a column of this type can reference a column of `other`
    pub fn matches(&self, other: &ColumnType) -> bool {
        self.base == other.base && self.unsigned == other.unsigned
    }

    /// DDL spelling, e.g. `BIGINT UNSIGNED`
    pub fn to_sql(&self) -> String {
        if self.unsigned {
            format!("{} UNSIGNED", self.base.to_uppercase())
        } else {
            self.base.to_uppercase()
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}
