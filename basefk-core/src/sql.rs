//! SQL statement builders
//!
//! All statements are built from the fixed schema targets in
//! `domain::schema`; values coming from the database are always bound as
//! parameters, never spliced in.

use crate::domain::schema::{
    ForeignKeySpec, FactTable, BASES, BASE_CODE_COLUMN, BASE_NAME_COLUMN, CATEGORY, EXPENSE_CATEGORIES, USERS,
    USER_BASES, USER_BASES_BASE_FK, USER_BASES_BASE_INDEX, USER_BASES_UNIQUE_KEY,
    USER_BASES_USER_FK, USER_BASES_USER_INDEX,
};
use crate::domain::ColumnType;

/// Quote an identifier with backticks
pub fn ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

// === DDL ===

pub fn add_column(table: &str, column: &str, ty: &ColumnType, after: Option<&str>) -> String {
    let mut sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {} NULL",
        ident(table),
        ident(column),
        ty.to_sql()
    );
    if let Some(after) = after {
        sql.push_str(&format!(" AFTER {}", ident(after)));
    }
    sql
}

pub fn modify_column(table: &str, column: &str, ty: &ColumnType) -> String {
    format!(
        "ALTER TABLE {} MODIFY COLUMN {} {} NULL",
        ident(table),
        ident(column),
        ty.to_sql()
    )
}

pub fn add_index(table: &str, index: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} ADD INDEX {} ({})",
        ident(table),
        ident(index),
        ident(column)
    )
}

pub fn add_foreign_key(fk: &ForeignKeySpec) -> String {
    let mut sql = format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({})",
        ident(fk.table),
        ident(fk.name),
        ident(fk.column),
        ident(fk.referenced_table),
        ident(fk.referenced_column)
    );
    if let Some(action) = fk.on_delete.as_sql() {
        sql.push_str(" ON DELETE ");
        sql.push_str(action);
    }
    sql
}

pub fn drop_column(table: &str, column: &str) -> String {
    format!("ALTER TABLE {} DROP COLUMN {}", ident(table), ident(column))
}

/// `user_bases` link table; id column types follow the referenced tables
pub fn create_user_bases(user_id: &ColumnType, base_id: &ColumnType) -> String {
    format!(
        "CREATE TABLE {table} (
  `id` BIGINT UNSIGNED NOT NULL AUTO_INCREMENT,
  `user_id` {user_ty} NOT NULL,
  `base_id` {base_ty} NOT NULL,
  `created_at` TIMESTAMP NULL DEFAULT CURRENT_TIMESTAMP,
  PRIMARY KEY (`id`),
  UNIQUE KEY {uk} (`user_id`, `base_id`),
  KEY {user_idx} (`user_id`),
  KEY {base_idx} (`base_id`),
  CONSTRAINT {user_fk} FOREIGN KEY (`user_id`) REFERENCES {users} (`id`) ON DELETE CASCADE,
  CONSTRAINT {base_fk} FOREIGN KEY (`base_id`) REFERENCES {bases} (`id`) ON DELETE CASCADE
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
        table = ident(USER_BASES),
        user_ty = user_id.to_sql(),
        base_ty = base_id.to_sql(),
        uk = ident(USER_BASES_UNIQUE_KEY),
        user_idx = ident(USER_BASES_USER_INDEX),
        base_idx = ident(USER_BASES_BASE_INDEX),
        user_fk = ident(USER_BASES_USER_FK),
        base_fk = ident(USER_BASES_BASE_FK),
        users = ident(USERS),
        bases = ident(BASES),
    )
}

// === Backfill ===

fn non_empty(alias: &str, column: &str) -> String {
    format!(
        "{alias}.{col} IS NOT NULL AND {alias}.{col} <> ''",
        alias = alias,
        col = ident(column)
    )
}

/// Distinct non-empty legacy values with no matching `bases.name`, ordered.
///
/// Matching happens in SQL so the column collation decides equality.
/// Returns `None` when no fact table is given.
pub fn missing_base_names(facts: &[FactTable]) -> Option<String> {
    if facts.is_empty() {
        return None;
    }
    let sources: Vec<String> = facts
        .iter()
        .map(|fact| {
            format!(
                "SELECT f.{col} AS name FROM {table} f WHERE {cond}",
                col = ident(fact.legacy_column),
                table = ident(fact.table),
                cond = non_empty("f", fact.legacy_column),
            )
        })
        .collect();
    Some(format!(
        "SELECT v.name FROM ({union}) v \
         WHERE NOT EXISTS (SELECT 1 FROM {bases} b WHERE b.{key} = v.name) \
         GROUP BY v.name ORDER BY v.name",
        union = sources.join(" UNION "),
        bases = ident(BASES),
        key = ident(BASE_NAME_COLUMN),
    ))
}

/// Missing legacy values already taken as another base's `code`.
///
/// Creating these would violate the unique key on `bases.code`.
pub fn base_code_collisions(facts: &[FactTable]) -> Option<String> {
    missing_base_names(facts).map(|missing| {
        format!(
            "SELECT m.name FROM ({missing}) m \
             WHERE EXISTS (SELECT 1 FROM {bases} b WHERE b.{code} = m.name) \
             ORDER BY m.name",
            missing = missing,
            bases = ident(BASES),
            code = ident(BASE_CODE_COLUMN),
        )
    })
}

/// Parameters: name, code, status, location, description, created_by
pub fn insert_base() -> String {
    format!(
        "INSERT INTO {} (`name`, `code`, `status`, `location`, `description`, `created_by`) \
         VALUES (?, ?, ?, ?, ?, ?)",
        ident(BASES)
    )
}

pub fn backfill_base_ids(fact: &FactTable) -> String {
    format!(
        "UPDATE {table} f JOIN {bases} b ON b.{key} = f.{legacy} \
         SET f.{fk} = b.`id` WHERE {cond}",
        table = ident(fact.table),
        bases = ident(BASES),
        key = ident(BASE_NAME_COLUMN),
        legacy = ident(fact.legacy_column),
        fk = ident(fact.fk_column),
        cond = non_empty("f", fact.legacy_column),
    )
}

pub fn count_unmatched(fact: &FactTable) -> String {
    format!(
        "SELECT COUNT(*) FROM {table} f WHERE f.{fk} IS NULL AND {cond}",
        table = ident(fact.table),
        fk = ident(fact.fk_column),
        cond = non_empty("f", fact.legacy_column),
    )
}

pub fn normalize_category_zero() -> String {
    format!(
        "UPDATE {} SET {col} = NULL WHERE {col} = 0",
        ident(CATEGORY.table),
        col = ident(CATEGORY.fk_column)
    )
}

pub fn count_rows(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", ident(table))
}

// === Verification ===

/// A query counting (and sampling) rows that violate an invariant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViolationQuery {
    /// `FROM ... WHERE ...` clause selecting the violating rows
    pub from: String,
    /// Expression rendered for each sampled row
    pub sample: String,
}

impl ViolationQuery {
    pub fn count_sql(&self) -> String {
        format!("SELECT COUNT(*) FROM {}", self.from)
    }

    pub fn sample_sql(&self, limit: usize) -> String {
        format!("SELECT {} FROM {} LIMIT {}", self.sample, self.from, limit)
    }
}

/// Fact rows whose legacy text disagrees with `bases.name[base_id]`
pub fn base_mismatch(fact: &FactTable) -> ViolationQuery {
    ViolationQuery {
        from: format!(
            "{table} f LEFT JOIN {bases} b ON b.`id` = f.{fk} \
             WHERE {cond} AND (b.`id` IS NULL OR b.{key} <> f.{legacy})",
            table = ident(fact.table),
            bases = ident(BASES),
            fk = ident(fact.fk_column),
            key = ident(BASE_NAME_COLUMN),
            legacy = ident(fact.legacy_column),
            cond = non_empty("f", fact.legacy_column),
        ),
        sample: format!(
            "CONCAT(f.`id`, ': ', f.{legacy})",
            legacy = ident(fact.legacy_column)
        ),
    }
}

/// Fact rows with a `base_id` pointing at no `bases` row
pub fn dangling_base_id(fact: &FactTable) -> ViolationQuery {
    ViolationQuery {
        from: format!(
            "{table} f LEFT JOIN {bases} b ON b.`id` = f.{fk} \
             WHERE f.{fk} IS NOT NULL AND b.`id` IS NULL",
            table = ident(fact.table),
            bases = ident(BASES),
            fk = ident(fact.fk_column),
        ),
        sample: format!("CONCAT(f.`id`, ': base_id=', f.{})", ident(fact.fk_column)),
    }
}

/// Fact rows still carrying legacy text but no `base_id`
pub fn unmatched_legacy(fact: &FactTable) -> ViolationQuery {
    ViolationQuery {
        from: format!(
            "{table} f WHERE f.{fk} IS NULL AND {cond}",
            table = ident(fact.table),
            fk = ident(fact.fk_column),
            cond = non_empty("f", fact.legacy_column),
        ),
        sample: format!("CONCAT(f.`id`, ': ', f.{})", ident(fact.legacy_column)),
    }
}

pub fn category_zero() -> ViolationQuery {
    ViolationQuery {
        from: format!(
            "{} f WHERE f.{} = 0",
            ident(CATEGORY.table),
            ident(CATEGORY.fk_column)
        ),
        sample: "CAST(f.`id` AS CHAR)".to_string(),
    }
}

pub fn dangling_category() -> ViolationQuery {
    ViolationQuery {
        from: format!(
            "{table} f LEFT JOIN {cats} c ON c.`id` = f.{fk} \
             WHERE f.{fk} IS NOT NULL AND f.{fk} <> 0 AND c.`id` IS NULL",
            table = ident(CATEGORY.table),
            cats = ident(EXPENSE_CATEGORIES),
            fk = ident(CATEGORY.fk_column),
        ),
        sample: format!("CONCAT(f.`id`, ': category_id=', f.{})", ident(CATEGORY.fk_column)),
    }
}

/// `user_bases` rows whose user or base is missing
pub fn user_bases_orphans() -> ViolationQuery {
    ViolationQuery {
        from: format!(
            "{ub} ub LEFT JOIN {users} u ON u.`id` = ub.`user_id` \
             LEFT JOIN {bases} b ON b.`id` = ub.`base_id` \
             WHERE u.`id` IS NULL OR b.`id` IS NULL",
            ub = ident(USER_BASES),
            users = ident(USERS),
            bases = ident(BASES),
        ),
        sample: "CONCAT('user_id=', ub.`user_id`, ', base_id=', ub.`base_id`)".to_string(),
    }
}

/// Duplicate `(user_id, base_id)` pairs, one row per duplicated pair
pub fn user_bases_duplicates() -> ViolationQuery {
    ViolationQuery {
        from: format!(
            "(SELECT `user_id`, `base_id`, COUNT(*) AS n FROM {} \
             GROUP BY `user_id`, `base_id` HAVING COUNT(*) > 1) d",
            ident(USER_BASES)
        ),
        sample: "CONCAT('user_id=', d.`user_id`, ', base_id=', d.`base_id`, ' x', d.n)".to_string(),
    }
}
