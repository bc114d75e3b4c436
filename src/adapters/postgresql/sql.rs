//! SQL text for the PostgreSQL store
//!
//! Table names are interpolated; callers pass names that went through
//! [`crate::adapters::database::tables::validate_identifier`]. Values are
//! always bound as parameters.

use crate::adapters::database::tables::RecordTables;

const ROW_COLUMNS: &str = "id, csruid, device, content";

/// DDL creating the tables of one record type
pub fn create_tables(tables: &RecordTables) -> String {
    let current = tables.current();
    let backup = tables.backup();
    let mut ddl = format!(
        r#"
CREATE TABLE IF NOT EXISTS {current} (
    id BIGSERIAL PRIMARY KEY,
    csruid TEXT NOT NULL UNIQUE,
    device JSONB NOT NULL,
    content JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE TABLE IF NOT EXISTS {backup} (
    id BIGSERIAL PRIMARY KEY,
    csruid TEXT NOT NULL,
    device JSONB NOT NULL,
    content JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS {backup}_csruid_idx ON {backup} (csruid);
"#
    );
    if let Some(marker) = tables.export_marker() {
        ddl.push_str(&format!(
            r#"CREATE TABLE IF NOT EXISTS {marker} (
    record_id BIGINT PRIMARY KEY REFERENCES {current} (id),
    exported_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
"#
        ));
    }
    ddl
}

pub fn select_by_id(table: &str) -> String {
    format!("SELECT {ROW_COLUMNS} FROM {table} WHERE id = $1")
}

pub fn select_by_key(table: &str) -> String {
    format!("SELECT {ROW_COLUMNS} FROM {table} WHERE csruid = $1 ORDER BY id")
}

pub fn select_by_key_prefix(table: &str) -> String {
    format!("SELECT {ROW_COLUMNS} FROM {table} WHERE csruid LIKE $1 ESCAPE '\\' ORDER BY id")
}

pub fn insert(table: &str) -> String {
    format!("INSERT INTO {table} (csruid, device, content) VALUES ($1, $2, $3) RETURNING id")
}

pub fn upsert_by_key(table: &str) -> String {
    format!(
        "INSERT INTO {table} (csruid, device, content) VALUES ($1, $2, $3) \
         ON CONFLICT (csruid) DO UPDATE SET \
         device = EXCLUDED.device, content = EXCLUDED.content, updated_at = now() \
         RETURNING id"
    )
}

pub fn delete_by_key(table: &str) -> String {
    format!("DELETE FROM {table} WHERE csruid = $1")
}

pub fn insert_marker(table: &str) -> String {
    format!("INSERT INTO {table} (record_id) VALUES ($1) ON CONFLICT (record_id) DO NOTHING")
}

pub fn delete_marker(table: &str) -> String {
    format!("DELETE FROM {table} WHERE record_id = $1")
}

pub fn marker_exported_at(table: &str) -> String {
    format!("SELECT exported_at FROM {table} WHERE record_id = $1")
}

pub fn select_unmarked(current: &str, marker: &str) -> String {
    format!(
        "SELECT c.id, c.csruid, c.device, c.content FROM {current} c \
         LEFT JOIN {marker} m ON m.record_id = c.id \
         WHERE m.record_id IS NULL ORDER BY c.id LIMIT $1"
    )
}

pub const TRY_ADVISORY_XACT_LOCK: &str = "SELECT pg_try_advisory_xact_lock($1, $2)";

pub const ADVISORY_XACT_LOCK: &str = "SELECT pg_advisory_xact_lock($1, $2)";

/// LIKE pattern matching every value that starts with `prefix`
pub fn like_prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_prefix_pattern_escapes() {
        assert_eq!(like_prefix_pattern("abc"), "abc%");
        assert_eq!(like_prefix_pattern("a_b%c"), "a\\_b\\%c%");
        assert_eq!(like_prefix_pattern("a\\b"), "a\\\\b%");
    }

    #[test]
    fn test_create_tables_without_marker() {
        let tables = RecordTables::new("fever", "surveys").unwrap();
        let ddl = create_tables(&tables);
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS fever_current_surveys"));
        assert!(ddl.contains("csruid TEXT NOT NULL UNIQUE"));
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS fever_backup_surveys"));
        assert!(ddl.contains("fever_backup_surveys_csruid_idx"));
        assert!(!ddl.contains("record_id"));
    }

    #[test]
    fn test_create_tables_with_marker() {
        let tables = RecordTables::new("fever", "surveys")
            .unwrap()
            .with_export_marker("fever_export_markers")
            .unwrap();
        let ddl = create_tables(&tables);
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS fever_export_markers"));
        assert!(ddl.contains("REFERENCES fever_current_surveys (id)"));
    }

    #[test]
    fn test_upsert_targets_record_key() {
        let sql = upsert_by_key("fever_current_surveys");
        assert!(sql.contains("ON CONFLICT (csruid) DO UPDATE"));
        assert!(sql.ends_with("RETURNING id"));
    }

    #[test]
    fn test_prefix_query_declares_escape() {
        let sql = select_by_key_prefix("t");
        assert!(sql.contains("LIKE $1 ESCAPE '\\'"));
    }

    #[test]
    fn test_unmarked_query_joins_marker() {
        let sql = select_unmarked("fever_current_surveys", "fever_export_markers");
        assert!(sql.contains("LEFT JOIN fever_export_markers m ON m.record_id = c.id"));
        assert!(sql.contains("WHERE m.record_id IS NULL"));
    }
}
