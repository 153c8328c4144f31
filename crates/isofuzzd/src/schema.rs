//! A reproducer's on-disk form carries no schema: `stmts.sql` is plain SQL
//! text, and [`isofuzz_reproducer::to_queue`] always comes back with
//! `target_table: None`. Before a queue can be replayed against a fresh
//! [`MemoryDut`], every table it touches has to be declared with
//! [`MemoryDut::create_table`], so this module recovers just enough of the
//! schema from the statement text itself to make that possible.

use std::collections::BTreeMap;

use isofuzz_dut::MemoryDut;
use isofuzz_instrument::InstrumentedStmt;

/// The column names every generated table carries, per the grammar's own
/// convention (`wkey` and `write_op_id` first, always present even when a
/// minimized reproducer has dropped every `INSERT` into a table).
const FALLBACK_COLUMNS: &[&str] = &["wkey", "write_op_id", "v"];

/// Declares every table `queue` references on `dut`, inferring each one's
/// column list from its first `INSERT INTO t (col, ...) VALUES (...)`
/// statement; a table only ever touched by `SELECT`/`UPDATE`/`DELETE`
/// (possible after minimizing away its inserts) falls back to the
/// generator's default three-column shape.
pub fn declare_referenced_tables(queue: &[InstrumentedStmt], dut: &mut MemoryDut) {
    let mut columns_by_table: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for stmt in queue {
        let Some(table) = table_name(&stmt.text) else { continue };
        columns_by_table.entry(table.clone()).or_insert_with(Vec::new);
        if let Some(columns) = insert_columns(&stmt.text) {
            columns_by_table.insert(table, columns);
        }
    }

    for (table, columns) in columns_by_table {
        let columns: Vec<&str> = if columns.is_empty() {
            FALLBACK_COLUMNS.to_vec()
        } else {
            columns.iter().map(String::as_str).collect()
        };
        dut.create_table(&table, &columns);
    }
}

/// The table name out of `SELECT * FROM t ...`, `INSERT INTO t ...`,
/// `UPDATE t SET ...`, or `DELETE FROM t ...`, matching the shapes
/// [`MemoryDut`] itself recognizes.
fn table_name(stmt: &str) -> Option<String> {
    let trimmed = stmt.trim();
    let upper = trimmed.to_ascii_uppercase();
    let rest = if let Some(rest) = upper.strip_prefix("SELECT * FROM ") {
        &trimmed[trimmed.len() - rest.len()..]
    } else if let Some(rest) = upper.strip_prefix("INSERT INTO ") {
        &trimmed[trimmed.len() - rest.len()..]
    } else if let Some(rest) = upper.strip_prefix("UPDATE ") {
        &trimmed[trimmed.len() - rest.len()..]
    } else if let Some(rest) = upper.strip_prefix("DELETE FROM ") {
        &trimmed[trimmed.len() - rest.len()..]
    } else {
        return None;
    };
    let end = rest.find(|c: char| c.is_whitespace() || c == '(').unwrap_or(rest.len());
    let name = rest[..end].trim();
    if name.is_empty() { None } else { Some(name.to_string()) }
}

/// The column list out of an `INSERT INTO t (a, b, c) VALUES (...)`
/// statement; `None` for the columnless `INSERT INTO t VALUES (...)` form.
fn insert_columns(stmt: &str) -> Option<Vec<String>> {
    let upper = stmt.to_ascii_uppercase();
    if !upper.trim_start().starts_with("INSERT INTO") {
        return None;
    }
    let open = stmt.find('(')?;
    let values_kw = find_ci(&stmt[open..], "VALUES")?;
    let header_end = open + values_kw;
    let close = stmt[..header_end].rfind(')')?;
    if close <= open {
        return None;
    }
    let names: Vec<String> = stmt[open + 1..close]
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if names.is_empty() { None } else { Some(names) }
}

fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_uppercase().find(needle)
}
