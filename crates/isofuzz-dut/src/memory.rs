use ahash::AHashMap;
use smol_str::SmolStr;

use crate::error::DutError;
use crate::value::{Row, SqlValue};
use crate::{Dut, ExecOutcome, SessionId};

#[derive(Debug, Clone, Default)]
struct SessionState {
    in_txn: bool,
    /// `None` means the row was deleted by this session and not yet
    /// committed; `Some(row)` is an insert/update pending commit.
    overlay: AHashMap<(SmolStr, i64), Option<Row>>,
}

#[derive(Debug, Clone)]
struct MemTable {
    columns: Vec<SmolStr>,
    rows: AHashMap<i64, Row>,
}

impl MemTable {
    fn wkey_of(&self, row: &[SqlValue]) -> Option<i64> {
        row.first().and_then(|v| v.as_int())
    }
}

/// A tiny in-process relational store that recognizes exactly the statement
/// shapes the generator and instrumentor emit (`SELECT`/`INSERT`/
/// `UPDATE`/`DELETE` with simple `col = literal` conjunctions, plus the
/// three transaction delimiters). It is not a SQL engine: it exists so the
/// scheduler and analyzer can be exercised end-to-end without a real
/// network driver.
///
/// Isolation model: each session sees the globally committed state
/// overlaid with its own uncommitted writes (read-your-own-writes, no dirty
/// reads of others). A row is exclusively locked for writes from the
/// moment one session writes it until that session commits or rolls back;
/// a conflicting writer is reported [`ExecOutcome::Blocked`].
#[derive(Debug, Default)]
pub struct MemoryDut {
    tables: AHashMap<SmolStr, MemTable>,
    sessions: AHashMap<SessionId, SessionState>,
    locks: AHashMap<(SmolStr, i64), SessionId>,
    backups: AHashMap<SmolStr, (AHashMap<SmolStr, MemTable>, u64)>,
    backup_counter: u64,
}

impl MemoryDut {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a table so `INSERT`/`UPDATE`/`DELETE`/`SELECT` can target it.
    /// `wkey` (the primary key) must be `columns[0]`.
    pub fn create_table(&mut self, name: &str, columns: &[&str]) {
        self.tables.insert(
            name.into(),
            MemTable {
                columns: columns.iter().map(|c| SmolStr::from(*c)).collect(),
                rows: AHashMap::default(),
            },
        );
    }

    fn session_mut(&mut self, session: SessionId) -> &mut SessionState {
        self.sessions.entry(session).or_default()
    }

    fn visible_row(&self, session: SessionId, table: &str, wkey: i64) -> Option<Row> {
        let key = (SmolStr::from(table), wkey);
        if let Some(state) = self.sessions.get(&session) {
            if let Some(overlay) = state.overlay.get(&key) {
                return overlay.clone();
            }
        }
        self.tables.get(table).and_then(|t| t.rows.get(&wkey).cloned())
    }

    fn all_visible_rows(&self, session: SessionId, table: &str) -> Vec<Row> {
        let mut out: AHashMap<i64, Row> = self
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default();
        if let Some(state) = self.sessions.get(&session) {
            for ((t, wkey), overlay) in &state.overlay {
                if t == table {
                    match overlay {
                        Some(row) => {
                            out.insert(*wkey, row.clone());
                        }
                        None => {
                            out.remove(wkey);
                        }
                    }
                }
            }
        }
        let mut rows: Vec<(i64, Row)> = out.into_iter().collect();
        rows.sort_by_key(|(wkey, _)| *wkey);
        rows.into_iter().map(|(_, row)| row).collect()
    }

    fn try_lock(&mut self, session: SessionId, table: &str, wkey: i64) -> bool {
        let key = (SmolStr::from(table), wkey);
        match self.locks.get(&key) {
            Some(holder) if *holder != session => false,
            _ => {
                self.locks.insert(key, session);
                true
            }
        }
    }

    fn release_locks_of(&mut self, session: SessionId) {
        self.locks.retain(|_, holder| *holder != session);
    }
}

impl Dut for MemoryDut {
    fn execute(&mut self, session: SessionId, stmt: &str) -> Result<ExecOutcome, DutError> {
        let trimmed = stmt.trim().trim_end_matches(';').trim();
        let upper = trimmed.to_ascii_uppercase();

        if upper == self.begin_stmt_text() {
            self.session_mut(session).in_txn = true;
            return Ok(ExecOutcome::AffectedRows(0));
        }
        if upper == self.commit_stmt_text() {
            let state = self.sessions.remove(&session).unwrap_or_default();
            for ((table, wkey), overlay) in state.overlay {
                let entry = self.tables.entry(table).or_insert_with(|| MemTable {
                    columns: Vec::new(),
                    rows: AHashMap::default(),
                });
                match overlay {
                    Some(row) => {
                        entry.rows.insert(wkey, row);
                    }
                    None => {
                        entry.rows.remove(&wkey);
                    }
                }
            }
            self.release_locks_of(session);
            return Ok(ExecOutcome::AffectedRows(0));
        }
        if upper == self.abort_stmt_text() {
            self.sessions.remove(&session);
            self.release_locks_of(session);
            return Ok(ExecOutcome::Skipped);
        }

        match mini_sql::parse(trimmed) {
            Some(mini_sql::Stmt::Select { table, predicate }) => {
                let rows = self.all_visible_rows(session, &table);
                let filtered: Vec<Row> = rows
                    .into_iter()
                    .filter(|row| {
                        let cols = self.tables.get(&table).map(|t| t.columns.as_slice());
                        predicate_matches(&predicate, row, cols.unwrap_or(&[]))
                    })
                    .collect();
                Ok(ExecOutcome::Rows(filtered))
            }
            Some(mini_sql::Stmt::Insert { table, values }) => {
                let Some(mem_table) = self.tables.get(&table) else {
                    return Ok(ExecOutcome::Syntax(format!("no such table `{table}`")));
                };
                let Some(wkey) = mem_table.wkey_of(&values) else {
                    return Ok(ExecOutcome::Syntax("insert row has no integer wkey".into()));
                };
                if !self.try_lock(session, &table, wkey) {
                    return Ok(ExecOutcome::Blocked);
                }
                self.session_mut(session)
                    .overlay
                    .insert((table.into(), wkey), Some(values));
                Ok(ExecOutcome::AffectedRows(1))
            }
            Some(mini_sql::Stmt::Update {
                table,
                assignments,
                predicate,
            }) => {
                let cols = self.tables.get(&table).map(|t| t.columns.clone()).unwrap_or_default();
                let rows = self.all_visible_rows(session, &table);
                let targets: Vec<Row> = rows
                    .into_iter()
                    .filter(|row| predicate_matches(&predicate, row, &cols))
                    .collect();
                let mut affected = 0u64;
                for mut row in targets {
                    let Some(wkey) = row.first().and_then(|v| v.as_int()) else {
                        continue;
                    };
                    if !self.try_lock(session, &table, wkey) {
                        return Ok(ExecOutcome::Blocked);
                    }
                    for (col, value) in &assignments {
                        if let Some(idx) = cols.iter().position(|c| c == col) {
                            row[idx] = value.clone();
                        }
                    }
                    self.session_mut(session)
                        .overlay
                        .insert((table.clone().into(), wkey), Some(row));
                    affected += 1;
                }
                Ok(ExecOutcome::AffectedRows(affected))
            }
            Some(mini_sql::Stmt::Delete { table, predicate }) => {
                let cols = self.tables.get(&table).map(|t| t.columns.clone()).unwrap_or_default();
                let rows = self.all_visible_rows(session, &table);
                let targets: Vec<Row> = rows
                    .into_iter()
                    .filter(|row| predicate_matches(&predicate, row, &cols))
                    .collect();
                let mut affected = 0u64;
                for row in targets {
                    let Some(wkey) = row.first().and_then(|v| v.as_int()) else {
                        continue;
                    };
                    if !self.try_lock(session, &table, wkey) {
                        return Ok(ExecOutcome::Blocked);
                    }
                    self.session_mut(session)
                        .overlay
                        .insert((table.clone().into(), wkey), None);
                    affected += 1;
                }
                Ok(ExecOutcome::AffectedRows(affected))
            }
            None => Ok(ExecOutcome::Syntax(format!("unrecognized statement: {trimmed}"))),
        }
    }

    fn is_blocked(&mut self, session: SessionId) -> Result<bool, DutError> {
        // MemoryDut never leaves a session parked mid-statement: `execute`
        // already returns `Blocked` synchronously, so by the time the
        // scheduler asks, the answer is always "no longer waiting".
        let _ = session;
        Ok(false)
    }

    fn reset(&mut self) -> Result<(), DutError> {
        for table in self.tables.values_mut() {
            table.rows.clear();
        }
        self.sessions.clear();
        self.locks.clear();
        Ok(())
    }

    fn backup(&mut self) -> Result<SmolStr, DutError> {
        let handle = SmolStr::from(format!("mem-backup-{}", self.backup_counter));
        self.backup_counter += 1;
        self.backups
            .insert(handle.clone(), (self.tables.clone(), self.backup_counter));
        Ok(handle)
    }

    fn restore_from_backup(&mut self, handle: &str) -> Result<(), DutError> {
        let (tables, _) = self
            .backups
            .get(handle)
            .ok_or_else(|| DutError::NoSuchBackup(handle.to_string()))?;
        self.tables = tables.clone();
        self.sessions.clear();
        self.locks.clear();
        Ok(())
    }

    fn get_content(&mut self, tables: &[SmolStr]) -> Result<AHashMap<SmolStr, Vec<Row>>, DutError> {
        let mut out = AHashMap::default();
        for name in tables {
            if let Some(table) = self.tables.get(name.as_str()) {
                let mut rows: Vec<(i64, Row)> = table.rows.clone().into_iter().collect();
                rows.sort_by_key(|(wkey, _)| *wkey);
                out.insert(name.clone(), rows.into_iter().map(|(_, r)| r).collect());
            }
        }
        Ok(out)
    }

    fn begin_stmt_text(&self) -> &str {
        "BEGIN"
    }

    fn commit_stmt_text(&self) -> &str {
        "COMMIT"
    }

    fn abort_stmt_text(&self) -> &str {
        "ROLLBACK"
    }
}

fn predicate_matches(predicate: &[mini_sql::Cond], row: &[SqlValue], cols: &[SmolStr]) -> bool {
    predicate.iter().all(|cond| {
        let Some(idx) = cols.iter().position(|c| c == &cond.column) else {
            return false;
        };
        let Some(actual) = row.get(idx) else {
            return false;
        };
        match (actual, &cond.value) {
            (SqlValue::Int(a), SqlValue::Int(b)) => mini_sql::cmp(cond.op, a.cmp(b)),
            (SqlValue::Real(a), SqlValue::Real(b)) => {
                mini_sql::cmp(cond.op, a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            }
            (SqlValue::Text(a), SqlValue::Text(b)) => mini_sql::cmp(cond.op, a.cmp(b)),
            (SqlValue::Bool(a), SqlValue::Bool(b)) => mini_sql::cmp(cond.op, a.cmp(b)),
            _ => false,
        }
    })
}

/// A deliberately minimal textual recognizer for the statement shapes this
/// crate's tests and the instrumentor actually produce. Not a SQL parser.
mod mini_sql {
    use crate::value::SqlValue;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Op {
        Eq,
        Ne,
        Lt,
        Le,
        Gt,
        Ge,
    }

    pub fn cmp(op: Op, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match (op, ord) {
            (Op::Eq, Equal) => true,
            (Op::Ne, Less | Greater) => true,
            (Op::Lt, Less) => true,
            (Op::Le, Less | Equal) => true,
            (Op::Gt, Greater) => true,
            (Op::Ge, Greater | Equal) => true,
            _ => false,
        }
    }

    #[derive(Debug, Clone)]
    pub struct Cond {
        pub column: String,
        pub op: Op,
        pub value: SqlValue,
    }

    pub enum Stmt {
        Select { table: String, predicate: Vec<Cond> },
        Insert { table: String, values: Vec<SqlValue> },
        Update {
            table: String,
            assignments: Vec<(String, SqlValue)>,
            predicate: Vec<Cond>,
        },
        Delete { table: String, predicate: Vec<Cond> },
    }

    pub fn parse(stmt: &str) -> Option<Stmt> {
        let upper = stmt.to_ascii_uppercase();
        if let Some(rest) = strip_prefix_ci(stmt, "SELECT * FROM ") {
            let (table, predicate) = split_where(rest);
            return Some(Stmt::Select {
                table: table.trim().to_string(),
                predicate,
            });
        }
        if upper.starts_with("INSERT INTO ") {
            let rest = &stmt[12..];
            let (table, rest) = rest.split_once('(')?;
            let rest = rest.trim_start();
            let rest = strip_prefix_ci(rest, "VALUES")?.trim_start();
            let values_str = rest.trim_start_matches('(').trim_end_matches(')').trim_end_matches(')');
            let values = split_commas(values_str)
                .into_iter()
                .map(|v| parse_literal(v.trim()))
                .collect();
            return Some(Stmt::Insert {
                table: table.trim().to_string(),
                values,
            });
        }
        if upper.starts_with("UPDATE ") {
            let rest = &stmt[7..];
            let (table, rest) = rest.split_once(" SET ")?;
            let (assign_str, pred_str) = split_where_str(rest);
            let assignments = split_commas(assign_str)
                .into_iter()
                .filter_map(|a| {
                    let (col, val) = a.split_once('=')?;
                    Some((col.trim().to_string(), parse_literal(val.trim())))
                })
                .collect();
            let predicate = pred_str.map(parse_conditions).unwrap_or_default();
            return Some(Stmt::Update {
                table: table.trim().to_string(),
                assignments,
                predicate,
            });
        }
        if upper.starts_with("DELETE FROM ") {
            let rest = &stmt[12..];
            let (table, predicate) = split_where(rest);
            return Some(Stmt::Delete {
                table: table.trim().to_string(),
                predicate,
            });
        }
        None
    }

    fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
        if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
            Some(&s[prefix.len()..])
        } else {
            None
        }
    }

    fn split_where(s: &str) -> (String, Vec<Cond>) {
        let (table, pred) = split_where_str(s);
        (table.to_string(), pred.map(parse_conditions).unwrap_or_default())
    }

    fn split_where_str(s: &str) -> (&str, Option<&str>) {
        let upper = s.to_ascii_uppercase();
        if let Some(pos) = upper.find(" WHERE ") {
            (&s[..pos], Some(&s[pos + 7..]))
        } else {
            (s, None)
        }
    }

    fn parse_conditions(s: &str) -> Vec<Cond> {
        s.split(" AND ")
            .chain(s.split(" and "))
            .filter(|c| !c.trim().is_empty())
            .filter_map(parse_condition)
            .collect()
    }

    fn parse_condition(s: &str) -> Option<Cond> {
        let s = s.trim();
        for (token, op) in [
            ("!=", Op::Ne),
            ("<>", Op::Ne),
            ("<=", Op::Le),
            (">=", Op::Ge),
            ("=", Op::Eq),
            ("<", Op::Lt),
            (">", Op::Gt),
        ] {
            if let Some((col, val)) = s.split_once(token) {
                return Some(Cond {
                    column: col.trim().to_string(),
                    op,
                    value: parse_literal(val.trim()),
                });
            }
        }
        None
    }

    fn parse_literal(s: &str) -> SqlValue {
        let s = s.trim();
        if s.eq_ignore_ascii_case("null") {
            SqlValue::Null
        } else if s.eq_ignore_ascii_case("true") {
            SqlValue::Bool(true)
        } else if s.eq_ignore_ascii_case("false") {
            SqlValue::Bool(false)
        } else if (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
            || (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        {
            SqlValue::Text(s[1..s.len() - 1].into())
        } else if let Ok(i) = s.parse::<i64>() {
            SqlValue::Int(i)
        } else if let Ok(f) = s.parse::<f64>() {
            SqlValue::Real(f)
        } else {
            SqlValue::Text(s.into())
        }
    }

    fn split_commas(s: &str) -> Vec<&str> {
        s.split(',').collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> MemoryDut {
        let mut dut = MemoryDut::new();
        dut.create_table("t", &["wkey", "write_op_id", "v"]);
        dut
    }

    #[test]
    fn insert_then_select_in_same_session() {
        let mut dut = setup();
        let s = SessionId(0);
        dut.execute(s, "BEGIN").unwrap();
        dut.execute(s, "INSERT INTO t (wkey, write_op_id, v) VALUES (1, 0, 10)")
            .unwrap();
        let outcome = dut.execute(s, "SELECT * FROM t WHERE wkey = 1").unwrap();
        match outcome {
            ExecOutcome::Rows(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0][2], SqlValue::Int(10));
            }
            other => panic!("expected rows, got {other:?}"),
        }
    }

    #[test]
    fn writes_invisible_to_other_session_until_commit() {
        let mut dut = setup();
        let (s0, s1) = (SessionId(0), SessionId(1));
        dut.execute(s0, "BEGIN").unwrap();
        dut.execute(s0, "INSERT INTO t (wkey, write_op_id, v) VALUES (1, 0, 10)")
            .unwrap();
        dut.execute(s1, "BEGIN").unwrap();
        let outcome = dut.execute(s1, "SELECT * FROM t WHERE wkey = 1").unwrap();
        assert!(matches!(outcome, ExecOutcome::Rows(rows) if rows.is_empty()));

        dut.execute(s0, "COMMIT").unwrap();
        let outcome = dut.execute(s1, "SELECT * FROM t WHERE wkey = 1").unwrap();
        assert!(matches!(outcome, ExecOutcome::Rows(rows) if rows.len() == 1));
    }

    #[test]
    fn conflicting_writers_block() {
        let mut dut = setup();
        let (s0, s1) = (SessionId(0), SessionId(1));
        dut.execute(s0, "BEGIN").unwrap();
        dut.execute(s0, "INSERT INTO t (wkey, write_op_id, v) VALUES (1, 0, 10)")
            .unwrap();
        dut.execute(s0, "COMMIT").unwrap();

        dut.execute(s0, "BEGIN").unwrap();
        dut.execute(s0, "UPDATE t SET v = 20 WHERE wkey = 1").unwrap();

        dut.execute(s1, "BEGIN").unwrap();
        let blocked = dut.execute(s1, "UPDATE t SET v = 30 WHERE wkey = 1").unwrap();
        assert!(matches!(blocked, ExecOutcome::Blocked));

        dut.execute(s0, "COMMIT").unwrap();
        let now = dut.execute(s1, "UPDATE t SET v = 30 WHERE wkey = 1").unwrap();
        assert!(matches!(now, ExecOutcome::AffectedRows(1)));
    }

    #[test]
    fn rollback_discards_overlay_and_locks() {
        let mut dut = setup();
        let s = SessionId(0);
        dut.execute(s, "BEGIN").unwrap();
        dut.execute(s, "INSERT INTO t (wkey, write_op_id, v) VALUES (1, 0, 10)")
            .unwrap();
        dut.execute(s, "ROLLBACK").unwrap();
        let content = dut.get_content(&[SmolStr::from("t")]).unwrap();
        assert!(content.get("t").is_none_or(|rows| rows.is_empty()));
    }

    #[test]
    fn backup_and_restore_round_trip() {
        let mut dut = setup();
        let s = SessionId(0);
        dut.execute(s, "BEGIN").unwrap();
        dut.execute(s, "INSERT INTO t (wkey, write_op_id, v) VALUES (1, 0, 10)")
            .unwrap();
        dut.execute(s, "COMMIT").unwrap();
        let handle = dut.backup().unwrap();

        dut.execute(s, "BEGIN").unwrap();
        dut.execute(s, "DELETE FROM t WHERE wkey = 1").unwrap();
        dut.execute(s, "COMMIT").unwrap();
        assert!(dut
            .get_content(&[SmolStr::from("t")])
            .unwrap()
            .get("t")
            .is_none_or(|r| r.is_empty()));

        dut.restore_from_backup(&handle).unwrap();
        let content = dut.get_content(&[SmolStr::from("t")]).unwrap();
        assert_eq!(content.get("t").unwrap().len(), 1);
    }
}
