use ahash::AHashMap;
use isofuzz_dut::{Row, SqlValue};
use isofuzz_instrument::{InstrumentedStmt, Role, TxnId};
use isofuzz_scheduler::{ExecOutcome, ExecutedStmt};
use smol_str::SmolStr;

use crate::hash::row_hash;

/// Every base table's primary key is its first column and its version
/// counter is its second, a convention fixed by `isofuzz-catalog`'s DDL
/// generation and `isofuzz-dut::MemoryDut`'s row layout.
pub const DEFAULT_WKEY_INDEX: usize = 0;
pub const DEFAULT_VERSION_INDEX: usize = 1;

/// A single row observation: one row returned by one statement.
#[derive(Debug, Clone)]
pub struct OperateUnit {
    pub role: Role,
    pub write_op_id: i64,
    pub txn: TxnId,
    /// Position of the statement in `executed`'s actual order; `None` for
    /// the synthetic initial-content writer, which never executed.
    pub exec_pos: Option<usize>,
    pub row_id: i64,
    pub row_hash: u64,
}

/// One statement's full set of observed rows, keyed by its position in
/// `executed` — used by the version-set / overwrite edge rules, which need
/// "this read's whole row-id set" rather than one row at a time.
#[derive(Debug, Clone)]
pub struct StatementObservation {
    pub exec_pos: usize,
    pub txn: TxnId,
    pub role: Role,
    pub target_table: Option<SmolStr>,
    pub rows: Vec<(i64, i64, u64)>,
}

/// Per-`row_id` insertion-ordered history, plus the per-statement view the
/// version-set rules need.
#[derive(Debug, Default)]
pub struct History {
    pub by_row: AHashMap<i64, Vec<OperateUnit>>,
    pub by_stmt: Vec<StatementObservation>,
}

/// The synthetic transaction id standing in for the database's setup
/// content, per the spec's `T∞` (index `trans_count`).
pub fn synthetic_txn(trans_count: u32) -> TxnId {
    TxnId(trans_count)
}

pub fn build_history(
    initial_content: &AHashMap<SmolStr, Vec<Row>>,
    queue: &[InstrumentedStmt],
    executed: &[ExecutedStmt],
    wkey_index: usize,
    version_index: usize,
    trans_count: u32,
) -> History {
    let mut history = History::default();
    let synthetic = synthetic_txn(trans_count);

    for rows in initial_content.values() {
        for row in rows {
            let (Some(row_id), Some(write_op_id)) =
                (extract_int(row, wkey_index), extract_int(row, version_index))
            else {
                continue;
            };
            history.by_row.entry(row_id).or_default().push(OperateUnit {
                role: Role::AfterWriteRead,
                write_op_id,
                txn: synthetic,
                exec_pos: None,
                row_id,
                row_hash: row_hash(row),
            });
        }
    }

    for (pos, exec) in executed.iter().enumerate() {
        let ExecOutcome::Rows(rows) = &exec.outcome else {
            continue;
        };
        let stmt = &queue[exec.queue_index];
        let mut observed = Vec::with_capacity(rows.len());
        for row in rows {
            let (Some(row_id), Some(write_op_id)) =
                (extract_int(row, wkey_index), extract_int(row, version_index))
            else {
                continue;
            };
            let hash = row_hash(row);
            history.by_row.entry(row_id).or_default().push(OperateUnit {
                role: stmt.role,
                write_op_id,
                txn: exec.txn,
                exec_pos: Some(pos),
                row_id,
                row_hash: hash,
            });
            observed.push((row_id, write_op_id, hash));
        }
        history.by_stmt.push(StatementObservation {
            exec_pos: pos,
            txn: exec.txn,
            role: stmt.role,
            target_table: stmt.target_table.clone(),
            rows: observed,
        });
    }

    history
}

fn extract_int(row: &[SqlValue], index: usize) -> Option<i64> {
    row.get(index).and_then(SqlValue::as_int)
}

#[cfg(test)]
mod tests {
    use super::*;
    use isofuzz_instrument::Role;

    #[test]
    fn initial_content_rows_become_synthetic_after_write_reads() {
        let mut initial = AHashMap::default();
        initial.insert(
            SmolStr::from("t"),
            vec![vec![SqlValue::Int(1), SqlValue::Int(0), SqlValue::Int(10)]],
        );
        let history = build_history(&initial, &[], &[], 0, 1, 2);
        let ops = &history.by_row[&1];
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].role, Role::AfterWriteRead);
        assert_eq!(ops[0].txn, TxnId(2));
        assert!(ops[0].exec_pos.is_none());
    }
}
