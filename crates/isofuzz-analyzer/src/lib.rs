//! Builds a per-row observation history from a scheduler run, derives the
//! transaction- and statement-level dependency graphs from it, and checks
//! the six Adya-style isolation-anomaly predicates over the result.
//!
//! The analyzer never talks to a DUT itself: it only consumes what the
//! scheduler and instrumentor already recorded, plus the database's
//! initial content.

mod edges;
mod error;
mod hash;
mod history;
mod minimize;
mod predicates;

pub use edges::{EdgeLabels, StmtGraph, TxnGraph};
pub use error::AnalyzerError;
pub use hash::row_hash;
pub use history::{
    build_history, synthetic_txn, History, OperateUnit, StatementObservation, DEFAULT_VERSION_INDEX,
    DEFAULT_WKEY_INDEX,
};
pub use minimize::{edge_weight, longest_path, topo_order, topo_order_breaking_cycles};
pub use predicates::{
    check_g1a, check_g1b, check_g1c, check_g2_item, check_gsia, check_gsib, evaluate, Verdict,
};

use ahash::AHashMap;
use isofuzz_dut::Row;
use isofuzz_instrument::{InstrumentedStmt, TxnId};
use isofuzz_scheduler::{ExecutedStmt, TransactionOutcome};
use smol_str::SmolStr;

/// Everything the analyzer needs to reconstruct a history and check the
/// anomaly predicates for one completed run.
pub struct AnalysisInput<'a> {
    pub initial_content: &'a AHashMap<SmolStr, Vec<Row>>,
    pub queue: &'a [InstrumentedStmt],
    pub executed: &'a [ExecutedStmt],
    pub txn_status: &'a AHashMap<TxnId, TransactionOutcome>,
    pub wkey_index: usize,
    pub version_index: usize,
}

impl<'a> AnalysisInput<'a> {
    /// The `wkey`/version column indices default to the generator's fixed
    /// layout (0 and 1), so most callers only need to supply the run data.
    pub fn new(
        initial_content: &'a AHashMap<SmolStr, Vec<Row>>,
        queue: &'a [InstrumentedStmt],
        executed: &'a [ExecutedStmt],
        txn_status: &'a AHashMap<TxnId, TransactionOutcome>,
    ) -> Self {
        AnalysisInput {
            initial_content,
            queue,
            executed,
            txn_status,
            wkey_index: DEFAULT_WKEY_INDEX,
            version_index: DEFAULT_VERSION_INDEX,
        }
    }
}

/// The analyzer's full output: the verdict plus the graphs it was computed
/// from, kept around for the reproducer's minimizer.
#[derive(Debug)]
pub struct Analysis {
    pub verdict: Verdict,
    pub txn_graph: TxnGraph,
    pub stmt_graph: StmtGraph,
}

/// Runs the whole analyzer pipeline: history build, edge derivation,
/// predicate evaluation.
pub fn analyze(input: AnalysisInput<'_>) -> Result<Analysis, AnalyzerError> {
    let trans_count = input
        .queue
        .iter()
        .map(|s| s.txn.0)
        .max()
        .map(|max| max + 1)
        .unwrap_or(0);

    let history = build_history(
        input.initial_content,
        input.queue,
        input.executed,
        input.wkey_index,
        input.version_index,
        trans_count,
    );
    let (txn_graph, stmt_graph) = edges::derive_graphs(&history);
    let verdict = evaluate(&history, &txn_graph, input.txn_status);

    Ok(Analysis { verdict, txn_graph, stmt_graph })
}

#[cfg(test)]
mod tests {
    use super::*;
    use isofuzz_dut::SqlValue;
    use isofuzz_instrument::Role;
    use isofuzz_scheduler::ExecOutcome;

    fn queue_stmt(text: &str, txn: u32, role: Role, table: Option<&str>) -> InstrumentedStmt {
        InstrumentedStmt {
            text: text.to_string(),
            txn: TxnId(txn),
            role,
            target_table: table.map(SmolStr::from),
        }
    }

    fn row(wkey: i64, version: i64, v: i64) -> Row {
        vec![SqlValue::Int(wkey), SqlValue::Int(version), SqlValue::Int(v)]
    }

    /// S1 from the scenario catalog: T0 (aborted) inserts wkey=1/v=10; T1
    /// (committed) selects wkey=1 and observes it before T0 rolls back.
    #[test]
    fn s1_g1a_fires_and_nothing_else_does() {
        let queue = vec![
            queue_stmt("INSERT INTO t ...", 0, Role::InsertWrite, Some("t")),
            queue_stmt("SELECT * FROM t WHERE wkey = 1", 0, Role::AfterWriteRead, Some("t")),
            queue_stmt("SELECT * FROM t WHERE wkey = 1", 1, Role::SelectRead, None),
            queue_stmt("ROLLBACK", 0, Role::Init, None),
        ];
        let executed = vec![
            ExecutedStmt { queue_index: 0, txn: TxnId(0), outcome: ExecOutcome::AffectedRows(1) },
            ExecutedStmt { queue_index: 1, txn: TxnId(0), outcome: ExecOutcome::Rows(vec![row(1, 0, 10)]) },
            ExecutedStmt { queue_index: 2, txn: TxnId(1), outcome: ExecOutcome::Rows(vec![row(1, 0, 10)]) },
            ExecutedStmt { queue_index: 3, txn: TxnId(0), outcome: ExecOutcome::Skipped },
        ];
        let mut status = AHashMap::default();
        status.insert(TxnId(0), TransactionOutcome::Aborted);
        status.insert(TxnId(1), TransactionOutcome::Committed);

        let initial = AHashMap::default();
        let analysis = analyze(AnalysisInput::new(&initial, &queue, &executed, &status)).unwrap();
        assert!(analysis.verdict.g1a);
        assert!(!analysis.verdict.g1c);
        assert!(!analysis.verdict.gsib);
    }

    /// S2: T0's write to row A is observed by T1, and T1's write to row B
    /// is observed by T0, crossing a write-read cycle between them.
    #[test]
    fn s2_g1c_fires_on_crossed_writes() {
        let queue = vec![
            queue_stmt("SELECT * FROM t WHERE wkey = 10", 0, Role::AfterWriteRead, Some("t")),
            queue_stmt("SELECT * FROM t WHERE wkey = 20", 1, Role::AfterWriteRead, Some("t")),
            queue_stmt("SELECT * FROM t WHERE wkey = 10", 1, Role::SelectRead, None),
            queue_stmt("SELECT * FROM t WHERE wkey = 20", 0, Role::SelectRead, None),
        ];
        let executed = vec![
            ExecutedStmt { queue_index: 0, txn: TxnId(0), outcome: ExecOutcome::Rows(vec![row(10, 1, 100)]) },
            ExecutedStmt { queue_index: 1, txn: TxnId(1), outcome: ExecOutcome::Rows(vec![row(20, 1, 200)]) },
            ExecutedStmt { queue_index: 2, txn: TxnId(1), outcome: ExecOutcome::Rows(vec![row(10, 1, 100)]) },
            ExecutedStmt { queue_index: 3, txn: TxnId(0), outcome: ExecOutcome::Rows(vec![row(20, 1, 200)]) },
        ];
        let mut status = AHashMap::default();
        status.insert(TxnId(0), TransactionOutcome::Committed);
        status.insert(TxnId(1), TransactionOutcome::Committed);

        let initial = AHashMap::default();
        let analysis = analyze(AnalysisInput::new(&initial, &queue, &executed, &status)).unwrap();
        assert!(analysis.verdict.g1c);
    }
}
