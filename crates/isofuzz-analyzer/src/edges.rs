use ahash::AHashMap;
use bitflags::bitflags;
use isofuzz_instrument::{Role, TxnId};
use petgraph::graphmap::DiGraphMap;

use crate::history::{History, StatementObservation};

bitflags! {
    /// Labels carried on one directed edge. An edge between the same two
    /// nodes can accumulate more than one label as different rules fire.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EdgeLabels: u16 {
        const WRITE_READ   = 1 << 0;
        const WRITE_WRITE  = 1 << 1;
        const READ_WRITE   = 1 << 2;
        const VERSION_SET  = 1 << 3;
        const OVERWRITE    = 1 << 4;
        const START        = 1 << 5;
        const STRICT_START = 1 << 6;
        const INNER        = 1 << 7;
        const INSTRUMENT   = 1 << 8;
    }
}

pub type TxnGraph = DiGraphMap<TxnId, EdgeLabels>;
pub type StmtGraph = DiGraphMap<usize, EdgeLabels>;

fn add_txn_edge(g: &mut TxnGraph, from: TxnId, to: TxnId, label: EdgeLabels) {
    let existing = g.edge_weight(from, to).copied().unwrap_or_default();
    g.add_edge(from, to, existing | label);
}

fn add_stmt_edge(g: &mut StmtGraph, from: usize, to: usize, label: EdgeLabels) {
    let existing = g.edge_weight(from, to).copied().unwrap_or_default();
    g.add_edge(from, to, existing | label);
}

/// Builds both the transaction-level and statement-level dependency graphs
/// from a completed history, per the edge derivation rules in the module
/// docs.
pub fn derive_graphs(history: &History) -> (TxnGraph, StmtGraph) {
    let mut txn_graph = TxnGraph::new();
    let mut stmt_graph = StmtGraph::new();

    for ops in history.by_row.values() {
        for (pos, unit) in ops.iter().enumerate() {
            if unit.role != Role::AfterWriteRead {
                // WR: this read observed an earlier write's content.
                if let Some(writer) = ops[..pos]
                    .iter()
                    .rev()
                    .find(|w| w.role == Role::AfterWriteRead && w.row_hash == unit.row_hash && w.txn != unit.txn)
                {
                    add_txn_edge(&mut txn_graph, writer.txn, unit.txn, EdgeLabels::WRITE_READ);
                    if let (Some(wp), Some(rp)) = (writer.exec_pos, unit.exec_pos) {
                        add_stmt_edge(&mut stmt_graph, wp, rp, EdgeLabels::WRITE_READ);
                    }
                }
            }

            if unit.role == Role::BeforeWriteRead {
                // RW: someone else read a version this writer is about to
                // clobber.
                for other in &ops[..pos] {
                    if other.txn == unit.txn || other.write_op_id != unit.write_op_id {
                        continue;
                    }
                    if matches!(other.role, Role::SelectRead | Role::AfterWriteRead) {
                        add_txn_edge(&mut txn_graph, other.txn, unit.txn, EdgeLabels::READ_WRITE);
                        if let (Some(op), Some(bp)) = (other.exec_pos, unit.exec_pos) {
                            add_stmt_edge(&mut stmt_graph, op, bp, EdgeLabels::READ_WRITE);
                        }
                    }
                }

                // WW: the nearest earlier committed write this snapshot
                // reflects.
                if let Some(writer) = ops[..pos]
                    .iter()
                    .rev()
                    .find(|w| w.role == Role::AfterWriteRead && w.row_hash == unit.row_hash)
                {
                    if writer.txn != unit.txn {
                        add_txn_edge(&mut txn_graph, writer.txn, unit.txn, EdgeLabels::WRITE_WRITE);
                        if let (Some(wp), Some(bp)) = (writer.exec_pos, unit.exec_pos) {
                            add_stmt_edge(&mut stmt_graph, wp, bp, EdgeLabels::WRITE_WRITE);
                        }
                    }
                }
            }
        }
    }

    derive_start_edges(history, &mut txn_graph);
    derive_version_set_edges(history, &mut txn_graph);
    derive_inner_and_instrument_edges(history, &mut stmt_graph);

    (txn_graph, stmt_graph)
}

fn derive_start_edges(history: &History, txn_graph: &mut TxnGraph) {
    let mut first_pos: AHashMap<TxnId, usize> = AHashMap::default();
    let mut first_nontrivial: AHashMap<TxnId, usize> = AHashMap::default();
    let mut last_pos: AHashMap<TxnId, usize> = AHashMap::default();

    for stmt in &history.by_stmt {
        first_pos.entry(stmt.txn).or_insert(stmt.exec_pos);
        last_pos.entry(stmt.txn).and_modify(|p| *p = (*p).max(stmt.exec_pos)).or_insert(stmt.exec_pos);
        if stmt.role != Role::Init {
            first_nontrivial.entry(stmt.txn).or_insert(stmt.exec_pos);
        }
    }
    for (&txn, &fp) in &first_pos {
        first_nontrivial.entry(txn).or_insert(fp);
    }

    let txns: Vec<TxnId> = first_pos.keys().copied().collect();
    for &i in &txns {
        for &j in &txns {
            if i == j {
                continue;
            }
            let Some(&last_i) = last_pos.get(&i) else { continue };
            let Some(&first_j) = first_pos.get(&j) else { continue };
            let Some(&first_nontrivial_j) = first_nontrivial.get(&j) else { continue };
            if last_i < first_nontrivial_j {
                add_txn_edge(txn_graph, i, j, EdgeLabels::START);
            }
            if last_i < first_j {
                add_txn_edge(txn_graph, i, j, EdgeLabels::STRICT_START);
            }
        }
    }
}

/// Version-set / overwrite dependency: a `VersionSetRead`'s observed
/// `(row_id, version)` set intersected against another transaction's write
/// instrumentation read on the same table, directed by which happened
/// first in actual execution order. Edges are skipped against a
/// `StrictStart`-ordered pair, per the spec.
fn derive_version_set_edges(history: &History, txn_graph: &mut TxnGraph) {
    let reads: Vec<&StatementObservation> =
        history.by_stmt.iter().filter(|s| s.role == Role::VersionSetRead).collect();
    let writes: Vec<&StatementObservation> = history
        .by_stmt
        .iter()
        .filter(|s| matches!(s.role, Role::AfterWriteRead | Role::BeforeWriteRead))
        .collect();

    for v in &reads {
        for w in &writes {
            if v.txn == w.txn || v.target_table != w.target_table {
                continue;
            }
            let intersects = v.rows.iter().any(|(rid, _, _)| w.rows.iter().any(|(wrid, _, _)| wrid == rid));
            if !intersects {
                continue;
            }
            if w.exec_pos < v.exec_pos {
                let already_strict = txn_graph
                    .edge_weight(w.txn, v.txn)
                    .is_some_and(|l| l.contains(EdgeLabels::STRICT_START));
                if !already_strict {
                    add_txn_edge(txn_graph, w.txn, v.txn, EdgeLabels::VERSION_SET);
                }
            } else {
                add_txn_edge(txn_graph, v.txn, w.txn, EdgeLabels::OVERWRITE);
            }
        }
    }
}

fn derive_inner_and_instrument_edges(history: &History, stmt_graph: &mut StmtGraph) {
    let mut by_txn: AHashMap<TxnId, Vec<usize>> = AHashMap::default();
    for stmt in &history.by_stmt {
        by_txn.entry(stmt.txn).or_default().push(stmt.exec_pos);
    }
    for positions in by_txn.values() {
        for (idx, &earlier) in positions.iter().enumerate() {
            for &later in &positions[idx + 1..] {
                add_stmt_edge(stmt_graph, earlier, later, EdgeLabels::INNER);
            }
        }
        for window in positions.windows(2) {
            let (a, b) = (window[0], window[1]);
            let a_role = history.by_stmt.iter().find(|s| s.exec_pos == a).map(|s| s.role);
            let b_role = history.by_stmt.iter().find(|s| s.exec_pos == b).map(|s| s.role);
            if matches!(a_role, Some(r) if r.is_instrumentation()) || matches!(b_role, Some(r) if r.is_instrumentation())
            {
                add_stmt_edge(stmt_graph, a, b, EdgeLabels::INSTRUMENT);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt(exec_pos: usize, txn: u32, role: Role, rows: &[(i64, i64)]) -> StatementObservation {
        StatementObservation {
            exec_pos,
            txn: TxnId(txn),
            role,
            target_table: Some("t".into()),
            rows: rows.iter().map(|&(rid, wop)| (rid, wop, 0)).collect(),
        }
    }

    /// A `VersionSetRead`'s observed row-id set, intersected against a write
    /// instrumentation read on the same row, must actually find the overlap
    /// rather than coming back vacuously empty (the original computed
    /// `set_intersection` between an iterator and itself, which always
    /// yields nothing).
    #[test]
    fn version_set_intersection_is_not_trivially_empty() {
        let history = History {
            by_row: AHashMap::default(),
            by_stmt: vec![
                stmt(0, 0, Role::AfterWriteRead, &[(1, 0)]),
                stmt(1, 1, Role::VersionSetRead, &[(1, 0)]),
            ],
        };
        let mut txn_graph = TxnGraph::new();
        derive_version_set_edges(&history, &mut txn_graph);

        let label = txn_graph.edge_weight(TxnId(0), TxnId(1)).copied().unwrap();
        assert!(label.contains(EdgeLabels::VERSION_SET));
    }

    /// Same overlap, but the `VersionSetRead` executes before the write it
    /// intersects: the edge is directed the other way, as `OVERWRITE`.
    #[test]
    fn version_set_read_before_the_write_becomes_overwrite() {
        let history = History {
            by_row: AHashMap::default(),
            by_stmt: vec![
                stmt(0, 1, Role::VersionSetRead, &[(1, 0)]),
                stmt(1, 0, Role::AfterWriteRead, &[(1, 0)]),
            ],
        };
        let mut txn_graph = TxnGraph::new();
        derive_version_set_edges(&history, &mut txn_graph);

        let label = txn_graph.edge_weight(TxnId(1), TxnId(0)).copied().unwrap();
        assert!(label.contains(EdgeLabels::OVERWRITE));
    }

    /// No row-id overlap at all means no edge, proving the first two tests
    /// are exercising a real intersection and not just "any two writes in
    /// different transactions get connected".
    #[test]
    fn disjoint_row_ids_produce_no_version_set_edge() {
        let history = History {
            by_row: AHashMap::default(),
            by_stmt: vec![
                stmt(0, 0, Role::AfterWriteRead, &[(1, 0)]),
                stmt(1, 1, Role::VersionSetRead, &[(2, 0)]),
            ],
        };
        let mut txn_graph = TxnGraph::new();
        derive_version_set_edges(&history, &mut txn_graph);

        assert!(txn_graph.edge_weight(TxnId(0), TxnId(1)).is_none());
    }
}
