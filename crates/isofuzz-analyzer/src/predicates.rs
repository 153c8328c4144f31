use ahash::AHashMap;
use isofuzz_instrument::{Role, TxnId};
use isofuzz_scheduler::TransactionOutcome;
use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;

use crate::edges::{EdgeLabels, TxnGraph};
use crate::history::History;

/// The six Adya-style isolation-anomaly predicates, evaluated once per
/// completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Verdict {
    pub g1a: bool,
    pub g1b: bool,
    pub g1c: bool,
    pub g2_item: bool,
    pub gsia: bool,
    pub gsib: bool,
}

impl Verdict {
    pub fn any(&self) -> bool {
        self.g1a || self.g1b || self.g1c || self.g2_item || self.gsia || self.gsib
    }
}

pub fn evaluate(
    history: &History,
    txn_graph: &TxnGraph,
    txn_status: &AHashMap<TxnId, TransactionOutcome>,
) -> Verdict {
    Verdict {
        g1a: check_g1a(txn_graph, txn_status),
        g1b: check_g1b(history, txn_status),
        g1c: check_g1c(txn_graph),
        g2_item: check_g2_item(txn_graph),
        gsia: check_gsia(txn_graph),
        gsib: check_gsib(txn_graph),
    }
}

/// An aborted writer's effect was observed by a committed reader.
pub fn check_g1a(txn_graph: &TxnGraph, txn_status: &AHashMap<TxnId, TransactionOutcome>) -> bool {
    for (from, to, label) in txn_graph.all_edges() {
        if !label.contains(EdgeLabels::WRITE_READ) {
            continue;
        }
        let writer_aborted = txn_status.get(&from) == Some(&TransactionOutcome::Aborted);
        let reader_committed = txn_status.get(&to) == Some(&TransactionOutcome::Committed);
        if writer_aborted && reader_committed {
            return true;
        }
    }
    false
}

/// Some transaction observed a row's content strictly between two of the
/// writing transaction's own writes to it (a stale intermediate read).
pub fn check_g1b(history: &History, txn_status: &AHashMap<TxnId, TransactionOutcome>) -> bool {
    for ops in history.by_row.values() {
        for (pos, writer) in ops.iter().enumerate() {
            if writer.role != Role::AfterWriteRead {
                continue;
            }
            if txn_status.get(&writer.txn) != Some(&TransactionOutcome::Committed) {
                continue;
            }
            let Some(next_rewrite) = ops[pos + 1..]
                .iter()
                .position(|o| o.role == Role::AfterWriteRead && o.txn == writer.txn)
                .map(|rel| pos + 1 + rel)
            else {
                continue;
            };
            let stale_read = ops[pos + 1..next_rewrite]
                .iter()
                .any(|r| r.txn != writer.txn && r.row_hash == writer.row_hash);
            if stale_read {
                return true;
            }
        }
    }
    false
}

/// Any cycle restricted to `{WriteWrite, WriteRead}`.
pub fn check_g1c(txn_graph: &TxnGraph) -> bool {
    has_cycle_under(txn_graph, EdgeLabels::WRITE_WRITE | EdgeLabels::WRITE_READ)
}

/// Any cycle restricted to `{WriteWrite, WriteRead, ReadWrite}`.
pub fn check_g2_item(txn_graph: &TxnGraph) -> bool {
    has_cycle_under(txn_graph, EdgeLabels::WRITE_WRITE | EdgeLabels::WRITE_READ | EdgeLabels::READ_WRITE)
}

/// Any `{WriteWrite, WriteRead}` edge unaccompanied by a `Start` edge in the
/// same direction.
pub fn check_gsia(txn_graph: &TxnGraph) -> bool {
    let mask = EdgeLabels::WRITE_WRITE | EdgeLabels::WRITE_READ;
    for (from, to, label) in txn_graph.all_edges() {
        if label.intersects(mask) && !label.contains(EdgeLabels::START) {
            return true;
        }
        let _ = (from, to);
    }
    false
}

/// A cycle over `{WriteWrite, WriteRead, ReadWrite, StrictStart}` that uses
/// exactly one `ReadWrite` edge: built by checking, for every `ReadWrite`
/// edge `(u, v)`, whether a path `v -> u` exists using only the other three
/// labels — combined with `(u, v)` that path closes a cycle with exactly
/// one anti-dependency edge.
pub fn check_gsib(txn_graph: &TxnGraph) -> bool {
    let non_rw_mask = EdgeLabels::WRITE_WRITE | EdgeLabels::WRITE_READ | EdgeLabels::STRICT_START;
    let mut without_rw: DiGraphMap<TxnId, ()> = DiGraphMap::new();
    for (from, to, label) in txn_graph.all_edges() {
        if label.intersects(non_rw_mask) {
            without_rw.add_edge(from, to, ());
        }
    }
    for node in txn_graph.nodes() {
        without_rw.add_node(node);
    }

    for (from, to, label) in txn_graph.all_edges() {
        if !label.contains(EdgeLabels::READ_WRITE) {
            continue;
        }
        if has_path_connecting(&without_rw, to, from, None) {
            return true;
        }
    }
    false
}

/// Iterated removal of zero-in-degree, then zero-out-degree, nodes on the
/// subgraph restricted to `mask`; a non-empty remainder proves a cycle.
fn has_cycle_under(txn_graph: &TxnGraph, mask: EdgeLabels) -> bool {
    let mut g: DiGraphMap<TxnId, ()> = DiGraphMap::new();
    for node in txn_graph.nodes() {
        g.add_node(node);
    }
    for (from, to, label) in txn_graph.all_edges() {
        if label.intersects(mask) {
            g.add_edge(from, to, ());
        }
    }

    loop {
        if g.node_count() == 0 {
            return false;
        }
        let zero_in: Vec<TxnId> = g.nodes().filter(|&n| g.neighbors_directed(n, petgraph::Incoming).count() == 0).collect();
        if !zero_in.is_empty() {
            for n in zero_in {
                g.remove_node(n);
            }
            continue;
        }
        let zero_out: Vec<TxnId> = g.nodes().filter(|&n| g.neighbors_directed(n, petgraph::Outgoing).count() == 0).collect();
        if !zero_out.is_empty() {
            for n in zero_out {
                g.remove_node(n);
            }
            continue;
        }
        return true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn g1a_fires_on_aborted_writer_committed_reader() {
        let mut g = TxnGraph::new();
        g.add_edge(TxnId(0), TxnId(1), EdgeLabels::WRITE_READ);
        let mut status = AHashMap::default();
        status.insert(TxnId(0), TransactionOutcome::Aborted);
        status.insert(TxnId(1), TransactionOutcome::Committed);
        assert!(check_g1a(&g, &status));
    }

    #[test]
    fn g1a_does_not_fire_when_writer_committed() {
        let mut g = TxnGraph::new();
        g.add_edge(TxnId(0), TxnId(1), EdgeLabels::WRITE_READ);
        let mut status = AHashMap::default();
        status.insert(TxnId(0), TransactionOutcome::Committed);
        status.insert(TxnId(1), TransactionOutcome::Committed);
        assert!(!check_g1a(&g, &status));
    }

    #[test]
    fn g1c_detects_a_two_cycle() {
        let mut g = TxnGraph::new();
        g.add_edge(TxnId(0), TxnId(1), EdgeLabels::WRITE_READ);
        g.add_edge(TxnId(1), TxnId(0), EdgeLabels::WRITE_READ);
        assert!(check_g1c(&g));
    }

    #[test]
    fn g1c_silent_on_acyclic_graph() {
        let mut g = TxnGraph::new();
        g.add_edge(TxnId(0), TxnId(1), EdgeLabels::WRITE_READ);
        g.add_edge(TxnId(1), TxnId(2), EdgeLabels::WRITE_WRITE);
        assert!(!check_g1c(&g));
    }

    #[test]
    fn gsia_fires_on_unaccompanied_write_edge() {
        let mut g = TxnGraph::new();
        g.add_edge(TxnId(0), TxnId(1), EdgeLabels::WRITE_WRITE);
        assert!(check_gsia(&g));
    }

    #[test]
    fn gsia_silent_when_start_edge_present() {
        let mut g = TxnGraph::new();
        g.add_edge(TxnId(0), TxnId(1), EdgeLabels::WRITE_WRITE | EdgeLabels::START);
        assert!(!check_gsia(&g));
    }

    #[test]
    fn gsib_fires_on_single_rw_cycle() {
        let mut g = TxnGraph::new();
        g.add_edge(TxnId(0), TxnId(1), EdgeLabels::READ_WRITE);
        g.add_edge(TxnId(1), TxnId(0), EdgeLabels::WRITE_WRITE);
        assert!(check_gsib(&g));
    }

    #[test]
    fn gsib_silent_with_two_rw_edges_only() {
        let mut g = TxnGraph::new();
        g.add_edge(TxnId(0), TxnId(1), EdgeLabels::READ_WRITE);
        g.add_edge(TxnId(1), TxnId(0), EdgeLabels::READ_WRITE);
        assert!(!check_gsib(&g));
    }
}
