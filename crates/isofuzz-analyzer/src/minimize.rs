use ahash::{AHashMap, AHashSet};

use crate::edges::{EdgeLabels, StmtGraph};

/// Edge weights used by the longest-path heuristic, increasing with how
/// "load-bearing" a statement-level dependency looks: a purely positional
/// `Inner` edge is nearly free to drop, while a write-read/write-write edge
/// unaccompanied by start ordering is almost certainly the thing that made
/// the anomaly fire.
pub fn edge_weight(label: EdgeLabels) -> u64 {
    let start = label.intersects(EdgeLabels::START | EdgeLabels::STRICT_START);
    let inner = label.contains(EdgeLabels::INNER);
    let write = label.intersects(EdgeLabels::WRITE_WRITE | EdgeLabels::WRITE_READ);
    let other = label.intersects(EdgeLabels::READ_WRITE | EdgeLabels::VERSION_SET | EdgeLabels::OVERWRITE);

    if inner && !start && !write && !other {
        1
    } else if start && !inner && !write && !other {
        10
    } else if start && (inner || write || other) {
        100
    } else if write && !start {
        100_000
    } else {
        10_000
    }
}

/// Kahn's algorithm: `Ok` with a full topological order, or `Err` with the
/// node set that couldn't be reduced (a cycle).
pub fn topo_order(g: &StmtGraph) -> Result<Vec<usize>, Vec<usize>> {
    let mut in_degree: AHashMap<usize, usize> = g.nodes().map(|n| (n, 0)).collect();
    for (_, to, _) in g.all_edges() {
        *in_degree.entry(to).or_insert(0) += 1;
    }

    let mut queue: Vec<usize> = in_degree.iter().filter(|(_, &d)| d == 0).map(|(&n, _)| n).collect();
    queue.sort_unstable();
    let mut order = Vec::with_capacity(in_degree.len());
    let mut cursor = 0;
    while cursor < queue.len() {
        let n = queue[cursor];
        cursor += 1;
        order.push(n);
        let mut newly_free = Vec::new();
        for (_, to, _) in g.edges(n) {
            let d = in_degree.get_mut(&to).unwrap();
            *d -= 1;
            if *d == 0 {
                newly_free.push(to);
            }
        }
        newly_free.sort_unstable();
        queue.extend(newly_free);
    }

    if order.len() == in_degree.len() {
        Ok(order)
    } else {
        let ordered: AHashSet<usize> = order.into_iter().collect();
        Err(in_degree.keys().filter(|n| !ordered.contains(n)).copied().collect())
    }
}

/// Topological order with cycle-breaking: whenever the remaining graph
/// can't be reduced further, an arbitrary stuck node is expanded to its
/// instrumentation set (via `instrumentation_of`) and that whole set is
/// dropped from the graph, then reduction resumes. Returns the surviving
/// order plus the statement indices that were dropped to break a cycle.
pub fn topo_order_breaking_cycles(
    g: &StmtGraph,
    instrumentation_of: impl Fn(usize) -> Vec<usize>,
) -> (Vec<usize>, Vec<usize>) {
    let mut working = g.clone();
    let mut order = Vec::new();
    let mut dropped = Vec::new();

    loop {
        match topo_order(&working) {
            Ok(mut full) => {
                order.append(&mut full);
                return (order, dropped);
            }
            Err(stuck) => {
                let Some(&pick) = stuck.iter().min() else {
                    return (order, dropped);
                };
                let group = instrumentation_of(pick);
                for &n in &group {
                    working.remove_node(n);
                    dropped.push(n);
                }
                if group.is_empty() {
                    working.remove_node(pick);
                    dropped.push(pick);
                }
            }
        }
    }
}

/// Longest weighted path through the DAG given by `order` (must already be
/// a valid topological order of `g`), returned as the sequence of node ids
/// on that path. Used by the reproducer minimizer to find the statements
/// that must survive trimming.
pub fn longest_path(g: &StmtGraph, order: &[usize]) -> Vec<usize> {
    let mut dist: AHashMap<usize, u64> = order.iter().map(|&n| (n, 0)).collect();
    let mut pred: AHashMap<usize, usize> = AHashMap::default();

    for &n in order {
        let edges: Vec<(usize, EdgeLabels)> = g.edges(n).map(|(_, to, &label)| (to, label)).collect();
        for (to, label) in edges {
            let candidate = dist[&n] + edge_weight(label);
            if candidate > *dist.get(&to).unwrap_or(&0) {
                dist.insert(to, candidate);
                pred.insert(to, n);
            }
        }
    }

    let Some((&end, _)) = dist.iter().max_by_key(|(_, &d)| d) else {
        return Vec::new();
    };
    let mut path = vec![end];
    let mut cur = end;
    while let Some(&p) = pred.get(&cur) {
        path.push(p);
        cur = p;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topo_order_linear_chain() {
        let mut g = StmtGraph::new();
        g.add_edge(0, 1, EdgeLabels::INNER);
        g.add_edge(1, 2, EdgeLabels::INNER);
        assert_eq!(topo_order(&g).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn topo_order_reports_cycle_nodes() {
        let mut g = StmtGraph::new();
        g.add_edge(0, 1, EdgeLabels::WRITE_READ);
        g.add_edge(1, 0, EdgeLabels::WRITE_READ);
        let mut err = topo_order(&g).unwrap_err();
        err.sort_unstable();
        assert_eq!(err, vec![0, 1]);
    }

    #[test]
    fn breaking_cycles_eventually_produces_a_full_order() {
        let mut g = StmtGraph::new();
        g.add_edge(0, 1, EdgeLabels::WRITE_READ);
        g.add_edge(1, 0, EdgeLabels::WRITE_READ);
        let (order, dropped) = topo_order_breaking_cycles(&g, |n| vec![n]);
        assert_eq!(order.len() + dropped.len(), 2);
        assert!(!dropped.is_empty());
    }

    #[test]
    fn longest_path_prefers_heavier_edges() {
        let mut g = StmtGraph::new();
        g.add_edge(0, 1, EdgeLabels::INNER);
        g.add_edge(0, 2, EdgeLabels::WRITE_WRITE);
        let order = topo_order(&g).unwrap();
        let path = longest_path(&g, &order);
        assert_eq!(path.last(), Some(&2));
    }
}
