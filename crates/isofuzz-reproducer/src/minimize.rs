use ahash::AHashSet;
use isofuzz_analyzer::Verdict;
use isofuzz_instrument::{InstrumentedStmt, Role};

use crate::error::ReproducerError;

/// Repeatedly drops a candidate statement (or, for an instrumented write,
/// its whole before/after read group) and keeps the removal as long as
/// `target` still judges the verdict `try_queue` returns to hold.
/// Non-instrumentation statements are tried before bare instrumentation
/// reads, since removing one of those in isolation is rarely useful.
/// Stops at a fixed point.
pub fn minimize(
    queue: &[InstrumentedStmt],
    target: impl Fn(&Verdict) -> bool,
    mut try_queue: impl FnMut(&[InstrumentedStmt]) -> Result<Verdict, ReproducerError>,
) -> Result<Vec<InstrumentedStmt>, ReproducerError> {
    let mut current: Vec<InstrumentedStmt> = queue.to_vec();

    'outer: loop {
        for start in removal_order(&current) {
            let group = removal_group(&current, start);
            let trial: Vec<InstrumentedStmt> = current
                .iter()
                .enumerate()
                .filter(|(i, _)| !group.contains(i))
                .map(|(_, s)| s.clone())
                .collect();
            if trial.len() == current.len() {
                continue;
            }
            let verdict = try_queue(&trial)?;
            if target(&verdict) {
                current = trial;
                continue 'outer;
            }
        }
        break;
    }

    Ok(current)
}

/// Tries dropping one statement at a time from an already-minimized
/// reproducer and reports which single removals make `target` stop
/// holding — those statements are load-bearing for the anomaly.
pub fn decycle(
    queue: &[InstrumentedStmt],
    target: impl Fn(&Verdict) -> bool,
    mut try_queue: impl FnMut(&[InstrumentedStmt]) -> Result<Verdict, ReproducerError>,
) -> Result<Vec<usize>, ReproducerError> {
    let mut load_bearing = Vec::new();
    for i in 0..queue.len() {
        let trial: Vec<InstrumentedStmt> =
            queue.iter().enumerate().filter(|(j, _)| *j != i).map(|(_, s)| s.clone()).collect();
        let verdict = try_queue(&trial)?;
        if !target(&verdict) {
            load_bearing.push(i);
        }
    }
    Ok(load_bearing)
}

fn removal_order(queue: &[InstrumentedStmt]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..queue.len()).collect();
    order.sort_by_key(|&i| queue[i].role.is_instrumentation());
    order
}

fn removal_group(queue: &[InstrumentedStmt], i: usize) -> AHashSet<usize> {
    let mut group = AHashSet::default();
    group.insert(i);
    if queue[i].role.is_write() {
        if i > 0 && queue[i - 1].txn == queue[i].txn && queue[i - 1].role == Role::BeforeWriteRead {
            group.insert(i - 1);
        }
        if i + 1 < queue.len() && queue[i + 1].txn == queue[i].txn && queue[i + 1].role == Role::AfterWriteRead {
            group.insert(i + 1);
        }
    }
    group
}

#[cfg(test)]
mod tests {
    use super::*;
    use isofuzz_instrument::TxnId;

    fn stmt(text: &str, tid: u32, role: Role) -> InstrumentedStmt {
        InstrumentedStmt { text: text.to_string(), txn: TxnId(tid), role, target_table: Some("t".into()) }
    }

    /// A toy verdict stand-in: "the anomaly holds" iff the queue still
    /// contains both the insert and a read of it, wired through a closure
    /// so the algorithm itself can be tested without a real DUT run.
    fn toy_verdict(queue: &[InstrumentedStmt]) -> Result<Verdict, ReproducerError> {
        let has_write = queue.iter().any(|s| s.role == Role::InsertWrite);
        let has_read = queue.iter().any(|s| s.role == Role::AfterWriteRead);
        Ok(Verdict { g1a: has_write && has_read, ..Verdict::default() })
    }

    #[test]
    fn minimize_drops_statements_unrelated_to_the_anomaly() {
        let queue = vec![
            stmt("BEGIN", 0, Role::Init),
            stmt("INSERT INTO t (wkey, write_op_id, v) VALUES (1, 0, 10)", 0, Role::InsertWrite),
            stmt("SELECT * FROM t WHERE wkey = 1", 0, Role::AfterWriteRead),
            stmt("BEGIN", 1, Role::Init),
            stmt("SELECT * FROM irrelevant WHERE wkey = 9", 1, Role::SelectRead),
            stmt("ROLLBACK", 0, Role::Init),
            stmt("COMMIT", 1, Role::Init),
        ];

        let minimized = minimize(&queue, |v| v.g1a, toy_verdict).unwrap();
        assert!(minimized.len() < queue.len());
        assert!(minimized.iter().any(|s| s.role == Role::InsertWrite));
        assert!(minimized.iter().any(|s| s.role == Role::AfterWriteRead));
        assert!(!minimized.iter().any(|s| s.text.contains("irrelevant")));
    }

    #[test]
    fn minimize_keeps_a_write_and_its_read_group_together() {
        let queue = vec![
            stmt("UPDATE t SET v = 1 WHERE wkey = 1", 0, Role::BeforeWriteRead),
            stmt("UPDATE t SET v = 1 WHERE wkey = 1", 0, Role::UpdateWrite),
            stmt("SELECT * FROM t WHERE wkey = 1", 0, Role::AfterWriteRead),
        ];
        let group = removal_group(&queue, 1);
        assert_eq!(group.len(), 3);
    }

    #[test]
    fn decycle_reports_the_statement_whose_removal_breaks_the_anomaly() {
        let queue = vec![
            stmt("INSERT INTO t (wkey, write_op_id, v) VALUES (1, 0, 10)", 0, Role::InsertWrite),
            stmt("SELECT * FROM t WHERE wkey = 1", 0, Role::AfterWriteRead),
        ];
        let load_bearing = decycle(&queue, |v| v.g1a, toy_verdict).unwrap();
        assert_eq!(load_bearing, vec![0, 1]);
    }
}
