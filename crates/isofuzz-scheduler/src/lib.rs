//! Drives an instrumented statement queue across one DUT session per
//! transaction: detects blocking, retries blocked transactions after other
//! transactions commit or abort, and records the *actual* execution order
//! (which may differ from the queue's planned order once blocking
//! intervenes) for the analyzer to consume.

mod error;

pub use error::SchedulerError;

use ahash::AHashMap;
use isofuzz_dut::{Dut, ExecOutcome, SessionId};
use isofuzz_instrument::{InstrumentedStmt, TxnId};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnState {
    Idle,
    Running,
    Blocked,
    Committed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum StmtState {
    Pending,
    Skipped,
}

/// One statement's result, in the order it actually executed.
#[derive(Debug, Clone)]
pub struct ExecutedStmt {
    pub queue_index: usize,
    pub txn: TxnId,
    pub outcome: ExecOutcome,
}

/// The scheduler's output: every executed statement (in actual order) plus
/// the final status of every transaction.
#[derive(Debug)]
pub struct ExecutionRecord {
    pub executed: Vec<ExecutedStmt>,
    pub final_status: AHashMap<TxnId, TransactionOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    Committed,
    Aborted,
}

fn looks_like_commit_or_abort(text: &str) -> Option<TransactionOutcome> {
    let trimmed = text.trim_start();
    if trimmed.len() >= 6 && trimmed[..6].eq_ignore_ascii_case("commit") {
        Some(TransactionOutcome::Committed)
    } else if trimmed.len() >= 8 && trimmed[..8].eq_ignore_ascii_case("rollback") {
        Some(TransactionOutcome::Aborted)
    } else {
        None
    }
}

/// Every transaction's queue ends with exactly one commit/rollback
/// delimiter by construction; this is the run's plan of transaction
/// statuses, known up front rather than discovered as execution reaches it.
fn planned_outcomes(queue: &[InstrumentedStmt]) -> AHashMap<TxnId, TransactionOutcome> {
    let mut planned = AHashMap::default();
    for stmt in queue {
        if let Some(outcome) = looks_like_commit_or_abort(&stmt.text) {
            planned.insert(stmt.txn, outcome);
        }
    }
    planned
}

/// Whether some transaction other than `txn` is planned to commit and is
/// currently blocked — the condition that holds a planned-committed `txn`
/// back from running further statements when the run isn't being tested for
/// serializable isolation.
fn other_planned_commit_blocked(
    planned: &AHashMap<TxnId, TransactionOutcome>,
    states: &AHashMap<TxnId, TxnState>,
    txn: TxnId,
) -> bool {
    planned.iter().any(|(&t, &outcome)| {
        t != txn && outcome == TransactionOutcome::Committed && states.get(&t) == Some(&TxnState::Blocked)
    })
}

/// Runs `queue` to local completion against `dut`, assigning one
/// [`SessionId`] per distinct [`TxnId`] in first-appearance order.
///
/// `is_serializable` gates whether a transaction planned to commit may keep
/// running statements while some other planned-commit transaction sits
/// blocked: under a non-serializable isolation level being tested, it must
/// not, since letting it proceed would produce an interleaving the
/// isolation level under test couldn't actually exhibit.
pub fn run(
    queue: &[InstrumentedStmt],
    dut: &mut dyn Dut,
    is_serializable: bool,
) -> Result<ExecutionRecord, SchedulerError> {
    let mut sessions: AHashMap<TxnId, SessionId> = AHashMap::new();
    let mut txn_queues: AHashMap<TxnId, Vec<usize>> = AHashMap::new();
    for (i, stmt) in queue.iter().enumerate() {
        let next_id = sessions.len() as u32;
        sessions.entry(stmt.txn).or_insert(SessionId(next_id));
        txn_queues.entry(stmt.txn).or_default().push(i);
    }

    let planned = planned_outcomes(queue);
    let mut states: AHashMap<TxnId, TxnState> = sessions.keys().map(|&t| (t, TxnState::Idle)).collect();
    let mut cursor: AHashMap<TxnId, usize> = sessions.keys().map(|&t| (t, 0usize)).collect();
    let mut stmt_state: Vec<StmtState> = queue.iter().map(|_| StmtState::Pending).collect();
    let mut executed: Vec<ExecutedStmt> = Vec::new();
    let mut final_status: AHashMap<TxnId, TransactionOutcome> = AHashMap::new();

    for (i, stmt) in queue.iter().enumerate() {
        if stmt_state[i] != StmtState::Pending {
            continue;
        }
        if states[&stmt.txn] == TxnState::Blocked {
            continue;
        }
        if !is_serializable
            && planned.get(&stmt.txn) == Some(&TransactionOutcome::Committed)
            && other_planned_commit_blocked(&planned, &states, stmt.txn)
        {
            continue;
        }
        advance_one(
            i,
            stmt,
            dut,
            &sessions,
            &mut states,
            &mut cursor,
            &mut stmt_state,
            &mut executed,
            &mut final_status,
        )?;
    }

    loop {
        let before = executed.len();
        retry_pass(
            queue,
            dut,
            &sessions,
            &txn_queues,
            &mut states,
            &mut cursor,
            &mut stmt_state,
            &mut executed,
            &mut final_status,
            &planned,
            is_serializable,
        )?;
        if executed.len() == before {
            break;
        }
    }

    let blocked = states.values().filter(|s| **s == TxnState::Blocked).count();
    if blocked > 0 {
        return Err(SchedulerError::Deadlocked { blocked });
    }

    Ok(ExecutionRecord { executed, final_status })
}

#[allow(clippy::too_many_arguments)]
fn advance_one(
    i: usize,
    stmt: &InstrumentedStmt,
    dut: &mut dyn Dut,
    sessions: &AHashMap<TxnId, SessionId>,
    states: &mut AHashMap<TxnId, TxnState>,
    cursor: &mut AHashMap<TxnId, usize>,
    stmt_state: &mut [StmtState],
    executed: &mut Vec<ExecutedStmt>,
    final_status: &mut AHashMap<TxnId, TransactionOutcome>,
) -> Result<bool, SchedulerError> {
    let session = sessions[&stmt.txn];
    let outcome = dut.execute(session, &stmt.text)?;
    match &outcome {
        ExecOutcome::Blocked => {
            states.insert(stmt.txn, TxnState::Blocked);
            trace!(txn = stmt.txn.0, queue_index = i, "statement blocked");
            Ok(false)
        }
        ExecOutcome::Skipped => {
            stmt_state[i] = StmtState::Skipped;
            *cursor.get_mut(&stmt.txn).unwrap() += 1;
            trace!(txn = stmt.txn.0, queue_index = i, "statement skipped");
            Ok(true)
        }
        ExecOutcome::Syntax(msg) => {
            warn!(txn = stmt.txn.0, queue_index = i, %msg, "syntax error treated as generator bug");
            stmt_state[i] = StmtState::Skipped;
            *cursor.get_mut(&stmt.txn).unwrap() += 1;
            Ok(true)
        }
        ExecOutcome::FatalBug(msg) => Err(SchedulerError::FatalBug(msg.clone())),
        ExecOutcome::Rows(_) | ExecOutcome::AffectedRows(_) => {
            states.insert(stmt.txn, TxnState::Running);
            *cursor.get_mut(&stmt.txn).unwrap() += 1;
            if let Some(result) = looks_like_commit_or_abort(&stmt.text) {
                states.insert(
                    stmt.txn,
                    match result {
                        TransactionOutcome::Committed => TxnState::Committed,
                        TransactionOutcome::Aborted => TxnState::Aborted,
                    },
                );
                final_status.insert(stmt.txn, result);
                debug!(txn = stmt.txn.0, ?result, "transaction finished");
            }
            executed.push(ExecutedStmt { queue_index: i, txn: stmt.txn, outcome });
            Ok(true)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn retry_pass(
    queue: &[InstrumentedStmt],
    dut: &mut dyn Dut,
    sessions: &AHashMap<TxnId, SessionId>,
    txn_queues: &AHashMap<TxnId, Vec<usize>>,
    states: &mut AHashMap<TxnId, TxnState>,
    cursor: &mut AHashMap<TxnId, usize>,
    stmt_state: &mut [StmtState],
    executed: &mut Vec<ExecutedStmt>,
    final_status: &mut AHashMap<TxnId, TransactionOutcome>,
    planned: &AHashMap<TxnId, TransactionOutcome>,
    is_serializable: bool,
) -> Result<(), SchedulerError> {
    let blocked_txns: Vec<TxnId> =
        states.iter().filter(|(_, s)| **s == TxnState::Blocked).map(|(&t, _)| t).collect();

    let mut unblocked_any = false;
    for txn in blocked_txns {
        let own_queue = &txn_queues[&txn];
        let pos = cursor[&txn];
        if pos >= own_queue.len() {
            states.insert(txn, TxnState::Running);
            continue;
        }
        let idx = own_queue[pos];
        let made_progress = advance_one(
            idx,
            &queue[idx],
            dut,
            sessions,
            states,
            cursor,
            stmt_state,
            executed,
            final_status,
        )?;
        if !made_progress {
            continue;
        }
        unblocked_any = true;
        // The transaction is no longer blocked: drain its remaining pending
        // statements in order, same as the main loop would have.
        loop {
            let pos = cursor[&txn];
            if pos >= own_queue.len() || states[&txn] == TxnState::Blocked {
                break;
            }
            let idx = own_queue[pos];
            if stmt_state[idx] != StmtState::Pending {
                break;
            }
            if !is_serializable
                && planned.get(&txn) == Some(&TransactionOutcome::Committed)
                && other_planned_commit_blocked(planned, states, txn)
            {
                break;
            }
            let progressed = advance_one(idx, &queue[idx], dut, sessions, states, cursor, stmt_state, executed, final_status)?;
            if !progressed {
                break;
            }
        }
    }

    if unblocked_any {
        retry_pass(
            queue,
            dut,
            sessions,
            txn_queues,
            states,
            cursor,
            stmt_state,
            executed,
            final_status,
            planned,
            is_serializable,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use isofuzz_dut::MemoryDut;
    use isofuzz_instrument::Role;

    fn stmt(text: &str, txn: u32, role: Role) -> InstrumentedStmt {
        InstrumentedStmt { text: text.to_string(), txn: TxnId(txn), role, target_table: None }
    }

    #[test]
    fn serial_transactions_both_commit() {
        let mut dut = MemoryDut::new();
        dut.create_table("t", &["wkey", "write_op_id", "v"]);
        let queue = vec![
            stmt("BEGIN", 0, Role::Init),
            stmt("INSERT INTO t (wkey, write_op_id, v) VALUES (1, 0, 10)", 0, Role::InsertWrite),
            stmt("COMMIT", 0, Role::Init),
            stmt("BEGIN", 1, Role::Init),
            stmt("INSERT INTO t (wkey, write_op_id, v) VALUES (2, 0, 20)", 1, Role::InsertWrite),
            stmt("COMMIT", 1, Role::Init),
        ];
        let record = run(&queue, &mut dut, true).unwrap();
        assert_eq!(record.final_status[&TxnId(0)], TransactionOutcome::Committed);
        assert_eq!(record.final_status[&TxnId(1)], TransactionOutcome::Committed);
        assert_eq!(record.executed.len(), queue.len());
    }

    #[test]
    fn blocked_transaction_unblocks_after_the_other_commits() {
        let mut dut = MemoryDut::new();
        dut.create_table("t", &["wkey", "write_op_id", "v"]);
        let queue = vec![
            stmt("BEGIN", 0, Role::Init),
            stmt("INSERT INTO t (wkey, write_op_id, v) VALUES (1, 0, 10)", 0, Role::InsertWrite),
            stmt("BEGIN", 1, Role::Init),
            stmt("UPDATE t SET v = 99 WHERE wkey = 1", 1, Role::UpdateWrite),
            stmt("COMMIT", 0, Role::Init),
            stmt("COMMIT", 1, Role::Init),
        ];
        let record = run(&queue, &mut dut, true).unwrap();
        assert_eq!(record.final_status[&TxnId(0)], TransactionOutcome::Committed);
        assert_eq!(record.final_status[&TxnId(1)], TransactionOutcome::Committed);
    }

    /// T1 blocks on a row T0 is holding. With `is_serializable = true` the
    /// two planned commits are still free to interleave, so T0's commit
    /// releases the lock and T1's retry goes through. With `is_serializable
    /// = false`, T0 is itself a planned commit and must not proceed past
    /// its own pending statements (including its commit) while the other
    /// planned commit, T1, sits blocked — so the two deadlock each other
    /// and the run reports it rather than silently letting them interleave.
    #[test]
    fn non_serializable_run_holds_a_planned_commit_back_from_releasing_another() {
        let mut dut = MemoryDut::new();
        dut.create_table("t", &["wkey", "write_op_id", "v"]);
        let queue = vec![
            stmt("BEGIN", 0, Role::Init),
            stmt("INSERT INTO t (wkey, write_op_id, v) VALUES (1, 0, 10)", 0, Role::InsertWrite),
            stmt("BEGIN", 1, Role::Init),
            stmt("UPDATE t SET v = 99 WHERE wkey = 1", 1, Role::UpdateWrite),
            stmt("COMMIT", 0, Role::Init),
            stmt("COMMIT", 1, Role::Init),
        ];
        let err = run(&queue, &mut dut, false).unwrap_err();
        assert!(matches!(err, SchedulerError::Deadlocked { .. }));
    }
}
