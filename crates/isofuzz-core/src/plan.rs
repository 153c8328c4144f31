use isofuzz_catalog::Catalog;
use isofuzz_dut::Dut;
use isofuzz_grammar::{statement, GenContext, GenError, Statement};
use isofuzz_instrument::{PlannedStmt, TxnId};
use isofuzz_random::RandomSource;

use crate::config::RunConfig;

const GENERATION_ATTEMPTS_PER_SLOT: u32 = 20;

/// Generates one statement sequence per transaction, then round-robins
/// them into a single plan so concurrent transactions actually interleave
/// instead of running fully serially.
pub fn build_plan(
    catalog: &Catalog,
    config: &RunConfig,
    dut: &dyn Dut,
    rng: &mut dyn RandomSource,
) -> Vec<PlannedStmt> {
    let per_txn: Vec<Vec<PlannedStmt>> =
        (0..config.transaction_count).map(|t| build_one_transaction(catalog, config, dut, rng, TxnId(t))).collect();

    let max_len = per_txn.iter().map(Vec::len).max().unwrap_or(0);
    let mut plan = Vec::with_capacity(per_txn.iter().map(Vec::len).sum());
    for i in 0..max_len {
        for stmts in &per_txn {
            if let Some(s) = stmts.get(i) {
                plan.push(s.clone());
            }
        }
    }
    plan
}

fn build_one_transaction(
    catalog: &Catalog,
    config: &RunConfig,
    dut: &dyn Dut,
    rng: &mut dyn RandomSource,
    txn: TxnId,
) -> Vec<PlannedStmt> {
    let mut stmts = vec![PlannedStmt::new(dut.begin_stmt_text(), txn)];
    let mut ctx = GenContext::new();

    for _ in 0..config.statements_per_transaction {
        for _ in 0..GENERATION_ATTEMPTS_PER_SLOT {
            match statement::generate(catalog, &mut ctx, rng) {
                Ok(stmt @ (Statement::Modify(_) | Statement::Query(_))) => {
                    stmts.push(PlannedStmt::new(stmt.render(), txn));
                    break;
                }
                // DDL and CTEs aren't instrumentable by the textual scan; re-roll.
                Ok(_) | Err(GenError::TryAgain) => continue,
                Err(GenError::Exhausted { .. } | GenError::Catalog(_)) => break,
            }
        }
    }

    let end = if rng.dx(100) <= config.abort_probability_pct { dut.abort_stmt_text() } else { dut.commit_stmt_text() };
    stmts.push(PlannedStmt::new(end, txn));
    stmts
}
