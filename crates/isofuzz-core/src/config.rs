use std::time::Duration;

/// Knobs for one test run, constructed directly in code or a test — no
/// file-based config layer, since the CLI's scope is deliberately thin.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub seed: u64,
    pub table_count: u32,
    pub transaction_count: u32,
    pub statements_per_transaction: u32,
    /// Per-statement wall-clock budget a real (non-`MemoryDut`) driver
    /// should enforce; unused against `MemoryDut`, which never blocks
    /// indefinitely.
    pub statement_timeout: Duration,
    /// Chance, out of 100, that a transaction ends in `ROLLBACK` rather
    /// than `COMMIT`.
    pub abort_probability_pct: u32,
    /// Whether the scheduler is allowed to freely interleave committed
    /// transactions' statements while another committed transaction sits
    /// blocked. `false` holds committed transactions back from running
    /// further statements until that other commit clears, the way a
    /// non-serializable isolation level under test is expected to behave;
    /// `true` lets every transaction run as soon as it isn't itself
    /// blocked.
    pub is_serializable: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            seed: 0,
            table_count: 3,
            transaction_count: 4,
            statements_per_transaction: 6,
            statement_timeout: Duration::from_secs(5),
            abort_probability_pct: 10,
            is_serializable: true,
        }
    }
}
