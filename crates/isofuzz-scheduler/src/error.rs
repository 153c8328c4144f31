#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Dut(#[from] isofuzz_dut::DutError),

    /// A retry pass made no progress while at least one transaction was
    /// still blocked — not expected against `MemoryDut`, but a real driver
    /// can wedge.
    #[error("scheduler made no progress with {blocked} transaction(s) still blocked")]
    Deadlocked { blocked: usize },

    /// An assertion or internal error inside the DUT itself, surfaced
    /// verbatim so the caller can write a reproducer.
    #[error("fatal bug observed in DUT: {0}")]
    FatalBug(String),
}
