#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Catalog(#[from] isofuzz_catalog::CatalogError),
    #[error(transparent)]
    Generator(#[from] isofuzz_grammar::GenError),
    #[error(transparent)]
    Dut(#[from] isofuzz_dut::DutError),
    #[error(transparent)]
    Instrument(#[from] isofuzz_instrument::InstrumentError),
    #[error(transparent)]
    Scheduler(#[from] isofuzz_scheduler::SchedulerError),
    #[error(transparent)]
    Analyzer(#[from] isofuzz_analyzer::AnalyzerError),
    #[error(transparent)]
    Reproducer(#[from] isofuzz_reproducer::ReproducerError),
    /// The only error variant meant to cross a test's outer boundary as
    /// "something is actually broken, not just an anomaly to report": an
    /// internal DUT assertion, panic, or lost connection.
    #[error("fatal bug observed in dut: {0}")]
    FatalBug(String),
}
