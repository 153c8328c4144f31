use smol_str::SmolStr;

#[derive(Debug, thiserror::Error)]
pub enum InstrumentError {
    #[error("table `{0}` has no `wkey` column; this is a generator bug, not a driver error")]
    MissingWkey(SmolStr),

    #[error("table `{0}` has no version column")]
    MissingVersionColumn(SmolStr),

    #[error("statement references unknown table `{0}`")]
    UnknownTable(SmolStr),

    #[error("could not classify statement for instrumentation: {0}")]
    UnrecognizedStatement(String),
}
