#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    /// A row in an observed output was shorter than the configured `wkey`
    /// or version column index, or the value there wasn't an integer.
    #[error("row at queue index {queue_index} has no integer value at column {column}")]
    MalformedRow { queue_index: usize, column: usize },
}
