use std::io;

use isofuzz_analyzer::AnalyzerError;
use isofuzz_dut::DutError;
use isofuzz_scheduler::SchedulerError;

#[derive(Debug, thiserror::Error)]
pub enum ReproducerError {
    #[error("io error reading/writing reproducer files: {0}")]
    Io(#[from] io::Error),
    #[error("reproducer files disagree on statement count: stmts={stmts} tid={tid} usage={usage}")]
    LineCountMismatch { stmts: usize, tid: usize, usage: usize },
    #[error("usage.txt line {line} has code {code}, outside the closed 0..=7 range")]
    InvalidUsageCode { line: usize, code: u8 },
    #[error("tid.txt line {line} is not a valid decimal integer: {text:?}")]
    InvalidTransactionId { line: usize, text: String },
    #[error("replay failed in the scheduler: {0}")]
    Scheduler(#[from] SchedulerError),
    #[error("replay failed in the analyzer: {0}")]
    Analyzer(#[from] AnalyzerError),
    #[error("replay could not reset the dut: {0}")]
    Dut(#[from] DutError),
}
