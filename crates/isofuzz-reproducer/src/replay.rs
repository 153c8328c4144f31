use ahash::AHashMap;
use isofuzz_analyzer::{analyze, Analysis, AnalysisInput};
use isofuzz_dut::{Dut, Row};
use isofuzz_instrument::InstrumentedStmt;
use smol_str::SmolStr;

use crate::error::ReproducerError;

/// Re-executes `queue` against a freshly reset `dut` and runs the analyzer
/// over the result, exactly as a live test would. The on-disk reproducer
/// format carries no record of the run's `is_serializable` setting, so
/// callers pass the value they want re-checked under.
pub fn replay(queue: &[InstrumentedStmt], dut: &mut dyn Dut, is_serializable: bool) -> Result<Analysis, ReproducerError> {
    dut.reset()?;
    let initial_content: AHashMap<SmolStr, Vec<Row>> = AHashMap::default();
    let record = isofuzz_scheduler::run(queue, dut, is_serializable)?;
    let analysis = analyze(AnalysisInput::new(&initial_content, queue, &record.executed, &record.final_status))?;
    Ok(analysis)
}
