//! Top-level facade tying the whole pipeline together: builds a catalog and
//! a statement plan from a [`RunConfig`], instruments and schedules it
//! against a DUT, runs the analyzer over the result, and writes a
//! reproducer to disk whenever an anomaly or fatal bug is observed.

mod config;
mod error;
mod logging;
mod plan;
mod schema;

pub use config::RunConfig;
pub use error::CoreError;
pub use logging::init_logging;

use std::path::{Path, PathBuf};

use isofuzz_analyzer::{analyze, Analysis, AnalysisInput};
use isofuzz_dut::MemoryDut;
use isofuzz_instrument::instrument;
use isofuzz_random::SeededSource;
use isofuzz_reproducer::write_reproducer;
use isofuzz_scheduler::SchedulerError;
use smol_str::SmolStr;
use tracing::info;

/// The result of one completed test run.
#[derive(Debug)]
pub enum TestOutcome {
    /// No isolation anomaly was observed.
    Clean,
    /// An anomaly was observed; a reproducer was written to `reproducer_dir`.
    Anomaly { analysis: Analysis, reproducer_dir: PathBuf },
}

/// Runs one complete test against `dut`: schema generation, statement
/// planning, instrumentation, scheduling, and analysis. Only a
/// [`CoreError::FatalBug`] is meant to propagate out of a production
/// caller as something to act on; any other `Err` means the harness itself
/// failed to run the test, not that the DUT misbehaved.
pub fn run_test(
    config: &RunConfig,
    dut: &mut MemoryDut,
    reproducer_root: &Path,
) -> Result<TestOutcome, CoreError> {
    let mut rng = SeededSource::new(config.seed);
    let catalog = schema::build_schema(config, &mut rng, dut)?;
    let plan = plan::build_plan(&catalog, config, dut, &mut rng);
    let queue = instrument(&catalog, &plan)?;

    let table_names: Vec<SmolStr> = catalog.tables().iter().filter(|t| t.is_base_table).map(|t| t.name.clone()).collect();
    let initial_content = dut.get_content(&table_names)?;

    let record = match isofuzz_scheduler::run(&queue, dut, config.is_serializable) {
        Ok(record) => record,
        Err(SchedulerError::FatalBug(msg)) => {
            let dir = reproducer_root.join(format!("fatal-seed-{}", config.seed));
            write_reproducer(&dir, &queue)?;
            return Err(CoreError::FatalBug(msg));
        }
        Err(other) => return Err(CoreError::from(other)),
    };

    let analysis = analyze(AnalysisInput::new(&initial_content, &queue, &record.executed, &record.final_status))?;

    if analysis.verdict.any() {
        let dir = reproducer_root.join(format!("anomaly-seed-{}", config.seed));
        write_reproducer(&dir, &queue)?;
        info!(seed = config.seed, verdict = ?analysis.verdict, "anomaly found");
        Ok(TestOutcome::Anomaly { analysis, reproducer_dir: dir })
    } else {
        Ok(TestOutcome::Clean)
    }
}
