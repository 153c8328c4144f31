/// Installs a `tracing` `fmt` subscriber gated by `ISOFUZZ_LOG`, falling
/// back to `RUST_LOG`, mirroring the teacher's env-selected log level.
/// Library crates never call this themselves; only the CLI entry point and
/// test setup do. Safe to call more than once — later calls are no-ops.
pub fn init_logging() {
    let filter = std::env::var("ISOFUZZ_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "warn".to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .try_init();
}
