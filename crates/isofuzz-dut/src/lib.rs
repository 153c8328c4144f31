//! The abstract contract the core consumes to execute one statement,
//! introspect blocking, and reset/backup/restore a database. Every concrete
//! wire-protocol driver (Postgres, MySQL, SQLite, CockroachDB, ...) is
//! expected to live outside this crate and implement [`Dut`]; [`MemoryDut`]
//! is the one reference implementation that ships here, for tests and the
//! reproducer binary's self-contained mode.

mod error;
mod memory;
mod value;

pub use error::DutError;
pub use memory::MemoryDut;
pub use value::{Row, SqlValue};

use smol_str::SmolStr;

/// Identifies one of the scheduler's concurrent DUT sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u32);

/// The outcome of submitting one statement to a session, already classified
/// per the error taxonomy in the spec: syntax and constraint errors never
/// reach this type as an `Err` — they're folded into [`ExecOutcome`]
/// variants so the scheduler and analyzer never branch on driver-specific
/// error strings.
#[derive(Debug, Clone)]
pub enum ExecOutcome {
    /// Statement completed and returned rows (a read, or a write whose
    /// instrumented read observed the result).
    Rows(Vec<Row>),
    /// Statement completed with no rows to report, only an affected-row
    /// count (an UPDATE/DELETE/INSERT with no instrumented read attached).
    AffectedRows(u64),
    /// The session is waiting on a lock. Not an error: the scheduler marks
    /// the owning transaction `Blocked` and retries later.
    Blocked,
    /// The driver reported "transaction aborted / commands ignored" for an
    /// already-doomed transaction. The statement is dropped.
    Skipped,
    /// A generator bug: the statement didn't parse. Absorbed by the
    /// generator's local retry loop, never fatal.
    Syntax(String),
    /// An uncaught assertion inside the DBMS, or a lost connection while
    /// other sessions are healthy. Escapes all the way to the supervisor.
    FatalBug(String),
}

/// Device-under-test contract. All operations are blocking: the scheduler
/// is itself single-threaded and cooperatively multiplexes sessions by
/// polling, so there is no `async` here (see the concurrency model notes).
pub trait Dut {
    /// Open (or reuse) the session named `session` and submit `stmt`.
    fn execute(&mut self, session: SessionId, stmt: &str) -> Result<ExecOutcome, DutError>;

    /// Ask whether `session` is currently blocked waiting on a lock, via a
    /// short auxiliary connection. Must not itself block indefinitely.
    fn is_blocked(&mut self, session: SessionId) -> Result<bool, DutError>;

    /// Drop all sessions and restore the schema to empty.
    fn reset(&mut self) -> Result<(), DutError>;

    /// Snapshot the current database content; returns an opaque handle (in
    /// a real driver, typically a file path) suitable for [`Dut::restore_from_backup`].
    fn backup(&mut self) -> Result<SmolStr, DutError>;

    /// Restore the database to a previously taken [`Dut::backup`].
    fn restore_from_backup(&mut self, handle: &str) -> Result<(), DutError>;

    /// Read back every row of the named tables, ordered by primary key.
    /// Best-effort per table: a table that doesn't exist is simply omitted
    /// from the result rather than failing the whole call.
    fn get_content(&mut self, tables: &[SmolStr]) -> Result<ahash::AHashMap<SmolStr, Vec<Row>>, DutError>;

    /// Literal statement text this DBMS uses to start/commit/abort a
    /// transaction (e.g. `"BEGIN"`, `"COMMIT"`, `"ROLLBACK"`).
    fn begin_stmt_text(&self) -> &str;
    fn commit_stmt_text(&self) -> &str;
    fn abort_stmt_text(&self) -> &str;

    /// Fork a fresh DBMS server process, for drivers that support
    /// multi-instance testing. Not every driver needs this.
    fn fork_server(&mut self) -> Result<u32, DutError> {
        Err(DutError::Unsupported("fork_server"))
    }
}
