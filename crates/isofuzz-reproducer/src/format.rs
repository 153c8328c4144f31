use std::fs;
use std::path::Path;

use isofuzz_instrument::{InstrumentedStmt, Role, TxnId};

use crate::error::ReproducerError;

/// One directory's worth of reproducer files, already parsed.
pub struct ReproducerFiles {
    pub stmts: Vec<String>,
    pub tids: Vec<u32>,
    pub roles: Vec<Role>,
}

/// Reads `stmts.sql`, `tid.txt` and `usage.txt` from `dir` and checks they
/// agree on record count before handing back the parsed triple.
pub fn read_reproducer(dir: &Path) -> Result<ReproducerFiles, ReproducerError> {
    let stmts_text = fs::read_to_string(dir.join("stmts.sql"))?;
    let tid_text = fs::read_to_string(dir.join("tid.txt"))?;
    let usage_text = fs::read_to_string(dir.join("usage.txt"))?;

    let stmts = split_statements(&stmts_text);
    let tids = parse_tids(&tid_text)?;
    let roles = parse_usages(&usage_text)?;

    if stmts.len() != tids.len() || stmts.len() != roles.len() {
        return Err(ReproducerError::LineCountMismatch {
            stmts: stmts.len(),
            tid: tids.len(),
            usage: roles.len(),
        });
    }

    Ok(ReproducerFiles { stmts, tids, roles })
}

/// Writes `queue` to `dir` as the three-file reproducer layout, creating
/// `dir` if it doesn't exist yet. `target_table` is not part of the
/// on-disk format and is dropped; a replayed reproducer re-derives
/// version-set edges without it.
pub fn write_reproducer(dir: &Path, queue: &[InstrumentedStmt]) -> Result<(), ReproducerError> {
    fs::create_dir_all(dir)?;

    let mut stmts_buf = String::new();
    let mut tid_buf = String::new();
    let mut usage_buf = String::new();
    for stmt in queue {
        let text = stmt.text.trim().trim_end_matches(';');
        stmts_buf.push_str(text);
        stmts_buf.push_str(";\n\n");
        tid_buf.push_str(&stmt.txn.0.to_string());
        tid_buf.push('\n');
        usage_buf.push_str(&stmt.role.as_usage_code().to_string());
        usage_buf.push('\n');
    }

    fs::write(dir.join("stmts.sql"), stmts_buf)?;
    fs::write(dir.join("tid.txt"), tid_buf)?;
    fs::write(dir.join("usage.txt"), usage_buf)?;
    Ok(())
}

/// Rebuilds an [`InstrumentedStmt`] queue from a parsed reproducer; every
/// `target_table` comes back `None` since the on-disk format doesn't carry
/// it.
pub fn to_queue(files: &ReproducerFiles) -> Vec<InstrumentedStmt> {
    files
        .stmts
        .iter()
        .zip(&files.tids)
        .zip(&files.roles)
        .map(|((text, &tid), &role)| InstrumentedStmt {
            text: text.clone(),
            txn: TxnId(tid),
            role,
            target_table: None,
        })
        .collect()
}

fn split_statements(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| chunk.trim_end_matches(';').trim().to_string())
        .collect()
}

fn parse_tids(text: &str) -> Result<Vec<u32>, ReproducerError> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(line, raw)| {
            raw.trim()
                .parse::<u32>()
                .map_err(|_| ReproducerError::InvalidTransactionId { line, text: raw.to_string() })
        })
        .collect()
}

fn parse_usages(text: &str) -> Result<Vec<Role>, ReproducerError> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(line, raw)| {
            let code: u8 = raw
                .trim()
                .parse()
                .map_err(|_| ReproducerError::InvalidUsageCode { line, code: u8::MAX })?;
            Role::from_usage_code(code).ok_or(ReproducerError::InvalidUsageCode { line, code })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn stmt(text: &str, tid: u32, role: Role) -> InstrumentedStmt {
        InstrumentedStmt { text: text.to_string(), txn: TxnId(tid), role, target_table: None }
    }

    #[test]
    fn round_trips_through_a_temp_directory() {
        let dir = tempfile::tempdir().unwrap();
        let queue = vec![
            stmt("INSERT INTO t VALUES (1, 0, 10)", 0, Role::InsertWrite),
            stmt("SELECT * FROM t WHERE wkey = 1", 1, Role::SelectRead),
        ];
        write_reproducer(dir.path(), &queue).unwrap();
        let files = read_reproducer(dir.path()).unwrap();
        let restored = to_queue(&files);

        assert_eq!(restored.len(), 2);
        assert_eq!(restored[0].txn, TxnId(0));
        assert_eq!(restored[0].role, Role::InsertWrite);
        assert_eq!(restored[1].role, Role::SelectRead);
        assert!(restored[0].text.contains("INSERT INTO t"));
    }

    #[test]
    fn mismatched_line_counts_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("stmts.sql"), "SELECT 1;\n\nSELECT 2;\n\n").unwrap();
        fs::write(dir.path().join("tid.txt"), "0\n").unwrap();
        fs::write(dir.path().join("usage.txt"), "1\n1\n").unwrap();
        let err = read_reproducer(dir.path()).unwrap_err();
        assert!(matches!(err, ReproducerError::LineCountMismatch { .. }));
    }

    #[test]
    fn out_of_range_usage_code_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("stmts.sql"), "SELECT 1;\n\n").unwrap();
        fs::write(dir.path().join("tid.txt"), "0\n").unwrap();
        fs::write(dir.path().join("usage.txt"), "9\n").unwrap();
        let err = read_reproducer(dir.path()).unwrap_err();
        assert!(matches!(err, ReproducerError::InvalidUsageCode { code: 9, .. }));
    }

    #[test]
    fn empty_dir_path_is_accepted_by_create_dir_all() {
        let base = tempfile::tempdir().unwrap();
        let nested: PathBuf = base.path().join("nested").join("deeper");
        write_reproducer(&nested, &[]).unwrap();
        assert!(nested.join("stmts.sql").exists());
    }
}
