use fancy_regex::Regex;
use isofuzz_catalog::Catalog;
use smol_str::SmolStr;
use std::sync::OnceLock;

pub enum Classified {
    TxnDelimiter,
    Update { table: SmolStr, set_list: String, predicate: String },
    Delete { table: SmolStr, predicate: String },
    Insert { table: SmolStr },
    Read,
}

fn update_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^\s*UPDATE\s+(\w+)\s+SET\s+(.*?)\bWHERE\b\s+(.*)$").unwrap()
    })
}

fn delete_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)^\s*DELETE\s+FROM\s+(\w+)\s+WHERE\s+(.*)$").unwrap())
}

fn insert_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)^\s*INSERT\s+INTO\s+(\w+)").unwrap())
}

fn txn_delimiter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*(BEGIN|COMMIT|ROLLBACK)\b").unwrap())
}

/// Classify a statement's shape from its text alone, the way the real
/// instrumentor does: no general SQL parse, just enough pattern matching to
/// know which observation statements to wrap it with.
pub fn classify(stmt: &str) -> Classified {
    let trimmed = stmt.trim();
    if txn_delimiter_re().is_match(trimmed).unwrap_or(false) {
        return Classified::TxnDelimiter;
    }
    if let Ok(Some(caps)) = update_re().captures(trimmed) {
        return Classified::Update {
            table: SmolStr::from(caps.get(1).unwrap().as_str()),
            set_list: caps.get(2).unwrap().as_str().trim().to_string(),
            predicate: caps.get(3).unwrap().as_str().trim_end_matches(';').to_string(),
        };
    }
    if let Ok(Some(caps)) = delete_re().captures(trimmed) {
        return Classified::Delete {
            table: SmolStr::from(caps.get(1).unwrap().as_str()),
            predicate: caps.get(2).unwrap().as_str().trim_end_matches(';').to_string(),
        };
    }
    if let Ok(Some(caps)) = insert_re().captures(trimmed) {
        return Classified::Insert {
            table: SmolStr::from(caps.get(1).unwrap().as_str()),
        };
    }
    Classified::Read
}

/// Every catalog base table whose name appears as a whole word in `text`,
/// in first-appearance order.
pub fn referenced_tables(catalog: &Catalog, text: &str) -> Vec<SmolStr> {
    let mut found = Vec::new();
    for table in catalog.base_tables() {
        if word_occurs(text, &table.name) {
            found.push(table.name.clone());
        }
    }
    found
}

fn word_occurs(text: &str, word: &str) -> bool {
    let bytes = text.as_bytes();
    let wb = word.as_bytes();
    if wb.is_empty() {
        return false;
    }
    let mut start = 0;
    while let Some(pos) = find_ci(&text[start..], word) {
        let abs = start + pos;
        let before_ok = abs == 0 || !is_word_byte(bytes[abs - 1]);
        let after = abs + wb.len();
        let after_ok = after >= bytes.len() || !is_word_byte(bytes[after]);
        if before_ok && after_ok {
            return true;
        }
        start = abs + 1;
        if start >= text.len() {
            break;
        }
    }
    false
}

fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    let haystack_lower = haystack.to_ascii_lowercase();
    let needle_lower = needle.to_ascii_lowercase();
    haystack_lower.find(&needle_lower)
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Find the update's own `wkey = <expr>` assignment within its SET list and
/// return the expression text verbatim, the way the instrumentor reuses the
/// set list's own value node rather than re-deriving it from the predicate.
/// Every SET list is required to assign `wkey`, since a row-identity-changing
/// update is generated exactly like any other column assignment.
pub fn extract_set_wkey(set_list: &str) -> Option<String> {
    for assignment in split_top_level(set_list, ',') {
        let assignment = assignment.trim();
        let eq = assignment.find('=')?;
        let (name, expr) = assignment.split_at(eq);
        if name.trim().eq_ignore_ascii_case("wkey") {
            return Some(expr[1..].trim().to_string());
        }
    }
    None
}

fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (idx, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            c if c == sep && depth == 0 => {
                out.push(&text[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    out.push(&text[start..]);
    out
}

/// Pull the first positional `wkey` value out of an
/// `INSERT INTO t (wkey, ...) VALUES (v, ...)` or
/// `INSERT INTO t VALUES (v, ...)` statement, given the table's wkey index
/// in its declared column order.
pub fn extract_inserted_wkey(text: &str, wkey_index: usize) -> Option<i64> {
    let open = text.find('(')?;
    let values_start = if let Some(values_kw) = find_ci(&text[open..], "values") {
        let abs = open + values_kw;
        text[abs..].find('(')? + abs
    } else {
        open
    };
    let close = text[values_start..].find(')')? + values_start;
    let inner = &text[values_start + 1..close];
    let value = inner.split(',').nth(wkey_index)?.trim();
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_update() {
        match classify("UPDATE t SET v = 1 WHERE wkey = 1") {
            Classified::Update { table, set_list, predicate } => {
                assert_eq!(table, "t");
                assert_eq!(set_list, "v = 1");
                assert_eq!(predicate, "wkey = 1");
            }
            _ => panic!("expected update"),
        }
    }

    #[test]
    fn extracts_set_wkey_from_set_list() {
        assert_eq!(extract_set_wkey("wkey = 9, v = 1"), Some("9".to_string()));
        assert_eq!(extract_set_wkey("v = 1, wkey = wkey + 1"), Some("wkey + 1".to_string()));
        assert_eq!(extract_set_wkey("v = 1"), None);
    }

    #[test]
    fn classifies_txn_delimiters_case_insensitively() {
        assert!(matches!(classify("begin"), Classified::TxnDelimiter));
        assert!(matches!(classify("  COMMIT  "), Classified::TxnDelimiter));
        assert!(matches!(classify("RollBack"), Classified::TxnDelimiter));
    }

    #[test]
    fn word_occurs_respects_boundaries() {
        assert!(word_occurs("SELECT * FROM accounts", "accounts"));
        assert!(!word_occurs("SELECT * FROM accounts_history", "accounts"));
    }
}
