use isofuzz_dut::Row;

/// FNV-offset-seeded rolling hash over a row's canonical byte encoding.
/// Deliberately simple (not a cryptographic hash): the analyzer only needs
/// two rows with the same content to collide and two rows with different
/// content to not, not resistance to an adversary.
pub fn row_hash(row: &Row) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for value in row {
        for byte in value.stable_bytes() {
            hash = hash.wrapping_mul(131).wrapping_add(u64::from(byte));
        }
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use isofuzz_dut::SqlValue;

    #[test]
    fn identical_rows_hash_identically() {
        let a = vec![SqlValue::Int(1), SqlValue::Text("x".into())];
        let b = vec![SqlValue::Int(1), SqlValue::Text("x".into())];
        assert_eq!(row_hash(&a), row_hash(&b));
    }

    #[test]
    fn differing_rows_hash_differently() {
        let a = vec![SqlValue::Int(1)];
        let b = vec![SqlValue::Int(2)];
        assert_ne!(row_hash(&a), row_hash(&b));
    }
}
