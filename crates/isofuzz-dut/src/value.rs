use smol_str::SmolStr;

/// A single cell value as observed from the DUT. Deliberately small: the
/// analyzer only ever needs to hash and compare these, never compute with
/// them.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(SmolStr),
}

impl SqlValue {
    /// A stable byte encoding used by the analyzer's row hash. Distinct
    /// values must never produce the same bytes; floats are encoded via
    /// their bit pattern so `-0.0` and `0.0` hash differently, matching the
    /// spec's "permuting the bytes within a field changes the hash"
    /// property even for values a naive `==` would conflate.
    pub fn stable_bytes(&self) -> Vec<u8> {
        match self {
            SqlValue::Null => vec![0],
            SqlValue::Bool(b) => vec![1, u8::from(*b)],
            SqlValue::Int(i) => {
                let mut out = vec![2];
                out.extend_from_slice(&i.to_le_bytes());
                out
            }
            SqlValue::Real(r) => {
                let mut out = vec![3];
                out.extend_from_slice(&r.to_bits().to_le_bytes());
                out
            }
            SqlValue::Text(s) => {
                let mut out = vec![4];
                out.extend_from_slice(s.as_bytes());
                out
            }
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SqlValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// One row as returned by [`crate::Dut::execute`]/[`crate::Dut::get_content`],
/// column order matching the statement's select-list / table definition.
pub type Row = Vec<SqlValue>;
