/// Tags an instrumented statement with what it's *for*. The three
/// instrumentation-only roles (`BeforeWriteRead`, `AfterWriteRead`,
/// `VersionSetRead`) are the observation statements injected around a user
/// write or read; the rest are user-authored statements passed through.
///
/// The discriminants are part of the on-disk `usage.txt` reproducer format
/// (`isofuzz-reproducer`) and must not be reordered.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::FromRepr,
    strum_macros::IntoStaticStr,
    strum_macros::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum Role {
    Init = 0,
    SelectRead = 1,
    UpdateWrite = 2,
    InsertWrite = 3,
    DeleteWrite = 4,
    BeforeWriteRead = 5,
    AfterWriteRead = 6,
    VersionSetRead = 7,
}

impl Role {
    /// True for the three read roles injected around a write.
    pub fn is_instrumentation(self) -> bool {
        matches!(self, Role::BeforeWriteRead | Role::AfterWriteRead | Role::VersionSetRead)
    }

    pub fn is_write(self) -> bool {
        matches!(self, Role::UpdateWrite | Role::InsertWrite | Role::DeleteWrite)
    }

    pub fn as_usage_code(self) -> u8 {
        self as u8
    }

    pub fn from_usage_code(code: u8) -> Option<Role> {
        Role::from_repr(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_code_round_trips_over_the_closed_range() {
        for code in 0..=7u8 {
            let role = Role::from_usage_code(code).unwrap();
            assert_eq!(role.as_usage_code(), code);
        }
        assert!(Role::from_usage_code(8).is_none());
    }

    #[test]
    fn only_the_three_injected_reads_are_instrumentation() {
        assert!(Role::BeforeWriteRead.is_instrumentation());
        assert!(Role::AfterWriteRead.is_instrumentation());
        assert!(Role::VersionSetRead.is_instrumentation());
        assert!(!Role::SelectRead.is_instrumentation());
        assert!(!Role::Init.is_instrumentation());
    }
}
