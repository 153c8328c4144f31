//! Rewrites a sequence of `(statement, transaction)` pairs into a longer
//! sequence of role-tagged observation statements, so the effect of every
//! write and every read is observable at the row level by the analyzer.

mod error;
mod role;
mod scan;

pub use error::InstrumentError;
pub use role::Role;

use isofuzz_catalog::{Catalog, VERSION_COLUMN, WKEY_COLUMN};
use smol_str::SmolStr;

/// Identifies one of the concurrent transactions in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxnId(pub u32);

/// Index of a statement within the *instrumented* queue.
pub type StmtIdx = usize;

/// One statement in the instrumented queue: its text, which transaction it
/// belongs to, and its role.
#[derive(Debug, Clone)]
pub struct InstrumentedStmt {
    pub text: String,
    pub txn: TxnId,
    pub role: Role,
    /// The affected base table, for every role except `Init` and plain
    /// reads with no single target (always `Some` for write roles and
    /// their instrumentation).
    pub target_table: Option<SmolStr>,
}

/// One statement submitted by the caller, prior to instrumentation.
#[derive(Debug, Clone)]
pub struct PlannedStmt {
    pub text: String,
    pub txn: TxnId,
}

impl PlannedStmt {
    pub fn new(text: impl Into<String>, txn: TxnId) -> Self {
        PlannedStmt {
            text: text.into(),
            txn,
        }
    }
}

/// Rewrite `plan` into the instrumented queue described in the module docs.
pub fn instrument(
    catalog: &Catalog,
    plan: &[PlannedStmt],
) -> Result<Vec<InstrumentedStmt>, InstrumentError> {
    let mut out = Vec::with_capacity(plan.len() * 2);
    for planned in plan {
        instrument_one(catalog, planned, &mut out)?;
    }
    Ok(out)
}

fn instrument_one(
    catalog: &Catalog,
    planned: &PlannedStmt,
    out: &mut Vec<InstrumentedStmt>,
) -> Result<(), InstrumentError> {
    let txn = planned.txn;
    match scan::classify(&planned.text) {
        scan::Classified::TxnDelimiter => {
            out.push(InstrumentedStmt {
                text: planned.text.clone(),
                txn,
                role: Role::Init,
                target_table: None,
            });
        }
        scan::Classified::Update { table, set_list, predicate } => {
            require_wkey_and_version(catalog, &table)?;
            push_version_set_reads(catalog, &planned.text, &table, txn, out);
            out.push(InstrumentedStmt {
                text: format!("SELECT * FROM {table} WHERE {predicate}"),
                txn,
                role: Role::BeforeWriteRead,
                target_table: Some(table.clone()),
            });
            out.push(InstrumentedStmt {
                text: planned.text.clone(),
                txn,
                role: Role::UpdateWrite,
                target_table: Some(table.clone()),
            });
            // The new wkey value comes from the update's own set list, not
            // the where-clause literal: an update is free to reassign wkey,
            // so the two can differ.
            let new_wkey = scan::extract_set_wkey(&set_list).ok_or_else(|| {
                InstrumentError::UnrecognizedStatement(planned.text.clone())
            })?;
            out.push(InstrumentedStmt {
                text: format!("SELECT * FROM {table} WHERE {WKEY_COLUMN} = {new_wkey}"),
                txn,
                role: Role::AfterWriteRead,
                target_table: Some(table),
            });
        }
        scan::Classified::Delete { table, predicate } => {
            require_wkey_and_version(catalog, &table)?;
            push_version_set_reads(catalog, &planned.text, &table, txn, out);
            out.push(InstrumentedStmt {
                text: format!("SELECT * FROM {table} WHERE {predicate}"),
                txn,
                role: Role::BeforeWriteRead,
                target_table: Some(table.clone()),
            });
            out.push(InstrumentedStmt {
                text: planned.text.clone(),
                txn,
                role: Role::DeleteWrite,
                target_table: Some(table),
            });
        }
        scan::Classified::Insert { table } => {
            require_wkey_and_version(catalog, &table)?;
            push_version_set_reads(catalog, &planned.text, &table, txn, out);
            out.push(InstrumentedStmt {
                text: planned.text.clone(),
                txn,
                role: Role::InsertWrite,
                target_table: Some(table.clone()),
            });
            let wkey_index = catalog
                .table_by_name(&table)
                .and_then(|t| t.wkey_index())
                .expect("checked by require_wkey_and_version");
            let wkey = scan::extract_inserted_wkey(&planned.text, wkey_index).ok_or_else(|| {
                InstrumentError::UnrecognizedStatement(planned.text.clone())
            })?;
            out.push(InstrumentedStmt {
                text: format!("SELECT * FROM {table} WHERE {WKEY_COLUMN} = {wkey}"),
                txn,
                role: Role::AfterWriteRead,
                target_table: Some(table),
            });
        }
        scan::Classified::Read => {
            for table in scan::referenced_tables(catalog, &planned.text) {
                out.push(InstrumentedStmt {
                    text: format!("SELECT * FROM {table}"),
                    txn,
                    role: Role::VersionSetRead,
                    target_table: Some(table),
                });
            }
            out.push(InstrumentedStmt {
                text: planned.text.clone(),
                txn,
                role: Role::SelectRead,
                target_table: None,
            });
        }
    }
    Ok(())
}

fn push_version_set_reads(
    catalog: &Catalog,
    text: &str,
    target: &str,
    txn: TxnId,
    out: &mut Vec<InstrumentedStmt>,
) {
    for table in scan::referenced_tables(catalog, text) {
        if table == target {
            continue;
        }
        out.push(InstrumentedStmt {
            text: format!("SELECT * FROM {table}"),
            txn,
            role: Role::VersionSetRead,
            target_table: Some(table),
        });
    }
}

fn require_wkey_and_version(catalog: &Catalog, table: &str) -> Result<(), InstrumentError> {
    let Some(t) = catalog.table_by_name(table) else {
        return Err(InstrumentError::UnknownTable(table.into()));
    };
    if t.column(WKEY_COLUMN).is_none() {
        return Err(InstrumentError::MissingWkey(table.into()));
    }
    if t.column(VERSION_COLUMN).is_none() {
        return Err(InstrumentError::MissingVersionColumn(table.into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use isofuzz_catalog::{CatalogBuilder, Column, Table, Type};

    fn catalog() -> Catalog {
        let mut b = CatalogBuilder::new();
        b.register_type(Type::scalar("int"));
        b.register_table(Table::base(
            "accounts",
            "public",
            vec![
                Column::new("wkey", "int"),
                Column::new("write_op_id", "int"),
                Column::new("balance", "int"),
            ],
        ));
        b.register_table(Table::base(
            "audit",
            "public",
            vec![Column::new("wkey", "int"), Column::new("write_op_id", "int")],
        ));
        b.build().unwrap()
    }

    #[test]
    fn update_gets_before_and_after_reads() {
        let cat = catalog();
        let plan = vec![PlannedStmt::new(
            "UPDATE accounts SET wkey = 1, balance = 5 WHERE wkey = 1",
            TxnId(0),
        )];
        let out = instrument(&cat, &plan).unwrap();
        let roles: Vec<Role> = out.iter().map(|s| s.role).collect();
        assert_eq!(roles, vec![Role::BeforeWriteRead, Role::UpdateWrite, Role::AfterWriteRead]);
        assert!(out[2].text.contains("wkey = 1"));
    }

    #[test]
    fn update_reassigning_wkey_reads_after_state_at_the_new_wkey() {
        let cat = catalog();
        let plan = vec![PlannedStmt::new(
            "UPDATE accounts SET wkey = 9, balance = 5 WHERE wkey = 1",
            TxnId(0),
        )];
        let out = instrument(&cat, &plan).unwrap();
        assert_eq!(out[0].text, "SELECT * FROM accounts WHERE wkey = 1");
        assert_eq!(out[2].text, "SELECT * FROM accounts WHERE wkey = 9");
    }

    #[test]
    fn update_missing_wkey_in_set_list_is_unrecognized() {
        let cat = catalog();
        let plan = vec![PlannedStmt::new(
            "UPDATE accounts SET balance = 5 WHERE wkey = 1",
            TxnId(0),
        )];
        let err = instrument(&cat, &plan).unwrap_err();
        assert!(matches!(err, InstrumentError::UnrecognizedStatement(_)));
    }

    #[test]
    fn insert_gets_after_read_with_inserted_wkey() {
        let cat = catalog();
        let plan = vec![PlannedStmt::new(
            "INSERT INTO accounts (wkey, write_op_id, balance) VALUES (7, 0, 100)",
            TxnId(0),
        )];
        let out = instrument(&cat, &plan).unwrap();
        let roles: Vec<Role> = out.iter().map(|s| s.role).collect();
        assert_eq!(roles, vec![Role::InsertWrite, Role::AfterWriteRead]);
        assert!(out[1].text.contains("wkey = 7"));
    }

    #[test]
    fn delete_gets_before_read_only() {
        let cat = catalog();
        let plan = vec![PlannedStmt::new("DELETE FROM accounts WHERE wkey = 1", TxnId(0))];
        let out = instrument(&cat, &plan).unwrap();
        let roles: Vec<Role> = out.iter().map(|s| s.role).collect();
        assert_eq!(roles, vec![Role::BeforeWriteRead, Role::DeleteWrite]);
    }

    #[test]
    fn plain_select_gets_version_set_reads_first() {
        let cat = catalog();
        let plan = vec![PlannedStmt::new("SELECT * FROM accounts WHERE balance > 0", TxnId(0))];
        let out = instrument(&cat, &plan).unwrap();
        assert_eq!(out.last().unwrap().role, Role::SelectRead);
        assert!(out[..out.len() - 1]
            .iter()
            .all(|s| s.role == Role::VersionSetRead));
    }

    #[test]
    fn txn_delimiter_is_passed_through_as_init() {
        let cat = catalog();
        let plan = vec![PlannedStmt::new("BEGIN", TxnId(0))];
        let out = instrument(&cat, &plan).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].role, Role::Init);
    }

    #[test]
    fn missing_wkey_is_a_hard_error() {
        let mut b = CatalogBuilder::new();
        b.register_type(Type::scalar("int"));
        b.register_table(Table::base("t", "public", vec![Column::new("v", "int")]));
        let cat = b.build().unwrap();
        let plan = vec![PlannedStmt::new("UPDATE t SET v = 1 WHERE v = 0", TxnId(0))];
        let err = instrument(&cat, &plan).unwrap_err();
        assert!(matches!(err, InstrumentError::MissingWkey(_)));
    }

    #[test]
    fn role_statement_count_matches_originals() {
        let cat = catalog();
        let plan = vec![
            PlannedStmt::new("BEGIN", TxnId(0)),
            PlannedStmt::new(
                "INSERT INTO accounts (wkey, write_op_id, balance) VALUES (1, 0, 10)",
                TxnId(0),
            ),
            PlannedStmt::new("SELECT * FROM accounts WHERE wkey = 1", TxnId(0)),
            PlannedStmt::new("COMMIT", TxnId(0)),
        ];
        let out = instrument(&cat, &plan).unwrap();
        let primary_count = out
            .iter()
            .filter(|s| {
                matches!(
                    s.role,
                    Role::Init
                        | Role::SelectRead
                        | Role::UpdateWrite
                        | Role::InsertWrite
                        | Role::DeleteWrite
                )
            })
            .count();
        assert_eq!(primary_count, plan.len());
    }
}
