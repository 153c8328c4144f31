use isofuzz_catalog::{Catalog, Scope, Type, VERSION_COLUMN, WKEY_COLUMN};
use isofuzz_random::RandomSource;
use smol_str::SmolStr;

use crate::DEFAULT_RETRY_BUDGET;
use crate::context::GenContext;
use crate::error::GenError;
use crate::query::{self, QuerySpec};

#[derive(Debug, Clone)]
pub enum AlterAction {
    RenameTable { new_name: SmolStr },
    RenameColumn { old_name: SmolStr, new_name: SmolStr },
    AddColumn { name: SmolStr, ty: SmolStr },
}

#[derive(Debug, Clone)]
pub enum DdlStmt {
    CreateTable { name: SmolStr, columns: Vec<(SmolStr, SmolStr)> },
    CreateTableAsSelect { name: SmolStr, query: QuerySpec },
    AlterTable { table: SmolStr, action: AlterAction },
}

impl DdlStmt {
    pub fn render(&self) -> String {
        match self {
            DdlStmt::CreateTable { name, columns } => {
                let cols: Vec<String> = columns
                    .iter()
                    .enumerate()
                    .map(|(i, (n, t))| {
                        if i == 0 {
                            format!("{n} {t} PRIMARY KEY")
                        } else {
                            format!("{n} {t}")
                        }
                    })
                    .collect();
                format!("CREATE TABLE {name} ({})", cols.join(", "))
            }
            DdlStmt::CreateTableAsSelect { name, query } => {
                format!("CREATE TABLE {name} AS {}", query.render())
            }
            DdlStmt::AlterTable { table, action } => match action {
                AlterAction::RenameTable { new_name } => format!("ALTER TABLE {table} RENAME TO {new_name}"),
                AlterAction::RenameColumn { old_name, new_name } => {
                    format!("ALTER TABLE {table} RENAME COLUMN {old_name} TO {new_name}")
                }
                AlterAction::AddColumn { name, ty } => format!("ALTER TABLE {table} ADD COLUMN {name} {ty}"),
            },
        }
    }
}

/// Non-pseudo, non-internal/array scalar types a generated column may use.
fn concrete_column_types(catalog: &Catalog) -> Vec<&Type> {
    catalog
        .types()
        .iter()
        .filter(|t| t.kind.is_scalar() && !t.is_forbidden_in_signatures())
        .collect()
}

/// Every generated table gets `wkey` (integer primary key) and
/// `write_op_id` (integer version column) first, per the row-identity
/// contract the analyzer and instrumentor both depend on.
pub fn generate_create_table(
    catalog: &Catalog,
    rng: &mut dyn RandomSource,
) -> Result<DdlStmt, GenError> {
    let int_ty = catalog.type_by_name("int").ok_or(GenError::TryAgain)?;
    let scalar_types = concrete_column_types(catalog);
    if scalar_types.is_empty() {
        return Err(GenError::TryAgain);
    }
    let name: SmolStr = rng.random_identifier("tbl").into();
    let mut columns = vec![
        (SmolStr::from(WKEY_COLUMN), int_ty.name.clone()),
        (SmolStr::from(VERSION_COLUMN), int_ty.name.clone()),
    ];
    let extra = rng.dx(4);
    for _ in 0..extra {
        let ty = scalar_types[rng.dx(scalar_types.len() as u32) as usize - 1];
        columns.push((rng.random_identifier("col").into(), ty.name.clone()));
    }
    Ok(DdlStmt::CreateTable { name, columns })
}

pub fn generate_create_table_as_select(
    catalog: &Catalog,
    ctx: &mut GenContext,
    rng: &mut dyn RandomSource,
) -> Result<DdlStmt, GenError> {
    let name: SmolStr = rng.random_identifier("tbl").into();
    let query = query::generate(catalog, &Scope::new(), ctx, rng, DEFAULT_RETRY_BUDGET)?;
    Ok(DdlStmt::CreateTableAsSelect { name, query })
}

pub fn generate_alter_table(catalog: &Catalog, rng: &mut dyn RandomSource) -> Result<DdlStmt, GenError> {
    let tables: Vec<_> = catalog.base_tables().collect();
    if tables.is_empty() {
        return Err(GenError::TryAgain);
    }
    let table = tables[rng.dx(tables.len() as u32) as usize - 1];
    let action = match rng.dx(3) {
        1 => AlterAction::RenameTable { new_name: rng.random_identifier("tbl").into() },
        2 => {
            let col = &table.columns[rng.dx(table.columns.len() as u32) as usize - 1];
            AlterAction::RenameColumn { old_name: col.name.clone(), new_name: rng.random_identifier("col").into() }
        }
        _ => {
            let scalar_types = concrete_column_types(catalog);
            if scalar_types.is_empty() {
                return Err(GenError::TryAgain);
            }
            let ty = scalar_types[rng.dx(scalar_types.len() as u32) as usize - 1];
            AlterAction::AddColumn { name: rng.random_identifier("col").into(), ty: ty.name.clone() }
        }
    };
    Ok(DdlStmt::AlterTable { table: table.name.clone(), action })
}

#[cfg(test)]
mod tests {
    use super::*;
    use isofuzz_catalog::{CatalogBuilder, Type};
    use isofuzz_random::SeededSource;

    fn catalog() -> Catalog {
        let mut b = CatalogBuilder::new();
        b.register_type(Type::scalar("int"));
        b.register_type(Type::scalar("text"));
        b.build().unwrap()
    }

    #[test]
    fn created_table_starts_with_wkey_primary_key() {
        let cat = catalog();
        let mut rng = SeededSource::new(6);
        let stmt = generate_create_table(&cat, &mut rng).unwrap();
        if let DdlStmt::CreateTable { columns, .. } = &stmt {
            assert_eq!(columns[0].0, WKEY_COLUMN);
            assert_eq!(columns[1].0, VERSION_COLUMN);
        } else {
            panic!("expected create table");
        }
        assert!(stmt.render().contains("wkey int PRIMARY KEY") || stmt.render().contains("PRIMARY KEY"));
    }
}
