use isofuzz_catalog::{Catalog, CatalogBuilder, Column, Table, Type};
use isofuzz_dut::MemoryDut;
use isofuzz_grammar::ddl::{self, DdlStmt};
use isofuzz_random::RandomSource;

use crate::config::RunConfig;
use crate::error::CoreError;

const BASE_TYPES: &[&str] = &["int", "text", "bool", "real"];

/// Generates `config.table_count` base tables (via the same DDL generator
/// the grammar uses elsewhere) and registers each directly against `dut`,
/// bypassing `Dut::execute` — schema setup is a one-time fixture step, not
/// part of the statement-level contract every driver implements.
pub fn build_schema(
    config: &RunConfig,
    rng: &mut dyn RandomSource,
    dut: &mut MemoryDut,
) -> Result<Catalog, CoreError> {
    let mut catalog = {
        let mut builder = CatalogBuilder::new();
        for name in BASE_TYPES {
            builder.register_type(Type::scalar(name));
        }
        builder.build()?
    };

    for _ in 0..config.table_count {
        let stmt = ddl::generate_create_table(&catalog, rng)?;
        let DdlStmt::CreateTable { name, columns } = &stmt else {
            unreachable!("generate_create_table always returns CreateTable");
        };

        let column_names: Vec<&str> = columns.iter().map(|(n, _)| n.as_str()).collect();
        dut.create_table(name, &column_names);

        let table_columns: Vec<Column> = columns.iter().map(|(n, t)| Column::new(n, t)).collect();
        let mut builder = CatalogBuilder::new();
        for ty in catalog.types() {
            builder.register_type(ty.clone());
        }
        for table in catalog.tables() {
            builder.register_table(table.clone());
        }
        builder.register_table(Table::base(name, "public", table_columns));
        catalog = builder.build()?;
    }

    Ok(catalog)
}
