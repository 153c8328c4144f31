//! In-memory SQL catalog: types, tables, columns, operators and routines,
//! plus the type-indexed lookup structures the random generator needs on
//! its hot path.

mod builder;
mod error;
mod scope;
mod types;

pub use builder::CatalogBuilder;
pub use error::CatalogError;
pub use scope::{Scope, VisibleColumn, VisibleRelation};
pub use types::{Aggregate, Column, Operator, Routine, Table, Type, TypeKind, WindowFunction};

use ahash::AHashMap;
use smol_str::SmolStr;

/// A column forbidden as a function argument/result type in generated code.
pub const INTERNAL_TYPE: &str = "internal";
/// A column forbidden as a function argument/result type in generated code.
pub const ARRAY_TYPE: &str = "array";
/// Every generated base table's primary key column.
pub const WKEY_COLUMN: &str = "wkey";
/// Every generated base table's version column, advanced on each write.
pub const VERSION_COLUMN: &str = "write_op_id";

/// The closed union of catalog objects, immutable once built.
///
/// A `Catalog` can only be produced by [`CatalogBuilder::build`], which is
/// the one place the type-keyed indices get populated. There is no public
/// mutator past that point.
#[derive(Debug)]
pub struct Catalog {
    types: Vec<Type>,
    tables: Vec<Table>,
    operators: Vec<Operator>,
    routines: Vec<Routine>,
    aggregates: Vec<Aggregate>,
    windows: Vec<WindowFunction>,

    type_by_name: AHashMap<SmolStr, usize>,
    table_by_name: AHashMap<SmolStr, usize>,

    tables_with_column_of_type: AHashMap<SmolStr, Vec<usize>>,
    operators_returning_type: AHashMap<SmolStr, Vec<usize>>,
    routines_returning_type: AHashMap<SmolStr, Vec<usize>>,
    aggregates_returning_type: AHashMap<SmolStr, Vec<usize>>,
    windows_returning_type: AHashMap<SmolStr, Vec<usize>>,
    parameterless_routines_returning_type: AHashMap<SmolStr, Vec<usize>>,
}

impl Catalog {
    pub fn types(&self) -> &[Type] {
        &self.types
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }

    pub fn routines(&self) -> &[Routine] {
        &self.routines
    }

    pub fn aggregates(&self) -> &[Aggregate] {
        &self.aggregates
    }

    pub fn windows(&self) -> &[WindowFunction] {
        &self.windows
    }

    pub fn type_by_name(&self, name: &str) -> Option<&Type> {
        self.type_by_name.get(name).map(|&idx| &self.types[idx])
    }

    pub fn table_by_name(&self, name: &str) -> Option<&Table> {
        self.table_by_name.get(name).map(|&idx| &self.tables[idx])
    }

    pub fn tables_with_column_of_type(&self, ty: &str) -> impl Iterator<Item = &Table> {
        self.tables_with_column_of_type
            .get(ty)
            .into_iter()
            .flatten()
            .map(|&idx| &self.tables[idx])
    }

    pub fn operators_returning(&self, ty: &str) -> impl Iterator<Item = &Operator> {
        self.operators_returning_type
            .get(ty)
            .into_iter()
            .flatten()
            .map(|&idx| &self.operators[idx])
    }

    pub fn routines_returning(&self, ty: &str) -> impl Iterator<Item = &Routine> {
        self.routines_returning_type
            .get(ty)
            .into_iter()
            .flatten()
            .map(|&idx| &self.routines[idx])
    }

    pub fn aggregates_returning(&self, ty: &str) -> impl Iterator<Item = &Aggregate> {
        self.aggregates_returning_type
            .get(ty)
            .into_iter()
            .flatten()
            .map(|&idx| &self.aggregates[idx])
    }

    pub fn windows_returning(&self, ty: &str) -> impl Iterator<Item = &WindowFunction> {
        self.windows_returning_type
            .get(ty)
            .into_iter()
            .flatten()
            .map(|&idx| &self.windows[idx])
    }

    pub fn parameterless_routines_returning(&self, ty: &str) -> impl Iterator<Item = &Routine> {
        self.parameterless_routines_returning_type
            .get(ty)
            .into_iter()
            .flatten()
            .map(|&idx| &self.routines[idx])
    }

    /// Every base table and view, in registration order.
    pub fn fill_scope(&self, scope: &mut Scope) {
        for table in &self.tables {
            scope.add_relation(table.clone());
        }
    }

    pub fn base_tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter().filter(|t| t.is_base_table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bool_int_text_builder() -> CatalogBuilder {
        let mut b = CatalogBuilder::new();
        b.register_type(Type::scalar("bool"));
        b.register_type(Type::scalar("int"));
        b.register_type(Type::scalar("real"));
        b.register_type(Type::scalar("text"));
        b.register_type(Type::pseudo("internal"));
        b.register_type(Type::pseudo("array"));
        b
    }

    #[test]
    fn closure_every_indexed_type_resolves() {
        let mut b = bool_int_text_builder();
        b.register_table(Table::base(
            "t",
            "public",
            vec![
                Column::new("wkey", "int"),
                Column::new("write_op_id", "int"),
                Column::new("v", "real"),
            ],
        ));
        b.register_operator(Operator::new("+", "int", "int", "int"));
        let cat = b.build().unwrap();

        for op in cat.operators() {
            assert!(cat.type_by_name(&op.left_type).is_some());
            assert!(cat.type_by_name(&op.right_type).is_some());
            assert!(cat.type_by_name(&op.result_type).is_some());
        }
        for table in cat.tables() {
            for col in &table.columns {
                assert!(cat.type_by_name(&col.ty).is_some());
            }
        }
    }

    #[test]
    fn consistent_is_reflexive() {
        let b = bool_int_text_builder();
        let cat = b.build().unwrap();
        for ty in cat.types() {
            assert!(ty.consistent(ty));
        }
    }

    #[test]
    fn unresolved_operator_type_is_an_error() {
        let mut b = bool_int_text_builder();
        b.register_operator(Operator::new("+", "int", "decimal", "int"));
        let err = b.build().unwrap_err();
        assert!(matches!(err, CatalogError::UnresolvedType { .. }));
    }

    #[test]
    fn tables_with_column_of_type_index() {
        let mut b = bool_int_text_builder();
        b.register_table(Table::base(
            "t",
            "public",
            vec![
                Column::new("wkey", "int"),
                Column::new("write_op_id", "int"),
                Column::new("v", "real"),
            ],
        ));
        let cat = b.build().unwrap();
        let names: Vec<_> = cat
            .tables_with_column_of_type("real")
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["t"]);
        assert_eq!(cat.tables_with_column_of_type("bool").count(), 0);
    }
}
