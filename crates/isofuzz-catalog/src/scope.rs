use smol_str::SmolStr;

use crate::types::{Column, Table};

/// A relation visible in the current statement: either a base table/view
/// straight from the catalog, or an aliased sub-query result with its own
/// column list.
#[derive(Debug, Clone)]
pub struct VisibleRelation {
    pub alias: SmolStr,
    pub underlying_name: SmolStr,
    pub columns: Vec<Column>,
    pub is_base_table: bool,
    pub is_insertable: bool,
}

impl VisibleRelation {
    pub fn from_table(table: &Table) -> Self {
        VisibleRelation {
            alias: table.name.clone(),
            underlying_name: table.name.clone(),
            columns: table.columns.clone(),
            is_base_table: table.is_base_table,
            is_insertable: table.is_insertable,
        }
    }
}

/// A `relation.column` binding visible in the current statement.
#[derive(Debug, Clone)]
pub struct VisibleColumn {
    pub relation_alias: SmolStr,
    pub column: Column,
}

/// Per-statement lexical environment threaded through production
/// construction: which relations and columns are currently visible, and a
/// counter used to mint unique aliases (`ref_N`, `subq_N`, `target_N`, ...).
///
/// A `Scope` is built fresh for every statement and dropped with its
/// production tree; it never outlives the statement it was built for.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    relations: Vec<VisibleRelation>,
    columns: Vec<VisibleColumn>,
    next_id: u64,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_relation(&mut self, table: Table) {
        let rel = VisibleRelation::from_table(&table);
        for col in &rel.columns {
            self.columns.push(VisibleColumn {
                relation_alias: rel.alias.clone(),
                column: col.clone(),
            });
        }
        self.relations.push(rel);
    }

    pub fn add_aliased_relation(&mut self, rel: VisibleRelation) {
        for col in &rel.columns {
            self.columns.push(VisibleColumn {
                relation_alias: rel.alias.clone(),
                column: col.clone(),
            });
        }
        self.relations.push(rel);
    }

    pub fn relations(&self) -> &[VisibleRelation] {
        &self.relations
    }

    pub fn columns(&self) -> &[VisibleColumn] {
        &self.columns
    }

    pub fn columns_of_type<'a>(&'a self, ty: &'a str) -> impl Iterator<Item = &'a VisibleColumn> {
        self.columns.iter().filter(move |c| c.column.ty == ty)
    }

    /// Remove a relation (and its columns) from visibility, by alias. Used
    /// by `delete`/`update`/`insert` so that the target table cannot be read
    /// back through the same alias inside the statement's own predicate.
    pub fn remove_relation(&mut self, alias: &str) {
        self.relations.retain(|r| r.alias != alias);
        self.columns.retain(|c| c.relation_alias != alias);
    }

    /// A fresh, statement-unique identifier with the given prefix, e.g.
    /// `scope.fresh_alias("ref")` -> `"ref_3"`.
    pub fn fresh_alias(&mut self, prefix: &str) -> SmolStr {
        let id = self.next_id;
        self.next_id += 1;
        SmolStr::from(format!("{prefix}_{id}"))
    }

    /// A scope that additionally sees `extra`'s relations/columns; used for
    /// join conditions and CTE bodies built over an extended environment.
    pub fn extended_with(&self, extra: &Scope) -> Scope {
        let mut merged = self.clone();
        merged.relations.extend(extra.relations.iter().cloned());
        merged.columns.extend(extra.columns.iter().cloned());
        merged.next_id = merged.next_id.max(extra.next_id);
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Column;

    #[test]
    fn fresh_alias_is_monotonic_within_one_scope() {
        let mut scope = Scope::new();
        assert_eq!(scope.fresh_alias("ref"), "ref_0");
        assert_eq!(scope.fresh_alias("ref"), "ref_1");
        assert_eq!(scope.fresh_alias("subq"), "subq_2");
    }

    #[test]
    fn remove_relation_drops_its_columns() {
        let mut scope = Scope::new();
        scope.add_relation(Table::base(
            "t",
            "public",
            vec![Column::new("wkey", "int"), Column::new("v", "int")],
        ));
        assert_eq!(scope.columns().len(), 2);
        scope.remove_relation("t");
        assert!(scope.relations().is_empty());
        assert!(scope.columns().is_empty());
    }
}
