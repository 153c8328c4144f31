use isofuzz_catalog::{Catalog, Scope, VisibleRelation};
use isofuzz_random::RandomSource;
use smol_str::SmolStr;

use crate::DEFAULT_RETRY_BUDGET;
use crate::bool_expr::{self, BoolExpr};
use crate::context::{GenContext, ProductionKind};
use crate::error::GenError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Cross,
    Inner,
    LeftOuter,
}

impl JoinKind {
    fn keyword(self) -> &'static str {
        match self {
            JoinKind::Cross => "CROSS JOIN",
            JoinKind::Inner => "JOIN",
            JoinKind::LeftOuter => "LEFT OUTER JOIN",
        }
    }
}

#[derive(Debug, Clone)]
pub enum TableRef {
    TableOrQueryName { alias: SmolStr, underlying: SmolStr },
    Joined { kind: JoinKind, left: Box<TableRef>, right: Box<TableRef>, cond: Option<BoolExpr> },
    Subquery { alias: SmolStr, query_text: String },
    Lateral { alias: SmolStr, query_text: String },
    Sample { inner: Box<TableRef>, percent: u32 },
}

impl TableRef {
    pub fn render(&self) -> String {
        match self {
            TableRef::TableOrQueryName { alias, underlying } => {
                if alias == underlying {
                    underlying.to_string()
                } else {
                    format!("{underlying} AS {alias}")
                }
            }
            TableRef::Joined { kind, left, right, cond } => match cond {
                Some(c) => format!("{} {} {} ON {}", left.render(), kind.keyword(), right.render(), c.render()),
                None => format!("{} {} {}", left.render(), kind.keyword(), right.render()),
            },
            TableRef::Subquery { alias, query_text } => format!("({query_text}) AS {alias}"),
            TableRef::Lateral { alias, query_text } => format!("LATERAL ({query_text}) AS {alias}"),
            TableRef::Sample { inner, percent } => format!("{} TABLESAMPLE BERNOULLI ({percent})", inner.render()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Family {
    TableOrQueryName,
    Joined,
    Subquery,
    Sample,
}

fn available_families(catalog: &Catalog) -> Vec<(Family, u32)> {
    let table_count = catalog.tables().len();
    let mut families = vec![
        (Family::TableOrQueryName, if table_count > 0 { 50 } else { 0 }),
        (Family::Joined, if table_count >= 2 { 20 } else { 0 }),
        (Family::Subquery, if table_count > 0 { 15 } else { 0 }),
        (Family::Sample, if table_count > 0 { 5 } else { 0 }),
    ];
    families.retain(|(_, w)| *w > 0);
    families
}

/// Build one FROM-clause relation and register it (and any nested
/// relations) into `scope` so downstream WHERE/select-list productions can
/// see it.
pub fn generate(
    catalog: &Catalog,
    scope: &mut Scope,
    ctx: &mut GenContext,
    rng: &mut dyn RandomSource,
    mut budget: u32,
) -> Result<TableRef, GenError> {
    loop {
        if budget == 0 {
            return Err(GenError::Exhausted { production: "TableRef" });
        }
        budget -= 1;
        let families = available_families(catalog);
        if families.is_empty() {
            return Err(GenError::TryAgain);
        }
        let family = *rng.weighted_pick(&families);
        match build_family(family, catalog, scope, ctx, rng) {
            Ok(t) => return Ok(t),
            Err(GenError::TryAgain) => continue,
            Err(e) => return Err(e),
        }
    }
}

fn plain_table_ref(catalog: &Catalog, scope: &mut Scope, rng: &mut dyn RandomSource) -> Result<TableRef, GenError> {
    let tables = catalog.tables();
    if tables.is_empty() {
        return Err(GenError::TryAgain);
    }
    let table = &tables[rng.dx(tables.len() as u32) as usize - 1];
    let alias = scope.fresh_alias(&table.name);
    scope.add_aliased_relation(VisibleRelation {
        alias: alias.clone(),
        underlying_name: table.name.clone(),
        columns: table.columns.clone(),
        is_base_table: table.is_base_table,
        is_insertable: table.is_insertable,
    });
    Ok(TableRef::TableOrQueryName { alias, underlying: table.name.clone() })
}

fn build_family(
    family: Family,
    catalog: &Catalog,
    scope: &mut Scope,
    ctx: &mut GenContext,
    rng: &mut dyn RandomSource,
) -> Result<TableRef, GenError> {
    match family {
        Family::TableOrQueryName => plain_table_ref(catalog, scope, rng),
        Family::Joined => {
            let kind = *rng.weighted_pick(&[(JoinKind::Cross, 1u32), (JoinKind::Inner, 3), (JoinKind::LeftOuter, 2)]);
            let left = plain_table_ref(catalog, scope, rng)?;
            let right = plain_table_ref(catalog, scope, rng)?;
            let cond = if matches!(kind, JoinKind::Cross) {
                None
            } else {
                let _guard = ctx.enter(ProductionKind::JoinCondition);
                Some(bool_expr::generate(catalog, scope, ctx, rng, DEFAULT_RETRY_BUDGET)?)
            };
            Ok(TableRef::Joined { kind, left: Box::new(left), right: Box::new(right), cond })
        }
        Family::Subquery => {
            let tables = catalog.base_tables().collect::<Vec<_>>();
            if tables.is_empty() {
                return Err(GenError::TryAgain);
            }
            let table = tables[rng.dx(tables.len() as u32) as usize - 1];
            let alias = scope.fresh_alias("subq");
            let query_text = format!("SELECT * FROM {}", table.name);
            scope.add_aliased_relation(VisibleRelation {
                alias: alias.clone(),
                underlying_name: table.name.clone(),
                columns: table.columns.clone(),
                is_base_table: false,
                is_insertable: false,
            });
            Ok(TableRef::Subquery { alias, query_text })
        }
        Family::Sample => {
            let inner = plain_table_ref(catalog, scope, rng)?;
            Ok(TableRef::Sample { inner: Box::new(inner), percent: rng.dx(100) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isofuzz_catalog::{CatalogBuilder, Column, Table, Type};
    use isofuzz_random::SeededSource;

    fn catalog() -> Catalog {
        let mut b = CatalogBuilder::new();
        b.register_type(Type::scalar("int"));
        b.register_table(Table::base(
            "t",
            "public",
            vec![Column::new("wkey", "int"), Column::new("write_op_id", "int")],
        ));
        b.register_table(Table::base(
            "u",
            "public",
            vec![Column::new("wkey", "int"), Column::new("write_op_id", "int")],
        ));
        b.build().unwrap()
    }

    #[test]
    fn plain_table_ref_registers_relation_into_scope() {
        let cat = catalog();
        let mut scope = Scope::new();
        let mut ctx = GenContext::new();
        let mut rng = SeededSource::new(5);
        let t = generate(&cat, &mut scope, &mut ctx, &mut rng, 50).unwrap();
        let _ = t.render();
        assert!(!scope.relations().is_empty());
    }

    #[test]
    fn joined_table_registers_both_sides() {
        let cat = catalog();
        let mut scope = Scope::new();
        let mut ctx = GenContext::new();
        let mut rng = SeededSource::new(9);
        let joined = loop {
            let t = generate(&cat, &mut scope, &mut ctx, &mut rng, 50).unwrap();
            if matches!(t, TableRef::Joined { .. }) {
                break t;
            }
            scope = Scope::new();
        };
        assert!(matches!(joined, TableRef::Joined { .. }));
        assert!(scope.relations().len() >= 2);
    }
}
