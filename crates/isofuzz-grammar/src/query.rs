use isofuzz_catalog::{Catalog, Scope};
use isofuzz_random::RandomSource;
use smol_str::SmolStr;

use crate::DEFAULT_RETRY_BUDGET;
use crate::bool_expr::{self, BoolExpr};
use crate::context::{GenContext, ProductionKind};
use crate::error::GenError;
use crate::table_ref::{self, TableRef};
use crate::value_expr::{self, ValueExpr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    All,
    Distinct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// `SELECT quantifier select-list FROM from-clause WHERE bool [GROUP BY
/// column] [ORDER BY select-list direction LIMIT n]`.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub quantifier: Quantifier,
    pub select_list: Vec<ValueExpr>,
    pub from: TableRef,
    pub where_clause: Option<BoolExpr>,
    pub group_by: Option<SmolStr>,
    pub order_by: Option<(usize, SortDirection)>,
    pub limit: Option<u32>,
}

impl QuerySpec {
    pub fn render(&self) -> String {
        let mut s = String::from("SELECT ");
        if matches!(self.quantifier, Quantifier::Distinct) {
            s.push_str("DISTINCT ");
        }
        let items: Vec<String> = self.select_list.iter().map(ValueExpr::render).collect();
        s.push_str(&items.join(", "));
        s.push_str(" FROM ");
        s.push_str(&self.from.render());
        if let Some(w) = &self.where_clause {
            s.push_str(" WHERE ");
            s.push_str(&w.render());
        }
        if let Some(col) = &self.group_by {
            s.push_str(" GROUP BY ");
            s.push_str(col);
        }
        if let Some((idx, dir)) = &self.order_by {
            s.push_str(&format!(" ORDER BY {} {}", idx + 1, if matches!(dir, SortDirection::Asc) { "ASC" } else { "DESC" }));
        }
        if let Some(n) = self.limit {
            s.push_str(&format!(" LIMIT {n}"));
        }
        s
    }
}

/// Build a query spec over a fresh scope extended from `outer_scope` (so a
/// caller building a CTE body or a join's right-hand side can pass in
/// already-visible relations).
pub fn generate(
    catalog: &Catalog,
    outer_scope: &Scope,
    ctx: &mut GenContext,
    rng: &mut dyn RandomSource,
    mut budget: u32,
) -> Result<QuerySpec, GenError> {
    loop {
        if budget == 0 {
            return Err(GenError::Exhausted { production: "QuerySpec" });
        }
        budget -= 1;
        match try_generate(catalog, outer_scope, ctx, rng) {
            Ok(q) => return Ok(q),
            Err(GenError::TryAgain) => continue,
            Err(e) => return Err(e),
        }
    }
}

fn try_generate(
    catalog: &Catalog,
    outer_scope: &Scope,
    ctx: &mut GenContext,
    rng: &mut dyn RandomSource,
) -> Result<QuerySpec, GenError> {
    let _kind_guard = ctx.enter(ProductionKind::QuerySpec);
    let mut scope = outer_scope.clone();
    let from = table_ref::generate(catalog, &mut scope, ctx, rng, DEFAULT_RETRY_BUDGET)?;

    let select_count = 1 + rng.dx(3);
    let mut select_list = Vec::with_capacity(select_count as usize);
    {
        let _sel_guard = ctx.enter(ProductionKind::SelectList);
        for _ in 0..select_count {
            select_list.push(value_expr::generate(catalog, &scope, ctx, rng, None, DEFAULT_RETRY_BUDGET)?);
        }
    }

    let where_clause = if rng.d6() > 1 {
        let _guard = ctx.enter(ProductionKind::WhereClause);
        Some(bool_expr::generate(catalog, &scope, ctx, rng, DEFAULT_RETRY_BUDGET)?)
    } else {
        None
    };

    let group_by = if rng.d6() == 1 {
        scope.columns().first().map(|c| c.column.name.clone())
    } else {
        None
    };
    ctx.set_use_group(group_by.is_some());

    let order_by = if rng.d6() > 3 && !select_list.is_empty() {
        let idx = rng.dx(select_list.len() as u32) as usize - 1;
        let dir = if rng.d6() % 2 == 0 { SortDirection::Asc } else { SortDirection::Desc };
        Some((idx, dir))
    } else {
        None
    };

    let limit = if !ctx.in_in_clause() && rng.d6() == 1 { Some(rng.dx(50)) } else { None };

    Ok(QuerySpec {
        quantifier: if rng.d6() == 1 { Quantifier::Distinct } else { Quantifier::All },
        select_list,
        from,
        where_clause,
        group_by,
        order_by,
        limit,
    })
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
            vec![Column::new("wkey", "int"), Column::new("write_op_id", "int"), Column::new("v", "int")],
        ));
        b.build().unwrap()
    }

    #[test]
    fn limit_never_appears_inside_in_clause_context() {
        let cat = catalog();
        let scope = Scope::new();
        let mut ctx = GenContext::new();
        let _guard = ctx.enter_in_clause();
        let mut rng = SeededSource::new(11);
        for _ in 0..20 {
            let q = generate(&cat, &scope, &mut ctx, &mut rng, 50).unwrap();
            assert!(q.limit.is_none());
        }
    }

    #[test]
    fn rendered_query_contains_select_and_from() {
        let cat = catalog();
        let scope = Scope::new();
        let mut ctx = GenContext::new();
        let mut rng = SeededSource::new(4);
        let q = generate(&cat, &scope, &mut ctx, &mut rng, 50).unwrap();
        let text = q.render();
        assert!(text.starts_with("SELECT"));
        assert!(text.contains(" FROM "));
    }
}
