use isofuzz_catalog::{Catalog, Scope};
use isofuzz_random::RandomSource;
use smol_str::SmolStr;

use crate::context::GenContext;
use crate::error::GenError;
use crate::value_expr::{self, ValueExpr};
use crate::DEFAULT_RETRY_BUDGET;

const COMPARISON_OPS: &[&str] = &["=", "<>", "<", "<=", ">", ">="];

/// A boolean-valued production.
#[derive(Debug, Clone)]
pub enum BoolExpr {
    Truth(bool),
    Comparison { op: SmolStr, left: ValueExpr, right: ValueExpr },
    Term { op: SmolStr, left: Box<BoolExpr>, right: Box<BoolExpr> },
    Not(Box<BoolExpr>),
    NullPredicate { expr: ValueExpr, is_not: bool },
    Between { expr: ValueExpr, low: ValueExpr, high: ValueExpr },
    Like { expr: ValueExpr, pattern: String },
    In { expr: ValueExpr, list: Vec<ValueExpr> },
    CompSubquery { expr: ValueExpr, op: SmolStr, subquery: String },
    Exists { subquery: String },
    Distinct { op: SmolStr, left: ValueExpr, right: ValueExpr },
}

impl BoolExpr {
    pub fn render(&self) -> String {
        match self {
            BoolExpr::Truth(b) => if *b { "TRUE".into() } else { "FALSE".into() },
            BoolExpr::Comparison { op, left, right } => {
                format!("({} {} {})", left.render(), op, right.render())
            }
            BoolExpr::Term { op, left, right } => {
                format!("({} {} {})", left.render(), op, right.render())
            }
            BoolExpr::Not(inner) => format!("(NOT {})", inner.render()),
            BoolExpr::NullPredicate { expr, is_not } => {
                format!("({} IS {}NULL)", expr.render(), if *is_not { "NOT " } else { "" })
            }
            BoolExpr::Between { expr, low, high } => {
                format!("({} BETWEEN {} AND {})", expr.render(), low.render(), high.render())
            }
            BoolExpr::Like { expr, pattern } => format!("({} LIKE '{}')", expr.render(), pattern),
            BoolExpr::In { expr, list } => {
                let rendered: Vec<String> = list.iter().map(ValueExpr::render).collect();
                format!("({} IN ({}))", expr.render(), rendered.join(", "))
            }
            BoolExpr::CompSubquery { expr, op, subquery } => {
                format!("({} {} {})", expr.render(), op, subquery)
            }
            BoolExpr::Exists { subquery } => format!("EXISTS {subquery}"),
            BoolExpr::Distinct { op, left, right } => {
                format!("({} IS {} DISTINCT FROM {})", left.render(), op, right.render())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Family {
    Truth,
    Comparison,
    Term,
    Not,
    NullPredicate,
    Between,
    Like,
    In,
    CompSubquery,
    Exists,
    Distinct,
}

fn available_families(catalog: &Catalog, ctx: &GenContext) -> Vec<(Family, u32)> {
    let in_and_exists_allowed = !ctx.in_check_clause();
    let has_text = catalog.type_by_name("text").is_some();
    let mut families = vec![
        (Family::Truth, 5),
        (Family::Comparison, 25),
        (Family::Term, 15),
        (Family::Not, 10),
        (Family::NullPredicate, 10),
        (Family::Between, if catalog.type_by_name("int").is_some() { 10 } else { 0 }),
        (Family::Like, if has_text { 10 } else { 0 }),
        (Family::In, if in_and_exists_allowed { 10 } else { 0 }),
        (Family::CompSubquery, if catalog.base_tables().next().is_some() { 8 } else { 0 }),
        (Family::Exists, if in_and_exists_allowed && catalog.base_tables().next().is_some() { 8 } else { 0 }),
        (Family::Distinct, 5),
    ];
    families.retain(|(_, w)| *w > 0);
    families
}

pub fn generate(
    catalog: &Catalog,
    scope: &Scope,
    ctx: &mut GenContext,
    rng: &mut dyn RandomSource,
    mut budget: u32,
) -> Result<BoolExpr, GenError> {
    loop {
        if budget == 0 {
            return Err(GenError::Exhausted { production: "BoolExpr" });
        }
        budget -= 1;
        let families = available_families(catalog, ctx);
        let family = *rng.weighted_pick(&families);
        match build_family(family, catalog, scope, ctx, rng) {
            Ok(expr) => return Ok(expr),
            Err(GenError::TryAgain) => continue,
            Err(e) => return Err(e),
        }
    }
}

fn build_family(
    family: Family,
    catalog: &Catalog,
    scope: &Scope,
    ctx: &mut GenContext,
    rng: &mut dyn RandomSource,
) -> Result<BoolExpr, GenError> {
    match family {
        Family::Truth => Ok(BoolExpr::Truth(rng.d6() % 2 == 0)),
        Family::Comparison => {
            let ty = pick_comparable_type(catalog, rng)?;
            let left = value_expr::generate(catalog, scope, ctx, rng, Some(&ty), DEFAULT_RETRY_BUDGET)?;
            let right = value_expr::generate(catalog, scope, ctx, rng, Some(&ty), DEFAULT_RETRY_BUDGET)?;
            let op = COMPARISON_OPS[rng.dx(COMPARISON_OPS.len() as u32) as usize - 1];
            Ok(BoolExpr::Comparison { op: op.into(), left, right })
        }
        Family::Term => {
            let left = generate(catalog, scope, ctx, rng, DEFAULT_RETRY_BUDGET)?;
            let right = generate(catalog, scope, ctx, rng, DEFAULT_RETRY_BUDGET)?;
            let op = if rng.d6() % 2 == 0 { "AND" } else { "OR" };
            Ok(BoolExpr::Term { op: op.into(), left: Box::new(left), right: Box::new(right) })
        }
        Family::Not => {
            let inner = generate(catalog, scope, ctx, rng, DEFAULT_RETRY_BUDGET)?;
            Ok(BoolExpr::Not(Box::new(inner)))
        }
        Family::NullPredicate => {
            let ty = pick_comparable_type(catalog, rng)?;
            let expr = value_expr::generate(catalog, scope, ctx, rng, Some(&ty), DEFAULT_RETRY_BUDGET)?;
            Ok(BoolExpr::NullPredicate { expr, is_not: rng.d6() % 2 == 0 })
        }
        Family::Between => {
            let expr = value_expr::generate(catalog, scope, ctx, rng, Some("int"), DEFAULT_RETRY_BUDGET)?;
            let low = value_expr::generate(catalog, scope, ctx, rng, Some("int"), DEFAULT_RETRY_BUDGET)?;
            let high = value_expr::generate(catalog, scope, ctx, rng, Some("int"), DEFAULT_RETRY_BUDGET)?;
            Ok(BoolExpr::Between { expr, low, high })
        }
        Family::Like => {
            let expr = value_expr::generate(catalog, scope, ctx, rng, Some("text"), DEFAULT_RETRY_BUDGET)?;
            Ok(BoolExpr::Like { expr, pattern: format!("%{}%", rng.random_identifier("pat")) })
        }
        Family::In => {
            let ty = pick_comparable_type(catalog, rng)?;
            let _guard = ctx.enter_in_clause();
            let expr = value_expr::generate(catalog, scope, ctx, rng, Some(&ty), DEFAULT_RETRY_BUDGET)?;
            let arity = 1 + rng.dx(3);
            let mut list = Vec::with_capacity(arity as usize);
            for _ in 0..arity {
                list.push(value_expr::generate(catalog, scope, ctx, rng, Some(&ty), DEFAULT_RETRY_BUDGET)?);
            }
            Ok(BoolExpr::In { expr, list })
        }
        Family::CompSubquery => {
            let tables: Vec<_> = catalog.base_tables().collect();
            if tables.is_empty() {
                return Err(GenError::TryAgain);
            }
            let table = tables[rng.dx(tables.len() as u32) as usize - 1];
            let column = table.columns.first().ok_or(GenError::TryAgain)?;
            let expr = value_expr::generate(
                catalog,
                scope,
                ctx,
                rng,
                Some(&column.ty),
                DEFAULT_RETRY_BUDGET,
            )?;
            let op = COMPARISON_OPS[rng.dx(COMPARISON_OPS.len() as u32) as usize - 1];
            Ok(BoolExpr::CompSubquery {
                expr,
                op: op.into(),
                subquery: format!("(SELECT {} FROM {} LIMIT 1)", column.name, table.name),
            })
        }
        Family::Exists => {
            let tables: Vec<_> = catalog.base_tables().collect();
            if tables.is_empty() {
                return Err(GenError::TryAgain);
            }
            let table = tables[rng.dx(tables.len() as u32) as usize - 1];
            Ok(BoolExpr::Exists { subquery: format!("(SELECT 1 FROM {})", table.name) })
        }
        Family::Distinct => {
            let ty = pick_comparable_type(catalog, rng)?;
            let left = value_expr::generate(catalog, scope, ctx, rng, Some(&ty), DEFAULT_RETRY_BUDGET)?;
            let right = value_expr::generate(catalog, scope, ctx, rng, Some(&ty), DEFAULT_RETRY_BUDGET)?;
            let op = if rng.d6() % 2 == 0 { "NOT" } else { "" };
            Ok(BoolExpr::Distinct { op: op.into(), left, right })
        }
    }
}

fn pick_comparable_type(catalog: &Catalog, rng: &mut dyn RandomSource) -> Result<SmolStr, GenError> {
    let candidates: Vec<_> = catalog
        .types()
        .iter()
        .filter(|t| matches!(t.name.as_str(), "int" | "real" | "bool" | "text"))
        .collect();
    if candidates.is_empty() {
        return Err(GenError::TryAgain);
    }
    Ok(candidates[rng.dx(candidates.len() as u32) as usize - 1].name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use isofuzz_catalog::{CatalogBuilder, Column, Table, Type};
    use isofuzz_random::SeededSource;

    fn catalog() -> Catalog {
        let mut b = CatalogBuilder::new();
        b.register_type(Type::scalar("int"));
        b.register_type(Type::scalar("bool"));
        b.register_table(Table::base(
            "t",
            "public",
            vec![Column::new("wkey", "int"), Column::new("write_op_id", "int"), Column::new("v", "int")],
        ));
        b.build().unwrap()
    }

    #[test]
    fn in_and_exists_are_forbidden_under_check_clause() {
        let cat = catalog();
        let mut ctx = GenContext::new();
        let _g = ctx.enter_check_clause();
        let families = available_families(&cat, &ctx);
        assert!(!families.iter().any(|(f, _)| matches!(f, Family::In | Family::Exists)));
    }

    #[test]
    fn generated_bool_expr_renders_without_panicking() {
        let cat = catalog();
        let mut scope = Scope::new();
        cat.fill_scope(&mut scope);
        let mut ctx = GenContext::new();
        let mut rng = SeededSource::new(3);
        for _ in 0..50 {
            let expr = generate(&cat, &scope, &mut ctx, &mut rng, 100).unwrap();
            let _ = expr.render();
        }
    }
}
