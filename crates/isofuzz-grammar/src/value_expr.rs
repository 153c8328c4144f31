use isofuzz_catalog::{Catalog, Scope};
use isofuzz_random::RandomSource;
use smol_str::SmolStr;

use crate::context::{GenContext, ProductionKind};
use crate::error::GenError;
use crate::{DEFAULT_RETRY_BUDGET, bool_expr::BoolExpr};

/// A scalar-valued production. Every variant carries its own static result
/// type, propagated from the constraint the caller requested.
#[derive(Debug, Clone)]
pub enum ValueExpr {
    Const {
        literal: String,
        ty: SmolStr,
    },
    Column {
        relation: SmolStr,
        column: SmolStr,
        ty: SmolStr,
    },
    FunCall {
        name: SmolStr,
        args: Vec<ValueExpr>,
        ty: SmolStr,
    },
    Case {
        branches: Vec<(BoolExpr, ValueExpr)>,
        else_branch: Box<ValueExpr>,
        ty: SmolStr,
    },
    Coalesce {
        args: Vec<ValueExpr>,
        ty: SmolStr,
    },
    NullIf {
        left: Box<ValueExpr>,
        right: Box<ValueExpr>,
        ty: SmolStr,
    },
    BinOp {
        symbol: SmolStr,
        left: Box<ValueExpr>,
        right: Box<ValueExpr>,
        ty: SmolStr,
    },
    Window {
        routine: SmolStr,
        ty: SmolStr,
    },
    /// A one-shot scalar subquery. Stored pre-rendered rather than as a
    /// nested `QuerySpec`: it never needs to be re-typed or re-scoped once
    /// built, so there is nothing a boxed query node would buy here.
    AtomicSubselect {
        text: String,
        ty: SmolStr,
    },
}

impl ValueExpr {
    pub fn result_type(&self) -> &str {
        match self {
            ValueExpr::Const { ty, .. }
            | ValueExpr::Column { ty, .. }
            | ValueExpr::FunCall { ty, .. }
            | ValueExpr::Case { ty, .. }
            | ValueExpr::Coalesce { ty, .. }
            | ValueExpr::NullIf { ty, .. }
            | ValueExpr::BinOp { ty, .. }
            | ValueExpr::Window { ty, .. }
            | ValueExpr::AtomicSubselect { ty, .. } => ty,
        }
    }

    pub fn render(&self) -> String {
        match self {
            ValueExpr::Const { literal, .. } => literal.clone(),
            ValueExpr::Column { relation, column, .. } => format!("{relation}.{column}"),
            ValueExpr::FunCall { name, args, .. } => {
                let rendered: Vec<String> = args.iter().map(ValueExpr::render).collect();
                format!("{name}({})", rendered.join(", "))
            }
            ValueExpr::Case { branches, else_branch, .. } => {
                let mut s = String::from("CASE");
                for (cond, val) in branches {
                    s.push_str(&format!(" WHEN {} THEN {}", cond.render(), val.render()));
                }
                s.push_str(&format!(" ELSE {} END", else_branch.render()));
                s
            }
            ValueExpr::Coalesce { args, .. } => {
                let rendered: Vec<String> = args.iter().map(ValueExpr::render).collect();
                format!("COALESCE({})", rendered.join(", "))
            }
            ValueExpr::NullIf { left, right, .. } => {
                format!("NULLIF({}, {})", left.render(), right.render())
            }
            ValueExpr::BinOp { symbol, left, right, .. } => {
                format!("({} {} {})", left.render(), symbol, right.render())
            }
            ValueExpr::Window { routine, .. } => format!("{routine}() OVER ()"),
            ValueExpr::AtomicSubselect { text, .. } => text.clone(),
        }
    }
}

fn literal_for(ty: &str, rng: &mut dyn RandomSource) -> Result<String, GenError> {
    match ty {
        "int" => Ok(rng.dx(1000).to_string()),
        "real" => Ok(format!("{}.{}", rng.dx(1000), rng.dx(99))),
        "bool" => Ok(if rng.d6() % 2 == 0 { "true" } else { "false" }.to_string()),
        "text" => Ok(format!("'{}'", rng.random_identifier("lit"))),
        _ => Err(GenError::TryAgain),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Family {
    Const,
    Column,
    FunCall,
    Case,
    Coalesce,
    NullIf,
    BinOp,
    Window,
    AtomicSubselect,
}

fn available_families(catalog: &Catalog, scope: &Scope, ctx: &GenContext, ty: &str) -> Vec<(Family, u32)> {
    let mut families = vec![
        (Family::Const, if matches!(ty, "int" | "real" | "bool" | "text") { 20 } else { 0 }),
        (Family::Column, if scope.columns_of_type(ty).next().is_some() { 25 } else { 0 }),
        (Family::FunCall, if catalog.routines_returning(ty).next().is_some() { 10 } else { 0 }),
        (Family::Case, if matches!(ty, "int" | "real" | "bool" | "text") { 5 } else { 0 }),
        (Family::Coalesce, if matches!(ty, "int" | "real" | "bool" | "text") { 5 } else { 0 }),
        (Family::NullIf, if matches!(ty, "int" | "real" | "bool" | "text") { 5 } else { 0 }),
        (Family::BinOp, if catalog.operators_returning(ty).next().is_some() { 15 } else { 0 }),
        (
            Family::Window,
            if ctx.is_nested_under(ProductionKind::SelectList) && catalog.windows_returning(ty).next().is_some() {
                10
            } else {
                0
            },
        ),
        (Family::AtomicSubselect, if catalog.tables_with_column_of_type(ty).next().is_some() { 5 } else { 0 }),
    ];
    families.retain(|(_, w)| *w > 0);
    families
}

/// Build a value expression whose static result type is `target_type` (or a
/// generator-chosen default when `None`). Retries locally up to `budget`
/// times; callers should treat [`GenError::Exhausted`] as "try another
/// shape at my level".
pub fn generate(
    catalog: &Catalog,
    scope: &Scope,
    ctx: &mut GenContext,
    rng: &mut dyn RandomSource,
    target_type: Option<&str>,
    mut budget: u32,
) -> Result<ValueExpr, GenError> {
    let ty: SmolStr = target_type.unwrap_or("int").into();
    loop {
        if budget == 0 {
            return Err(GenError::Exhausted { production: "ValueExpr" });
        }
        budget -= 1;
        let families = available_families(catalog, scope, ctx, &ty);
        if families.is_empty() {
            return Err(GenError::TryAgain);
        }
        let family = *rng.weighted_pick(&families);
        match build_family(family, catalog, scope, ctx, rng, &ty) {
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
    ty: &SmolStr,
) -> Result<ValueExpr, GenError> {
    match family {
        Family::Const => Ok(ValueExpr::Const { literal: literal_for(ty, rng)?, ty: ty.clone() }),
        Family::Column => {
            let candidates: Vec<_> = scope.columns_of_type(ty).collect();
            if candidates.is_empty() {
                return Err(GenError::TryAgain);
            }
            let idx = rng.dx(candidates.len() as u32) as usize - 1;
            let picked = candidates[idx];
            if ctx.column_already_set(&picked.column.name) {
                return Err(GenError::TryAgain);
            }
            Ok(ValueExpr::Column {
                relation: picked.relation_alias.clone(),
                column: picked.column.name.clone(),
                ty: ty.clone(),
            })
        }
        Family::FunCall => {
            let routines: Vec<_> = catalog.routines_returning(ty).collect();
            if routines.is_empty() {
                return Err(GenError::TryAgain);
            }
            let idx = rng.dx(routines.len() as u32) as usize - 1;
            let routine = routines[idx];
            let mut args = Vec::with_capacity(routine.argtypes.len());
            for argtype in &routine.argtypes {
                args.push(generate(catalog, scope, ctx, rng, Some(argtype), DEFAULT_RETRY_BUDGET)?);
            }
            Ok(ValueExpr::FunCall { name: routine.name.clone(), args, ty: ty.clone() })
        }
        Family::Case => {
            let branch_count = rng.dx(3);
            let mut branches = Vec::with_capacity(branch_count as usize);
            for _ in 0..branch_count {
                let cond = crate::bool_expr::generate(catalog, scope, ctx, rng, DEFAULT_RETRY_BUDGET)?;
                let val = generate(catalog, scope, ctx, rng, Some(ty), DEFAULT_RETRY_BUDGET)?;
                branches.push((cond, val));
            }
            let else_branch = generate(catalog, scope, ctx, rng, Some(ty), DEFAULT_RETRY_BUDGET)?;
            Ok(ValueExpr::Case { branches, else_branch: Box::new(else_branch), ty: ty.clone() })
        }
        Family::Coalesce => {
            let arity = 2 + rng.dx(2);
            let mut args = Vec::with_capacity(arity as usize);
            for _ in 0..arity {
                args.push(generate(catalog, scope, ctx, rng, Some(ty), DEFAULT_RETRY_BUDGET)?);
            }
            Ok(ValueExpr::Coalesce { args, ty: ty.clone() })
        }
        Family::NullIf => {
            let left = generate(catalog, scope, ctx, rng, Some(ty), DEFAULT_RETRY_BUDGET)?;
            let right = generate(catalog, scope, ctx, rng, Some(ty), DEFAULT_RETRY_BUDGET)?;
            Ok(ValueExpr::NullIf { left: Box::new(left), right: Box::new(right), ty: ty.clone() })
        }
        Family::BinOp => {
            let operators: Vec<_> = catalog.operators_returning(ty).collect();
            if operators.is_empty() {
                return Err(GenError::TryAgain);
            }
            let idx = rng.dx(operators.len() as u32) as usize - 1;
            let op = operators[idx];
            let left = generate(catalog, scope, ctx, rng, Some(&op.left_type), DEFAULT_RETRY_BUDGET)?;
            let right = generate(catalog, scope, ctx, rng, Some(&op.right_type), DEFAULT_RETRY_BUDGET)?;
            Ok(ValueExpr::BinOp {
                symbol: op.symbol.clone(),
                left: Box::new(left),
                right: Box::new(right),
                ty: ty.clone(),
            })
        }
        Family::Window => {
            let windows: Vec<_> = catalog.windows_returning(ty).collect();
            if windows.is_empty() {
                return Err(GenError::TryAgain);
            }
            let idx = rng.dx(windows.len() as u32) as usize - 1;
            Ok(ValueExpr::Window { routine: windows[idx].name.clone(), ty: ty.clone() })
        }
        Family::AtomicSubselect => {
            let tables: Vec<_> = catalog.tables_with_column_of_type(ty).collect();
            if tables.is_empty() {
                return Err(GenError::TryAgain);
            }
            let idx = rng.dx(tables.len() as u32) as usize - 1;
            let table = tables[idx];
            let column = table
                .columns
                .iter()
                .find(|c| c.ty == *ty)
                .expect("indexed by tables_with_column_of_type");
            Ok(ValueExpr::AtomicSubselect {
                text: format!("(SELECT {} FROM {} LIMIT 1)", column.name, table.name),
                ty: ty.clone(),
            })
        }
    }
}

/// Type-indexed counts, exposed for tests that want to assert coverage of
/// the production families without threading a live catalog through.
#[cfg(test)]
pub(crate) fn family_weights_for_tests(
    catalog: &Catalog,
    scope: &Scope,
    ctx: &GenContext,
    ty: &str,
) -> ahash::AHashMap<&'static str, u32> {
    available_families(catalog, scope, ctx, ty)
        .into_iter()
        .map(|(f, w)| {
            let name = match f {
                Family::Const => "const",
                Family::Column => "column",
                Family::FunCall => "funcall",
                Family::Case => "case",
                Family::Coalesce => "coalesce",
                Family::NullIf => "nullif",
                Family::BinOp => "binop",
                Family::Window => "window",
                Family::AtomicSubselect => "subselect",
            };
            (name, w)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use isofuzz_catalog::{CatalogBuilder, Column, Operator, Table, Type};
    use isofuzz_random::SeededSource;

    fn catalog() -> Catalog {
        let mut b = CatalogBuilder::new();
        b.register_type(Type::scalar("int"));
        b.register_type(Type::scalar("bool"));
        b.register_operator(Operator::new("+", "int", "int", "int"));
        b.register_table(Table::base(
            "t",
            "public",
            vec![
                Column::new("wkey", "int"),
                Column::new("write_op_id", "int"),
                Column::new("v", "int"),
            ],
        ));
        b.build().unwrap()
    }

    fn scope(catalog: &Catalog) -> Scope {
        let mut s = Scope::new();
        catalog.fill_scope(&mut s);
        s
    }

    #[test]
    fn generated_expression_carries_requested_result_type() {
        let cat = catalog();
        let sc = scope(&cat);
        let mut ctx = GenContext::new();
        let mut rng = SeededSource::new(1);
        for _ in 0..50 {
            let expr = generate(&cat, &sc, &mut ctx, &mut rng, Some("int"), 100).unwrap();
            assert_eq!(expr.result_type(), "int");
        }
    }

    #[test]
    fn binop_children_are_consistent_with_operand_types() {
        let cat = catalog();
        let sc = scope(&cat);
        let mut ctx = GenContext::new();
        let mut rng = SeededSource::new(7);
        for _ in 0..200 {
            if let Ok(ValueExpr::BinOp { left, right, .. }) =
                build_family(Family::BinOp, &cat, &sc, &mut ctx, &mut rng, &"int".into())
            {
                assert_eq!(left.result_type(), "int");
                assert_eq!(right.result_type(), "int");
            }
        }
    }

    #[test]
    fn unavailable_type_yields_try_again() {
        let cat = catalog();
        let sc = scope(&cat);
        let ctx = GenContext::new();
        let weights = family_weights_for_tests(&cat, &sc, &ctx, "text");
        assert!(weights.is_empty());
    }
}
