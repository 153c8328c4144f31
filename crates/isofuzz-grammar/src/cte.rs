use isofuzz_catalog::{Catalog, Column, Scope, VisibleRelation};
use isofuzz_random::RandomSource;
use smol_str::SmolStr;

use crate::DEFAULT_RETRY_BUDGET;
use crate::context::GenContext;
use crate::error::GenError;
use crate::query::{self, QuerySpec};

/// One or more named sub-queries introduced into scope, then a main query
/// spec built over the extended scope.
#[derive(Debug, Clone)]
pub struct CteStmt {
    pub ctes: Vec<(SmolStr, QuerySpec)>,
    pub main_query: QuerySpec,
}

impl CteStmt {
    pub fn render(&self) -> String {
        let bodies: Vec<String> =
            self.ctes.iter().map(|(name, q)| format!("{name} AS ({})", q.render())).collect();
        format!("WITH {} {}", bodies.join(", "), self.main_query.render())
    }
}

pub fn generate(
    catalog: &Catalog,
    ctx: &mut GenContext,
    rng: &mut dyn RandomSource,
) -> Result<CteStmt, GenError> {
    let cte_count = 1 + rng.dx(2);
    let mut scope = Scope::new();
    let mut ctes = Vec::with_capacity(cte_count as usize);
    for _ in 0..cte_count {
        let inner_scope = Scope::new();
        let q = query::generate(catalog, &inner_scope, ctx, rng, DEFAULT_RETRY_BUDGET)?;
        let alias = scope.fresh_alias("cte");
        let columns: Vec<Column> = q
            .select_list
            .iter()
            .enumerate()
            .map(|(i, expr)| Column::new(&format!("col{i}"), expr.result_type()))
            .collect();
        scope.add_aliased_relation(VisibleRelation {
            alias: alias.clone(),
            underlying_name: alias.clone(),
            columns,
            is_base_table: false,
            is_insertable: false,
        });
        ctes.push((alias, q));
    }
    let main_query = query::generate(catalog, &scope, ctx, rng, DEFAULT_RETRY_BUDGET)?;
    Ok(CteStmt { ctes, main_query })
}

#[cfg(test)]
mod tests {
    use super::*;
    use isofuzz_catalog::{CatalogBuilder, Column as CatCol, Table, Type};
    use isofuzz_random::SeededSource;

    fn catalog() -> Catalog {
        let mut b = CatalogBuilder::new();
        b.register_type(Type::scalar("int"));
        b.register_table(Table::base(
            "t",
            "public",
            vec![CatCol::new("wkey", "int"), CatCol::new("write_op_id", "int"), CatCol::new("v", "int")],
        ));
        b.build().unwrap()
    }

    #[test]
    fn main_query_can_see_cte_columns() {
        let cat = catalog();
        let mut ctx = GenContext::new();
        let mut rng = SeededSource::new(8);
        let stmt = generate(&cat, &mut ctx, &mut rng).unwrap();
        assert!(!stmt.ctes.is_empty());
        let text = stmt.render();
        assert!(text.starts_with("WITH "));
    }
}
