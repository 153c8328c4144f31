use isofuzz_catalog::{Catalog, Scope, Table};
use isofuzz_random::RandomSource;
use smol_str::SmolStr;

use crate::DEFAULT_RETRY_BUDGET;
use crate::bool_expr::{self, BoolExpr};
use crate::context::GenContext;
use crate::error::GenError;
use crate::value_expr::{self, ValueExpr};

#[derive(Debug, Clone)]
pub enum MergeClause {
    MatchedDoNothing,
    MatchedUpdate { column: SmolStr, value: ValueExpr },
    NotMatchedInsert { values: Vec<String> },
}

impl MergeClause {
    fn render(&self) -> String {
        match self {
            MergeClause::MatchedDoNothing => "WHEN MATCHED THEN DO NOTHING".to_string(),
            MergeClause::MatchedUpdate { column, value } => {
                format!("WHEN MATCHED THEN UPDATE SET {column} = {}", value.render())
            }
            MergeClause::NotMatchedInsert { values } => {
                format!("WHEN NOT MATCHED THEN INSERT VALUES ({})", values.join(", "))
            }
        }
    }
}

/// A data-modifying statement. Rendered text is what the instrumentor's
/// textual scan (or, for `Upsert`/`Merge`, nothing — see module docs)
/// recognizes.
#[derive(Debug, Clone)]
pub enum ModifyingStmt {
    Insert { table: SmolStr, columns: Vec<SmolStr>, values: Vec<String> },
    Delete { table: SmolStr, predicate: BoolExpr },
    Update { table: SmolStr, assignments: Vec<(SmolStr, ValueExpr)>, predicate: BoolExpr },
    Upsert {
        table: SmolStr,
        columns: Vec<SmolStr>,
        values: Vec<String>,
        conflict_column: SmolStr,
        update_column: SmolStr,
        update_value: ValueExpr,
    },
    Merge { table: SmolStr, source_table: SmolStr, on: BoolExpr, clauses: Vec<MergeClause> },
}

impl ModifyingStmt {
    pub fn render(&self) -> String {
        match self {
            ModifyingStmt::Insert { table, columns, values } => format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                columns.iter().map(SmolStr::as_str).collect::<Vec<_>>().join(", "),
                values.join(", ")
            ),
            ModifyingStmt::Delete { table, predicate } => {
                format!("DELETE FROM {table} WHERE {}", predicate.render())
            }
            ModifyingStmt::Update { table, assignments, predicate } => {
                let sets: Vec<String> =
                    assignments.iter().map(|(c, v)| format!("{c} = {}", v.render())).collect();
                format!("UPDATE {table} SET {} WHERE {}", sets.join(", "), predicate.render())
            }
            ModifyingStmt::Upsert { table, columns, values, conflict_column, update_column, update_value } => {
                format!(
                    "INSERT INTO {table} ({}) VALUES ({}) ON CONFLICT ({conflict_column}) DO UPDATE SET {update_column} = {}",
                    columns.iter().map(SmolStr::as_str).collect::<Vec<_>>().join(", "),
                    values.join(", "),
                    update_value.render(),
                )
            }
            ModifyingStmt::Merge { table, source_table, on, clauses } => {
                let clause_text: Vec<String> = clauses.iter().map(MergeClause::render).collect();
                format!(
                    "MERGE INTO {table} USING {source_table} ON {} {}",
                    on.render(),
                    clause_text.join(" ")
                )
            }
        }
    }

    pub fn target_table(&self) -> &str {
        match self {
            ModifyingStmt::Insert { table, .. }
            | ModifyingStmt::Delete { table, .. }
            | ModifyingStmt::Update { table, .. }
            | ModifyingStmt::Upsert { table, .. }
            | ModifyingStmt::Merge { table, .. } => table,
        }
    }
}

fn single_table_scope(table: &Table) -> Scope {
    let mut scope = Scope::new();
    scope.add_relation(table.clone());
    scope
}

fn row_literals(catalog: &Catalog, table: &Table, rng: &mut dyn RandomSource) -> Result<Vec<String>, GenError> {
    let mut values = Vec::with_capacity(table.columns.len());
    for col in &table.columns {
        if col.name == isofuzz_catalog::WKEY_COLUMN {
            values.push(rng.dx(1_000_000).to_string());
            continue;
        }
        if col.name == isofuzz_catalog::VERSION_COLUMN {
            values.push("0".to_string());
            continue;
        }
        let expr = value_expr::generate(
            catalog,
            &Scope::new(),
            &mut GenContext::new(),
            rng,
            Some(&col.ty),
            DEFAULT_RETRY_BUDGET,
        )?;
        values.push(expr.render());
    }
    Ok(values)
}

fn wkey_equality_predicate(
    catalog: &Catalog,
    scope: &Scope,
    ctx: &mut GenContext,
    rng: &mut dyn RandomSource,
) -> Result<BoolExpr, GenError> {
    let column = scope
        .columns()
        .iter()
        .find(|c| c.column.name == isofuzz_catalog::WKEY_COLUMN)
        .ok_or(GenError::TryAgain)?;
    let left = ValueExpr::Column {
        relation: column.relation_alias.clone(),
        column: column.column.name.clone(),
        ty: column.column.ty.clone(),
    };
    let right = value_expr::generate(catalog, scope, ctx, rng, Some(&column.column.ty), DEFAULT_RETRY_BUDGET)?;
    Ok(BoolExpr::Comparison { op: "=".into(), left, right })
}

/// Build an INSERT against a randomly chosen base table.
pub fn generate_insert(
    catalog: &Catalog,
    rng: &mut dyn RandomSource,
) -> Result<ModifyingStmt, GenError> {
    let tables: Vec<_> = catalog.base_tables().collect();
    if tables.is_empty() {
        return Err(GenError::TryAgain);
    }
    let table = tables[rng.dx(tables.len() as u32) as usize - 1];
    let columns = table.columns.iter().map(|c| c.name.clone()).collect();
    let values = row_literals(catalog, table, rng)?;
    Ok(ModifyingStmt::Insert { table: table.name.clone(), columns, values })
}

/// Build a DELETE targeting a row by its `wkey`, the way the scheduler's
/// row-level history needs to be able to identify which row was touched.
pub fn generate_delete(
    catalog: &Catalog,
    ctx: &mut GenContext,
    rng: &mut dyn RandomSource,
) -> Result<ModifyingStmt, GenError> {
    let tables: Vec<_> = catalog.base_tables().collect();
    if tables.is_empty() {
        return Err(GenError::TryAgain);
    }
    let table = tables[rng.dx(tables.len() as u32) as usize - 1];
    let scope = single_table_scope(table);
    let predicate = wkey_equality_predicate(catalog, &scope, ctx, rng)?;
    Ok(ModifyingStmt::Delete { table: table.name.clone(), predicate })
}

/// Build an UPDATE. The set-list never assigns the same column twice
/// (`GenContext::column_already_set`), but `wkey` itself is always one of
/// the assignments: the generated value can equal the row's current wkey
/// or move it somewhere else entirely, a row-identity-changing update. The
/// instrumentor derives `AfterWriteRead` from this assignment, not from the
/// WHERE clause, so the two are free to differ.
pub fn generate_update(
    catalog: &Catalog,
    ctx: &mut GenContext,
    rng: &mut dyn RandomSource,
) -> Result<ModifyingStmt, GenError> {
    let tables: Vec<_> = catalog.base_tables().collect();
    if tables.is_empty() {
        return Err(GenError::TryAgain);
    }
    let table = tables[rng.dx(tables.len() as u32) as usize - 1];
    let scope = single_table_scope(table);
    ctx.clear_set_list();

    let wkey_col = table
        .columns
        .iter()
        .find(|c| c.name == isofuzz_catalog::WKEY_COLUMN)
        .ok_or(GenError::TryAgain)?;
    let wkey_value = value_expr::generate(catalog, &scope, ctx, rng, Some(&wkey_col.ty), DEFAULT_RETRY_BUDGET)?;
    ctx.mark_column_set(wkey_col.name.clone());
    let mut assignments = vec![(wkey_col.name.clone(), wkey_value)];

    let assignable: Vec<_> = table
        .columns
        .iter()
        .filter(|c| c.name != isofuzz_catalog::WKEY_COLUMN)
        .collect();
    if assignable.is_empty() {
        return Err(GenError::TryAgain);
    }
    let set_count = rng.dx(assignable.len().min(3) as u32);
    for _ in 0..set_count {
        let col = assignable[rng.dx(assignable.len() as u32) as usize - 1];
        if ctx.column_already_set(&col.name) {
            continue;
        }
        let value = if col.name == isofuzz_catalog::VERSION_COLUMN {
            ValueExpr::BinOp {
                symbol: "+".into(),
                left: Box::new(ValueExpr::Column {
                    relation: table.name.clone(),
                    column: col.name.clone(),
                    ty: col.ty.clone(),
                }),
                right: Box::new(ValueExpr::Const { literal: "1".into(), ty: col.ty.clone() }),
                ty: col.ty.clone(),
            }
        } else {
            value_expr::generate(catalog, &scope, ctx, rng, Some(&col.ty), DEFAULT_RETRY_BUDGET)?
        };
        ctx.mark_column_set(col.name.clone());
        assignments.push((col.name.clone(), value));
    }
    let predicate = wkey_equality_predicate(catalog, &scope, ctx, rng)?;
    Ok(ModifyingStmt::Update { table: table.name.clone(), assignments, predicate })
}

/// Build an `INSERT ... ON CONFLICT (wkey) DO UPDATE` against a randomly
/// chosen base table.
pub fn generate_upsert(
    catalog: &Catalog,
    ctx: &mut GenContext,
    rng: &mut dyn RandomSource,
) -> Result<ModifyingStmt, GenError> {
    let tables: Vec<_> = catalog.base_tables().collect();
    if tables.is_empty() {
        return Err(GenError::TryAgain);
    }
    let table = tables[rng.dx(tables.len() as u32) as usize - 1];
    let scope = single_table_scope(table);
    let columns = table.columns.iter().map(|c| c.name.clone()).collect();
    let values = row_literals(catalog, table, rng)?;
    let update_column = table
        .columns
        .iter()
        .find(|c| c.name != isofuzz_catalog::WKEY_COLUMN)
        .ok_or(GenError::TryAgain)?;
    let update_value = value_expr::generate(catalog, &scope, ctx, rng, Some(&update_column.ty), DEFAULT_RETRY_BUDGET)?;
    Ok(ModifyingStmt::Upsert {
        table: table.name.clone(),
        columns,
        values,
        conflict_column: isofuzz_catalog::WKEY_COLUMN.into(),
        update_column: update_column.name.clone(),
        update_value,
    })
}

/// Build a `MERGE` with at least one `WHEN` clause, drawing additional
/// clauses from `{MatchedDoNothing, MatchedUpdate, NotMatchedInsert}`.
pub fn generate_merge(
    catalog: &Catalog,
    ctx: &mut GenContext,
    rng: &mut dyn RandomSource,
) -> Result<ModifyingStmt, GenError> {
    let tables: Vec<_> = catalog.base_tables().collect();
    if tables.len() < 2 {
        return Err(GenError::TryAgain);
    }
    let target_idx = rng.dx(tables.len() as u32) as usize - 1;
    let target = tables[target_idx];
    let source = tables[(target_idx + 1) % tables.len()];
    let scope = single_table_scope(target);
    let on = wkey_equality_predicate(catalog, &scope, ctx, rng)?;

    let clause_count = 1 + rng.dx(2);
    let mut clauses = Vec::with_capacity(clause_count as usize);
    for _ in 0..clause_count {
        let clause = match rng.dx(3) {
            1 => MergeClause::MatchedDoNothing,
            2 => {
                let col = target
                    .columns
                    .iter()
                    .find(|c| c.name != isofuzz_catalog::WKEY_COLUMN)
                    .ok_or(GenError::TryAgain)?;
                let value = value_expr::generate(catalog, &scope, ctx, rng, Some(&col.ty), DEFAULT_RETRY_BUDGET)?;
                MergeClause::MatchedUpdate { column: col.name.clone(), value }
            }
            _ => MergeClause::NotMatchedInsert { values: row_literals(catalog, target, rng)? },
        };
        clauses.push(clause);
    }
    Ok(ModifyingStmt::Merge { table: target.name.clone(), source_table: source.name.clone(), on, clauses })
}
