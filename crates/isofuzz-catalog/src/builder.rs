use ahash::AHashMap;

use crate::error::CatalogError;
use crate::types::{Aggregate, Operator, Routine, Table, Type, WindowFunction};
use crate::Catalog;

/// Accumulates catalog objects and, on [`CatalogBuilder::build`], finalizes
/// the type-keyed indices and freezes the result.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    types: Vec<Type>,
    tables: Vec<Table>,
    operators: Vec<Operator>,
    routines: Vec<Routine>,
    aggregates: Vec<Aggregate>,
    windows: Vec<WindowFunction>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_type(&mut self, ty: Type) -> &mut Self {
        self.types.push(ty);
        self
    }

    pub fn register_table(&mut self, table: Table) -> &mut Self {
        self.tables.push(table);
        self
    }

    pub fn register_operator(&mut self, op: Operator) -> &mut Self {
        self.operators.push(op);
        self
    }

    pub fn register_routine(&mut self, routine: Routine) -> &mut Self {
        self.routines.push(routine);
        self
    }

    pub fn register_aggregate(&mut self, agg: Aggregate) -> &mut Self {
        self.aggregates.push(agg);
        self
    }

    pub fn register_window(&mut self, win: WindowFunction) -> &mut Self {
        self.windows.push(win);
        self
    }

    pub fn build(self) -> Result<Catalog, CatalogError> {
        let mut type_by_name = AHashMap::default();
        for (idx, ty) in self.types.iter().enumerate() {
            if type_by_name.insert(ty.name.clone(), idx).is_some() {
                return Err(CatalogError::DuplicateType(ty.name.clone()));
            }
        }

        let mut table_by_name = AHashMap::default();
        for (idx, table) in self.tables.iter().enumerate() {
            if table_by_name.insert(table.name.clone(), idx).is_some() {
                return Err(CatalogError::DuplicateTable(table.name.clone()));
            }
            for col in &table.columns {
                require_type(&type_by_name, &col.ty, &table.name)?;
            }
        }

        for op in &self.operators {
            require_type(&type_by_name, &op.left_type, &op.symbol)?;
            require_type(&type_by_name, &op.right_type, &op.symbol)?;
            require_type(&type_by_name, &op.result_type, &op.symbol)?;
        }
        for pool in [&self.routines, &self.aggregates, &self.windows] {
            for r in pool {
                require_type(&type_by_name, &r.result_type, &r.name)?;
                for arg in &r.argtypes {
                    require_type(&type_by_name, arg, &r.name)?;
                }
            }
        }

        let mut tables_with_column_of_type: AHashMap<_, Vec<usize>> = AHashMap::default();
        for (idx, table) in self.tables.iter().enumerate() {
            for col in &table.columns {
                tables_with_column_of_type
                    .entry(col.ty.clone())
                    .or_default()
                    .push(idx);
            }
        }
        for entries in tables_with_column_of_type.values_mut() {
            entries.dedup();
        }

        let operators_returning_type = index_by(&self.operators, |o| o.result_type.clone());
        let routines_returning_type = index_by(&self.routines, |r| r.result_type.clone());
        let aggregates_returning_type = index_by(&self.aggregates, |a| a.result_type.clone());
        let windows_returning_type = index_by(&self.windows, |w| w.result_type.clone());
        let mut parameterless_routines_returning_type: AHashMap<_, Vec<usize>> = AHashMap::default();
        for (idx, r) in self.routines.iter().enumerate() {
            if r.is_parameterless() {
                parameterless_routines_returning_type
                    .entry(r.result_type.clone())
                    .or_default()
                    .push(idx);
            }
        }

        Ok(Catalog {
            types: self.types,
            tables: self.tables,
            operators: self.operators,
            routines: self.routines,
            aggregates: self.aggregates,
            windows: self.windows,
            type_by_name,
            table_by_name,
            tables_with_column_of_type,
            operators_returning_type,
            routines_returning_type,
            aggregates_returning_type,
            windows_returning_type,
            parameterless_routines_returning_type,
        })
    }
}

fn require_type(
    type_by_name: &AHashMap<smol_str::SmolStr, usize>,
    ty: &smol_str::SmolStr,
    referrer: &smol_str::SmolStr,
) -> Result<(), CatalogError> {
    if type_by_name.contains_key(ty) {
        Ok(())
    } else {
        Err(CatalogError::UnresolvedType {
            ty: ty.clone(),
            referrer: referrer.clone(),
        })
    }
}

fn index_by<T>(
    items: &[T],
    key: impl Fn(&T) -> smol_str::SmolStr,
) -> AHashMap<smol_str::SmolStr, Vec<usize>> {
    let mut out: AHashMap<_, Vec<usize>> = AHashMap::default();
    for (idx, item) in items.iter().enumerate() {
        out.entry(key(item)).or_default().push(idx);
    }
    out
}
