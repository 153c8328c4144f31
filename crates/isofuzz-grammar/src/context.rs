use ahash::AHashSet;
use smol_str::SmolStr;

/// Default number of local re-rolls a production is allowed before giving up
/// and surfacing [`crate::GenError::Exhausted`] to its caller.
pub const DEFAULT_RETRY_BUDGET: u32 = 100;

/// Which production kind is currently under construction, innermost last.
/// Used by the handful of productions that need to know their ancestry
/// (e.g. a window function is only legal under a query's select list).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductionKind {
    QuerySpec,
    SelectList,
    WhereClause,
    SetList,
    JoinCondition,
    CheckConstraint,
}

/// Carries the construction-time state the original implementation kept as
/// process-wide mutable globals: which syntactic context a production is
/// nested under, and which columns an UPDATE's set-list has already
/// assigned. Threaded explicitly alongside a [`isofuzz_catalog::Scope`]
/// rather than living behind `thread_local!`, so two statements under
/// construction never see each other's state.
#[derive(Debug, Default)]
pub struct GenContext {
    kind_stack: Vec<ProductionKind>,
    in_check_clause: bool,
    in_in_clause: bool,
    use_group: bool,
    update_used_column_ref: AHashSet<SmolStr>,
}

impl GenContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ancestry(&self) -> &[ProductionKind] {
        &self.kind_stack
    }

    pub fn is_nested_under(&self, kind: ProductionKind) -> bool {
        self.kind_stack.contains(&kind)
    }

    pub fn enter(&mut self, kind: ProductionKind) -> KindGuard<'_> {
        self.kind_stack.push(kind);
        KindGuard { ctx: self }
    }

    pub fn in_check_clause(&self) -> bool {
        self.in_check_clause
    }

    pub fn enter_check_clause(&mut self) -> FlagGuard<'_> {
        let prior = self.in_check_clause;
        self.in_check_clause = true;
        FlagGuard { flag: &mut self.in_check_clause, prior }
    }

    pub fn in_in_clause(&self) -> bool {
        self.in_in_clause
    }

    pub fn enter_in_clause(&mut self) -> FlagGuard<'_> {
        let prior = self.in_in_clause;
        self.in_in_clause = true;
        FlagGuard { flag: &mut self.in_in_clause, prior }
    }

    pub fn use_group(&self) -> bool {
        self.use_group
    }

    pub fn set_use_group(&mut self, value: bool) {
        self.use_group = value;
    }

    /// True if `column` has already been assigned in the UPDATE set-list
    /// currently under construction.
    pub fn column_already_set(&self, column: &str) -> bool {
        self.update_used_column_ref.contains(column)
    }

    pub fn mark_column_set(&mut self, column: SmolStr) {
        self.update_used_column_ref.insert(column);
    }

    /// Clears the per-set-list bookkeeping; called at the boundary of each
    /// UPDATE statement, not nested set-lists (there are none).
    pub fn clear_set_list(&mut self) {
        self.update_used_column_ref.clear();
    }
}

/// Restores a [`ProductionKind`] stack entry on drop.
pub struct KindGuard<'a> {
    ctx: &'a mut GenContext,
}

impl Drop for KindGuard<'_> {
    fn drop(&mut self) {
        self.ctx.kind_stack.pop();
    }
}

/// Restores a boolean context flag to its prior value on drop.
pub struct FlagGuard<'a> {
    flag: &'a mut bool,
    prior: bool,
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        *self.flag = self.prior;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_clause_flag_restores_on_guard_drop() {
        let mut ctx = GenContext::new();
        assert!(!ctx.in_check_clause());
        {
            let _guard = ctx.enter_check_clause();
            assert!(ctx.in_check_clause());
        }
        assert!(!ctx.in_check_clause());
    }

    #[test]
    fn kind_stack_pops_on_guard_drop() {
        let mut ctx = GenContext::new();
        {
            let _g = ctx.enter(ProductionKind::QuerySpec);
            assert!(ctx.is_nested_under(ProductionKind::QuerySpec));
        }
        assert!(!ctx.is_nested_under(ProductionKind::QuerySpec));
    }
}
