//! Typed production tree for random SQL statements: value expressions,
//! boolean expressions, table references, query specs, modifying
//! statements, DDL, and common-table expressions, each built bottom-up
//! against a live [`isofuzz_catalog::Catalog`] and a per-statement
//! [`isofuzz_catalog::Scope`].

pub mod bool_expr;
mod context;
pub mod cte;
pub mod ddl;
mod error;
pub mod modify;
pub mod query;
pub mod statement;
pub mod table_ref;
pub mod value_expr;

pub use context::{DEFAULT_RETRY_BUDGET, GenContext, ProductionKind};
pub use error::GenError;
pub use statement::Statement;
