//! AeroData query engine.
//!
//! Build a backend-agnostic query with [`QueryBuilder`], canonicalize it,
//! and compile it for either store with [`SqlCompiler`] or
//! [`CypherCompiler`]. An [`ExecutionContext`] runs the compiled query
//! through a [`BackendAdapter`] and maps the rows back to validated
//! entities.
//!
//! ```ignore
//! let query = QueryBuilder::new(registry, "Aircraft")?
//!     .filter("mtow", Operator::Gt, 50000)?
//!     .traverse("materials", |m| m.eq("grade", "7075-T6"))?;
//! let aircraft = query.execute(&ctx).await?;
//! ```

pub mod builder;
pub mod canonical;
pub mod error;
pub mod execute;
pub mod ir;
pub mod mutation;
pub mod render;

pub use builder::{QueryBuilder, Scope};
pub use canonical::canonicalize;
pub use error::{BackendExecutionError, BuildError, CompileError, QueryError, QueryResult};
pub use execute::{retry_with_backoff, BackendAdapter, ExecutionContext};
pub use ir::{Direction, Filter, Operator, Page, Predicate, QueryAst, SortKey, Traversal};
pub use mutation::Mutation;
pub use render::{
    compiler_for, CompiledQuery, CypherCompiler, QueryCompiler, QueryKind, QuerySource,
    SqlCompiler,
};
