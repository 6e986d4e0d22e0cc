//! # SQL Generation Module
//!
//! Everything that turns typed requests into SQL text: the expression tree
//! and its DSL, the compiler that lowers trees to parameterized predicates,
//! and the table query builder.
//!
//! ## Module Structure
//!
//! - `expr`: `Expr`, `BinaryOp`, `UnaryOp`, `col`, `lit`, `IntoExpr`
//! - `compiler`: `ExpressionCompiler` and `CompileResult`
//! - `query`: `TableQuery`, `Selected`, `Joined`, `QueryRows`, `QueryRowsIter`
//!
//! ## Identifiers
//!
//! Table, column and index names are always emitted double-quoted by
//! [`quote_identifier`]; values are always bound, never inlined.
//!
//! ## Example
//!
//! ```ignore
//! use turorm::sql::col;
//!
//! let people = conn
//!     .table::<Person>()?
//!     .filter(col("Age").gt(20))
//!     .order_by_desc(col("Name"))?
//!     .take(10)
//!     .to_list()?;
//! // select * from "Person" where ("Age" > ?) order by "Name" desc limit 10
//! ```

pub mod compiler;
pub mod expr;
pub mod query;

pub use compiler::{CompileResult, ExpressionCompiler};
pub use expr::{col, lit, BinaryOp, Expr, IntoExpr, UnaryOp};
pub use query::{JoinDescriptor, Joined, Ordering, QueryRows, QueryRowsIter, QueryState, Selected, TableQuery};

/// Double-quotes `name`, doubling any embedded quote.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_identifier("Person"), "\"Person\"");
        assert_eq!(quote_identifier("odd\"name"), "\"odd\"\"name\"");
    }
}
