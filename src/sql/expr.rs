//! # Expression Trees
//!
//! `Expr` is the predicate, ordering and selector language of the query
//! builder. Trees are built with a small typed DSL and compiled to SQL by
//! `ExpressionCompiler`; nothing here touches the engine.
//!
//! ## Node Kinds
//!
//! | Node | Meaning | Built by |
//! |------|---------|----------|
//! | `Parameter` | the record being queried | `col` (as receiver) |
//! | `Constant` | a host value: scalar, list or object | `lit`, `Expr::constant` |
//! | `Member` | named member of a receiver | `col`, `Expr::member` |
//! | `Binary` | comparison, logical or bitwise operator | `eq`, `gt`, `and`, ... |
//! | `Call` | method or free-function call | `like`, `contains`, `Expr::call` |
//! | `Convert` | coercion to a semantic type | `cast` |
//! | `Unary` | negation | `not`, `neg` |
//! | `Conditional` | `test ? a : b` | `Expr::conditional` |
//!
//! `Unary` and `Conditional` can be built but not compiled.
//!
//! ## Usage
//!
//! ```ignore
//! let adults = col("Age").ge(18).and(col("Name").starts_with("A"));
//! let listed = col("Id").is_in([1, 2, 3]);
//! let missing = col("Email").eq(None::<String>);   // compiles to ("Email" is ?)
//! ```

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta, Utc};
use uuid::Uuid;

use crate::types::{DataType, Decimal, HostValue, OwnedValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Gt,
    Ge,
    Lt,
    Le,
    BitAnd,
    And,
    BitOr,
    Or,
    Eq,
    Ne,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    /// SQL spelling, `None` for operators the compiler rejects.
    pub fn sql(self) -> Option<&'static str> {
        match self {
            BinaryOp::Gt => Some(">"),
            BinaryOp::Ge => Some(">="),
            BinaryOp::Lt => Some("<"),
            BinaryOp::Le => Some("<="),
            BinaryOp::BitAnd => Some("&"),
            BinaryOp::And => Some("and"),
            BinaryOp::BitOr => Some("|"),
            BinaryOp::Or => Some("or"),
            BinaryOp::Eq => Some("="),
            BinaryOp::Ne => Some("<>"),
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Parameter,
    Constant(HostValue),
    Member {
        object: Box<Expr>,
        name: String,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        method: String,
        object: Option<Box<Expr>>,
        args: Vec<Expr>,
    },
    Convert {
        operand: Box<Expr>,
        target: DataType,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
}

/// Member `property` of the queried record.
pub fn col(property: impl Into<String>) -> Expr {
    Expr::Parameter.member(property)
}

/// A constant.
pub fn lit(value: impl IntoExpr) -> Expr {
    value.into_expr()
}

impl Expr {
    pub fn constant(value: impl Into<HostValue>) -> Expr {
        Expr::Constant(value.into())
    }

    /// A list constant, compiled to an IN-list.
    pub fn list<V: Into<OwnedValue>>(items: impl IntoIterator<Item = V>) -> Expr {
        Expr::Constant(HostValue::List(items.into_iter().map(Into::into).collect()))
    }

    /// Free-function call `method(args...)`.
    pub fn call(method: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Call {
            method: method.into(),
            object: None,
            args,
        }
    }

    /// Method call `self.method(args...)`.
    pub fn method(self, method: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Call {
            method: method.into(),
            object: Some(Box::new(self)),
            args,
        }
    }

    pub fn conditional(test: Expr, if_true: impl IntoExpr, if_false: impl IntoExpr) -> Expr {
        Expr::Conditional {
            test: Box::new(test),
            if_true: Box::new(if_true.into_expr()),
            if_false: Box::new(if_false.into_expr()),
        }
    }

    pub fn member(self, name: impl Into<String>) -> Expr {
        Expr::Member {
            object: Box::new(self),
            name: name.into(),
        }
    }

    pub fn cast(self, target: DataType) -> Expr {
        Expr::Convert {
            operand: Box::new(self),
            target,
        }
    }

    pub fn binary(self, op: BinaryOp, rhs: impl IntoExpr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(rhs.into_expr()),
        }
    }

    pub fn eq(self, rhs: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::Eq, rhs)
    }

    pub fn ne(self, rhs: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::Ne, rhs)
    }

    pub fn gt(self, rhs: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::Gt, rhs)
    }

    pub fn ge(self, rhs: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::Ge, rhs)
    }

    pub fn lt(self, rhs: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::Lt, rhs)
    }

    pub fn le(self, rhs: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::Le, rhs)
    }

    pub fn and(self, rhs: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::And, rhs)
    }

    pub fn or(self, rhs: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::Or, rhs)
    }

    pub fn bit_and(self, rhs: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::BitAnd, rhs)
    }

    pub fn bit_or(self, rhs: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::BitOr, rhs)
    }

    pub fn add(self, rhs: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::Add, rhs)
    }

    pub fn sub(self, rhs: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::Sub, rhs)
    }

    pub fn mul(self, rhs: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::Mul, rhs)
    }

    pub fn div(self, rhs: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::Div, rhs)
    }

    pub fn rem(self, rhs: impl IntoExpr) -> Expr {
        self.binary(BinaryOp::Rem, rhs)
    }

    /// `self like pattern`.
    pub fn like(self, pattern: impl IntoExpr) -> Expr {
        Expr::call("like", vec![self, pattern.into_expr()])
    }

    /// Substring test on text receivers, membership test on lists.
    pub fn contains(self, item: impl IntoExpr) -> Expr {
        self.method("contains", vec![item.into_expr()])
    }

    pub fn starts_with(self, prefix: impl IntoExpr) -> Expr {
        self.method("starts_with", vec![prefix.into_expr()])
    }

    pub fn ends_with(self, suffix: impl IntoExpr) -> Expr {
        self.method("ends_with", vec![suffix.into_expr()])
    }

    pub fn equals(self, other: impl IntoExpr) -> Expr {
        self.method("equals", vec![other.into_expr()])
    }

    pub fn to_lower(self) -> Expr {
        self.method("to_lower", Vec::new())
    }

    pub fn to_upper(self) -> Expr {
        self.method("to_upper", Vec::new())
    }

    /// `self in (items...)`.
    pub fn is_in<V: Into<OwnedValue>>(self, items: impl IntoIterator<Item = V>) -> Expr {
        Expr::call("contains", vec![Expr::list(items), self])
    }

    pub fn not(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        }
    }

    pub fn neg(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(self),
        }
    }

    /// Node name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Parameter => "Parameter",
            Expr::Constant(_) => "Constant",
            Expr::Member { .. } => "MemberAccess",
            Expr::Binary { .. } => "Binary",
            Expr::Call { .. } => "Call",
            Expr::Convert { .. } => "Convert",
            Expr::Unary { .. } => "Unary",
            Expr::Conditional { .. } => "Conditional",
        }
    }
}

/// Conversion into an expression operand.
pub trait IntoExpr {
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl IntoExpr for OwnedValue {
    fn into_expr(self) -> Expr {
        Expr::Constant(HostValue::Scalar(self))
    }
}

impl IntoExpr for HostValue {
    fn into_expr(self) -> Expr {
        Expr::Constant(self)
    }
}

impl<T: Into<OwnedValue>> IntoExpr for Option<T> {
    fn into_expr(self) -> Expr {
        OwnedValue::from(self).into_expr()
    }
}

macro_rules! scalar_into_expr {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoExpr for $ty {
                fn into_expr(self) -> Expr {
                    OwnedValue::from(self).into_expr()
                }
            }
        )*
    };
}

scalar_into_expr!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    f32,
    f64,
    Decimal,
    String,
    &str,
    &String,
    Vec<u8>,
    &[u8],
    NaiveDateTime,
    DateTime<FixedOffset>,
    DateTime<Utc>,
    TimeDelta,
    Uuid,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn col_is_member_of_parameter() {
        assert_eq!(
            col("Age"),
            Expr::Member {
                object: Box::new(Expr::Parameter),
                name: "Age".into(),
            }
        );
    }

    #[test]
    fn is_in_builds_static_contains() {
        let expr = col("Id").is_in([1, 2]);
        match expr {
            Expr::Call { method, object, args } => {
                assert_eq!(method, "contains");
                assert!(object.is_none());
                assert_eq!(
                    args[0],
                    Expr::Constant(HostValue::List(vec![OwnedValue::Int(1), OwnedValue::Int(2)]))
                );
                assert_eq!(args[1], col("Id"));
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn none_becomes_null_constant() {
        assert_eq!(lit(None::<i32>), Expr::Constant(HostValue::null()));
    }

    #[test]
    fn arithmetic_has_no_sql_spelling() {
        for op in [BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul, BinaryOp::Div, BinaryOp::Rem] {
            assert!(op.sql().is_none());
        }
        assert_eq!(BinaryOp::Ne.sql(), Some("<>"));
    }
}
