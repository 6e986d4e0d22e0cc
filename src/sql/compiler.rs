//! # Expression Compiler
//!
//! Turns an `Expr` into parameterized SQL text against one table mapping.
//!
//! ## Compilation
//!
//! `compile` is a pure recursive walk. Each node yields a `CompileResult`:
//! its SQL text, and for placeholders the host value it carries. Constants
//! are never inlined; every one becomes `?` and is appended to the argument
//! list, so the number of `?` in the text always equals the number of
//! arguments and they appear in the same order.
//!
//! ```text
//! col("Age").gt(20).and(col("Name").eq(None::<String>))
//!     │
//!     ▼
//! (("Age" > ?) and ("Name" is ?))        args = [20, NULL]
//! ```
//!
//! ## Rules
//!
//! | Node | SQL |
//! |------|-----|
//! | `a = b`, b carries NULL | `(a is b)` |
//! | `a <> b`, b carries NULL | `(a is not b)` |
//! | `a op b` | `(a op b)` |
//! | `like(a, b)` | `(a like b)` |
//! | `contains(list, x)` | `(x in list)` |
//! | `s.contains(x)`, s text | `(s like ('%'\|\|x\|\|'%'))` |
//! | `l.contains(x)`, l not text | `(x in l)` |
//! | `s.starts_with(x)` | `(s like (x\|\|'%'))` |
//! | `s.ends_with(x)` | `(s like ('%'\|\|x))` |
//! | `a.equals(b)` | `(a = (b))` |
//! | `s.to_lower()` / `s.to_upper()` | `(lower(s))` / `(upper(s))` |
//! | other call | `name(arg1,arg2,...)` |
//! | list constant | `(?,?,...)` |
//! | `Member` of the parameter | quoted storage column name |
//!
//! Arithmetic operators, `Unary`, `Conditional` and a bare `Parameter` are
//! rejected with `OrmError::UnsupportedExpression`.

use crate::error::{OrmError, Result};
use crate::schema::TableMapping;
use crate::sql::expr::{BinaryOp, Expr};
use crate::sql::quote_identifier;
use crate::types::{DataType, HostValue, OwnedValue};

/// Output of compiling one node.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileResult {
    pub sql: String,
    /// Value carried by a placeholder node.
    pub value: Option<HostValue>,
    /// Semantic type of a mapped column or converted operand.
    pub data_type: Option<DataType>,
}

impl CompileResult {
    fn text(sql: String) -> Self {
        Self {
            sql,
            value: None,
            data_type: None,
        }
    }

    fn carries_null(&self) -> bool {
        self.value.as_ref().is_some_and(HostValue::is_null)
    }

    fn is_text(&self) -> bool {
        self.data_type.is_some_and(|t| t.is_text())
            || matches!(&self.value, Some(HostValue::Scalar(OwnedValue::Text(_))))
    }
}

fn unsupported(message: impl Into<String>) -> OrmError {
    OrmError::UnsupportedExpression(message.into())
}

pub struct ExpressionCompiler<'m> {
    mapping: &'m TableMapping,
}

impl<'m> ExpressionCompiler<'m> {
    pub fn new(mapping: &'m TableMapping) -> Self {
        Self { mapping }
    }

    /// Compiles a predicate, appending its arguments to `args`.
    pub fn compile_predicate(&self, expr: &Expr, args: &mut Vec<HostValue>) -> Result<String> {
        Ok(self.compile(expr, args)?.sql)
    }

    /// Storage column named by an ordering selector.
    pub fn resolve_ordering(&self, expr: &Expr) -> Result<String> {
        match expr {
            Expr::Member { object, name } if matches!(**object, Expr::Parameter) => self
                .mapping
                .find_column_by_property_name(name)
                .map(|c| c.name().to_string())
                .ok_or_else(|| {
                    unsupported(format!(
                        "{} has no mapped member {}",
                        self.mapping.type_name(),
                        name
                    ))
                }),
            Expr::Convert { operand, .. } => self.resolve_ordering(operand),
            other => Err(unsupported(format!(
                "order by requires a member of the queried record, got {}",
                other.kind()
            ))),
        }
    }

    pub fn compile(&self, expr: &Expr, args: &mut Vec<HostValue>) -> Result<CompileResult> {
        match expr {
            Expr::Binary { op, left, right } => self.compile_binary(*op, left, right, args),
            Expr::Call { method, object, args: call_args } => {
                self.compile_call(method, object.as_deref(), call_args, args)
            }
            Expr::Constant(value) => Ok(placeholder(value.clone(), args)),
            Expr::Convert { operand, target } => self.compile_convert(operand, *target, args),
            Expr::Member { object, name } => self.compile_member(object, name, args),
            other => Err(unsupported(format!(
                "cannot compile a {} expression",
                other.kind()
            ))),
        }
    }

    fn compile_binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        args: &mut Vec<HostValue>,
    ) -> Result<CompileResult> {
        let sql_op = op
            .sql()
            .ok_or_else(|| unsupported(format!("operator {:?} is not supported", op)))?;
        let l = self.compile(left, args)?;
        let r = self.compile(right, args)?;

        let either_null = l.carries_null() || r.carries_null();
        let sql = match op {
            BinaryOp::Eq if either_null => format!("({} is {})", l.sql, r.sql),
            BinaryOp::Ne if either_null => format!("({} is not {})", l.sql, r.sql),
            _ => format!("({} {} {})", l.sql, sql_op, r.sql),
        };
        Ok(CompileResult::text(sql))
    }

    fn compile_call(
        &self,
        method: &str,
        object: Option<&Expr>,
        call_args: &[Expr],
        args: &mut Vec<HostValue>,
    ) -> Result<CompileResult> {
        // Operands compile into their own buffers and are appended in the
        // order they appear in the emitted text.
        let compile_alone = |expr: &Expr| -> Result<(CompileResult, Vec<HostValue>)> {
            let mut own = Vec::new();
            let result = self.compile(expr, &mut own)?;
            Ok((result, own))
        };

        let sql = match (method, object, call_args) {
            ("like", None, [a, b]) => {
                let a = self.compile(a, args)?;
                let b = self.compile(b, args)?;
                format!("({} like {})", a.sql, b.sql)
            }
            ("contains", None, [collection, item]) => {
                let (collection, collection_args) = compile_alone(collection)?;
                let item = self.compile(item, args)?;
                args.extend(collection_args);
                format!("({} in {})", item.sql, collection.sql)
            }
            ("contains", Some(receiver), [item]) => {
                let (receiver, receiver_args) = compile_alone(receiver)?;
                if receiver.is_text() {
                    args.extend(receiver_args);
                    let item = self.compile(item, args)?;
                    format!("({} like ('%'||{}||'%'))", receiver.sql, item.sql)
                } else {
                    let item = self.compile(item, args)?;
                    args.extend(receiver_args);
                    format!("({} in {})", item.sql, receiver.sql)
                }
            }
            ("starts_with", Some(receiver), [prefix]) => {
                let receiver = self.compile(receiver, args)?;
                let prefix = self.compile(prefix, args)?;
                format!("({} like ({}||'%'))", receiver.sql, prefix.sql)
            }
            ("ends_with", Some(receiver), [suffix]) => {
                let receiver = self.compile(receiver, args)?;
                let suffix = self.compile(suffix, args)?;
                format!("({} like ('%'||{}))", receiver.sql, suffix.sql)
            }
            ("equals", Some(receiver), [other]) => {
                let receiver = self.compile(receiver, args)?;
                let other = self.compile(other, args)?;
                format!("({} = ({}))", receiver.sql, other.sql)
            }
            ("to_lower", Some(receiver), []) => {
                format!("(lower({}))", self.compile(receiver, args)?.sql)
            }
            ("to_upper", Some(receiver), []) => {
                format!("(upper({}))", self.compile(receiver, args)?.sql)
            }
            _ => {
                let parts = call_args
                    .iter()
                    .map(|a| self.compile(a, args).map(|r| r.sql))
                    .collect::<Result<Vec<_>>>()?;
                format!("{}({})", method.to_lowercase(), parts.join(","))
            }
        };
        Ok(CompileResult::text(sql))
    }

    fn compile_convert(&self, operand: &Expr, target: DataType, args: &mut Vec<HostValue>) -> Result<CompileResult> {
        let mut result = self.compile(operand, args)?;
        if let Some(HostValue::Scalar(value)) = &result.value {
            if !value.is_null() {
                let converted = HostValue::Scalar(value.clone().coerce_to(target)?);
                if let Some(last) = args.last_mut() {
                    *last = converted.clone();
                }
                result.value = Some(converted);
            }
        }
        result.data_type = Some(target);
        Ok(result)
    }

    fn compile_member(&self, object: &Expr, name: &str, args: &mut Vec<HostValue>) -> Result<CompileResult> {
        if matches!(object, Expr::Parameter) {
            let column = self.mapping.find_column_by_property_name(name).ok_or_else(|| {
                unsupported(format!(
                    "{} has no mapped member {}",
                    self.mapping.type_name(),
                    name
                ))
            })?;
            return Ok(CompileResult {
                sql: quote_identifier(column.name()),
                value: None,
                data_type: Some(column.data_type()),
            });
        }

        let receiver = self.compile(object, args)?;
        let Some(HostValue::Object(target)) = receiver.value else {
            return Err(unsupported(format!(
                "member {} needs an object receiver, got {}",
                name,
                object.kind()
            )));
        };
        args.pop();

        let value = target
            .member(name)
            .ok_or_else(|| unsupported(format!("{} has no member {}", target.type_name(), name)))?;
        Ok(placeholder(value, args))
    }
}

/// Emits the placeholder(s) for a host value and records its argument(s).
fn placeholder(value: HostValue, args: &mut Vec<HostValue>) -> CompileResult {
    let sql = match &value {
        HostValue::List(items) => {
            args.extend(items.iter().cloned().map(HostValue::Scalar));
            format!("({})", vec!["?"; items.len()].join(","))
        }
        other => {
            args.push(other.clone());
            "?".to_string()
        }
    };
    CompileResult {
        sql,
        value: Some(value),
        data_type: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, CreateFlags, Record, TableDef};
    use crate::sql::expr::{col, lit};

    #[derive(Debug, Default)]
    struct Person {
        id: i64,
        name: String,
        age: i32,
    }

    impl Record for Person {
        fn describe() -> TableDef<Self> {
            TableDef::<Self>::new("Person")
                .field(ColumnDef::new("Id").primary_key(), |p| &p.id, |p| &mut p.id)
                .field(ColumnDef::new("Name").with_name("full_name"), |p| &p.name, |p| &mut p.name)
                .field(ColumnDef::new("Age"), |p| &p.age, |p| &mut p.age)
        }
    }

    fn compile(expr: Expr) -> Result<(String, Vec<HostValue>)> {
        let mapping = TableMapping::build::<Person>(CreateFlags::NONE)?;
        let mut args = Vec::new();
        let sql = ExpressionCompiler::new(&mapping).compile_predicate(&expr, &mut args)?;
        Ok((sql, args))
    }

    #[test]
    fn member_uses_storage_name() {
        let (sql, args) = compile(col("Name").eq("Ann")).unwrap();
        assert_eq!(sql, "(\"full_name\" = ?)");
        assert_eq!(args, vec![HostValue::from(OwnedValue::from("Ann"))]);
    }

    #[test]
    fn null_comparison_uses_is() {
        let (sql, _) = compile(col("Name").eq(None::<String>)).unwrap();
        assert_eq!(sql, "(\"full_name\" is ?)");

        let (sql, _) = compile(col("Name").ne(None::<String>)).unwrap();
        assert_eq!(sql, "(\"full_name\" is not ?)");
    }

    #[test]
    fn text_contains_becomes_like() {
        let (sql, args) = compile(col("Name").contains("nn")).unwrap();
        assert_eq!(sql, "(\"full_name\" like ('%'||?||'%'))");
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn list_contains_becomes_in_list() {
        let (sql, args) = compile(col("Age").gt(1).and(col("Id").is_in([1, 2, 3]))).unwrap();
        assert_eq!(sql, "((\"Age\" > ?) and (\"Id\" in (?,?,?)))");
        let ints: Vec<_> = args.iter().map(|a| a.as_scalar().cloned()).collect();
        assert_eq!(
            ints,
            [1, 1, 2, 3].map(|i| Some(OwnedValue::Int(i)))
        );
    }

    #[test]
    fn convert_coerces_the_carried_value() {
        let (sql, args) = compile(col("Age").eq(lit(41.6).cast(DataType::Int32))).unwrap();
        assert_eq!(sql, "(\"Age\" = ?)");
        assert_eq!(args, vec![HostValue::Scalar(OwnedValue::Int(42))]);
    }

    #[test]
    fn unknown_call_is_passed_through() {
        let (sql, _) = compile(Expr::call("Abs", vec![col("Age")]).gt(3)).unwrap();
        assert_eq!(sql, "(abs(\"Age\") > ?)");
    }

    #[test]
    fn unsupported_nodes_fail() {
        for expr in [
            col("Age").add(1).gt(2),
            col("Age").gt(1).not(),
            Expr::Parameter,
            Expr::conditional(col("Age").gt(1), 1, 2),
            col("Missing").eq(1),
        ] {
            assert!(
                matches!(compile(expr), Err(OrmError::UnsupportedExpression(_))),
                "expected UnsupportedExpression"
            );
        }
    }

    #[test]
    fn ordering_resolves_storage_names() {
        let mapping = TableMapping::build::<Person>(CreateFlags::NONE).unwrap();
        let compiler = ExpressionCompiler::new(&mapping);
        assert_eq!(compiler.resolve_ordering(&col("Name")).unwrap(), "full_name");
        assert!(compiler.resolve_ordering(&lit(1)).is_err());
    }
}
