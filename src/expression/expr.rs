//! Expression AST definitions.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::expression::operator::{BinaryOperator, Method, UnaryOperator};
use crate::expression::Value;

static NEXT_PARAMETER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a formal parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(u64);

/// Formal parameter of a lambda.
///
/// Identity is the id, not the name: two parameters both named `x` are
/// different parameters, and substitution only ever matches by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    id: ParamId,
    name: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ParamId(NEXT_PARAMETER_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
        }
    }

    pub fn id(&self) -> ParamId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reference to this parameter as an expression node
    pub fn to_expr(&self) -> Expression {
        Expression::Parameter(self.clone())
    }
}

/// Literal value in an expression
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: Value,
}

impl Literal {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn null() -> Self {
        Self { value: Value::Null }
    }

    pub fn bool(val: bool) -> Self {
        Self {
            value: Value::Boolean(val),
        }
    }

    pub fn int64(val: i64) -> Self {
        Self {
            value: Value::Int64(val),
        }
    }

    pub fn string(val: impl Into<String>) -> Self {
        Self {
            value: Value::String(val.into()),
        }
    }
}

/// A function-shaped tree: formal parameters plus a body
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub parameters: Vec<Parameter>,
    pub body: Box<Expression>,
}

impl Lambda {
    pub fn new(parameters: Vec<Parameter>, body: Expression) -> Self {
        Self {
            parameters,
            body: Box::new(body),
        }
    }

    /// Build a one-parameter lambda from a closure over the parameter node
    pub fn unary(name: &str, build: impl FnOnce(Expression) -> Expression) -> Self {
        let parameter = Parameter::new(name);
        let body = build(parameter.to_expr());
        Self::new(vec![parameter], body)
    }

    /// Build a two-parameter lambda from a closure over both parameter nodes
    pub fn binary(
        names: (&str, &str),
        build: impl FnOnce(Expression, Expression) -> Expression,
    ) -> Self {
        let first = Parameter::new(names.0);
        let second = Parameter::new(names.1);
        let body = build(first.to_expr(), second.to_expr());
        Self::new(vec![first, second], body)
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }
}

/// Expression tree node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal constant value
    Literal(Literal),

    /// Reference to a formal parameter
    Parameter(Parameter),

    /// Field access on a record
    Member {
        target: Box<Expression>,
        member: String,
    },

    /// Built-in method call; the receiver is the first argument
    Call { method: Method, args: Vec<Expression> },

    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },

    /// `test ? if_true : if_false`
    Conditional {
        test: Box<Expression>,
        if_true: Box<Expression>,
        if_false: Box<Expression>,
    },

    /// Nested function, e.g. the argument of `Any`
    Lambda(Lambda),

    /// Invocation of a function-valued expression
    Invoke {
        target: Box<Expression>,
        args: Vec<Expression>,
    },

    /// Construction of a record with named fields
    Record { fields: Vec<(String, Expression)> },
}

impl Expression {
    /// Create a literal expression
    pub fn literal(value: Value) -> Self {
        Expression::Literal(Literal::new(value))
    }

    pub fn bool(val: bool) -> Self {
        Expression::Literal(Literal::bool(val))
    }

    pub fn int64(val: i64) -> Self {
        Expression::Literal(Literal::int64(val))
    }

    pub fn string(val: impl Into<String>) -> Self {
        Expression::Literal(Literal::string(val))
    }

    pub fn null() -> Self {
        Expression::Literal(Literal::null())
    }

    /// Create a member access on this expression
    pub fn member(self, member: impl Into<String>) -> Self {
        Expression::Member {
            target: Box::new(self),
            member: member.into(),
        }
    }

    /// Create a method call expression
    pub fn call(method: Method, args: Vec<Expression>) -> Self {
        Expression::Call { method, args }
    }

    /// Create a binary operation expression
    pub fn binary_op(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Create a unary operation expression
    pub fn unary_op(op: UnaryOperator, operand: Expression) -> Self {
        Expression::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    /// Create a conditional expression
    pub fn conditional(test: Expression, if_true: Expression, if_false: Expression) -> Self {
        Expression::Conditional {
            test: Box::new(test),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
        }
    }

    pub fn lambda(lambda: Lambda) -> Self {
        Expression::Lambda(lambda)
    }

    /// Create an invocation of `target` with `args`
    pub fn invoke(target: Expression, args: Vec<Expression>) -> Self {
        Expression::Invoke {
            target: Box::new(target),
            args,
        }
    }

    /// Create a record construction expression
    pub fn record<N: Into<String>>(fields: Vec<(N, Expression)>) -> Self {
        Expression::Record {
            fields: fields
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }
    }

    /// Create an AND expression
    pub fn and(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::And, left, right)
    }

    /// Create an OR expression
    pub fn or(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Or, left, right)
    }

    /// Create a NOT expression
    pub fn not_expr(operand: Expression) -> Self {
        Self::unary_op(UnaryOperator::Not, operand)
    }

    /// Create an equality expression
    pub fn eq(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Eq, left, right)
    }

    /// Create a not-equal expression
    pub fn ne(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Ne, left, right)
    }

    /// Create a less-than expression
    pub fn lt(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Lt, left, right)
    }

    /// Create a less-than-or-equal expression
    pub fn le(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Le, left, right)
    }

    /// Create a greater-than expression
    pub fn gt(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Gt, left, right)
    }

    /// Create a greater-than-or-equal expression
    pub fn ge(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Ge, left, right)
    }

    /// Create an addition expression
    pub fn add_expr(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Add, left, right)
    }

    /// Create a subtraction expression
    pub fn sub_expr(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Sub, left, right)
    }

    /// Create a multiplication expression
    pub fn mul_expr(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Mul, left, right)
    }

    /// Create a division expression
    pub fn div_expr(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Div, left, right)
    }

    /// Create an IS NULL expression
    pub fn is_null(operand: Expression) -> Self {
        Self::unary_op(UnaryOperator::IsNull, operand)
    }

    /// Create an IS NOT NULL expression
    pub fn is_not_null(operand: Expression) -> Self {
        Self::unary_op(UnaryOperator::IsNotNull, operand)
    }

    // Method-call sugar. The receiver is `self`.

    pub fn contains(self, needle: Expression) -> Self {
        Self::call(Method::Contains, vec![self, needle])
    }

    pub fn starts_with(self, prefix: Expression) -> Self {
        Self::call(Method::StartsWith, vec![self, prefix])
    }

    pub fn ends_with(self, suffix: Expression) -> Self {
        Self::call(Method::EndsWith, vec![self, suffix])
    }

    pub fn equals_ignore_case(self, other: Expression) -> Self {
        Self::call(Method::EqualsIgnoreCase, vec![self, other])
    }

    pub fn to_lower(self) -> Self {
        Self::call(Method::ToLower, vec![self])
    }

    pub fn to_upper(self) -> Self {
        Self::call(Method::ToUpper, vec![self])
    }

    pub fn length(self) -> Self {
        Self::call(Method::Length, vec![self])
    }

    pub fn any(self, predicate: Lambda) -> Self {
        Self::call(Method::Any, vec![self, Expression::Lambda(predicate)])
    }

    pub fn all(self, predicate: Lambda) -> Self {
        Self::call(Method::All, vec![self, Expression::Lambda(predicate)])
    }

    pub fn filter(self, predicate: Lambda) -> Self {
        Self::call(Method::Where, vec![self, Expression::Lambda(predicate)])
    }

    pub fn select(self, projection: Lambda) -> Self {
        Self::call(Method::Select, vec![self, Expression::Lambda(projection)])
    }

    pub fn count(self) -> Self {
        Self::call(Method::Count, vec![self])
    }

    pub fn count_where(self, predicate: Lambda) -> Self {
        Self::call(Method::Count, vec![self, Expression::Lambda(predicate)])
    }

    pub fn first_or_default(self) -> Self {
        Self::call(Method::FirstOrDefault, vec![self])
    }

    pub fn sum(self) -> Self {
        Self::call(Method::Sum, vec![self])
    }

    /// The boolean value of this node when it is a boolean literal
    pub fn as_bool_literal(&self) -> Option<bool> {
        match self {
            Expression::Literal(Literal {
                value: Value::Boolean(b),
            }) => Some(*b),
            _ => None,
        }
    }

    /// Whether this node is an embed marker call
    pub fn is_embed_marker(&self) -> bool {
        matches!(
            self,
            Expression::Call {
                method: Method::Embed,
                ..
            }
        )
    }

    /// Check if any embed marker remains anywhere in this tree
    pub fn contains_embed(&self) -> bool {
        match self {
            Expression::Literal(_) | Expression::Parameter(_) => false,
            Expression::Member { target, .. } => target.contains_embed(),
            Expression::Call { method, args } => {
                *method == Method::Embed || args.iter().any(|arg| arg.contains_embed())
            }
            Expression::BinaryOp { left, right, .. } => {
                left.contains_embed() || right.contains_embed()
            }
            Expression::UnaryOp { operand, .. } => operand.contains_embed(),
            Expression::Conditional {
                test,
                if_true,
                if_false,
            } => test.contains_embed() || if_true.contains_embed() || if_false.contains_embed(),
            Expression::Lambda(lambda) => lambda.body.contains_embed(),
            Expression::Invoke { target, args } => {
                target.contains_embed() || args.iter().any(|arg| arg.contains_embed())
            }
            Expression::Record { fields } => fields.iter().any(|(_, value)| value.contains_embed()),
        }
    }

    /// Check if this expression is a constant (references no parameters)
    pub fn is_constant(&self) -> bool {
        match self {
            Expression::Literal(_) => true,
            Expression::Parameter(_) => false,
            Expression::Member { target, .. } => target.is_constant(),
            Expression::Call { args, .. } => args.iter().all(|arg| arg.is_constant()),
            Expression::BinaryOp { left, right, .. } => left.is_constant() && right.is_constant(),
            Expression::UnaryOp { operand, .. } => operand.is_constant(),
            Expression::Conditional {
                test,
                if_true,
                if_false,
            } => test.is_constant() && if_true.is_constant() && if_false.is_constant(),
            // A lambda's own parameters are bound, but its body may capture outer ones.
            Expression::Lambda(lambda) => lambda.body.references_only(&lambda.parameters),
            Expression::Invoke { target, args } => {
                target.is_constant() && args.iter().all(|arg| arg.is_constant())
            }
            Expression::Record { fields } => fields.iter().all(|(_, value)| value.is_constant()),
        }
    }

    fn references_only(&self, bound: &[Parameter]) -> bool {
        let mut free = Vec::new();
        self.collect_parameters(&mut free);
        free.iter().all(|p| bound.iter().any(|b| b.id() == p.id()))
    }

    /// Collect every parameter referenced anywhere in this tree
    pub fn collect_parameters(&self, out: &mut Vec<Parameter>) {
        match self {
            Expression::Literal(_) => {}
            Expression::Parameter(p) => {
                if !out.iter().any(|seen| seen.id() == p.id()) {
                    out.push(p.clone());
                }
            }
            Expression::Member { target, .. } => target.collect_parameters(out),
            Expression::Call { args, .. } => args.iter().for_each(|a| a.collect_parameters(out)),
            Expression::BinaryOp { left, right, .. } => {
                left.collect_parameters(out);
                right.collect_parameters(out);
            }
            Expression::UnaryOp { operand, .. } => operand.collect_parameters(out),
            Expression::Conditional {
                test,
                if_true,
                if_false,
            } => {
                test.collect_parameters(out);
                if_true.collect_parameters(out);
                if_false.collect_parameters(out);
            }
            Expression::Lambda(lambda) => lambda.body.collect_parameters(out),
            Expression::Invoke { target, args } => {
                target.collect_parameters(out);
                args.iter().for_each(|a| a.collect_parameters(out));
            }
            Expression::Record { fields } => {
                fields.iter().for_each(|(_, v)| v.collect_parameters(out))
            }
        }
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parameters.as_slice() {
            [single] => write!(f, "{} => {}", single.name(), self.body),
            params => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p.name())?;
                }
                write!(f, ") => {}", self.body)
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(lit) => write!(f, "{}", lit.value),
            Expression::Parameter(p) => write!(f, "{}", p.name()),
            Expression::Member { target, member } => write!(f, "{}.{}", target, member),
            Expression::Call { method, args } => match args.split_first() {
                Some((receiver, rest)) if *method != Method::Embed => {
                    write!(f, "{}.{}(", receiver, method.as_str())?;
                    write_list(f, rest)?;
                    write!(f, ")")
                }
                _ => {
                    write!(f, "{}(", method.as_str())?;
                    write_list(f, args)?;
                    write!(f, ")")
                }
            },
            Expression::BinaryOp { op, left, right } => {
                write!(f, "({} {} {})", left, op.as_str(), right)
            }
            Expression::UnaryOp { op, operand } => match op {
                UnaryOperator::Not | UnaryOperator::Minus => write!(f, "{}{}", op.as_str(), operand),
                UnaryOperator::IsNull | UnaryOperator::IsNotNull => {
                    write!(f, "({} {})", operand, op.as_str())
                }
            },
            Expression::Conditional {
                test,
                if_true,
                if_false,
            } => write!(f, "({} ? {} : {})", test, if_true, if_false),
            Expression::Lambda(lambda) => write!(f, "({})", lambda),
            Expression::Invoke { target, args } => {
                write!(f, "{}(", target)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Expression::Record { fields } => {
                write!(f, "new {{ ")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", name, value)?;
                }
                write!(f, " }}")
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expression]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_identity() {
        let a = Parameter::new("x");
        let b = Parameter::new("x");
        assert_eq!(a.name(), b.name());
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
    }

    #[test]
    fn test_literal() {
        let null_lit = Literal::null();
        assert_eq!(null_lit.value, Value::Null);

        let bool_lit = Literal::bool(true);
        assert_eq!(bool_lit.value, Value::Boolean(true));

        let int_lit = Literal::int64(42);
        assert_eq!(int_lit.value, Value::Int64(42));

        let str_lit = Literal::string("hello");
        assert_eq!(str_lit.value, Value::String("hello".to_string()));
    }

    #[test]
    fn test_lambda_builders() {
        let lambda = Lambda::unary("x", |x| Expression::eq(x.member("id"), Expression::string("1")));
        assert_eq!(lambda.arity(), 1);
        assert_eq!(lambda.to_string(), "x => (x.id == \"1\")");

        let pair = Lambda::binary(("a", "b"), |a, b| Expression::lt(a, b));
        assert_eq!(pair.arity(), 2);
        assert_eq!(pair.to_string(), "(a, b) => (a < b)");
    }

    #[test]
    fn test_bool_literal_detection() {
        assert_eq!(Expression::bool(true).as_bool_literal(), Some(true));
        assert_eq!(Expression::bool(false).as_bool_literal(), Some(false));
        assert_eq!(Expression::int64(1).as_bool_literal(), None);
        assert_eq!(
            Expression::not_expr(Expression::bool(true)).as_bool_literal(),
            None
        );
    }

    #[test]
    fn test_is_constant() {
        // Literal is constant
        assert!(Expression::int64(42).is_constant());

        // Parameter reference is not constant
        let x = Parameter::new("x");
        assert!(!x.to_expr().is_constant());

        // Binary op with all constants is constant
        assert!(Expression::add_expr(Expression::int64(1), Expression::int64(2)).is_constant());

        // Binary op with a parameter is not constant
        assert!(!Expression::add_expr(x.to_expr(), Expression::int64(2)).is_constant());

        // A closed lambda is constant, one capturing an outer parameter is not
        let closed = Lambda::unary("y", |y| Expression::is_null(y));
        assert!(Expression::Lambda(closed).is_constant());
        let captured = x.to_expr();
        let open = Lambda::unary("y", move |y| Expression::eq(y, captured));
        assert!(!Expression::Lambda(open).is_constant());
    }

    #[test]
    fn test_display_nested() {
        let expr = Lambda::unary("x", |x| {
            x.member("items")
                .any(Lambda::unary("y", |y| y.member("active")))
        });
        assert_eq!(expr.to_string(), "x => x.items.Any((y => y.active))");

        let record = Expression::record(vec![("count", Expression::int64(2))]);
        assert_eq!(record.to_string(), "new { count = 2 }");
    }
}
