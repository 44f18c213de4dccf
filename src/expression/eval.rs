//! Expression evaluation implementation.
//!
//! This is the in-process counterpart of compiling a tree: a plain interpreter
//! over the closed set of node kinds, evaluated against a chain of parameter
//! bindings.

use std::cmp::Ordering;

use crate::expression::{
    BinaryOperator, DataType, Expression, ExpressionError, ExpressionResult, Lambda, Method,
    ParamId, UnaryOperator, Value,
};

/// Parameter bindings visible while evaluating a lambda body
#[derive(Debug, Default)]
pub struct Scope<'a> {
    parent: Option<&'a Scope<'a>>,
    bindings: Vec<(ParamId, Value)>,
}

impl<'a> Scope<'a> {
    /// A scope with no bindings
    pub fn empty() -> Scope<'static> {
        Scope {
            parent: None,
            bindings: Vec::new(),
        }
    }

    /// A nested scope; inner bindings shadow outer ones
    pub fn child(&'a self, bindings: Vec<(ParamId, Value)>) -> Scope<'a> {
        Scope {
            parent: Some(self),
            bindings,
        }
    }

    pub fn lookup(&self, id: ParamId) -> Option<&Value> {
        self.bindings
            .iter()
            .rev()
            .find(|(bound, _)| *bound == id)
            .map(|(_, value)| value)
            .or_else(|| self.parent.and_then(|parent| parent.lookup(id)))
    }
}

/// Evaluator for expressions
#[derive(Debug, Default, Clone, Copy)]
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate an expression and return the result
    pub fn evaluate(&self, expr: &Expression, scope: &Scope<'_>) -> ExpressionResult<Value> {
        match expr {
            Expression::Literal(lit) => Ok(lit.value.clone()),

            Expression::Parameter(p) => {
                scope
                    .lookup(p.id())
                    .cloned()
                    .ok_or_else(|| ExpressionError::UnboundParameter {
                        name: p.name().to_string(),
                    })
            }

            Expression::Member { target, member } => {
                let target_val = self.evaluate(target, scope)?;
                self.evaluate_member(target_val, member)
            }

            Expression::Call { method, args } => self.evaluate_call(*method, args, scope),

            Expression::BinaryOp { op, left, right } if op.is_short_circuit() => {
                self.evaluate_logical(*op, left, right, scope)
            }

            Expression::BinaryOp { op, left, right } => {
                let left_val = self.evaluate(left, scope)?;
                let right_val = self.evaluate(right, scope)?;
                self.evaluate_binary_op(*op, left_val, right_val)
            }

            Expression::UnaryOp { op, operand } => {
                let operand_val = self.evaluate(operand, scope)?;
                self.evaluate_unary_op(*op, operand_val)
            }

            Expression::Conditional {
                test,
                if_true,
                if_false,
            } => {
                let test_val = self.evaluate(test, scope)?;
                if to_bool(test_val, "conditional test")? {
                    self.evaluate(if_true, scope)
                } else {
                    self.evaluate(if_false, scope)
                }
            }

            Expression::Lambda(_) => Err(ExpressionError::EvaluationError {
                message: "lambda can only appear as a method argument or invocation target"
                    .to_string(),
            }),

            Expression::Invoke { target, args } => match target.as_ref() {
                Expression::Lambda(lambda) => {
                    let values = args
                        .iter()
                        .map(|arg| self.evaluate(arg, scope))
                        .collect::<ExpressionResult<Vec<_>>>()?;
                    self.apply(lambda, values, scope)
                }
                marker if marker.is_embed_marker() => Err(ExpressionError::UnresolvedEmbed),
                other => Err(ExpressionError::EvaluationError {
                    message: format!("cannot invoke non-lambda expression {}", other),
                }),
            },

            Expression::Record { fields } => Ok(Value::Record(
                fields
                    .iter()
                    .map(|(name, value)| Ok((name.clone(), self.evaluate(value, scope)?)))
                    .collect::<ExpressionResult<_>>()?,
            )),
        }
    }

    /// Apply a lambda to argument values, binding its parameters in a child scope
    pub fn apply(
        &self,
        lambda: &Lambda,
        args: Vec<Value>,
        scope: &Scope<'_>,
    ) -> ExpressionResult<Value> {
        if args.len() != lambda.parameters.len() {
            return Err(ExpressionError::FunctionArgumentCount {
                function: "lambda".to_string(),
                expected: lambda.parameters.len(),
                actual: args.len(),
            });
        }
        let bindings = lambda
            .parameters
            .iter()
            .map(|p| p.id())
            .zip(args)
            .collect();
        let child = scope.child(bindings);
        self.evaluate(&lambda.body, &child)
    }

    fn test(&self, lambda: &Lambda, item: Value, scope: &Scope<'_>) -> ExpressionResult<bool> {
        to_bool(self.apply(lambda, vec![item], scope)?, "predicate result")
    }

    fn evaluate_member(&self, target: Value, member: &str) -> ExpressionResult<Value> {
        match target {
            Value::Record(mut fields) => {
                fields
                    .remove(member)
                    .ok_or_else(|| ExpressionError::UnknownMember {
                        member: member.to_string(),
                    })
            }
            Value::Null => Err(ExpressionError::UnexpectedNull {
                context: format!("member access .{}", member),
            }),
            other => Err(ExpressionError::TypeMismatch {
                expected: DataType::Record,
                actual: other.data_type(),
                context: format!("member access .{}", member),
            }),
        }
    }

    fn evaluate_logical(
        &self,
        op: BinaryOperator,
        left: &Expression,
        right: &Expression,
        scope: &Scope<'_>,
    ) -> ExpressionResult<Value> {
        let left_val = self.evaluate(left, scope)?;
        let decided = match (op, &left_val) {
            (BinaryOperator::And, Value::Boolean(false)) => Some(false),
            (BinaryOperator::Or, Value::Boolean(true)) => Some(true),
            (_, Value::Boolean(_)) => None,
            _ => {
                return Err(ExpressionError::InvalidOperandTypes {
                    operator: op.as_str().to_string(),
                    left_type: left_val.data_type(),
                    right_type: None,
                })
            }
        };
        if let Some(result) = decided {
            return Ok(Value::Boolean(result));
        }

        match self.evaluate(right, scope)? {
            Value::Boolean(b) => Ok(Value::Boolean(b)),
            other => Err(ExpressionError::InvalidOperandTypes {
                operator: op.as_str().to_string(),
                left_type: left_val.data_type(),
                right_type: other.data_type(),
            }),
        }
    }

    /// Evaluate a binary operation
    fn evaluate_binary_op(
        &self,
        op: BinaryOperator,
        left: Value,
        right: Value,
    ) -> ExpressionResult<Value> {
        match op {
            BinaryOperator::Eq => Ok(Value::Boolean(left == right)),
            BinaryOperator::Ne => Ok(Value::Boolean(left != right)),

            // Ordering against NULL is false, never an error
            BinaryOperator::Lt => self.compare_values(op, left, right, |o| o == Ordering::Less),
            BinaryOperator::Le => self.compare_values(op, left, right, |o| o != Ordering::Greater),
            BinaryOperator::Gt => self.compare_values(op, left, right, |o| o == Ordering::Greater),
            BinaryOperator::Ge => self.compare_values(op, left, right, |o| o != Ordering::Less),

            BinaryOperator::Add
            | BinaryOperator::Sub
            | BinaryOperator::Mul
            | BinaryOperator::Div => self.evaluate_arithmetic(op, left, right),

            BinaryOperator::Concat => match (&left, &right) {
                (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
                _ => Err(invalid_operands(op, &left, &right)),
            },

            BinaryOperator::And | BinaryOperator::Or => match (&left, &right) {
                (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(
                    if op == BinaryOperator::And { *a && *b } else { *a || *b },
                )),
                _ => Err(invalid_operands(op, &left, &right)),
            },
        }
    }

    fn evaluate_arithmetic(
        &self,
        op: BinaryOperator,
        left: Value,
        right: Value,
    ) -> ExpressionResult<Value> {
        // NULL propagates through arithmetic
        if left.is_null() || right.is_null() {
            return Ok(Value::Null);
        }

        match (op, &left, &right) {
            (BinaryOperator::Add, Value::String(a), Value::String(b)) => {
                Ok(Value::String(format!("{}{}", a, b)))
            }
            (BinaryOperator::Add, Value::Int64(a), Value::Int64(b)) => {
                Ok(Value::Int64(a.wrapping_add(*b)))
            }
            (BinaryOperator::Sub, Value::Int64(a), Value::Int64(b)) => {
                Ok(Value::Int64(a.wrapping_sub(*b)))
            }
            (BinaryOperator::Mul, Value::Int64(a), Value::Int64(b)) => {
                Ok(Value::Int64(a.wrapping_mul(*b)))
            }
            (BinaryOperator::Div, Value::Int64(a), Value::Int64(b)) => {
                if *b == 0 {
                    Err(ExpressionError::DivisionByZero)
                } else {
                    Ok(Value::Int64(a.wrapping_div(*b)))
                }
            }
            _ => match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => Ok(Value::Float64(match op {
                    BinaryOperator::Add => a + b,
                    BinaryOperator::Sub => a - b,
                    BinaryOperator::Mul => a * b,
                    _ => {
                        if b == 0.0 {
                            return Err(ExpressionError::DivisionByZero);
                        }
                        a / b
                    }
                })),
                _ => Err(invalid_operands(op, &left, &right)),
            },
        }
    }

    /// Evaluate a unary operation
    fn evaluate_unary_op(&self, op: UnaryOperator, operand: Value) -> ExpressionResult<Value> {
        match op {
            UnaryOperator::Not => match operand {
                Value::Null => Ok(Value::Null),
                Value::Boolean(b) => Ok(Value::Boolean(!b)),
                _ => Err(ExpressionError::InvalidOperandTypes {
                    operator: op.as_str().to_string(),
                    left_type: operand.data_type(),
                    right_type: None,
                }),
            },

            UnaryOperator::Minus => match operand {
                Value::Null => Ok(Value::Null),
                Value::Int64(n) => Ok(Value::Int64(n.wrapping_neg())),
                Value::Float64(n) => Ok(Value::Float64(-n)),
                _ => Err(ExpressionError::InvalidOperandTypes {
                    operator: op.as_str().to_string(),
                    left_type: operand.data_type(),
                    right_type: None,
                }),
            },

            UnaryOperator::IsNull => Ok(Value::Boolean(operand.is_null())),

            UnaryOperator::IsNotNull => Ok(Value::Boolean(!operand.is_null())),
        }
    }

    /// Compare two values and apply a comparison function
    fn compare_values<F>(
        &self,
        op: BinaryOperator,
        left: Value,
        right: Value,
        cmp_fn: F,
    ) -> ExpressionResult<Value>
    where
        F: FnOnce(Ordering) -> bool,
    {
        let ordering = match (&left, &right) {
            (Value::Null, _) | (_, Value::Null) => return Ok(Value::Boolean(false)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::UInt64(a), Value::UInt64(b)) => Some(a.cmp(b)),
            _ => match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => return Err(invalid_operands(op, &left, &right)),
            },
        };

        // NaN orders with nothing
        Ok(Value::Boolean(ordering.map(cmp_fn).unwrap_or(false)))
    }

    fn evaluate_call(
        &self,
        method: Method,
        args: &[Expression],
        scope: &Scope<'_>,
    ) -> ExpressionResult<Value> {
        let (min, max) = method.arity();
        if args.len() < min || args.len() > max {
            return Err(ExpressionError::FunctionArgumentCount {
                function: method.as_str().to_string(),
                expected: if args.len() < min { min } else { max },
                actual: args.len(),
            });
        }

        if method == Method::Embed {
            return Err(ExpressionError::UnresolvedEmbed);
        }

        let receiver = self.evaluate(&args[0], scope)?;
        if receiver.is_null() {
            return Err(ExpressionError::UnexpectedNull {
                context: format!("receiver of {}", method.as_str()),
            });
        }

        if method.takes_lambda() {
            let lambda = match args.get(1) {
                None => None,
                Some(Expression::Lambda(lambda)) => Some(lambda),
                Some(other) => {
                    return Err(ExpressionError::EvaluationError {
                        message: format!(
                            "{} expects a lambda argument, got {}",
                            method.as_str(),
                            other
                        ),
                    })
                }
            };
            return self.evaluate_sequence_method(method, receiver, lambda, scope);
        }

        let argument = match args.get(1) {
            Some(arg) => Some(self.evaluate(arg, scope)?),
            None => None,
        };
        self.evaluate_string_method(method, receiver, argument)
    }

    fn evaluate_string_method(
        &self,
        method: Method,
        receiver: Value,
        argument: Option<Value>,
    ) -> ExpressionResult<Value> {
        let mismatch = |actual: &Value| ExpressionError::TypeMismatch {
            expected: DataType::String,
            actual: actual.data_type(),
            context: format!("argument of {}", method.as_str()),
        };

        match (method, &receiver, argument.as_ref()) {
            (Method::Contains, Value::List(items), Some(needle)) => {
                Ok(Value::Boolean(items.contains(needle)))
            }
            (Method::Length, Value::List(items), None) => Ok(Value::Int64(items.len() as i64)),
            (_, Value::String(s), None) => match method {
                Method::ToLower => Ok(Value::String(s.to_lowercase())),
                Method::ToUpper => Ok(Value::String(s.to_uppercase())),
                Method::Length => Ok(Value::Int64(s.chars().count() as i64)),
                _ => Err(mismatch(&Value::Null)),
            },
            (_, Value::String(s), Some(Value::String(other))) => Ok(Value::Boolean(match method {
                Method::Contains => s.contains(other.as_str()),
                Method::StartsWith => s.starts_with(other.as_str()),
                Method::EndsWith => s.ends_with(other.as_str()),
                _ => s.to_lowercase() == other.to_lowercase(),
            })),
            (_, Value::String(_), Some(other)) => Err(mismatch(other)),
            (_, other, _) => Err(mismatch(other)),
        }
    }

    fn evaluate_sequence_method(
        &self,
        method: Method,
        receiver: Value,
        lambda: Option<&Lambda>,
        scope: &Scope<'_>,
    ) -> ExpressionResult<Value> {
        let items = match receiver {
            Value::List(items) => items,
            other => {
                return Err(ExpressionError::TypeMismatch {
                    expected: DataType::List,
                    actual: other.data_type(),
                    context: format!("receiver of {}", method.as_str()),
                })
            }
        };

        match (method, lambda) {
            (Method::Any, None) => Ok(Value::Boolean(!items.is_empty())),
            (Method::Count, None) => Ok(Value::Int64(items.len() as i64)),
            (Method::FirstOrDefault, None) => Ok(items.into_iter().next().unwrap_or(Value::Null)),
            (Method::Sum, None) => sum_values(items),

            (Method::Any, Some(lambda)) => {
                for item in items {
                    if self.test(lambda, item, scope)? {
                        return Ok(Value::Boolean(true));
                    }
                }
                Ok(Value::Boolean(false))
            }
            (Method::All, Some(lambda)) => {
                for item in items {
                    if !self.test(lambda, item, scope)? {
                        return Ok(Value::Boolean(false));
                    }
                }
                Ok(Value::Boolean(true))
            }
            (Method::Where, Some(lambda)) => {
                let mut kept = Vec::new();
                for item in items {
                    if self.test(lambda, item.clone(), scope)? {
                        kept.push(item);
                    }
                }
                Ok(Value::List(kept))
            }
            (Method::Select, Some(lambda)) => Ok(Value::List(
                items
                    .into_iter()
                    .map(|item| self.apply(lambda, vec![item], scope))
                    .collect::<ExpressionResult<_>>()?,
            )),
            (Method::Count, Some(lambda)) => {
                let mut count = 0;
                for item in items {
                    if self.test(lambda, item, scope)? {
                        count += 1;
                    }
                }
                Ok(Value::Int64(count))
            }
            (Method::FirstOrDefault, Some(lambda)) => {
                for item in items {
                    if self.test(lambda, item.clone(), scope)? {
                        return Ok(item);
                    }
                }
                Ok(Value::Null)
            }
            (Method::Sum, Some(lambda)) => sum_values(
                items
                    .into_iter()
                    .map(|item| self.apply(lambda, vec![item], scope))
                    .collect::<ExpressionResult<_>>()?,
            ),
            (other, _) => Err(ExpressionError::EvaluationError {
                message: format!("{} is not a sequence method", other.as_str()),
            }),
        }
    }
}

fn invalid_operands(op: BinaryOperator, left: &Value, right: &Value) -> ExpressionError {
    ExpressionError::InvalidOperandTypes {
        operator: op.as_str().to_string(),
        left_type: left.data_type(),
        right_type: right.data_type(),
    }
}

fn sum_values(items: Vec<Value>) -> ExpressionResult<Value> {
    let mut int_total: i64 = 0;
    let mut float_total: Option<f64> = None;
    for item in items {
        match item {
            Value::Null => {}
            Value::Int64(n) => match float_total.as_mut() {
                Some(total) => *total += n as f64,
                None => int_total = int_total.wrapping_add(n),
            },
            Value::Float64(n) => {
                *float_total.get_or_insert(int_total as f64) += n;
            }
            Value::UInt64(n) => {
                *float_total.get_or_insert(int_total as f64) += n as f64;
            }
            other => {
                return Err(ExpressionError::TypeMismatch {
                    expected: DataType::Float64,
                    actual: other.data_type(),
                    context: "Sum".to_string(),
                })
            }
        }
    }
    Ok(float_total.map(Value::Float64).unwrap_or(Value::Int64(int_total)))
}

/// Read a predicate-style result; NULL counts as false
pub fn to_bool(value: Value, context: &str) -> ExpressionResult<bool> {
    match value {
        Value::Boolean(b) => Ok(b),
        Value::Null => Ok(false),
        other => Err(ExpressionError::TypeMismatch {
            expected: DataType::Boolean,
            actual: other.data_type(),
            context: context.to_string(),
        }),
    }
}

/// Helper function to evaluate a closed expression
pub fn evaluate_expression(expr: &Expression) -> ExpressionResult<Value> {
    ExpressionEvaluator::new().evaluate(expr, &Scope::empty())
}

/// A lambda ready to be applied to argument values.
///
/// Construction rejects trees that still contain embed markers.
#[derive(Debug, Clone)]
pub struct CompiledLambda {
    lambda: Lambda,
}

impl CompiledLambda {
    pub fn new(lambda: Lambda) -> ExpressionResult<Self> {
        if lambda.body.contains_embed() {
            return Err(ExpressionError::UnresolvedEmbed);
        }
        Ok(Self { lambda })
    }

    pub fn lambda(&self) -> &Lambda {
        &self.lambda
    }

    pub fn invoke(&self, args: Vec<Value>) -> ExpressionResult<Value> {
        ExpressionEvaluator::new().apply(&self.lambda, args, &Scope::empty())
    }

    /// Invoke and read the result as a predicate outcome
    pub fn test(&self, args: Vec<Value>) -> ExpressionResult<bool> {
        to_bool(self.invoke(args)?, "predicate result")
    }
}
