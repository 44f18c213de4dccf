//! Operator and built-in method definitions for expressions.

/// Binary operators supported in expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Logical, short-circuiting
    And,
    Or,

    // String
    Concat,
}

impl BinaryOperator {
    /// Whether the right operand is only evaluated when the left one does not decide the result
    pub fn is_short_circuit(&self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }

    /// Get the display string for this operator
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Le => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ge => ">=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
            BinaryOperator::Concat => "++",
        }
    }
}

/// Unary operators supported in expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    // Logical
    Not,

    // Arithmetic
    Minus,

    // NULL checks
    IsNull,
    IsNotNull,
}

impl UnaryOperator {
    /// Get the display string for this operator
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOperator::Not => "!",
            UnaryOperator::Minus => "-",
            UnaryOperator::IsNull => "is null",
            UnaryOperator::IsNotNull => "is not null",
        }
    }
}

/// Built-in methods callable from a tree.
///
/// The receiver, when there is one, is the first argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Embed marker: inlined by the embedding resolver, never evaluated
    Embed,

    // String
    Contains,
    StartsWith,
    EndsWith,
    EqualsIgnoreCase,
    ToLower,
    ToUpper,
    Length,

    // Sequence
    Any,
    All,
    Where,
    Select,
    Count,
    FirstOrDefault,
    Sum,
}

impl Method {
    /// Accepted argument count, receiver included, as `(min, max)`
    pub fn arity(&self) -> (usize, usize) {
        match self {
            Method::Embed => (1, 1),
            Method::Contains
            | Method::StartsWith
            | Method::EndsWith
            | Method::EqualsIgnoreCase => (2, 2),
            Method::ToLower | Method::ToUpper | Method::Length => (1, 1),
            Method::All | Method::Where | Method::Select => (2, 2),
            Method::Any | Method::Count | Method::FirstOrDefault | Method::Sum => (1, 2),
        }
    }

    /// Whether the second argument is a function applied per element
    pub fn takes_lambda(&self) -> bool {
        matches!(
            self,
            Method::Any
                | Method::All
                | Method::Where
                | Method::Select
                | Method::Count
                | Method::FirstOrDefault
                | Method::Sum
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Embed => "Embed",
            Method::Contains => "Contains",
            Method::StartsWith => "StartsWith",
            Method::EndsWith => "EndsWith",
            Method::EqualsIgnoreCase => "EqualsIgnoreCase",
            Method::ToLower => "ToLower",
            Method::ToUpper => "ToUpper",
            Method::Length => "Length",
            Method::Any => "Any",
            Method::All => "All",
            Method::Where => "Where",
            Method::Select => "Select",
            Method::Count => "Count",
            Method::FirstOrDefault => "FirstOrDefault",
            Method::Sum => "Sum",
        }
    }
}
