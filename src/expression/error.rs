//! Error types for expression evaluation.

use crate::expression::DataType;
use std::fmt;

/// Errors that can occur during expression evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionError {
    /// Type mismatch in operation
    TypeMismatch {
        expected: DataType,
        actual: Option<DataType>,
        context: String,
    },

    /// Invalid operand types for operator
    InvalidOperandTypes {
        operator: String,
        left_type: Option<DataType>,
        right_type: Option<DataType>,
    },

    /// Parameter referenced outside the lambda that declares it
    UnboundParameter { name: String },

    /// Record has no field with this name
    UnknownMember { member: String },

    /// Division by zero
    DivisionByZero,

    /// NULL value in non-nullable context
    UnexpectedNull { context: String },

    /// Wrong number of method arguments
    FunctionArgumentCount {
        function: String,
        expected: usize,
        actual: usize,
    },

    /// Embed marker reached the evaluator without being resolved
    UnresolvedEmbed,

    /// Entity could not be converted to or from a value
    Conversion { message: String },

    /// Generic evaluation error
    EvaluationError { message: String },
}

/// Type name for messages; a missing type is a NULL value
struct TypeName(Option<DataType>);

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(data_type) => write!(f, "{:?}", data_type),
            None => write!(f, "NULL"),
        }
    }
}

impl fmt::Display for ExpressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionError::TypeMismatch {
                expected,
                actual,
                context,
            } => {
                write!(
                    f,
                    "Type mismatch in {}: expected {:?}, got {}",
                    context,
                    expected,
                    TypeName(*actual)
                )
            }

            ExpressionError::InvalidOperandTypes {
                operator,
                left_type,
                right_type,
            } => {
                write!(
                    f,
                    "Invalid operand types for operator {}: left={}, right={}",
                    operator,
                    TypeName(*left_type),
                    TypeName(*right_type)
                )
            }

            ExpressionError::UnboundParameter { name } => {
                write!(f, "Parameter '{}' is not bound in this scope", name)
            }

            ExpressionError::UnknownMember { member } => {
                write!(f, "Unknown member: {}", member)
            }

            ExpressionError::DivisionByZero => write!(f, "Division by zero"),

            ExpressionError::UnexpectedNull { context } => {
                write!(f, "Unexpected NULL value in {}", context)
            }

            ExpressionError::FunctionArgumentCount {
                function,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Function {} expects {} arguments, got {}",
                    function, expected, actual
                )
            }

            ExpressionError::UnresolvedEmbed => {
                write!(f, "Embed marker must be resolved before evaluation")
            }

            ExpressionError::Conversion { message } => {
                write!(f, "Value conversion failed: {}", message)
            }

            ExpressionError::EvaluationError { message } => {
                write!(f, "Expression evaluation error: {}", message)
            }
        }
    }
}

impl std::error::Error for ExpressionError {}

/// Result type for expression operations
pub type ExpressionResult<T> = Result<T, ExpressionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExpressionError::TypeMismatch {
            expected: DataType::Boolean,
            actual: Some(DataType::String),
            context: "predicate result".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Type mismatch in predicate result: expected Boolean, got String"
        );

        let err = ExpressionError::TypeMismatch {
            expected: DataType::List,
            actual: None,
            context: "receiver of Any".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Type mismatch in receiver of Any: expected List, got NULL"
        );

        let err = ExpressionError::InvalidOperandTypes {
            operator: "+".to_string(),
            left_type: Some(DataType::Int64),
            right_type: Some(DataType::Boolean),
        };
        assert_eq!(
            err.to_string(),
            "Invalid operand types for operator +: left=Int64, right=Boolean"
        );

        let err = ExpressionError::UnboundParameter {
            name: "x".to_string(),
        };
        assert_eq!(err.to_string(), "Parameter 'x' is not bound in this scope");

        let err = ExpressionError::DivisionByZero;
        assert_eq!(err.to_string(), "Division by zero");

        let err = ExpressionError::UnexpectedNull {
            context: "member access .active".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unexpected NULL value in member access .active"
        );

        let err = ExpressionError::FunctionArgumentCount {
            function: "Contains".to_string(),
            expected: 2,
            actual: 1,
        };
        assert_eq!(err.to_string(), "Function Contains expects 2 arguments, got 1");
    }
}
