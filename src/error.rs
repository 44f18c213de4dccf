//! Crate-level error types.

use thiserror::Error;

use crate::expression::ExpressionError;

/// Errors raised while composing, resolving or applying specifications.
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("Required argument is absent: {0}")]
    NullArgument(&'static str),

    #[error("Arity mismatch: expected {expected} arguments, supplied {supplied}")]
    ArityMismatch { expected: usize, supplied: usize },

    #[error("Cannot resolve embedded expression: {0}")]
    UnresolvableEmbed(String),

    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionError),

    #[error(transparent)]
    Engine(anyhow::Error),
}

/// Result type for specification operations.
pub type Result<T> = std::result::Result<T, SpecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            SpecError::NullArgument("specification").to_string(),
            "Required argument is absent: specification"
        );
        assert_eq!(
            SpecError::ArityMismatch {
                expected: 1,
                supplied: 2
            }
            .to_string(),
            "Arity mismatch: expected 1 arguments, supplied 2"
        );
        assert_eq!(
            SpecError::from(ExpressionError::DivisionByZero).to_string(),
            "Expression error: Division by zero"
        );
        assert_eq!(
            SpecError::Engine(anyhow::anyhow!("connection reset")).to_string(),
            "connection reset"
        );
    }
}
