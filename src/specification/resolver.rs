//! Embedding resolution.
//!
//! Replaces every embed marker in a tree with the tree it references, so the
//! result can be evaluated in-process or handed to a query engine. Markers
//! come in two forms:
//!
//! - `Embed(handle)`: the referenced lambda's body is spliced in place.
//! - `Embed(handle)(args...)`: the referenced lambda's parameters are
//!   substituted positionally with `args`, then spliced in place.
//!
//! Spliced trees are resolved recursively. Resolving an already resolved
//! tree returns an equal tree.

use log::debug;

use crate::error::{Result, SpecError};
use crate::expression::rewrite::rewrite_all;
use crate::expression::{
    evaluate_expression, substitute_parameters, EmbedHandle, Expression, ExpressionRewriter,
    Lambda, Method, Value,
};

/// Limits for a resolution pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Deepest chain of nested markers accepted before giving up
    pub max_depth: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { max_depth: 32 }
    }
}

/// Rewriter that inlines embedded specifications and selectors
#[derive(Debug, Default)]
pub struct EmbeddingResolver {
    config: ResolverConfig,
    depth: usize,
}

impl EmbeddingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ResolverConfig) -> Self {
        Self { config, depth: 0 }
    }

    /// Resolve every marker in `expr`
    pub fn resolve(&mut self, expr: &Expression) -> Result<Expression> {
        self.rewrite(expr)
    }

    /// Resolve every marker in a lambda's body, keeping its parameters
    pub fn resolve_lambda(&mut self, lambda: &Lambda) -> Result<Lambda> {
        Ok(Lambda::new(
            lambda.parameters.clone(),
            self.resolve(&lambda.body)?,
        ))
    }

    fn handle_of(args: &[Expression]) -> Result<EmbedHandle> {
        let [arg] = args else {
            return Err(SpecError::UnresolvableEmbed(format!(
                "marker takes one argument, got {}",
                args.len()
            )));
        };
        match evaluate_expression(arg) {
            Ok(Value::Embedded(handle)) => Ok(handle),
            Ok(other) => Err(SpecError::UnresolvableEmbed(format!(
                "marker argument {} is not a specification or selector",
                other
            ))),
            Err(e) => Err(SpecError::UnresolvableEmbed(format!(
                "marker argument {} cannot be evaluated: {}",
                arg, e
            ))),
        }
    }

    /// Resolve `expr`, which came from `handle`, one level deeper
    fn descend(&mut self, handle: &EmbedHandle, expr: &Expression) -> Result<Expression> {
        if self.depth >= self.config.max_depth {
            return Err(SpecError::UnresolvableEmbed(format!(
                "{} nests deeper than {} levels",
                handle.describe(),
                self.config.max_depth
            )));
        }
        self.depth += 1;
        let result = self.rewrite(expr);
        self.depth -= 1;
        result
    }
}

impl ExpressionRewriter for EmbeddingResolver {
    type Error = SpecError;

    fn rewrite_call(&mut self, method: Method, args: &[Expression]) -> Result<Expression> {
        if method != Method::Embed {
            return Ok(Expression::call(method, rewrite_all(self, args)?));
        }
        let handle = Self::handle_of(args)?;
        let lambda = handle.lambda();
        debug!("inlining {} as {}", handle.describe(), lambda);
        self.descend(&handle, &lambda.body)
    }

    fn rewrite_invoke(&mut self, target: &Expression, args: &[Expression]) -> Result<Expression> {
        let Expression::Call {
            method: Method::Embed,
            args: marker_args,
        } = target
        else {
            let target = self.rewrite(target)?;
            return Ok(Expression::invoke(target, rewrite_all(self, args)?));
        };

        let handle = Self::handle_of(marker_args)?;
        let lambda = handle.lambda();
        let body = substitute_parameters(&lambda, args)?;
        debug!(
            "inlining {} with {} argument(s) as {}",
            handle.describe(),
            args.len(),
            body
        );
        self.descend(&handle, &body)
    }
}

/// Resolve `expr` with the default configuration
pub fn resolve_embedded(expr: &Expression) -> Result<Expression> {
    EmbeddingResolver::new().resolve(expr)
}

/// Resolve a lambda's body with the default configuration
pub fn resolve_lambda(lambda: &Lambda) -> Result<Lambda> {
    EmbeddingResolver::new().resolve_lambda(lambda)
}
