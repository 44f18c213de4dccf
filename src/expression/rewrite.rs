//! Structural rewriting of expression trees.
//!
//! [`walk`] drives the recursion over every node kind; an
//! [`ExpressionRewriter`] overrides only the hooks it cares about. Parameter
//! substitution is built on top of it.

use std::convert::Infallible;

use log::trace;

use crate::error::{Result, SpecError};
use crate::expression::{Expression, Lambda, Method, ParamId, Parameter};

/// A pass that rebuilds a tree, possibly replacing some nodes.
///
/// Every hook defaults to a structural copy of its node.
pub trait ExpressionRewriter {
    type Error;

    fn rewrite(&mut self, expr: &Expression) -> std::result::Result<Expression, Self::Error> {
        walk(self, expr)
    }

    fn rewrite_parameter(
        &mut self,
        parameter: &Parameter,
    ) -> std::result::Result<Expression, Self::Error> {
        Ok(parameter.to_expr())
    }

    fn rewrite_call(
        &mut self,
        method: Method,
        args: &[Expression],
    ) -> std::result::Result<Expression, Self::Error> {
        Ok(Expression::call(method, rewrite_all(self, args)?))
    }

    fn rewrite_invoke(
        &mut self,
        target: &Expression,
        args: &[Expression],
    ) -> std::result::Result<Expression, Self::Error> {
        let target = self.rewrite(target)?;
        Ok(Expression::invoke(target, rewrite_all(self, args)?))
    }
}

/// Rebuild `expr`, sending each child back through the rewriter
pub fn walk<R: ExpressionRewriter + ?Sized>(
    rewriter: &mut R,
    expr: &Expression,
) -> std::result::Result<Expression, R::Error> {
    match expr {
        Expression::Literal(_) => Ok(expr.clone()),
        Expression::Parameter(p) => rewriter.rewrite_parameter(p),
        Expression::Member { target, member } => {
            Ok(rewriter.rewrite(target)?.member(member.clone()))
        }
        Expression::Call { method, args } => rewriter.rewrite_call(*method, args),
        Expression::BinaryOp { op, left, right } => {
            let left = rewriter.rewrite(left)?;
            let right = rewriter.rewrite(right)?;
            Ok(Expression::binary_op(*op, left, right))
        }
        Expression::UnaryOp { op, operand } => {
            Ok(Expression::unary_op(*op, rewriter.rewrite(operand)?))
        }
        Expression::Conditional {
            test,
            if_true,
            if_false,
        } => {
            let test = rewriter.rewrite(test)?;
            let if_true = rewriter.rewrite(if_true)?;
            let if_false = rewriter.rewrite(if_false)?;
            Ok(Expression::conditional(test, if_true, if_false))
        }
        Expression::Lambda(lambda) => Ok(Expression::Lambda(Lambda::new(
            lambda.parameters.clone(),
            rewriter.rewrite(&lambda.body)?,
        ))),
        Expression::Invoke { target, args } => rewriter.rewrite_invoke(target, args),
        Expression::Record { fields } => {
            let fields = fields
                .iter()
                .map(|(name, value)| Ok((name.clone(), rewriter.rewrite(value)?)))
                .collect::<std::result::Result<Vec<_>, R::Error>>()?;
            Ok(Expression::Record { fields })
        }
    }
}

/// Rewrite each expression of a slice in order
pub fn rewrite_all<R: ExpressionRewriter + ?Sized>(
    rewriter: &mut R,
    exprs: &[Expression],
) -> std::result::Result<Vec<Expression>, R::Error> {
    exprs.iter().map(|e| rewriter.rewrite(e)).collect()
}

/// Replaces parameters, matched by id, with fixed expressions
struct ParameterReplacer<'a> {
    replacements: &'a [(ParamId, Expression)],
    revisit: bool,
    // Parameters whose replacement is currently being visited
    active: Vec<ParamId>,
}

impl ExpressionRewriter for ParameterReplacer<'_> {
    type Error = Infallible;

    fn rewrite_parameter(&mut self, parameter: &Parameter) -> std::result::Result<Expression, Infallible> {
        let id = parameter.id();
        if self.active.contains(&id) {
            return Ok(parameter.to_expr());
        }
        let replacements = self.replacements;
        let Some((_, replacement)) = replacements.iter().find(|(from, _)| *from == id) else {
            return Ok(parameter.to_expr());
        };

        trace!("substituting {} with {}", parameter.name(), replacement);
        if !self.revisit {
            return Ok(replacement.clone());
        }
        self.active.push(id);
        let result = self.rewrite(replacement);
        self.active.pop();
        result
    }
}

/// Replace every occurrence of `from` in `tree` with `to`
pub fn substitute_parameter(tree: &Expression, from: &Parameter, to: &Expression) -> Expression {
    let replacements = [(from.id(), to.clone())];
    let mut replacer = ParameterReplacer {
        replacements: &replacements,
        revisit: false,
        active: Vec::new(),
    };
    match replacer.rewrite(tree) {
        Ok(expr) => expr,
        Err(never) => match never {},
    }
}

/// Substitute a lambda's parameters positionally and return its rewritten body.
///
/// Each replacement is itself visited, so a replacement that mentions another
/// parameter of the same lambda has that parameter substituted too. A
/// replacement never has its own parameter substituted inside it.
pub fn substitute_parameters(lambda: &Lambda, values: &[Expression]) -> Result<Expression> {
    if values.len() != lambda.parameters.len() {
        return Err(SpecError::ArityMismatch {
            expected: lambda.parameters.len(),
            supplied: values.len(),
        });
    }

    let replacements: Vec<(ParamId, Expression)> = lambda
        .parameters
        .iter()
        .map(|p| p.id())
        .zip(values.iter().cloned())
        .collect();
    let mut replacer = ParameterReplacer {
        replacements: &replacements,
        revisit: true,
        active: Vec::new(),
    };
    match replacer.rewrite(&lambda.body) {
        Ok(expr) => Ok(expr),
        Err(never) => match never {},
    }
}
