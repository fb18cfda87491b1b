// dtFabric
// SPDX-License-Identifier: MPL-2.0

use crate::ast::{BinaryOp, CompareOp, Condition, Expr};
use crate::error::ExprError;

/// The evaluation environment for an expression: a lookup from dotted path to
/// an already-decoded integer value. Implemented by `dtfabric-map`'s
/// `MapContext`; kept as a trait here so the evaluator has no dependency on
/// the runtime crate.
pub trait ExprContext {
    /// Resolves a dotted path (e.g. `["sphere3d", "number_of_triangles"]`) to
    /// its decoded integer value, or `None` if unbound.
    fn resolve(&self, path: &[String]) -> Option<i64>;
}

/// Evaluates an arithmetic expression eagerly, left-to-right, with standard
/// precedence (already encoded in the parsed AST's shape).
pub fn eval(expr: &Expr, ctx: &dyn ExprContext) -> Result<i64, ExprError> {
    match expr {
        Expr::Integer(v) => Ok(*v),
        Expr::Path(path) => ctx
            .resolve(path)
            .ok_or_else(|| ExprError::unbound_path(path)),
        Expr::BinaryOp(op, lhs, rhs) => {
            let l = eval(lhs, ctx)?;
            let r = eval(rhs, ctx)?;
            Ok(match op {
                BinaryOp::Add => l.wrapping_add(r),
                BinaryOp::Sub => l.wrapping_sub(r),
                BinaryOp::Mul => l.wrapping_mul(r),
                // Integer division and remainder truncate toward zero, as Rust's do natively.
                BinaryOp::Div => l.wrapping_div(r),
                BinaryOp::Rem => l.wrapping_rem(r),
            })
        }
    }
}

/// Evaluates a `condition` to a boolean.
pub fn eval_condition(condition: &Condition, ctx: &dyn ExprContext) -> Result<bool, ExprError> {
    let lhs = eval(&condition.lhs, ctx)?;
    let rhs = eval(&condition.rhs, ctx)?;
    Ok(match condition.op {
        CompareOp::Eq => lhs == rhs,
        CompareOp::Ne => lhs != rhs,
        CompareOp::Lt => lhs < rhs,
        CompareOp::Le => lhs <= rhs,
        CompareOp::Gt => lhs > rhs,
        CompareOp::Ge => lhs >= rhs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_condition, parse_expr};
    use std::collections::HashMap;

    struct MapCtx(HashMap<String, i64>);

    impl ExprContext for MapCtx {
        fn resolve(&self, path: &[String]) -> Option<i64> {
            self.0.get(&path.join(".")).copied()
        }
    }

    #[test]
    fn evaluates_precedence() {
        let ctx = MapCtx(HashMap::from([
            ("a".to_string(), 2),
            ("b".to_string(), 3),
            ("c".to_string(), 4),
        ]));
        let expr = parse_expr("a + b * c").unwrap();
        assert_eq!(eval(&expr, &ctx).unwrap(), 2 + 3 * 4);
    }

    #[test]
    fn division_truncates_toward_zero() {
        let ctx = MapCtx(HashMap::new());
        let expr = parse_expr("(0 - 7) / 2").unwrap();
        assert_eq!(eval(&expr, &ctx).unwrap(), -3);
    }

    #[test]
    fn unbound_path_is_an_error() {
        let ctx = MapCtx(HashMap::new());
        let expr = parse_expr("missing.path").unwrap();
        assert!(eval(&expr, &ctx).is_err());
    }

    #[test]
    fn evaluates_condition() {
        let ctx = MapCtx(HashMap::from([("version".to_string(), 2)]));
        let cond = parse_condition("version > 1").unwrap();
        assert!(eval_condition(&cond, &ctx).unwrap());

        let ctx2 = MapCtx(HashMap::from([("version".to_string(), 1)]));
        assert!(!eval_condition(&cond, &ctx2).unwrap());
    }
}
