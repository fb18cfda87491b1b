// dtFabric
// SPDX-License-Identifier: MPL-2.0

use crate::ast::{BinaryOp, CompareOp, Condition, Expr};
use crate::error::ExprError;
use crate::lexer::{tokenize, Token, TokenKind};

/// Parses an `expr` per the grammar in §6.1: `term (("+"|"-") term)*`.
pub fn parse_expr(input: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(input).map_err(|e| e.with_source_text(input))?;
    let mut p = Parser { tokens: &tokens, pos: 0 };
    let expr = p.parse_expr().map_err(|e| e.with_source_text(input))?;
    p.expect_end().map_err(|e| e.with_source_text(input))?;
    Ok(expr)
}

/// Parses a `condition`: `expr relop expr`.
pub fn parse_condition(input: &str) -> Result<Condition, ExprError> {
    let tokens = tokenize(input).map_err(|e| e.with_source_text(input))?;
    let mut p = Parser { tokens: &tokens, pos: 0 };
    let lhs = p.parse_expr().map_err(|e| e.with_source_text(input))?;
    let op = p.parse_relop().map_err(|e| e.with_source_text(input))?;
    let rhs = p.parse_expr().map_err(|e| e.with_source_text(input))?;
    p.expect_end().map_err(|e| e.with_source_text(input))?;
    Ok(Condition { lhs, op, rhs })
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn end_offset(&self) -> usize {
        self.tokens.last().map(|t| t.offset + 1).unwrap_or(0)
    }

    fn expect_end(&self) -> Result<(), ExprError> {
        if self.pos != self.tokens.len() {
            let off = self.peek().map(|t| t.offset).unwrap_or_else(|| self.end_offset());
            return Err(ExprError::syntax(off, "unexpected trailing input"));
        }
        Ok(())
    }

    fn parse_relop(&mut self) -> Result<CompareOp, ExprError> {
        match self.bump() {
            Some(Token { kind: TokenKind::EqEq, .. }) => Ok(CompareOp::Eq),
            Some(Token { kind: TokenKind::Ne, .. }) => Ok(CompareOp::Ne),
            Some(Token { kind: TokenKind::Lt, .. }) => Ok(CompareOp::Lt),
            Some(Token { kind: TokenKind::Le, .. }) => Ok(CompareOp::Le),
            Some(Token { kind: TokenKind::Gt, .. }) => Ok(CompareOp::Gt),
            Some(Token { kind: TokenKind::Ge, .. }) => Ok(CompareOp::Ge),
            Some(t) => Err(ExprError::syntax(t.offset, "expected a comparison operator")),
            None => Err(ExprError::syntax(self.end_offset(), "expected a comparison operator")),
        }
    }

    // expr = term (("+"/"-") term)*
    fn parse_expr(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_term()?;
            lhs = Expr::BinaryOp(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // term = factor (("*"/"/"/"%") factor)*
    fn parse_term(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                Some(TokenKind::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_factor()?;
            lhs = Expr::BinaryOp(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // factor = integer / path / "(" expr ")"
    fn parse_factor(&mut self) -> Result<Expr, ExprError> {
        match self.bump() {
            Some(Token { kind: TokenKind::Integer(v), .. }) => Ok(Expr::Integer(*v)),
            Some(Token { kind: TokenKind::Name(name), .. }) => {
                let mut path = vec![name.clone()];
                while matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Dot)) {
                    self.bump();
                    match self.bump() {
                        Some(Token { kind: TokenKind::Name(seg), .. }) => path.push(seg.clone()),
                        Some(t) => {
                            return Err(ExprError::syntax(t.offset, "expected a path segment after '.'"))
                        }
                        None => {
                            return Err(ExprError::syntax(
                                self.end_offset(),
                                "expected a path segment after '.'",
                            ))
                        }
                    }
                }
                Ok(Expr::Path(path))
            }
            Some(Token { kind: TokenKind::LParen, .. }) => {
                let inner = self.parse_expr()?;
                match self.bump() {
                    Some(Token { kind: TokenKind::RParen, .. }) => Ok(inner),
                    Some(t) => Err(ExprError::syntax(t.offset, "expected ')'")),
                    None => Err(ExprError::syntax(self.end_offset(), "expected ')'")),
                }
            }
            Some(t) => Err(ExprError::syntax(t.offset, "expected an integer, path, or '('")),
            None => Err(ExprError::syntax(
                self.end_offset(),
                "expected an integer, path, or '('",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_path() {
        let expr = parse_expr("sphere3d.number_of_triangles").unwrap();
        assert_eq!(
            expr,
            Expr::Path(vec!["sphere3d".into(), "number_of_triangles".into()])
        );
    }

    #[test]
    fn parses_precedence() {
        // a + b * c == a + (b * c)
        let expr = parse_expr("a + b * c").unwrap();
        assert_eq!(
            expr,
            Expr::BinaryOp(
                BinaryOp::Add,
                Box::new(Expr::Path(vec!["a".into()])),
                Box::new(Expr::BinaryOp(
                    BinaryOp::Mul,
                    Box::new(Expr::Path(vec!["b".into()])),
                    Box::new(Expr::Path(vec!["c".into()]))
                ))
            )
        );
    }

    #[test]
    fn parses_parentheses() {
        let expr = parse_expr("(a + b) * c").unwrap();
        assert_eq!(
            expr,
            Expr::BinaryOp(
                BinaryOp::Mul,
                Box::new(Expr::BinaryOp(
                    BinaryOp::Add,
                    Box::new(Expr::Path(vec!["a".into()])),
                    Box::new(Expr::Path(vec!["b".into()]))
                )),
                Box::new(Expr::Path(vec!["c".into()]))
            )
        );
    }

    #[test]
    fn parses_condition() {
        let cond = parse_condition("version > 1").unwrap();
        assert_eq!(cond.op, CompareOp::Gt);
        assert_eq!(cond.lhs, Expr::Path(vec!["version".into()]));
        assert_eq!(cond.rhs, Expr::Integer(1));
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse_expr("1 + 2 3").is_err());
    }

    #[test]
    fn rejects_dangling_operator() {
        assert!(parse_expr("1 +").is_err());
    }
}
