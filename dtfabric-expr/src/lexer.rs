// dtFabric
// SPDX-License-Identifier: MPL-2.0

use crate::error::ExprError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Integer(i64),
    Name(String),
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    EqEq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

/// Splits an expression source string into tokens, per the ABNF-like grammar in §6.1.
pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let offset = i;
        let kind = match c {
            '.' => {
                i += 1;
                TokenKind::Dot
            }
            '+' => {
                i += 1;
                TokenKind::Plus
            }
            '-' => {
                i += 1;
                TokenKind::Minus
            }
            '*' => {
                i += 1;
                TokenKind::Star
            }
            '/' => {
                i += 1;
                TokenKind::Slash
            }
            '%' => {
                i += 1;
                TokenKind::Percent
            }
            '(' => {
                i += 1;
                TokenKind::LParen
            }
            ')' => {
                i += 1;
                TokenKind::RParen
            }
            '=' if bytes.get(i + 1) == Some(&b'=') => {
                i += 2;
                TokenKind::EqEq
            }
            '!' if bytes.get(i + 1) == Some(&b'=') => {
                i += 2;
                TokenKind::Ne
            }
            '<' if bytes.get(i + 1) == Some(&b'=') => {
                i += 2;
                TokenKind::Le
            }
            '<' => {
                i += 1;
                TokenKind::Lt
            }
            '>' if bytes.get(i + 1) == Some(&b'=') => {
                i += 2;
                TokenKind::Ge
            }
            '>' => {
                i += 1;
                TokenKind::Gt
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                    i += 1;
                }
                let text = &input[start..i];
                let value = text
                    .parse::<i64>()
                    .map_err(|e| ExprError::syntax(start, format!("invalid integer: {e}")))?;
                TokenKind::Integer(value)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                TokenKind::Name(input[start..i].to_owned())
            }
            other => {
                return Err(ExprError::syntax(
                    offset,
                    format!("unexpected character '{other}'"),
                ))
            }
        };
        tokens.push(Token { kind, offset });
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_path_and_arithmetic() {
        let tokens = tokenize("sphere3d.count + 1 * (2 - x)").unwrap();
        assert_eq!(tokens.len(), 11);
        assert_eq!(tokens[0].kind, TokenKind::Name("sphere3d".into()));
        assert_eq!(tokens[1].kind, TokenKind::Dot);
    }

    #[test]
    fn tokenizes_comparisons() {
        let tokens = tokenize("version >= 2").unwrap();
        assert_eq!(
            tokens.iter().map(|t| t.kind.clone()).collect::<Vec<_>>(),
            vec![
                TokenKind::Name("version".into()),
                TokenKind::Ge,
                TokenKind::Integer(2),
            ]
        );
    }

    #[test]
    fn rejects_unknown_character() {
        assert!(tokenize("a & b").is_err());
    }
}
