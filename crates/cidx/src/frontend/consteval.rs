//! Integer constant expression evaluation over preprocessing tokens.
//!
//! Used for array lengths, bitfield widths and enumerator values. Anything the
//! evaluator cannot decide yields `None`; callers fall back to "unknown".

use super::lex::{Token, TokenKind, parse_char, parse_integer};

/// Names the evaluator needs resolved from its surroundings.
pub trait ConstEnv {
    /// Value of an enumerator or object-like macro.
    fn constant(&self, name: &str) -> Option<i64>;

    /// Whether an identifier names a type (builtin keyword or typedef).
    fn is_type_name(&self, name: &str) -> bool;

    /// `sizeof` of a type written as tokens.
    fn sizeof_tokens(&self, tokens: &[Token]) -> Option<u64>;
}

/// Evaluate a whole token sequence as one constant expression.
#[must_use]
pub fn evaluate(tokens: &[Token], env: &dyn ConstEnv) -> Option<i64> {
    let mut parser = Evaluator {
        tokens,
        pos: 0,
        env,
    };
    let value = parser.conditional()?;
    (parser.pos == tokens.len()).then_some(value)
}

struct Evaluator<'a> {
    tokens: &'a [Token],
    pos: usize,
    env: &'a dyn ConstEnv,
}

fn binary_precedence(op: &str) -> Option<u8> {
    Some(match op {
        "*" | "/" | "%" => 10,
        "+" | "-" => 9,
        "<<" | ">>" => 8,
        "<" | ">" | "<=" | ">=" => 7,
        "==" | "!=" => 6,
        "&" => 5,
        "^" => 4,
        "|" => 3,
        "&&" => 2,
        "||" => 1,
        _ => return None,
    })
}

fn apply(op: &str, lhs: i64, rhs: i64) -> Option<i64> {
    Some(match op {
        "*" => lhs.wrapping_mul(rhs),
        "/" => lhs.checked_div(rhs)?,
        "%" => lhs.checked_rem(rhs)?,
        "+" => lhs.wrapping_add(rhs),
        "-" => lhs.wrapping_sub(rhs),
        "<<" => lhs.wrapping_shl(u32::try_from(rhs).ok()?),
        ">>" => lhs.wrapping_shr(u32::try_from(rhs).ok()?),
        "<" => i64::from(lhs < rhs),
        ">" => i64::from(lhs > rhs),
        "<=" => i64::from(lhs <= rhs),
        ">=" => i64::from(lhs >= rhs),
        "==" => i64::from(lhs == rhs),
        "!=" => i64::from(lhs != rhs),
        "&" => lhs & rhs,
        "^" => lhs ^ rhs,
        "|" => lhs | rhs,
        "&&" => i64::from(lhs != 0 && rhs != 0),
        "||" => i64::from(lhs != 0 || rhs != 0),
        _ => return None,
    })
}

impl Evaluator<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_is(&self, spelling: &str) -> bool {
        self.peek().is_some_and(|t| t.spelling == spelling)
    }

    fn expect(&mut self, spelling: &str) -> Option<()> {
        if self.peek_is(spelling) {
            self.pos += 1;
            Some(())
        } else {
            None
        }
    }

    fn conditional(&mut self) -> Option<i64> {
        let cond = self.binary(1)?;
        if !self.peek_is("?") {
            return Some(cond);
        }
        self.pos += 1;
        let then = self.conditional()?;
        self.expect(":")?;
        let otherwise = self.conditional()?;
        Some(if cond != 0 { then } else { otherwise })
    }

    fn binary(&mut self, min_precedence: u8) -> Option<i64> {
        let mut lhs = self.unary()?;
        loop {
            let Some(op) = self.peek().map(|t| t.spelling.clone()) else {
                break;
            };
            let Some(precedence) = binary_precedence(&op) else {
                break;
            };
            if precedence < min_precedence {
                break;
            }
            self.pos += 1;
            let rhs = self.binary(precedence + 1)?;
            lhs = apply(&op, lhs, rhs)?;
        }
        Some(lhs)
    }

    fn unary(&mut self) -> Option<i64> {
        let token = self.peek()?.clone();
        match token.spelling.as_str() {
            "-" => {
                self.pos += 1;
                Some(self.unary()?.wrapping_neg())
            }
            "+" => {
                self.pos += 1;
                self.unary()
            }
            "~" => {
                self.pos += 1;
                Some(!self.unary()?)
            }
            "!" => {
                self.pos += 1;
                Some(i64::from(self.unary()? == 0))
            }
            "(" if self.is_cast() => {
                let close = self.matching_paren(self.pos)?;
                self.pos = close + 1;
                self.unary()
            }
            _ => self.primary(),
        }
    }

    fn is_cast(&self) -> bool {
        self.tokens
            .get(self.pos + 1)
            .is_some_and(|t| t.kind == TokenKind::Identifier && self.env.is_type_name(&t.spelling))
    }

    fn matching_paren(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(open) {
            match token.spelling.as_str() {
                "(" => depth += 1,
                ")" => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn primary(&mut self) -> Option<i64> {
        let token = self.peek()?.clone();
        self.pos += 1;
        match token.kind {
            TokenKind::Number => parse_integer(&token.spelling),
            TokenKind::Char => parse_char(&token.spelling),
            TokenKind::Identifier if token.spelling == "sizeof" => {
                if !self.peek_is("(") {
                    return None;
                }
                let open = self.pos;
                let close = self.matching_paren(open)?;
                self.pos = close + 1;
                let size = self.env.sizeof_tokens(&self.tokens[open + 1..close])?;
                i64::try_from(size).ok()
            }
            TokenKind::Identifier => self.env.constant(&token.spelling),
            TokenKind::Punct if token.spelling == "(" => {
                let value = self.conditional()?;
                self.expect(")")?;
                Some(value)
            }
            TokenKind::Punct | TokenKind::String => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::lex::tokenize;
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    struct MapEnv(HashMap<&'static str, i64>);

    impl ConstEnv for MapEnv {
        fn constant(&self, name: &str) -> Option<i64> {
            self.0.get(name).copied()
        }

        fn is_type_name(&self, name: &str) -> bool {
            matches!(name, "int" | "unsigned" | "char" | "long")
        }

        fn sizeof_tokens(&self, tokens: &[Token]) -> Option<u64> {
            match tokens.first()?.spelling.as_str() {
                "int" => Some(4),
                "char" => Some(1),
                "long" => Some(8),
                _ => None,
            }
        }
    }

    fn eval(text: &str) -> Option<i64> {
        let env = MapEnv(HashMap::from([("N", 16), ("SHIFT", 3)]));
        evaluate(&tokenize(text), &env)
    }

    #[rstest]
    #[case("1 + 2 * 3", Some(7))]
    #[case("(1 + 2) * 3", Some(9))]
    #[case("N * 4", Some(64))]
    #[case("1 << SHIFT", Some(8))]
    #[case("-1", Some(-1))]
    #[case("~0 & 0xff", Some(255))]
    #[case("N > 8 ? 1 : 2", Some(1))]
    #[case("sizeof(int) * 2", Some(8))]
    #[case("(unsigned)N", Some(16))]
    #[case("'a' - 'A'", Some(32))]
    #[case("1 / 0", None)]
    #[case("UNKNOWN + 1", None)]
    #[case("1 2", None)]
    fn evaluates_constant_expressions(#[case] text: &str, #[case] expected: Option<i64>) {
        assert_eq!(eval(text), expected);
    }
}
