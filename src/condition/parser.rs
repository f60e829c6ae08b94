//! Recursive-descent parser producing the condition expression tree.
//!
//! Precedence, loosest first: `||`, `&&`, comparisons, `+ -`, `* / %`,
//! unary `! -`, primaries. Names are resolved while parsing, so an unknown
//! attribute or function is a compile error and never reaches evaluation.

use serde::Serialize;

use super::CompileError;
use super::lexer::{Spanned, Token};
use crate::resources::environment::BorderKind;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Literal values. Every expression evaluates to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Value {
    Number(f64),
    Bool(bool),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
        }
    }
}

/// Readable pet or environment attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Attribute {
    X,
    Y,
    Vx,
    Vy,
    Width,
    Height,
    AnchorX,
    AnchorY,
    OnFloor,
    OnCeiling,
    OnLeftWall,
    OnRightWall,
    CloseToLeftWall,
    CloseToRightWall,
    RightFloor,
    LeftFloor,
    RightCeiling,
    LeftCeiling,
    IsDragging,
    IsThrown,
    LookRight,
    BorderLine(BorderKind),
    ScreenWidth,
    ScreenHeight,
    WorkAreaLeft,
    WorkAreaRight,
    WorkAreaTop,
    WorkAreaBottom,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FunctionCall {
    /// Contact with a boundary line, read from the boundary flags.
    IsOn(BorderKind),
    /// True with probability `p`, a fresh draw each evaluation.
    Random(Box<Expr>),
    /// Uniform number in `[0, 1)`.
    MathRandom,
    Abs(Box<Expr>),
    Min(Box<Expr>, Box<Expr>),
    Max(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    Literal(Value),
    AttributeRef(Attribute),
    Comparison {
        op: CmpOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Not(Box<Expr>),
    Arithmetic {
        op: ArithOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Negate(Box<Expr>),
    Call(FunctionCall),
}

/// Parse a token stream into a single expression.
pub fn parse(tokens: &[Spanned]) -> Result<Expr, CompileError> {
    if tokens.is_empty() {
        return Err(CompileError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or_expr()?;
    match parser.peek() {
        None => Ok(expr),
        Some(extra) => Err(CompileError::UnexpectedToken {
            found: extra.token.to_string(),
            pos: extra.pos,
        }),
    }
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&'a Token> {
        self.peek().map(|s| &s.token)
    }

    fn next(&mut self) -> Option<&'a Spanned> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek_token() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), CompileError> {
        match self.next() {
            Some(s) if &s.token == token => Ok(()),
            Some(s) => Err(CompileError::UnexpectedToken {
                found: s.token.to_string(),
                pos: s.pos,
            }),
            None => Err(CompileError::UnexpectedEnd),
        }
    }

    fn or_expr(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.and_expr()?;
        while self.eat(&Token::Or) {
            let rhs = self.and_expr()?;
            lhs = Expr::Logical {
                op: LogicalOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.comparison()?;
        while self.eat(&Token::And) {
            let rhs = self.comparison()?;
            lhs = Expr::Logical {
                op: LogicalOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr, CompileError> {
        let lhs = self.sum()?;
        let op = match self.peek_token() {
            Some(Token::Lt) => CmpOp::Lt,
            Some(Token::Le) => CmpOp::Le,
            Some(Token::Gt) => CmpOp::Gt,
            Some(Token::Ge) => CmpOp::Ge,
            Some(Token::Eq) => CmpOp::Eq,
            Some(Token::Ne) => CmpOp::Ne,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.sum()?;
        Ok(Expr::Comparison {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn sum(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.product()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Plus) => ArithOp::Add,
                Some(Token::Minus) => ArithOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.product()?;
            lhs = Expr::Arithmetic {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn product(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Star) => ArithOp::Mul,
                Some(Token::Slash) => ArithOp::Div,
                Some(Token::Percent) => ArithOp::Rem,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Arithmetic {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, CompileError> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        if self.eat(&Token::Minus) {
            return Ok(Expr::Negate(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, CompileError> {
        let Some(spanned) = self.next() else {
            return Err(CompileError::UnexpectedEnd);
        };
        match &spanned.token {
            Token::Number(n) => Ok(Expr::Literal(Value::Number(*n))),
            Token::LParen => {
                let inner = self.or_expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(first) => {
                let path = self.path_rest(first)?;
                if self.eat(&Token::LParen) {
                    self.call(path)
                } else {
                    resolve_name(&path)
                }
            }
            other => Err(CompileError::UnexpectedToken {
                found: other.to_string(),
                pos: spanned.pos,
            }),
        }
    }

    /// Collect `first(.ident)*` into a path.
    fn path_rest(&mut self, first: &str) -> Result<Vec<String>, CompileError> {
        let mut path = vec![first.to_string()];
        while self.eat(&Token::Dot) {
            match self.next() {
                Some(Spanned {
                    token: Token::Ident(part),
                    ..
                }) => path.push(part.clone()),
                Some(s) => {
                    return Err(CompileError::UnexpectedToken {
                        found: s.token.to_string(),
                        pos: s.pos,
                    });
                }
                None => return Err(CompileError::UnexpectedEnd),
            }
        }
        Ok(path)
    }

    /// Parse `ident(.ident)*` as a bare path argument.
    fn path_argument(&mut self) -> Result<Vec<String>, CompileError> {
        match self.next() {
            Some(Spanned {
                token: Token::Ident(first),
                ..
            }) => self.path_rest(first),
            Some(s) => Err(CompileError::UnexpectedToken {
                found: s.token.to_string(),
                pos: s.pos,
            }),
            None => Err(CompileError::UnexpectedEnd),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, CompileError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.or_expr()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(&Token::RParen)?;
            return Ok(args);
        }
    }

    fn call(&mut self, path: Vec<String>) -> Result<Expr, CompileError> {
        let segments = strip_mascot(&path);
        let joined = path.join(".");

        // environment.<border>.isOn(anchor)
        if let ["environment", border, "isOn"] = segments.as_slice() {
            let kind = BorderKind::from_name(border)
                .ok_or_else(|| CompileError::UnknownAttribute(joined.clone()))?;
            let arg = self.path_argument()?;
            self.expect(&Token::RParen)?;
            if !is_anchor(&arg) {
                return Err(CompileError::UnknownAttribute(arg.join(".")));
            }
            return Ok(Expr::Call(FunctionCall::IsOn(kind)));
        }

        // isOn(<border>)
        if segments.as_slice() == ["isOn"] {
            let arg = self.path_argument()?;
            self.expect(&Token::RParen)?;
            let arg_segments = strip_mascot(&arg);
            let border = match arg_segments.as_slice() {
                [name] | ["environment", name] => BorderKind::from_name(name),
                _ => None,
            };
            return border
                .map(|kind| Expr::Call(FunctionCall::IsOn(kind)))
                .ok_or_else(|| CompileError::UnknownAttribute(arg.join(".")));
        }

        let args = self.arguments()?;
        let arity = |expected: usize| {
            if args.len() == expected {
                Ok(())
            } else {
                Err(CompileError::Arity {
                    name: joined.clone(),
                    expected,
                    found: args.len(),
                })
            }
        };
        let call = match segments.as_slice() {
            ["random"] => {
                arity(1)?;
                let mut args = args;
                FunctionCall::Random(Box::new(args.remove(0)))
            }
            ["Math", "random"] => {
                arity(0)?;
                FunctionCall::MathRandom
            }
            ["Math", "abs"] | ["abs"] => {
                arity(1)?;
                let mut args = args;
                FunctionCall::Abs(Box::new(args.remove(0)))
            }
            ["Math", "min"] | ["min"] | ["Math", "max"] | ["max"] => {
                arity(2)?;
                let is_min = segments.last() == Some(&"min");
                let mut args = args.into_iter();
                let (Some(a), Some(b)) = (args.next(), args.next()) else {
                    return Err(CompileError::UnexpectedEnd);
                };
                if is_min {
                    FunctionCall::Min(Box::new(a), Box::new(b))
                } else {
                    FunctionCall::Max(Box::new(a), Box::new(b))
                }
            }
            _ => return Err(CompileError::UnknownFunction(joined)),
        };
        Ok(Expr::Call(call))
    }
}

fn strip_mascot(path: &[String]) -> Vec<&str> {
    let mut segments: Vec<&str> = path.iter().map(String::as_str).collect();
    if segments.len() > 1 && segments[0] == "mascot" {
        segments.remove(0);
    }
    segments
}

fn is_anchor(path: &[String]) -> bool {
    strip_mascot(path).as_slice() == ["anchor"]
}

fn resolve_name(path: &[String]) -> Result<Expr, CompileError> {
    let segments = strip_mascot(path);
    let attr = match segments.as_slice() {
        ["true"] => return Ok(Expr::Literal(Value::Bool(true))),
        ["false"] => return Ok(Expr::Literal(Value::Bool(false))),
        ["x"] => Attribute::X,
        ["y"] => Attribute::Y,
        ["vx"] | ["velocity", "x"] => Attribute::Vx,
        ["vy"] | ["velocity", "y"] => Attribute::Vy,
        ["width"] => Attribute::Width,
        ["height"] => Attribute::Height,
        ["anchor", "x"] => Attribute::AnchorX,
        ["anchor", "y"] => Attribute::AnchorY,
        ["onFloor"] => Attribute::OnFloor,
        ["onCeiling"] => Attribute::OnCeiling,
        ["onLeftWall"] => Attribute::OnLeftWall,
        ["onRightWall"] => Attribute::OnRightWall,
        ["closeToLeftWall"] => Attribute::CloseToLeftWall,
        ["closeToRightWall"] => Attribute::CloseToRightWall,
        ["rightFloor"] => Attribute::RightFloor,
        ["leftFloor"] => Attribute::LeftFloor,
        ["rightCeiling"] => Attribute::RightCeiling,
        ["leftCeiling"] => Attribute::LeftCeiling,
        ["isDragging"] | ["dragging"] => Attribute::IsDragging,
        ["isThrown"] | ["thrown"] => Attribute::IsThrown,
        ["lookRight"] => Attribute::LookRight,
        ["environment", "floor", "y"] | ["environment", "floor", "bottom"] => {
            Attribute::BorderLine(BorderKind::Floor)
        }
        ["environment", "ceiling", "y"] | ["environment", "ceiling", "top"] => {
            Attribute::BorderLine(BorderKind::Ceiling)
        }
        ["environment", "leftWall", "x"] | ["environment", "leftWall", "left"] => {
            Attribute::BorderLine(BorderKind::LeftWall)
        }
        ["environment", "rightWall", "x"] | ["environment", "rightWall", "right"] => {
            Attribute::BorderLine(BorderKind::RightWall)
        }
        ["environment", "screen", "width"] => Attribute::ScreenWidth,
        ["environment", "screen", "height"] => Attribute::ScreenHeight,
        ["environment", "workArea", "left"] => Attribute::WorkAreaLeft,
        ["environment", "workArea", "right"] => Attribute::WorkAreaRight,
        ["environment", "workArea", "top"] => Attribute::WorkAreaTop,
        ["environment", "workArea", "bottom"] => Attribute::WorkAreaBottom,
        _ => return Err(CompileError::UnknownAttribute(path.join("."))),
    };
    Ok(Expr::AttributeRef(attr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::lexer::tokenize;

    fn parse_str(text: &str) -> Result<Expr, CompileError> {
        parse(&tokenize(text)?)
    }

    #[test]
    fn test_mascot_prefix_is_optional() {
        assert_eq!(parse_str("mascot.y").unwrap(), parse_str("y").unwrap());
        assert_eq!(
            parse_str("mascot.anchor.x").unwrap(),
            Expr::AttributeRef(Attribute::AnchorX)
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = parse_str("onFloor || onCeiling && isThrown").unwrap();
        match expr {
            Expr::Logical {
                op: LogicalOp::Or,
                rhs,
                ..
            } => assert!(matches!(
                *rhs,
                Expr::Logical {
                    op: LogicalOp::And,
                    ..
                }
            )),
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn test_arithmetic_precedence() {
        let expr = parse_str("1 + 2 * 3").unwrap();
        match expr {
            Expr::Arithmetic {
                op: ArithOp::Add,
                rhs,
                ..
            } => assert!(matches!(
                *rhs,
                Expr::Arithmetic {
                    op: ArithOp::Mul,
                    ..
                }
            )),
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn test_environment_is_on_forms() {
        let long = parse_str("mascot.environment.floor.isOn(mascot.anchor)").unwrap();
        assert_eq!(long, Expr::Call(FunctionCall::IsOn(BorderKind::Floor)));
        let short = parse_str("isOn(leftWall)").unwrap();
        assert_eq!(short, Expr::Call(FunctionCall::IsOn(BorderKind::LeftWall)));
    }

    #[test]
    fn test_is_on_rejects_unknown_argument() {
        assert!(matches!(
            parse_str("environment.floor.isOn(mascot.tail)"),
            Err(CompileError::UnknownAttribute(_))
        ));
        assert!(matches!(
            parse_str("isOn(sky)"),
            Err(CompileError::UnknownAttribute(_))
        ));
    }

    #[test]
    fn test_function_arity_and_names() {
        assert!(parse_str("Math.random() < 0.5").is_ok());
        assert!(parse_str("max(x, y) > 3").is_ok());
        assert!(matches!(
            parse_str("random()"),
            Err(CompileError::Arity { expected: 1, found: 0, .. })
        ));
        assert!(matches!(
            parse_str("explode(1)"),
            Err(CompileError::UnknownFunction(_))
        ));
    }

    #[test]
    fn test_unknown_attribute_fails() {
        assert_eq!(
            parse_str("mascot.hunger > 3"),
            Err(CompileError::UnknownAttribute("mascot.hunger".to_string()))
        );
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(matches!(
            parse_str("x > 1 )"),
            Err(CompileError::UnexpectedToken { .. })
        ));
        assert_eq!(parse_str("x >"), Err(CompileError::UnexpectedEnd));
        assert_eq!(parse(&[]), Err(CompileError::Empty));
    }
}
