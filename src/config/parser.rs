//! Recursive-descent parser.
//!
//! Precedence, loosest first: `if`, `||`, `&&`, comparisons (non-associative), `:`,
//! `+ -`, `* /`, unary `- !`, then member access and calls.

use crate::config::ast::{Arg, BinaryOp, Expr, Member, Param, Script, UnaryOp};
use crate::config::lexer::{Tok, Token, syntax, tokenize};
use crate::error::Result;
use std::rc::Rc;

/// Parse a whole description.
pub fn parse(source: &str) -> Result<Script> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        pos: 0,
    };
    let members = parser.members()?;
    parser.expect_eof()?;
    Ok(Script { members })
}

/// Parse a single expression.
pub fn parse_expr(source: &str) -> Result<Expr> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        pos: 0,
    };
    let expr = parser.expr()?;
    parser.expect_eof()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token list always ends with Eof, which is never consumed.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.tok != Tok::Eof {
            self.pos += 1;
        }
        token
    }

    fn at_sym(&self, sym: &str) -> bool {
        matches!(&self.peek().tok, Tok::Sym(s) if *s == sym)
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(&self.peek().tok, Tok::Keyword(k) if *k == kw)
    }

    fn eat_sym(&mut self, sym: &str) -> bool {
        if self.at_sym(sym) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_sym(&mut self, sym: &str) -> Result<()> {
        if self.eat_sym(sym) {
            return Ok(());
        }
        Err(self.unexpected(&format!("'{}'", sym)))
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<()> {
        if self.at_keyword(kw) {
            self.pos += 1;
            return Ok(());
        }
        Err(self.unexpected(&format!("'{}'", kw)))
    }

    fn expect_ident(&mut self) -> Result<String> {
        if let Tok::Ident(name) = &self.peek().tok {
            let name = name.clone();
            self.pos += 1;
            return Ok(name);
        }
        Err(self.unexpected("an identifier"))
    }

    fn expect_eof(&self) -> Result<()> {
        if self.peek().tok == Tok::Eof {
            Ok(())
        } else {
            Err(self.unexpected("end of input"))
        }
    }

    fn unexpected(&self, expected: &str) -> crate::error::Error {
        let token = self.peek();
        let found = match &token.tok {
            Tok::Number(n) => format!("number {}", n),
            Tok::Str(s) => format!("string '{}'", s),
            Tok::Ident(s) => format!("identifier '{}'", s),
            Tok::Keyword(k) => format!("keyword '{}'", k),
            Tok::Sym(s) => format!("'{}'", s),
            Tok::Eof => "end of input".to_string(),
        };
        syntax(
            token.line,
            token.column,
            format!("expected {}, found {}", expected, found),
        )
    }

    /// Record body: members separated by optional `;`, up to `]` or end of input.
    fn members(&mut self) -> Result<Vec<Member>> {
        let mut members = Vec::new();
        loop {
            while self.eat_sym(";") {}
            if self.at_sym("]") || self.peek().tok == Tok::Eof {
                return Ok(members);
            }
            members.push(self.member()?);
        }
    }

    fn member(&mut self) -> Result<Member> {
        let name = self.expect_ident()?;
        if self.eat_sym("(") {
            let params = self.params()?;
            self.expect_sym("=")?;
            let body = Rc::new(self.expr()?);
            return Ok(Member::Function { name, params, body });
        }
        self.expect_sym("=")?;
        let expr = Rc::new(self.expr()?);
        Ok(Member::Value { name, expr })
    }

    fn params(&mut self) -> Result<Vec<Param>> {
        let mut params = Vec::new();
        if self.eat_sym(")") {
            return Ok(params);
        }
        loop {
            let name = self.expect_ident()?;
            let default = if self.eat_sym("=") {
                Some(Rc::new(self.expr()?))
            } else {
                None
            };
            params.push(Param { name, default });
            if self.eat_sym(")") {
                return Ok(params);
            }
            self.expect_sym(",")?;
        }
    }

    fn args(&mut self) -> Result<Vec<Arg>> {
        let mut args = Vec::new();
        if self.eat_sym(")") {
            return Ok(args);
        }
        loop {
            // `name = expr` is a named argument; `==` lexes as its own symbol.
            let named = match (&self.peek().tok, self.tokens.get(self.pos + 1).map(|t| &t.tok)) {
                (Tok::Ident(name), Some(Tok::Sym("="))) => Some(name.clone()),
                _ => None,
            };
            if named.is_some() {
                self.pos += 2;
            }
            let value = Rc::new(self.expr()?);
            args.push(Arg { name: named, value });
            if self.eat_sym(")") {
                return Ok(args);
            }
            self.expect_sym(",")?;
        }
    }

    fn expr(&mut self) -> Result<Expr> {
        if self.at_keyword("if") {
            self.pos += 1;
            let cond = Rc::new(self.expr()?);
            self.expect_keyword("then")?;
            let then = Rc::new(self.expr()?);
            self.expect_keyword("else")?;
            let otherwise = Rc::new(self.expr()?);
            return Ok(Expr::If {
                cond,
                then,
                otherwise,
            });
        }
        self.or()
    }

    fn or(&mut self) -> Result<Expr> {
        let mut lhs = self.and()?;
        while self.eat_sym("||") {
            let rhs = self.and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut lhs = self.comparison()?;
        while self.eat_sym("&&") {
            let rhs = self.comparison()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn comparison_op(&self) -> Option<BinaryOp> {
        let Tok::Sym(s) = &self.peek().tok else {
            return None;
        };
        Some(match *s {
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            _ => return None,
        })
    }

    fn comparison(&mut self) -> Result<Expr> {
        let lhs = self.range()?;
        let Some(op) = self.comparison_op() else {
            return Ok(lhs);
        };
        self.pos += 1;
        let rhs = self.range()?;
        if self.comparison_op().is_some() {
            return Err(self.unexpected("an operand; comparisons do not chain"));
        }
        Ok(binary(op, lhs, rhs))
    }

    fn range(&mut self) -> Result<Expr> {
        let first = self.additive()?;
        if !self.at_sym(":") {
            return Ok(first);
        }
        let mut items = vec![Rc::new(first)];
        while self.eat_sym(":") {
            items.push(Rc::new(self.additive()?));
        }
        Ok(Expr::Array(items))
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = if self.eat_sym("+") {
                BinaryOp::Add
            } else if self.eat_sym("-") {
                BinaryOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat_sym("*") {
                BinaryOp::Mul
            } else if self.eat_sym("/") {
                BinaryOp::Div
            } else {
                return Ok(lhs);
            };
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = if self.eat_sym("-") {
            UnaryOp::Neg
        } else if self.eat_sym("!") {
            UnaryOp::Not
        } else {
            return self.postfix();
        };
        let operand = Rc::new(self.unary()?);
        Ok(Expr::Unary { op, operand })
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_sym(".") {
                let field = self.expect_ident()?;
                expr = Expr::Field {
                    target: Rc::new(expr),
                    field,
                };
            } else if self.eat_sym("(") {
                let args = self.args()?;
                expr = Expr::Call {
                    callee: Rc::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        match token.tok {
            Tok::Number(n) => {
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            Tok::Str(s) => {
                self.pos += 1;
                Ok(Expr::Str(s))
            }
            Tok::Ident(name) => {
                self.pos += 1;
                Ok(Expr::Ident(name))
            }
            Tok::Keyword("true") => {
                self.pos += 1;
                Ok(Expr::Bool(true))
            }
            Tok::Keyword("false") => {
                self.pos += 1;
                Ok(Expr::Bool(false))
            }
            Tok::Keyword("new") => {
                self.pos += 1;
                let type_name = self.expect_ident()?;
                self.expect_sym("[")?;
                let members = self.members()?;
                self.expect_sym("]")?;
                Ok(Expr::New { type_name, members })
            }
            Tok::Sym("(") => {
                self.pos += 1;
                let expr = self.expr()?;
                self.expect_sym(")")?;
                Ok(expr)
            }
            Tok::Sym("[") => {
                self.pos += 1;
                let members = self.members()?;
                self.expect_sym("]")?;
                Ok(Expr::Record(members))
            }
            _ => Err(self.unexpected("an expression")),
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Rc::new(lhs),
        rhs: Rc::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;

    fn num(n: f64) -> Rc<Expr> {
        Rc::new(Expr::Number(n))
    }

    fn ident(s: &str) -> Rc<Expr> {
        Rc::new(Expr::Ident(s.into()))
    }

    #[test]
    fn precedence() {
        // 1 + 2 * 3 : x
        let expected = Expr::Array(vec![
            Rc::new(Expr::Binary {
                op: BinaryOp::Add,
                lhs: num(1.0),
                rhs: Rc::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    lhs: num(2.0),
                    rhs: num(3.0),
                }),
            }),
            ident("x"),
        ]);
        assert_eq!(parse_expr("1 + 2 * 3 : x").unwrap(), expected);

        let expected = Expr::Binary {
            op: BinaryOp::Or,
            lhs: Rc::new(Expr::Binary {
                op: BinaryOp::Lt,
                lhs: ident("a"),
                rhs: num(1.0),
            }),
            rhs: Rc::new(Expr::Binary {
                op: BinaryOp::And,
                lhs: Rc::new(Expr::Bool(true)),
                rhs: Rc::new(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: ident("b"),
                }),
            }),
        };
        assert_eq!(parse_expr("a < 1 || true && !b").unwrap(), expected);
    }

    #[test]
    fn calls_fields_and_new() {
        let expected = Expr::Field {
            target: Rc::new(Expr::Call {
                callee: ident("BFF"),
                args: vec![
                    Arg {
                        name: None,
                        value: ident("x"),
                    },
                    Arg {
                        name: Some("tag".into()),
                        value: Rc::new(Expr::Str("output".into())),
                    },
                ],
            }),
            field: "z".into(),
        };
        assert_eq!(parse_expr("BFF(x, tag = 'output').z").unwrap(), expected);

        let expected = Expr::New {
            type_name: "ComputationNode".into(),
            members: vec![Member::Value {
                name: "operation".into(),
                expr: Rc::new(Expr::Str("Input".into())),
            }],
        };
        assert_eq!(
            parse_expr("new ComputationNode [ operation = 'Input' ; ]").unwrap(),
            expected
        );
    }

    #[test]
    fn members_and_functions() {
        let script = parse("f(x, y = 2) = x\n g = [ a = 1 b = f(a) ] ;; h = if g.a == 1 then 'y' else 'n'").unwrap();
        let names: Vec<&str> = script.members.iter().map(Member::name).collect();
        assert_eq!(names, vec!["f", "g", "h"]);
        match &script.members[0] {
            Member::Function { params, .. } => {
                assert_eq!(params[0].name, "x");
                assert_eq!(params[1].default, Some(num(2.0)));
            }
            other => panic!("expected a function, got {:?}", other),
        }
    }

    #[test]
    fn syntax_errors_carry_positions() {
        assert_eq!(
            parse("a = 1 +\nb = 2").unwrap_err(),
            syntax(2, 3, "expected an identifier, found '='")
        );
        let err = parse("a = (1").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 1, column: 7, .. }), "{}", err);
        let err = parse("a = 1 < 2 < 3").unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }), "{}", err);
        let err = parse("new = 1").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 1, column: 1, .. }), "{}", err);
    }
}
