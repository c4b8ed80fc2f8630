use super::ast::*;
use super::lexer::{Keyword, Punct, Spanned, Token};
use super::Error;

/// Deepest nesting of statements and expressions a script may use.
pub const MAX_NESTING: usize = 128;

pub fn parse(tokens: Vec<Spanned>) -> Result<Script, Error> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        in_function: false,
        loop_depth: 0,
        depth: 0,
    };
    let mut body = vec![];
    while !parser.at_eof() {
        body.push(parser.statement()?);
    }
    Ok(Script { body })
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    in_function: bool,
    loop_depth: usize,
    /// Open statements, sub-expressions and operator chains.
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn line(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn previous_line(&self) -> usize {
        if self.pos == 0 {
            1
        } else {
            self.tokens[self.pos - 1].line
        }
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check_punct(&self, punct: Punct) -> bool {
        matches!(self.peek(), Token::Punct(p) if *p == punct)
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.peek(), Token::Keyword(k) if *k == keyword)
    }

    fn eat_punct(&mut self, punct: Punct) -> bool {
        if self.check_punct(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: Punct) -> Result<(), Error> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_ident(&mut self) -> Result<Name, Error> {
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn unexpected(&self) -> Error {
        let msg = match self.peek() {
            Token::Eof => "Unexpected end of input".to_string(),
            Token::Number(n) => format!("Unexpected number {n}"),
            Token::Str(s) => format!("Unexpected string {s:?}"),
            Token::Ident(name) => format!("Unexpected identifier {name}"),
            Token::Keyword(k) => format!("Unexpected token {k:?}"),
            Token::Punct(p) => format!("Unexpected token {p:?}"),
        };
        Error::syntax(self.line(), &msg)
    }

    /// Automatic semicolon insertion, restricted to the cases the generated
    /// code and hand-written ducks rely on.
    fn consume_semicolon(&mut self) -> Result<(), Error> {
        if self.eat_punct(Punct::Semicolon) {
            return Ok(());
        }
        if self.check_punct(Punct::RBrace) || self.at_eof() || self.line() > self.previous_line()
        {
            return Ok(());
        }
        Err(self.unexpected())
    }

    /// Counts one more level of nesting, failing once the script is too deep
    /// to compile without exhausting the native stack.
    fn deepen(&mut self) -> Result<(), Error> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(Error::syntax(self.line(), "Script is nested too deeply"));
        }
        Ok(())
    }

    fn nested<T>(&mut self, parse: fn(&mut Self) -> Result<T, Error>) -> Result<T, Error> {
        self.deepen()?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn statement(&mut self) -> Result<Stmt, Error> {
        self.nested(Self::parse_statement)
    }

    fn parse_statement(&mut self) -> Result<Stmt, Error> {
        let line = self.line();
        let kind = match self.peek().clone() {
            Token::Punct(Punct::LBrace) => StmtKind::Block(self.block()?),
            Token::Punct(Punct::Semicolon) => {
                self.advance();
                StmtKind::Empty
            }
            Token::Keyword(Keyword::Var | Keyword::Let | Keyword::Const) => {
                self.advance();
                let decls = self.var_declarations()?;
                self.consume_semicolon()?;
                StmtKind::Var(decls)
            }
            Token::Keyword(Keyword::Function) => {
                self.advance();
                StmtKind::Function(self.function(line)?)
            }
            Token::Keyword(Keyword::If) => {
                self.advance();
                self.expect_punct(Punct::LParen)?;
                let test = self.expression()?;
                self.expect_punct(Punct::RParen)?;
                let consequent = Box::new(self.statement()?);
                let alternate = if self.eat_keyword(Keyword::Else) {
                    Some(Box::new(self.statement()?))
                } else {
                    None
                };
                StmtKind::If {
                    test,
                    consequent,
                    alternate,
                }
            }
            Token::Keyword(Keyword::While) => {
                self.advance();
                self.expect_punct(Punct::LParen)?;
                let test = self.expression()?;
                self.expect_punct(Punct::RParen)?;
                let body = Box::new(self.loop_body()?);
                StmtKind::While { test, body }
            }
            Token::Keyword(Keyword::Do) => {
                self.advance();
                let body = Box::new(self.loop_body()?);
                if !self.eat_keyword(Keyword::While) {
                    return Err(self.unexpected());
                }
                self.expect_punct(Punct::LParen)?;
                let test = self.expression()?;
                self.expect_punct(Punct::RParen)?;
                self.eat_punct(Punct::Semicolon);
                StmtKind::DoWhile { body, test }
            }
            Token::Keyword(Keyword::For) => {
                self.advance();
                self.for_statement()?
            }
            Token::Keyword(Keyword::Break) => {
                self.advance();
                if self.loop_depth == 0 {
                    return Err(Error::syntax(line, "Illegal break statement"));
                }
                self.consume_semicolon()?;
                StmtKind::Break
            }
            Token::Keyword(Keyword::Continue) => {
                self.advance();
                if self.loop_depth == 0 {
                    return Err(Error::syntax(line, "Illegal continue statement"));
                }
                self.consume_semicolon()?;
                StmtKind::Continue
            }
            Token::Keyword(Keyword::Return) => {
                self.advance();
                if !self.in_function {
                    return Err(Error::syntax(line, "Illegal return statement"));
                }
                let value = if self.check_punct(Punct::Semicolon)
                    || self.check_punct(Punct::RBrace)
                    || self.at_eof()
                    || self.line() > line
                {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.consume_semicolon()?;
                StmtKind::Return(value)
            }
            _ => {
                let expr = self.expression()?;
                self.consume_semicolon()?;
                StmtKind::Expr(expr)
            }
        };
        Ok(Stmt { kind, line })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, Error> {
        self.expect_punct(Punct::LBrace)?;
        let mut body = vec![];
        while !self.check_punct(Punct::RBrace) {
            if self.at_eof() {
                return Err(self.unexpected());
            }
            body.push(self.statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn loop_body(&mut self) -> Result<Stmt, Error> {
        self.loop_depth += 1;
        let body = self.statement();
        self.loop_depth -= 1;
        body
    }

    fn var_declarations(&mut self) -> Result<Vec<(Name, Option<Expr>)>, Error> {
        let mut decls = vec![];
        loop {
            let name = self.expect_ident()?;
            let init = if self.eat_punct(Punct::Assign) {
                Some(self.assignment()?)
            } else {
                None
            };
            decls.push((name, init));
            if !self.eat_punct(Punct::Comma) {
                return Ok(decls);
            }
        }
    }

    fn function(&mut self, line: usize) -> Result<FunctionDecl, Error> {
        let name = self.expect_ident()?;
        self.expect_punct(Punct::LParen)?;
        let mut params = vec![];
        if !self.check_punct(Punct::RParen) {
            loop {
                params.push(self.expect_ident()?);
                if !self.eat_punct(Punct::Comma) {
                    break;
                }
            }
        }
        self.expect_punct(Punct::RParen)?;

        let saved = (self.in_function, self.loop_depth);
        self.in_function = true;
        self.loop_depth = 0;
        let body = self.block();
        (self.in_function, self.loop_depth) = saved;

        Ok(FunctionDecl {
            name,
            params,
            body: body?,
            line,
        })
    }

    fn for_statement(&mut self) -> Result<StmtKind, Error> {
        self.expect_punct(Punct::LParen)?;
        let init = if self.check_punct(Punct::Semicolon) {
            None
        } else {
            let line = self.line();
            let kind = if self.eat_keyword(Keyword::Var)
                || self.eat_keyword(Keyword::Let)
                || self.eat_keyword(Keyword::Const)
            {
                StmtKind::Var(self.var_declarations()?)
            } else {
                StmtKind::Expr(self.expression()?)
            };
            Some(Box::new(Stmt { kind, line }))
        };
        self.expect_punct(Punct::Semicolon)?;
        let test = if self.check_punct(Punct::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(Punct::Semicolon)?;
        let update = if self.check_punct(Punct::RParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(Punct::RParen)?;
        let body = Box::new(self.loop_body()?);
        Ok(StmtKind::For {
            init,
            test,
            update,
            body,
        })
    }

    fn expression(&mut self) -> Result<Expr, Error> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, Error> {
        self.nested(Self::parse_assignment)
    }

    fn parse_assignment(&mut self) -> Result<Expr, Error> {
        let left = self.conditional()?;
        let op = match self.peek() {
            Token::Punct(Punct::Assign) => None,
            Token::Punct(Punct::PlusAssign) => Some(BinaryOp::Add),
            Token::Punct(Punct::MinusAssign) => Some(BinaryOp::Sub),
            Token::Punct(Punct::StarAssign) => Some(BinaryOp::Mul),
            Token::Punct(Punct::SlashAssign) => Some(BinaryOp::Div),
            Token::Punct(Punct::PercentAssign) => Some(BinaryOp::Rem),
            _ => return Ok(left),
        };
        let line = self.line();
        let target = match left.kind {
            ExprKind::Ident(name) => name,
            _ => {
                return Err(Error::syntax(
                    line,
                    "Invalid left-hand side in assignment",
                ))
            }
        };
        self.advance();
        let value = Box::new(self.assignment()?);
        Ok(Expr {
            kind: ExprKind::Assign { op, target, value },
            line: left.line,
        })
    }

    fn conditional(&mut self) -> Result<Expr, Error> {
        let test = self.logical_or()?;
        if !self.eat_punct(Punct::Question) {
            return Ok(test);
        }
        let consequent = self.assignment()?;
        self.expect_punct(Punct::Colon)?;
        let alternate = self.assignment()?;
        let line = test.line;
        Ok(Expr {
            kind: ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            line,
        })
    }

    fn logical_or(&mut self) -> Result<Expr, Error> {
        let mut left = self.logical_and()?;
        let depth = self.depth;
        while self.eat_punct(Punct::OrOr) {
            self.deepen()?;
            let right = self.logical_and()?;
            left = logical(LogicalOp::Or, left, right);
        }
        self.depth = depth;
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<Expr, Error> {
        let mut left = self.equality()?;
        let depth = self.depth;
        while self.eat_punct(Punct::AndAnd) {
            self.deepen()?;
            let right = self.equality()?;
            left = logical(LogicalOp::And, left, right);
        }
        self.depth = depth;
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, Error> {
        let mut left = self.relational()?;
        let depth = self.depth;
        loop {
            let op = match self.peek() {
                Token::Punct(Punct::Eq) => BinaryOp::Eq,
                Token::Punct(Punct::NotEq) => BinaryOp::NotEq,
                Token::Punct(Punct::StrictEq) => BinaryOp::StrictEq,
                Token::Punct(Punct::StrictNotEq) => BinaryOp::StrictNotEq,
                _ => break,
            };
            self.advance();
            self.deepen()?;
            let right = self.relational()?;
            left = binary(op, left, right);
        }
        self.depth = depth;
        Ok(left)
    }

    fn relational(&mut self) -> Result<Expr, Error> {
        let mut left = self.additive()?;
        let depth = self.depth;
        loop {
            let op = match self.peek() {
                Token::Punct(Punct::Lt) => BinaryOp::Lt,
                Token::Punct(Punct::LtEq) => BinaryOp::LtEq,
                Token::Punct(Punct::Gt) => BinaryOp::Gt,
                Token::Punct(Punct::GtEq) => BinaryOp::GtEq,
                _ => break,
            };
            self.advance();
            self.deepen()?;
            let right = self.additive()?;
            left = binary(op, left, right);
        }
        self.depth = depth;
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, Error> {
        let mut left = self.multiplicative()?;
        let depth = self.depth;
        loop {
            let op = match self.peek() {
                Token::Punct(Punct::Plus) => BinaryOp::Add,
                Token::Punct(Punct::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            self.deepen()?;
            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
        self.depth = depth;
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Expr, Error> {
        let mut left = self.unary()?;
        let depth = self.depth;
        loop {
            let op = match self.peek() {
                Token::Punct(Punct::Star) => BinaryOp::Mul,
                Token::Punct(Punct::Slash) => BinaryOp::Div,
                Token::Punct(Punct::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.advance();
            self.deepen()?;
            let right = self.unary()?;
            left = binary(op, left, right);
        }
        self.depth = depth;
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, Error> {
        self.nested(Self::parse_unary)
    }

    fn parse_unary(&mut self) -> Result<Expr, Error> {
        let line = self.line();
        let op = match self.peek() {
            Token::Punct(Punct::Minus) => UnaryOp::Neg,
            Token::Punct(Punct::Plus) => UnaryOp::Plus,
            Token::Punct(Punct::Not) => UnaryOp::Not,
            Token::Keyword(Keyword::Typeof) => UnaryOp::Typeof,
            Token::Punct(Punct::PlusPlus) | Token::Punct(Punct::MinusMinus) => {
                let increment = self.check_punct(Punct::PlusPlus);
                self.advance();
                let operand = self.unary()?;
                let target = update_target(operand)?;
                return Ok(Expr {
                    kind: ExprKind::Update {
                        increment,
                        prefix: true,
                        target,
                    },
                    line,
                });
            }
            _ => return self.postfix(),
        };
        self.advance();
        let operand = Box::new(self.unary()?);
        Ok(Expr {
            kind: ExprKind::Unary { op, operand },
            line,
        })
    }

    fn postfix(&mut self) -> Result<Expr, Error> {
        let expr = self.call()?;
        // A line break before "++" starts a new statement.
        if self.line() != self.previous_line() {
            return Ok(expr);
        }
        let increment = match self.peek() {
            Token::Punct(Punct::PlusPlus) => true,
            Token::Punct(Punct::MinusMinus) => false,
            _ => return Ok(expr),
        };
        self.advance();
        let line = expr.line;
        let target = update_target(expr)?;
        Ok(Expr {
            kind: ExprKind::Update {
                increment,
                prefix: false,
                target,
            },
            line,
        })
    }

    fn call(&mut self) -> Result<Expr, Error> {
        let mut expr = self.primary()?;
        let depth = self.depth;
        loop {
            let line = self.line();
            if self.check_punct(Punct::LParen) || self.check_punct(Punct::Dot) {
                self.deepen()?;
            }
            if self.eat_punct(Punct::LParen) {
                let mut args = vec![];
                if !self.check_punct(Punct::RParen) {
                    loop {
                        args.push(self.assignment()?);
                        if !self.eat_punct(Punct::Comma) {
                            break;
                        }
                    }
                }
                self.expect_punct(Punct::RParen)?;
                expr = Expr {
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    line,
                };
            } else if self.eat_punct(Punct::Dot) {
                let property = self.expect_ident()?;
                expr = Expr {
                    kind: ExprKind::Member {
                        object: Box::new(expr),
                        property,
                    },
                    line,
                };
            } else {
                self.depth = depth;
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, Error> {
        let line = self.line();
        let kind = match self.peek().clone() {
            Token::Number(n) => ExprKind::Number(n),
            Token::Str(s) => ExprKind::Str(s),
            Token::Ident(name) => ExprKind::Ident(name),
            Token::Keyword(Keyword::True) => ExprKind::Bool(true),
            Token::Keyword(Keyword::False) => ExprKind::Bool(false),
            Token::Keyword(Keyword::Null) => ExprKind::Null,
            Token::Punct(Punct::LParen) => {
                self.advance();
                let expr = self.expression()?;
                self.expect_punct(Punct::RParen)?;
                return Ok(expr);
            }
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(Expr { kind, line })
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let line = left.line;
    Expr {
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        line,
    }
}

fn logical(op: LogicalOp, left: Expr, right: Expr) -> Expr {
    let line = left.line;
    Expr {
        kind: ExprKind::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        line,
    }
}

fn update_target(expr: Expr) -> Result<Name, Error> {
    match expr.kind {
        ExprKind::Ident(name) => Ok(name),
        _ => Err(Error::syntax(
            expr.line,
            "Invalid left-hand side expression in update operation",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::lexer::tokenize;

    fn parse_str(src: &str) -> Result<Script, Error> {
        parse(tokenize(src)?)
    }

    #[test]
    fn test_precedence() {
        let script = parse_str("x = 1 + 2 * 3;").unwrap();
        let StmtKind::Expr(expr) = &script.body[0].kind else {
            panic!("expected expression statement");
        };
        let ExprKind::Assign { value, .. } = &expr.kind else {
            panic!("expected assignment");
        };
        let ExprKind::Binary { op, right, .. } = &value.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(
            right.kind,
            ExprKind::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_assignment_in_condition() {
        let script = parse_str("while ((range = scan(0, 4)) <= 70) cannon(0, range);").unwrap();
        assert!(matches!(script.body[0].kind, StmtKind::While { .. }));
    }

    #[test]
    fn test_semicolon_insertion() {
        let script = parse_str("var a = 1\nvar b = 2\na++\nb").unwrap();
        assert_eq!(script.body.len(), 4);
        assert!(parse_str("var a = 1 var b = 2").is_err());
    }

    #[test]
    fn test_loops_and_functions() {
        let script = parse_str(
            "
            function f(a, b) {
              for (var i = 0; i < 10; i++) {
                if (i == a) break; else continue;
              }
              do { b--; } while (b > 0);
              return a ? b : -b;
            }
            ",
        )
        .unwrap();
        let StmtKind::Function(decl) = &script.body[0].kind else {
            panic!("expected function");
        };
        assert_eq!(decl.name.as_str(), "f");
        assert_eq!(decl.params.len(), 2);
        assert_eq!(decl.body.len(), 3);
    }

    #[test]
    fn test_illegal_statements() {
        assert_eq!(
            parse_str("return 1;").unwrap_err().msg,
            "Illegal return statement"
        );
        assert_eq!(parse_str("break;").unwrap_err().msg, "Illegal break statement");
        assert!(parse_str("1 = 2;").is_err());
        assert!(parse_str("Math.x = 2;").is_err());
        assert!(parse_str("f(1, 2").is_err());
        assert!(parse_str("if (x) {").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let parens = format!("var a = {}1{};", "(".repeat(3000), ")".repeat(3000));
        let error = parse_str(&parens).unwrap_err();
        assert_eq!(error.kind, crate::vm::ErrorKind::Syntax);
        assert_eq!(error.msg, "Script is nested too deeply");

        let chain = format!("var a = 1{};", "+1".repeat(100_000));
        assert!(parse_str(&chain).is_err());
        let negations = format!("var a = {}1;", "-".repeat(3000));
        assert!(parse_str(&negations).is_err());
        let blocks = format!("{}{}", "{".repeat(3000), "}".repeat(3000));
        assert!(parse_str(&blocks).is_err());
        let calls = format!("f{};", "()".repeat(3000));
        assert!(parse_str(&calls).is_err());

        let shallow = format!("var a = {}1{} + 2 * 3;", "(".repeat(20), ")".repeat(20));
        assert!(parse_str(&shallow).is_ok());
    }
}
