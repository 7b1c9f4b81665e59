use std::ops::Range;

use crate::ast::*;
use crate::lexer::Token;

/// Give up after this many errors; later ones are usually cascades.
const MAX_ERRORS: usize = 20;

/// Deepest nesting of statements, and of operators within one
/// expression, that the parser accepts.
const MAX_NESTING: usize = 200;

/// Binding power, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Prec {
    None,
    Comma,
    Assignment,
    Ternary,
    Or,
    And,
    BitOr,
    BitAnd,
    Equality,
    Comparison,
    Shift,
    Term,
    Factor,
    Unary,
    Postfix,
}

impl Prec {
    fn next(self) -> Prec {
        match self {
            Prec::None => Prec::Comma,
            Prec::Comma => Prec::Assignment,
            Prec::Assignment => Prec::Ternary,
            Prec::Ternary => Prec::Or,
            Prec::Or => Prec::And,
            Prec::And => Prec::BitOr,
            Prec::BitOr => Prec::BitAnd,
            Prec::BitAnd => Prec::Equality,
            Prec::Equality => Prec::Comparison,
            Prec::Comparison => Prec::Shift,
            Prec::Shift => Prec::Term,
            Prec::Term => Prec::Factor,
            Prec::Factor => Prec::Unary,
            Prec::Unary | Prec::Postfix => Prec::Postfix,
        }
    }
}

fn infix_prec(token: &Token) -> Prec {
    match token {
        Token::Comma => Prec::Comma,
        Token::Assign => Prec::Assignment,
        Token::Question => Prec::Ternary,
        Token::OrOr => Prec::Or,
        Token::AndAnd => Prec::And,
        Token::Pipe => Prec::BitOr,
        Token::Amp => Prec::BitAnd,
        Token::EqualEqual | Token::BangEqual => Prec::Equality,
        Token::Less | Token::LessEqual | Token::Greater | Token::GreaterEqual => Prec::Comparison,
        Token::ShiftLeft | Token::ShiftRight => Prec::Shift,
        Token::Plus | Token::Minus => Prec::Term,
        Token::Star | Token::Slash | Token::Percent => Prec::Factor,
        Token::PlusPlus | Token::MinusMinus | Token::LParen => Prec::Postfix,
        _ => Prec::None,
    }
}

fn starts_expression(token: &Token) -> bool {
    matches!(
        token,
        Token::Number(_)
            | Token::Str(_)
            | Token::True
            | Token::False
            | Token::Null
            | Token::Ident(_)
            | Token::LParen
            | Token::Minus
            | Token::Bang
            | Token::Tilde
            | Token::PlusPlus
            | Token::MinusMinus
    )
}

fn binary_op(token: &Token) -> Option<BinaryOp> {
    Some(match token {
        Token::Plus => BinaryOp::Add,
        Token::Minus => BinaryOp::Subtract,
        Token::Star => BinaryOp::Multiply,
        Token::Slash => BinaryOp::Divide,
        Token::Percent => BinaryOp::Modulo,
        Token::EqualEqual => BinaryOp::Equal,
        Token::BangEqual => BinaryOp::NotEqual,
        Token::Less => BinaryOp::Less,
        Token::LessEqual => BinaryOp::LessEqual,
        Token::Greater => BinaryOp::Greater,
        Token::GreaterEqual => BinaryOp::GreaterEqual,
        Token::Amp => BinaryOp::BitAnd,
        Token::Pipe => BinaryOp::BitOr,
        Token::ShiftLeft => BinaryOp::ShiftLeft,
        Token::ShiftRight => BinaryOp::ShiftRight,
        _ => return None,
    })
}

pub struct Parser {
    tokens: Vec<(Token, Span, Pos)>,
    pos: usize,
    /// Number of loops enclosing the statement being parsed.
    loop_depth: usize,
    /// Current nesting, bounded by `MAX_NESTING`.
    depth: usize,
    errors: Vec<ParseError>,
    /// End of input, for errors raised there.
    eof: (Span, Pos),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub row: u32,
    pub col: u32,
    pub span: Span,
    pub message: String,
}

impl ParseError {
    pub fn report(&self, file: &str) -> String {
        format!("ParserError at {file}:{}:{} {}", self.row, self.col, self.message)
    }
}

type Result<T> = std::result::Result<T, ParseError>;

impl Parser {
    pub fn new(source: &str, tokens: Vec<(Token, Range<usize>)>) -> Self {
        let map = SourceMap::new(source);
        let position = |offset: usize| {
            let (row, col) = map.lookup(offset);
            Pos::new(row as u32, col as u32)
        };
        let tokens = tokens
            .into_iter()
            .map(|(t, r)| {
                let pos = position(r.start);
                (t, Span { start: r.start, end: r.end }, pos)
            })
            .collect();
        let eof = (Span { start: source.len(), end: source.len() }, position(source.len()));
        Parser { tokens, pos: 0, loop_depth: 0, depth: 0, errors: Vec::new(), eof }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _, _)| t)
    }

    fn peek_span(&self) -> Span {
        self.tokens.get(self.pos).map(|(_, s, _)| *s).unwrap_or(self.eof.0)
    }

    fn peek_pos(&self) -> Pos {
        self.tokens.get(self.pos).map(|(_, _, p)| *p).unwrap_or(self.eof.1)
    }

    fn advance(&mut self) -> Option<(Token, Pos)> {
        let tok = self.tokens.get(self.pos).map(|(t, _, p)| (t.clone(), *p));
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, expected: &Token) -> bool {
        self.peek() == Some(expected)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<Pos> {
        match self.peek() {
            Some(tok) if tok == expected => {
                let pos = self.peek_pos();
                self.pos += 1;
                Ok(pos)
            }
            Some(tok) => Err(self.error(format!("expected '{}', got {}", expected.symbol(), tok.describe()))),
            None => Err(self.error(format!("expected '{}', got end of input", expected.symbol()))),
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Pos)> {
        match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                let pos = self.peek_pos();
                self.pos += 1;
                Ok((name, pos))
            }
            Some(tok) => Err(self.error(format!("expected identifier, got {}", tok.describe()))),
            None => Err(self.error("expected identifier, got end of input".into())),
        }
    }

    fn error(&self, message: String) -> ParseError {
        let pos = self.peek_pos();
        ParseError { row: pos.row, col: pos.col, span: self.peek_span(), message }
    }

    fn error_at(&self, pos: Pos, span: Span, message: String) -> ParseError {
        ParseError { row: pos.row, col: pos.col, span, message }
    }

    /// Go one level deeper; the caller restores `depth`.
    fn nest(&mut self, what: &str) -> Result<()> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("{what} nested too deeply")));
        }
        self.depth += 1;
        Ok(())
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn gave_up(&self) -> bool {
        self.errors.len() >= MAX_ERRORS
    }

    // ---- Statements ----

    pub fn parse_program(&mut self) -> (Program, Vec<ParseError>) {
        let statements = self.statements_until(None);
        (Program { statements }, std::mem::take(&mut self.errors))
    }

    /// Statements up to `end` (or end of input), recovering from errors
    /// by skipping to the next statement boundary.
    fn statements_until(&mut self, end: Option<&Token>) -> Vec<Stmt> {
        let mut statements = Vec::new();
        while !self.at_end() && !self.gave_up() {
            if end.is_some_and(|e| self.check(e)) {
                break;
            }
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize(end.is_some());
                }
            }
        }
        statements
    }

    /// Skip past the next `;`, or up to the next token that starts a
    /// statement. Always makes progress.
    fn synchronize(&mut self, in_block: bool) {
        let start = self.pos;
        while let Some(tok) = self.peek() {
            match tok {
                Token::Semicolon => {
                    self.pos += 1;
                    return;
                }
                Token::RBrace if in_block => return,
                Token::Var
                | Token::Function
                | Token::Print
                | Token::If
                | Token::While
                | Token::For
                | Token::Return
                    if self.pos > start =>
                {
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }

    fn declaration(&mut self) -> Result<Stmt> {
        match self.peek() {
            Some(Token::Var) => self.var_declaration(),
            Some(Token::Function) => self.function_declaration(),
            _ => self.statement(),
        }
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        self.expect(&Token::Var)?;
        let (name, pos) = self.expect_ident()?;
        let init = if self.eat(&Token::Assign) {
            Some(self.parse_precedence(Prec::Assignment)?)
        } else {
            None
        };
        self.expect(&Token::Semicolon)?;
        Ok(Stmt::Var { name, init, pos })
    }

    fn function_declaration(&mut self) -> Result<Stmt> {
        self.expect(&Token::Function)?;
        let (name, pos) = self.expect_ident()?;
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                let (name, pos) = self.expect_ident()?;
                params.push(Param { name, pos });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;

        // A function body is never inside the loop that encloses the declaration.
        self.nest("function")?;
        let outer_loops = std::mem::replace(&mut self.loop_depth, 0);
        let body = self.brace_body();
        self.loop_depth = outer_loops;
        self.depth -= 1;

        Ok(Stmt::Function { name, params, body: body?, pos })
    }

    fn brace_body(&mut self) -> Result<Vec<Stmt>> {
        self.expect(&Token::LBrace)?;
        let body = self.statements_until(Some(&Token::RBrace));
        self.expect(&Token::RBrace)?;
        Ok(body)
    }

    fn statement(&mut self) -> Result<Stmt> {
        self.nest("statement")?;
        let stmt = self.nested_statement();
        self.depth -= 1;
        stmt
    }

    fn nested_statement(&mut self) -> Result<Stmt> {
        let pos = self.peek_pos();
        match self.peek() {
            Some(Token::Print) => {
                self.pos += 1;
                let value = self.expression()?;
                self.expect(&Token::Semicolon)?;
                Ok(Stmt::Print { value, pos })
            }
            Some(Token::If) => self.if_statement(),
            Some(Token::While) => self.while_statement(),
            Some(Token::For) => self.for_statement(),
            Some(Token::Return) => {
                self.pos += 1;
                let value = if self.check(&Token::Semicolon) { None } else { Some(self.expression()?) };
                self.expect(&Token::Semicolon)?;
                Ok(Stmt::Return { value, pos })
            }
            Some(Token::Break) | Some(Token::Continue) => {
                let span = self.peek_span();
                let is_break = self.check(&Token::Break);
                self.pos += 1;
                if self.loop_depth == 0 {
                    return Err(self.error_at(
                        pos,
                        span,
                        "'break' or 'continue' statement used outside of a loop.".into(),
                    ));
                }
                self.expect(&Token::Semicolon)?;
                Ok(if is_break { Stmt::Break { pos } } else { Stmt::Continue { pos } })
            }
            Some(Token::LBrace) => Ok(Stmt::Block { body: self.brace_body()?, pos }),
            _ => {
                let expr = self.expression()?;
                self.expect(&Token::Semicolon)?;
                Ok(Stmt::Expression(expr))
            }
        }
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        let pos = self.expect(&Token::If)?;
        self.expect(&Token::LParen)?;
        let condition = self.expression()?;
        self.expect(&Token::RParen)?;
        let then = Box::new(self.statement()?);
        let otherwise = if self.eat(&Token::Else) { Some(Box::new(self.statement()?)) } else { None };
        Ok(Stmt::If { condition, then, otherwise, pos })
    }

    fn loop_body(&mut self) -> Result<Box<Stmt>> {
        self.loop_depth += 1;
        let body = self.statement();
        self.loop_depth -= 1;
        Ok(Box::new(body?))
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        let pos = self.expect(&Token::While)?;
        self.expect(&Token::LParen)?;
        let condition = self.expression()?;
        self.expect(&Token::RParen)?;
        let body = self.loop_body()?;
        Ok(Stmt::While { condition, body, pos })
    }

    fn for_statement(&mut self) -> Result<Stmt> {
        let pos = self.expect(&Token::For)?;
        self.expect(&Token::LParen)?;

        let init = match self.peek() {
            Some(Token::Semicolon) => {
                self.pos += 1;
                None
            }
            Some(Token::Var) => Some(Box::new(self.var_declaration()?)),
            _ => {
                let expr = self.expression()?;
                self.expect(&Token::Semicolon)?;
                Some(Box::new(Stmt::Expression(expr)))
            }
        };

        let condition = if self.check(&Token::Semicolon) { None } else { Some(self.expression()?) };
        self.expect(&Token::Semicolon)?;

        let step = if self.check(&Token::RParen) { None } else { Some(self.expression()?) };
        self.expect(&Token::RParen)?;

        let body = self.loop_body()?;
        Ok(Stmt::For { init, condition, step, body, pos })
    }

    // ---- Expressions ----

    pub fn expression(&mut self) -> Result<Expr> {
        self.parse_precedence(Prec::Comma)
    }

    fn parse_precedence(&mut self, min: Prec) -> Result<Expr> {
        let outer = self.depth;
        let expr = self.operator_chain(min);
        self.depth = outer;
        expr
    }

    fn operator_chain(&mut self, min: Prec) -> Result<Expr> {
        self.nest("expression")?;
        let mut left = self.prefix()?;
        while let Some(tok) = self.peek() {
            let prec = infix_prec(tok);
            if prec == Prec::None || prec < min {
                break;
            }
            // Every operator deepens the tree by one.
            self.nest("expression")?;
            left = self.infix(left, prec)?;
        }
        Ok(left)
    }

    fn prefix(&mut self) -> Result<Expr> {
        let span = self.peek_span();
        let Some((tok, pos)) = self.advance() else {
            return Err(self.error("expected expression, got end of input".into()));
        };
        if !starts_expression(&tok) {
            // Leave the offending token for recovery to see.
            self.pos -= 1;
            return Err(self.error_at(pos, span, format!("expected expression, got {}", tok.describe())));
        }
        match tok {
            Token::Number(value) => Ok(Expr::Number { value, pos }),
            Token::Str(value) => Ok(Expr::String { value, pos }),
            Token::True => Ok(Expr::Bool { value: true, pos }),
            Token::False => Ok(Expr::Bool { value: false, pos }),
            Token::Null => Ok(Expr::Null { pos }),
            Token::Ident(name) => Ok(Expr::Id { name, pos }),
            Token::LParen => {
                let inner = Box::new(self.expression()?);
                self.expect(&Token::RParen)?;
                Ok(Expr::Group { inner, pos })
            }
            Token::Minus | Token::Bang | Token::Tilde => {
                let op = match tok {
                    Token::Minus => UnaryOp::Negate,
                    Token::Bang => UnaryOp::Not,
                    _ => UnaryOp::BitNot,
                };
                let operand = Box::new(self.parse_precedence(Prec::Unary)?);
                Ok(Expr::Unary { op, operand, pos })
            }
            Token::PlusPlus | Token::MinusMinus => {
                let op = if tok == Token::PlusPlus { StepOp::Increment } else { StepOp::Decrement };
                let operand_span = self.peek_span();
                match self.parse_precedence(Prec::Unary)? {
                    Expr::Id { name, pos: target } => Ok(Expr::Prefix { op, name, target, pos }),
                    other => Err(self.error_at(
                        other.pos(),
                        operand_span,
                        format!("operand of '{}' must be a variable", tok.symbol()),
                    )),
                }
            }
            other => Err(self.error_at(pos, span, format!("expected expression, got {}", other.describe()))),
        }
    }

    fn infix(&mut self, left: Expr, prec: Prec) -> Result<Expr> {
        let span = self.peek_span();
        let Some((tok, pos)) = self.advance() else {
            return Ok(left);
        };
        match tok {
            Token::Comma => {
                let mut items = vec![left, self.parse_precedence(Prec::Assignment)?];
                while self.eat(&Token::Comma) {
                    items.push(self.parse_precedence(Prec::Assignment)?);
                }
                Ok(Expr::Sequence { items, pos })
            }
            Token::Assign => {
                // Right associative: `a = b = c`.
                let value = Box::new(self.parse_precedence(Prec::Assignment)?);
                match left {
                    Expr::Id { name, pos: target } => Ok(Expr::Assign { name, target, value, pos }),
                    other => Err(self.error_at(other.pos(), span, "lvalue cannot be a constant.".into())),
                }
            }
            Token::Question => {
                let then = Box::new(self.parse_precedence(Prec::Assignment)?);
                self.expect(&Token::Colon)?;
                let otherwise = Box::new(self.parse_precedence(Prec::Ternary)?);
                Ok(Expr::Ternary { condition: Box::new(left), then, otherwise, pos })
            }
            Token::AndAnd | Token::OrOr => {
                let op = if tok == Token::AndAnd { LogicalOp::And } else { LogicalOp::Or };
                let right = Box::new(self.parse_precedence(prec.next())?);
                Ok(Expr::Logical { op, left: Box::new(left), right, pos })
            }
            Token::PlusPlus | Token::MinusMinus => {
                let op = if tok == Token::PlusPlus { StepOp::Increment } else { StepOp::Decrement };
                match left {
                    Expr::Id { name, pos: target } => Ok(Expr::Postfix { op, name, target, pos }),
                    other => Err(self.error_at(
                        other.pos(),
                        span,
                        format!("operand of '{}' must be a variable", tok.symbol()),
                    )),
                }
            }
            Token::LParen => {
                let Expr::Id { name: callee, pos: target } = left else {
                    return Err(self.error_at(left.pos(), span, "only named functions can be called".into()));
                };
                let mut args = Vec::new();
                if !self.check(&Token::RParen) {
                    loop {
                        args.push(self.parse_precedence(Prec::Assignment)?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&Token::RParen)?;
                Ok(Expr::Call { callee, target, args, pos: target })
            }
            other => match binary_op(&other) {
                Some(op) => {
                    let right = Box::new(self.parse_precedence(prec.next())?);
                    Ok(Expr::Binary { op, left: Box::new(left), right, pos })
                }
                None => Err(self.error_at(pos, span, format!("unexpected {}", other.describe()))),
            },
        }
    }
}

/// Parse a token stream produced by [`crate::lexer::lex`] over `source`.
pub fn parse(source: &str, tokens: Vec<(Token, Range<usize>)>) -> (Program, Vec<ParseError>) {
    Parser::new(source, tokens).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse_str(source: &str) -> Program {
        let (prog, errors) = parse(source, lex(source).unwrap());
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        prog
    }

    fn parse_errors(source: &str) -> Vec<ParseError> {
        parse(source, lex(source).unwrap()).1
    }

    fn only_expr(source: &str) -> Expr {
        match parse_str(source).statements.into_iter().next() {
            Some(Stmt::Expression(e)) => e,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn parse_var_with_and_without_initializer() {
        let prog = parse_str("var a = 1;\nvar b;");
        assert_eq!(prog.statements.len(), 2);
        match &prog.statements[0] {
            Stmt::Var { name, init: Some(Expr::Number { value, .. }), pos } => {
                assert_eq!(name, "a");
                assert_eq!(*value, 1.0);
                assert_eq!(*pos, Pos::new(1, 5));
            }
            other => panic!("got {other:?}"),
        }
        assert!(matches!(&prog.statements[1], Stmt::Var { init: None, pos, .. } if *pos == Pos::new(2, 5)));
    }

    #[test]
    fn factor_binds_tighter_than_term() {
        let expr = only_expr("1 + 2 * 3;");
        let Expr::Binary { op: BinaryOp::Add, right, .. } = expr else { panic!("expected +") };
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Multiply, .. }));
    }

    #[test]
    fn subtraction_is_left_associative() {
        let expr = only_expr("a - b - c;");
        let Expr::Binary { op: BinaryOp::Subtract, left, .. } = expr else { panic!("expected -") };
        assert!(matches!(*left, Expr::Binary { op: BinaryOp::Subtract, .. }));
    }

    #[test]
    fn shift_sits_between_comparison_and_term() {
        let expr = only_expr("a < b << c + d;");
        let Expr::Binary { op: BinaryOp::Less, right, .. } = expr else { panic!("expected <") };
        let Expr::Binary { op: BinaryOp::ShiftLeft, right, .. } = *right else { panic!("expected <<") };
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn assignment_is_right_associative() {
        let expr = only_expr("a = b = 1;");
        let Expr::Assign { name, value, .. } = expr else { panic!("expected assignment") };
        assert_eq!(name, "a");
        assert!(matches!(*value, Expr::Assign { .. }));
    }

    #[test]
    fn comma_builds_a_sequence() {
        let expr = only_expr("a = 1, b = 2, 3;");
        let Expr::Sequence { items, .. } = expr else { panic!("expected sequence") };
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn call_arguments_are_split_on_commas() {
        let expr = only_expr("add(1, x + 2);");
        let Expr::Call { callee, args, .. } = expr else { panic!("expected call") };
        assert_eq!(callee, "add");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn ternary_nests_to_the_right() {
        let expr = only_expr("a ? 1 : b ? 2 : 3;");
        let Expr::Ternary { otherwise, .. } = expr else { panic!("expected ternary") };
        assert!(matches!(*otherwise, Expr::Ternary { .. }));
    }

    #[test]
    fn prefix_and_postfix_steps() {
        assert!(matches!(only_expr("++i;"), Expr::Prefix { op: StepOp::Increment, .. }));
        assert!(matches!(only_expr("i--;"), Expr::Postfix { op: StepOp::Decrement, .. }));
    }

    #[test]
    fn for_loop_clauses_are_optional() {
        let prog = parse_str("for (;;) { break; }");
        let Stmt::For { init, condition, step, .. } = &prog.statements[0] else { panic!("expected for") };
        assert!(init.is_none() && condition.is_none() && step.is_none());
    }

    #[test]
    fn function_declaration_with_params() {
        let prog = parse_str("function add(a, b) { return a + b; }");
        let Stmt::Function { name, params, body, .. } = &prog.statements[0] else { panic!("expected function") };
        assert_eq!(name, "add");
        assert_eq!(params.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(matches!(body[0], Stmt::Return { value: Some(_), .. }));
    }

    #[test]
    fn if_else_binds_to_nearest_if() {
        let prog = parse_str("if (a) if (b) print 1; else print 2;");
        let Stmt::If { then, otherwise, .. } = &prog.statements[0] else { panic!("expected if") };
        assert!(otherwise.is_none());
        assert!(matches!(**then, Stmt::If { otherwise: Some(_), .. }));
    }

    #[test]
    fn assignment_to_literal_is_an_error() {
        let errors = parse_errors("1 = 2;");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "lvalue cannot be a constant.");
        assert_eq!((errors[0].row, errors[0].col), (1, 1));
    }

    #[test]
    fn break_outside_loop_is_an_error() {
        let errors = parse_errors("break;");
        assert_eq!(errors[0].message, "'break' or 'continue' statement used outside of a loop.");
        assert_eq!(errors[0].report("a.cn"), "ParserError at a.cn:1:1 'break' or 'continue' statement used outside of a loop.");
    }

    #[test]
    fn loop_inside_function_does_not_leak_outward() {
        assert!(parse_errors("while (true) { function f() { break; } }").len() == 1);
        assert!(parse_errors("function f() { while (true) { continue; } }").is_empty());
    }

    #[test]
    fn recovery_reports_each_bad_statement() {
        let errors = parse_errors("var = 1;\nprint 2;\nvar x = ;\nprint x;");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].row, 1);
        assert_eq!(errors[1].row, 3);
    }

    #[test]
    fn recovery_inside_blocks_keeps_the_block() {
        let (prog, errors) = parse("{ print ; print 1; }", lex("{ print ; print 1; }").unwrap());
        assert_eq!(errors.len(), 1);
        let Stmt::Block { body, .. } = &prog.statements[0] else { panic!("expected block") };
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn error_count_is_capped() {
        let source = "1 = 2;\n".repeat(50);
        assert_eq!(parse_errors(&source).len(), MAX_ERRORS);
    }

    #[test]
    fn deep_unary_chain_is_an_error() {
        let source = format!("print {}1;\nprint 2;", "!".repeat(3000));
        let (prog, errors) = parse(&source, lex(&source).unwrap());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "expression nested too deeply");
        assert_eq!(prog.statements.len(), 1);
        assert!(matches!(prog.statements[0], Stmt::Print { pos: Pos { row: 2, .. }, .. }));
    }

    #[test]
    fn deep_blocks_are_an_error() {
        let source = format!("{}{}", "{".repeat(1000), "}".repeat(1000));
        let errors = parse_errors(&source);
        assert_eq!(errors[0].message, "statement nested too deeply");
    }

    #[test]
    fn long_operator_chains_are_bounded() {
        let terms = |n: usize| vec!["1"; n].join(" + ");
        parse_str(&format!("print {};", terms(100)));
        let errors = parse_errors(&format!("print {};", terms(500)));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "expression nested too deeply");
    }

    #[test]
    fn moderate_nesting_parses() {
        let parens = format!("print {}1{};", "(".repeat(100), ")".repeat(100));
        parse_str(&parens);
        let ifs = format!("{}print 1;", "if (true) ".repeat(100));
        parse_str(&ifs);
    }

    #[test]
    fn missing_semicolon_at_end_of_input() {
        let errors = parse_errors("print 1");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "expected ';', got end of input");
        assert_eq!((errors[0].row, errors[0].col), (1, 8));
    }
}
