use std::rc::Rc;

use log::debug;

use crate::error::{Diagnostics, LoxError, Result};
use crate::expr::{Expr, FunctionExpr};
use crate::stmt::Stmt;
use crate::token::{Token, TokenType};

/// Recursive-descent parser with panic-mode recovery.
///
/// Local failures are reported to the diagnostics sink, then the parser
/// discards tokens up to the next statement boundary and keeps going, so one
/// run surfaces as many syntax errors as possible. A tree is produced even
/// when diagnostics were issued; callers must consult `had_error` before
/// running later passes.
pub struct Parser<'d> {
    tokens: Vec<Token>,
    current: usize,
    next_id: usize,
    diagnostics: &'d mut Diagnostics,
}

impl<'d> Parser<'d> {
    /// `first_id` seeds the node-id counter. A fresh parse starts at zero;
    /// the REPL threads the counter across lines so resolver annotations from
    /// earlier lines are never clobbered.
    pub fn new(tokens: Vec<Token>, first_id: usize, diagnostics: &'d mut Diagnostics) -> Self {
        let mut tokens = tokens;

        if tokens.is_empty() {
            tokens.push(Token::new(TokenType::EOF, String::new(), 1));
        }

        Parser {
            tokens,
            current: 0,
            next_id: first_id,
            diagnostics,
        }
    }

    pub fn parse(&mut self) -> Vec<Stmt> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        statements
    }

    /// First node id not handed out yet; the REPL feeds this into the next
    /// line's parser.
    pub fn next_id(&self) -> usize {
        self.next_id
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Declarations and statements
    // ─────────────────────────────────────────────────────────────────────────

    fn declaration(&mut self) -> Option<Stmt> {
        let result = if self.match_tokens(&[TokenType::CLASS]) {
            self.class_declaration()
        } else if self.match_tokens(&[TokenType::VAR]) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),

            Err(e) => {
                self.diagnostics.report(&e);
                self.synchronize();
                None
            }
        }
    }

    fn class_declaration(&mut self) -> Result<Stmt> {
        let name = self.consume(TokenType::IDENTIFIER, "Expect class name.")?.clone();

        let superclass = if self.match_tokens(&[TokenType::LESS]) {
            let super_name = self
                .consume(TokenType::IDENTIFIER, "Expect superclass name.")?
                .clone();

            let id = self.fresh_id();

            Some(Expr::Variable {
                id,
                name: super_name,
            })
        } else {
            None
        };

        self.consume(TokenType::LEFT_BRACE, "Expect '{' before class body.")?;

        let mut methods: Vec<Rc<FunctionExpr>> = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after class body.")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        let name = self
            .consume(TokenType::IDENTIFIER, "Expect variable name.")?
            .clone();

        let initializer = if self.match_tokens(&[TokenType::EQUAL]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::SEMICOLON,
            "Expect ';' after variable declaration.",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    fn statement(&mut self) -> Result<Stmt> {
        if self.match_tokens(&[TokenType::FOR]) {
            return self.for_statement();
        }

        if self.match_tokens(&[TokenType::IF]) {
            return self.if_statement();
        }

        if self.match_tokens(&[TokenType::PRINT]) {
            return self.print_statement();
        }

        if self.match_tokens(&[TokenType::RETURN]) {
            return self.return_statement();
        }

        if self.match_tokens(&[TokenType::WHILE]) {
            return self.while_statement();
        }

        if self.match_tokens(&[TokenType::BREAK]) {
            let keyword = self.previous().clone();
            self.consume(TokenType::SEMICOLON, "Expect ';' after 'break'.")?;
            return Ok(Stmt::Break { keyword });
        }

        if self.match_tokens(&[TokenType::CONTINUE]) {
            let keyword = self.previous().clone();
            self.consume(TokenType::SEMICOLON, "Expect ';' after 'continue'.")?;
            return Ok(Stmt::Continue { keyword });
        }

        if self.match_tokens(&[TokenType::LEFT_BRACE]) {
            return Ok(Stmt::Block(self.block()?));
        }

        self.expression_statement()
    }

    /// `for` desugars at parse time into an optional initializer block around
    /// a `Loop` node. The increment is kept on the loop itself so `continue`
    /// still runs it.
    fn for_statement(&mut self) -> Result<Stmt> {
        let for_line = self.previous().line;

        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'for'.")?;

        let initializer = if self.match_tokens(&[TokenType::SEMICOLON]) {
            None
        } else if self.match_tokens(&[TokenType::VAR]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if self.check(&TokenType::SEMICOLON) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(TokenType::SEMICOLON, "Expect ';' after loop condition.")?;

        let increment = if self.check(&TokenType::RIGHT_PAREN) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after for clauses.")?;

        let body = self.statement()?;

        // A missing condition loops forever.
        let condition = condition.unwrap_or_else(|| {
            Expr::Literal(Token::new(TokenType::TRUE, "true".to_string(), for_line))
        });

        let loop_stmt = Stmt::Loop {
            condition,
            body: Box::new(body),
            increment,
        };

        debug!("Desugared 'for' loop at line {}", for_line);

        Ok(match initializer {
            Some(init) => Stmt::Block(vec![init, loop_stmt]),
            None => loop_stmt,
        })
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);

        let else_branch = if self.match_tokens(&[TokenType::ELSE]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        let value = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expect ';' after value.")?;
        Ok(Stmt::Print(value))
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let keyword = self.previous().clone();

        let value = if self.check(&TokenType::SEMICOLON) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(TokenType::SEMICOLON, "Expect ';' after return value.")?;

        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after condition.")?;

        let body = Box::new(self.statement()?);

        Ok(Stmt::Loop {
            condition,
            body,
            increment: None,
        })
    }

    fn block(&mut self) -> Result<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after block.")?;

        Ok(statements)
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let expr = self.expression()?;

        // A function expression at statement position ends at its closing
        // brace; no ';' is required after `fun name() { ... }`.
        if matches!(expr, Expr::Function(_)) && !self.check(&TokenType::SEMICOLON) {
            return Ok(Stmt::Expression(expr));
        }

        self.consume(TokenType::SEMICOLON, "Expect ';' after expression.")?;

        Ok(Stmt::Expression(expr))
    }

    /// Parse a named function (declaration position or class method).
    fn function(&mut self, kind: &str) -> Result<Rc<FunctionExpr>> {
        let name = self
            .consume(TokenType::IDENTIFIER, &format!("Expect {} name.", kind))?
            .clone();

        self.finish_function(Some(name), kind)
    }

    fn finish_function(&mut self, name: Option<Token>, kind: &str) -> Result<Rc<FunctionExpr>> {
        self.consume(
            TokenType::LEFT_PAREN,
            &format!("Expect '(' before {} parameters.", kind),
        )?;

        let mut params: Vec<Token> = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if params.len() >= 255 {
                    let token = self.peek().clone();
                    self.diagnostics.report(&LoxError::parse(
                        &token,
                        "Can't have more than 255 parameters.",
                    ));
                }

                params.push(
                    self.consume(TokenType::IDENTIFIER, "Expect parameter name.")?
                        .clone(),
                );

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after parameters.")?;

        self.consume(
            TokenType::LEFT_BRACE,
            &format!("Expect '{{' before {} body.", kind),
        )?;

        let body = self.block()?;

        Ok(Rc::new(FunctionExpr { name, params, body }))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions, highest precedence last
    // ─────────────────────────────────────────────────────────────────────────

    fn expression(&mut self) -> Result<Expr> {
        if self.match_tokens(&[TokenType::FUN]) {
            let name = if self.check(&TokenType::IDENTIFIER) {
                Some(self.advance().clone())
            } else {
                None
            };

            return Ok(Expr::Function(self.finish_function(name, "function")?));
        }

        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr = self.or()?;

        if self.match_tokens(&[TokenType::EQUAL]) {
            let equals = self.previous().clone();
            let value = Box::new(self.assignment()?);

            return Ok(match expr {
                // The variable node disappears; its id carries over to the
                // assignment so the resolver annotation stays attached.
                Expr::Variable { id, name } => Expr::Assign { id, name, value },

                Expr::Get { object, name } => Expr::Set {
                    object,
                    name,
                    value,
                },

                other => {
                    // Non-fatal: report and keep the left-hand side.
                    self.diagnostics
                        .report(&LoxError::parse(&equals, "Invalid assignment target."));
                    other
                }
            });
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr> {
        let mut expr = self.and()?;

        while self.match_tokens(&[TokenType::OR]) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut expr = self.equality()?;

        while self.match_tokens(&[TokenType::AND]) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut expr = self.comparison()?;

        while self.match_tokens(&[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL]) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut expr = self.term()?;

        while self.match_tokens(&[
            TokenType::GREATER,
            TokenType::GREATER_EQUAL,
            TokenType::LESS,
            TokenType::LESS_EQUAL,
        ]) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut expr = self.factor()?;

        while self.match_tokens(&[TokenType::MINUS, TokenType::PLUS]) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr> {
        let mut expr = self.unary()?;

        while self.match_tokens(&[TokenType::SLASH, TokenType::STAR]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.match_tokens(&[TokenType::BANG, TokenType::MINUS]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_tokens(&[TokenType::LEFT_PAREN]) {
                expr = self.finish_call(expr)?;
            } else if self.match_tokens(&[TokenType::DOT]) {
                let name = self
                    .consume(TokenType::IDENTIFIER, "Expect property name after '.'.")?
                    .clone();

                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut arguments: Vec<Expr> = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if arguments.len() >= 255 {
                    let token = self.peek().clone();
                    self.diagnostics.report(&LoxError::parse(
                        &token,
                        "Can't have more than 255 arguments.",
                    ));
                }

                arguments.push(self.expression()?);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        let paren = self
            .consume(TokenType::RIGHT_PAREN, "Expect ')' after arguments.")?
            .clone();

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        if self.match_tokens(&[
            TokenType::NUMBER(0.0),
            TokenType::STRING(String::new()),
            TokenType::TRUE,
            TokenType::FALSE,
            TokenType::NIL,
        ]) {
            return Ok(Expr::Literal(self.previous().clone()));
        }

        if self.match_tokens(&[TokenType::THIS]) {
            let keyword = self.previous().clone();
            let id = self.fresh_id();
            return Ok(Expr::This { id, keyword });
        }

        if self.match_tokens(&[TokenType::SUPER]) {
            let keyword = self.previous().clone();
            self.consume(TokenType::DOT, "Expect '.' after 'super'.")?;
            let method = self
                .consume(TokenType::IDENTIFIER, "Expect superclass method name.")?
                .clone();
            let id = self.fresh_id();
            return Ok(Expr::Super {
                id,
                keyword,
                method,
            });
        }

        if self.match_tokens(&[TokenType::IDENTIFIER]) {
            let name = self.previous().clone();
            let id = self.fresh_id();
            return Ok(Expr::Variable { id, name });
        }

        if self.match_tokens(&[TokenType::LEFT_PAREN]) {
            let expr = self.expression()?;
            self.consume(TokenType::RIGHT_PAREN, "Expect ')' after expression.")?;
            return Ok(Expr::Grouping(Box::new(expr)));
        }

        Err(LoxError::parse(self.peek(), "Expect expression."))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Panic-mode recovery
    // ─────────────────────────────────────────────────────────────────────────

    /// Discard tokens until just past a ';' or until the next token begins a
    /// declaration or statement.
    fn synchronize(&mut self) {
        debug!("Synchronizing after parse error at line {}", self.peek().line);

        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::SEMICOLON {
                return;
            }

            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FUN
                | TokenType::VAR
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::PRINT
                | TokenType::RETURN => return,

                _ => {}
            }

            self.advance();
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Token cursor
    // ─────────────────────────────────────────────────────────────────────────

    fn match_tokens(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.check(token_type) {
                self.advance();
                return true;
            }
        }

        false
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> Result<&Token> {
        if self.check(&token_type) {
            return Ok(self.advance());
        }

        Err(LoxError::parse(self.peek(), message))
    }

    fn check(&self, token_type: &TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        &self.peek().token_type == token_type
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::EOF
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn fresh_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}
