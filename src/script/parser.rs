use std::rc::Rc;

use super::{
    diagnostic::Diagnostic,
    expression::Expression,
    lexer::Lexer,
    precedence::{Precedence, token_precedence},
    statement::{Block, Statement},
    token::Token,
    token_type::TokenType,
};

pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    peek_token: Token,
    pub errors: Vec<Diagnostic>,
}

impl Parser {
    pub fn new(lexer: Lexer) -> Self {
        let mut parser = Parser {
            lexer,
            current_token: Token::new(TokenType::Eof, "", 0, 0),
            peek_token: Token::new(TokenType::Eof, "", 0, 0),
            errors: Vec::new(),
        };
        parser.next_token();
        parser.next_token();
        parser
    }

    pub fn parse_program(&mut self) -> Block {
        let mut program = Block::default();

        while self.current_token.token_type != TokenType::Eof {
            match self.parse_statement() {
                Some(statement) => program.statements.push(statement),
                None => self.synchronize_after_error(),
            }
            self.next_token();
        }

        program
    }

    fn next_token(&mut self) {
        self.current_token = self.peek_token.clone();
        self.peek_token = self.lexer.next_token();
    }

    fn synchronize_after_error(&mut self) {
        while !matches!(
            self.current_token.token_type,
            TokenType::Semicolon | TokenType::Eof
        ) && !self.peek_is(TokenType::Eof)
        {
            self.next_token();
        }
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        match self.current_token.token_type {
            TokenType::Let => self.parse_let_statement(),
            TokenType::Return => self.parse_return_statement(),
            TokenType::While => self.parse_while_statement(),
            TokenType::Semicolon => {
                // Stray separator, treat as an empty statement
                Some(Statement::Expression {
                    expression: Expression::Nil,
                    position: self.current_token.position,
                })
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_expression_statement(&mut self) -> Option<Statement> {
        let position = self.current_token.position;
        let expression = self.parse_expression(Precedence::Lowest)?;

        if self.peek_is(TokenType::Assign) {
            if !expression.is_place() {
                self.errors.push(
                    Diagnostic::error(format!("cannot assign to {}", expression))
                        .with_position(self.peek_token.position)
                        .with_hint("Only names, indexes and members can be assigned."),
                );
                return None;
            }
            self.next_token();
            self.next_token();
            let value = self.parse_expression(Precedence::Lowest)?;
            self.skip_semicolon();
            return Some(Statement::Assign {
                target: expression,
                value,
                position,
            });
        }

        self.skip_semicolon();

        Some(Statement::Expression {
            expression,
            position,
        })
    }

    fn parse_return_statement(&mut self) -> Option<Statement> {
        let position = self.current_token.position;

        let value = if self.peek_is(TokenType::Semicolon)
            || self.peek_is(TokenType::RBrace)
            || self.peek_is(TokenType::Eof)
        {
            None
        } else {
            self.next_token();
            Some(self.parse_expression(Precedence::Lowest)?)
        };

        self.skip_semicolon();

        Some(Statement::Return { value, position })
    }

    fn parse_let_statement(&mut self) -> Option<Statement> {
        let position = self.current_token.position;

        if !self.expect_peek(TokenType::Ident) {
            return None;
        }

        let name = self.current_token.literal.clone();

        if !self.expect_peek(TokenType::Assign) {
            return None;
        }

        self.next_token();

        let value = self.parse_expression(Precedence::Lowest)?;

        self.skip_semicolon();

        Some(Statement::Let {
            name,
            value,
            position,
        })
    }

    fn parse_while_statement(&mut self) -> Option<Statement> {
        let position = self.current_token.position;
        self.next_token();
        let condition = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(TokenType::LBrace) {
            return None;
        }

        let body = self.parse_block()?;
        self.skip_semicolon();

        Some(Statement::While {
            condition,
            body,
            position,
        })
    }

    fn skip_semicolon(&mut self) {
        if self.peek_is(TokenType::Semicolon) {
            self.next_token();
        }
    }

    fn parse_expression(&mut self, precedence: Precedence) -> Option<Expression> {
        let mut left = self.parse_prefix()?;

        while !self.peek_is(TokenType::Semicolon) && precedence < self.peek_precedence() {
            self.next_token();
            left = self.parse_infix(left)?;
        }

        Some(left)
    }

    fn parse_prefix(&mut self) -> Option<Expression> {
        match &self.current_token.token_type {
            TokenType::Ident => Some(Expression::Identifier(self.current_token.literal.clone())),
            TokenType::Int => self.parse_integer(),
            TokenType::Float => self.parse_float(),
            TokenType::String => Some(Expression::String(self.current_token.literal.clone())),
            TokenType::True | TokenType::False => Some(Expression::Boolean(
                self.current_token.token_type == TokenType::True,
            )),
            TokenType::Nil => Some(Expression::Nil),
            TokenType::Bang | TokenType::Minus => self.parse_prefix_expression(),
            TokenType::LParen => self.parse_grouped_expression(),
            TokenType::LBracket => self.parse_array(),
            TokenType::LBrace => self.parse_hash(),
            TokenType::If => self.parse_if_expression(),
            TokenType::Fun => self.parse_function_literal(),
            TokenType::UnterminatedString => {
                self.errors.push(
                    Diagnostic::error("unterminated string literal")
                        .with_position(self.current_token.position)
                        .with_hint("Close the string with `\"` before the end of the line."),
                );
                None
            }
            _ => {
                self.no_prefix_parse_error();
                None
            }
        }
    }

    fn no_prefix_parse_error(&mut self) {
        self.errors.push(
            Diagnostic::error(format!(
                "unexpected {}",
                self.current_token.token_type
            ))
            .with_position(self.current_token.position)
            .with_message("expected an expression here"),
        );
    }

    fn parse_infix(&mut self, left: Expression) -> Option<Expression> {
        match self.current_token.token_type {
            TokenType::Plus
            | TokenType::Minus
            | TokenType::Asterisk
            | TokenType::Slash
            | TokenType::Percent
            | TokenType::Lt
            | TokenType::Gt
            | TokenType::Lte
            | TokenType::Gte
            | TokenType::Eq
            | TokenType::NotEq
            | TokenType::And
            | TokenType::Or => self.parse_infix_expression(left),
            TokenType::LParen => self.parse_call_expression(left),
            TokenType::LBracket => self.parse_index_expression(left),
            TokenType::Dot => self.parse_member_expression(left),
            _ => Some(left),
        }
    }

    fn parse_infix_expression(&mut self, left: Expression) -> Option<Expression> {
        let operator = self.current_token.literal.clone();
        let precedence = self.current_precedence();
        self.next_token();
        let right = self.parse_expression(precedence)?;
        Some(Expression::Infix {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        })
    }

    fn parse_call_expression(&mut self, function: Expression) -> Option<Expression> {
        let arguments = self.parse_expression_list(TokenType::RParen)?;
        Some(Expression::Call {
            function: Box::new(function),
            arguments,
        })
    }

    fn parse_index_expression(&mut self, left: Expression) -> Option<Expression> {
        self.next_token();
        let index = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(TokenType::RBracket) {
            return None;
        }

        Some(Expression::Index {
            left: Box::new(left),
            index: Box::new(index),
        })
    }

    fn parse_member_expression(&mut self, object: Expression) -> Option<Expression> {
        if !self.expect_peek(TokenType::Ident) {
            return None;
        }
        let name = self.current_token.literal.clone();

        if self.peek_is(TokenType::LParen) {
            self.next_token();
            let arguments = self.parse_expression_list(TokenType::RParen)?;
            return Some(Expression::MethodCall {
                object: Box::new(object),
                name,
                arguments,
            });
        }

        Some(Expression::Member {
            object: Box::new(object),
            name,
        })
    }

    fn parse_integer(&mut self) -> Option<Expression> {
        let literal = &self.current_token.literal;
        if let Ok(value) = literal.parse::<i64>() {
            return Some(Expression::Integer(value));
        }
        // Integers beyond i64 degrade to floats, as arithmetic overflow does
        match literal.parse::<f64>() {
            Ok(value) => Some(Expression::Float(value)),
            Err(_) => {
                self.errors.push(
                    Diagnostic::error(format!("could not parse {} as integer", literal))
                        .with_position(self.current_token.position),
                );
                None
            }
        }
    }

    fn parse_float(&mut self) -> Option<Expression> {
        match self.current_token.literal.parse::<f64>() {
            Ok(value) => Some(Expression::Float(value)),
            Err(_) => {
                self.errors.push(
                    Diagnostic::error(format!(
                        "could not parse {} as float",
                        self.current_token.literal
                    ))
                    .with_position(self.current_token.position),
                );
                None
            }
        }
    }

    fn parse_prefix_expression(&mut self) -> Option<Expression> {
        let operator = self.current_token.literal.clone();
        self.next_token();
        let right = self.parse_expression(Precedence::Prefix)?;
        Some(Expression::Prefix {
            operator,
            right: Box::new(right),
        })
    }

    /// `(expr)` groups, `()` and `(a, b, ..)` build a value list.
    fn parse_grouped_expression(&mut self) -> Option<Expression> {
        if self.peek_is(TokenType::RParen) {
            self.next_token();
            return Some(Expression::List {
                elements: Vec::new(),
            });
        }

        self.next_token();
        let first = self.parse_expression(Precedence::Lowest)?;

        if !self.peek_is(TokenType::Comma) {
            if !self.expect_peek(TokenType::RParen) {
                return None;
            }
            return Some(first);
        }

        let mut elements = vec![first];
        while self.peek_is(TokenType::Comma) {
            self.next_token();
            if self.peek_is(TokenType::RParen) {
                break;
            }
            self.next_token();
            elements.push(self.parse_expression(Precedence::Lowest)?);
        }

        if !self.expect_peek(TokenType::RParen) {
            return None;
        }

        Some(Expression::List { elements })
    }

    fn parse_array(&mut self) -> Option<Expression> {
        let elements = self.parse_expression_list(TokenType::RBracket)?;
        Some(Expression::Array { elements })
    }

    fn parse_hash(&mut self) -> Option<Expression> {
        let mut pairs = Vec::new();

        while !self.peek_is(TokenType::RBrace) {
            self.next_token();
            let key = self.parse_expression(Precedence::Lowest)?;

            if !self.expect_peek(TokenType::Colon) {
                return None;
            }

            self.next_token();

            let value = self.parse_expression(Precedence::Lowest)?;

            pairs.push((key, value));

            if !self.peek_is(TokenType::RBrace) && !self.expect_peek(TokenType::Comma) {
                return None;
            }
        }

        if !self.expect_peek(TokenType::RBrace) {
            return None;
        }

        Some(Expression::Hash { pairs })
    }

    fn parse_if_expression(&mut self) -> Option<Expression> {
        self.next_token();
        let condition = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(TokenType::LBrace) {
            return None;
        }

        let consequence = self.parse_block()?;

        let alternative = if self.peek_is(TokenType::Else) {
            self.next_token();

            if self.peek_is(TokenType::If) {
                // `else if` chains nest as a single-expression block
                self.next_token();
                let position = self.current_token.position;
                let nested = self.parse_if_expression()?;
                Some(Block {
                    statements: vec![Statement::Expression {
                        expression: nested,
                        position,
                    }],
                })
            } else {
                if !self.expect_peek(TokenType::LBrace) {
                    return None;
                }
                Some(self.parse_block()?)
            }
        } else {
            None
        };

        Some(Expression::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        })
    }

    fn parse_function_literal(&mut self) -> Option<Expression> {
        if !self.expect_peek(TokenType::LParen) {
            return None;
        }

        let parameters = self.parse_function_parameters()?;

        if !self.expect_peek(TokenType::LBrace) {
            return None;
        }

        let body = self.parse_block()?;
        Some(Expression::Function {
            parameters: parameters.into(),
            body: Rc::new(body),
        })
    }

    fn parse_function_parameters(&mut self) -> Option<Vec<String>> {
        self.parse_delimited(TokenType::RParen, |parser| {
            if parser.current_is(TokenType::Ident) {
                return Some(parser.current_token.literal.clone());
            }
            parser.token_error(TokenType::Ident, parser.current_token.clone());
            None
        })
    }

    /// Entry: current token is `{`. Exit: current token is the matching `}`.
    fn parse_block(&mut self) -> Option<Block> {
        let mut statements = Vec::new();
        self.next_token();

        while !self.current_is(TokenType::RBrace) {
            if self.current_is(TokenType::Eof) {
                self.errors.push(
                    Diagnostic::error("expected }, got EOF")
                        .with_position(self.current_token.position)
                        .with_message("unclosed block"),
                );
                return None;
            }
            statements.push(self.parse_statement()?);
            self.next_token();
        }

        Some(Block { statements })
    }

    fn parse_expression_list(&mut self, end: TokenType) -> Option<Vec<Expression>> {
        self.parse_delimited(end, |parser| parser.parse_expression(Precedence::Lowest))
    }

    /// Comma separated items up to `end`, which becomes the current token.
    /// A trailing comma is allowed.
    fn parse_delimited<T>(
        &mut self,
        end: TokenType,
        mut item: impl FnMut(&mut Self) -> Option<T>,
    ) -> Option<Vec<T>> {
        let mut items = Vec::new();
        while !self.peek_is(end) {
            self.next_token();
            items.push(item(self)?);
            if !self.peek_is(TokenType::Comma) {
                break;
            }
            self.next_token();
        }

        if !self.expect_peek(end) {
            return None;
        }
        Some(items)
    }

    fn current_is(&self, token_type: TokenType) -> bool {
        self.current_token.is(token_type)
    }

    fn peek_is(&self, token_type: TokenType) -> bool {
        self.peek_token.is(token_type)
    }

    fn expect_peek(&mut self, token_type: TokenType) -> bool {
        if self.peek_is(token_type) {
            self.next_token();
            true
        } else {
            self.peek_error(token_type);
            false
        }
    }

    fn current_precedence(&self) -> Precedence {
        token_precedence(&self.current_token.token_type)
    }

    fn peek_precedence(&self) -> Precedence {
        token_precedence(&self.peek_token.token_type)
    }

    fn peek_error(&mut self, expected: TokenType) {
        self.token_error(expected, self.peek_token.clone());
    }

    fn token_error(&mut self, expected: TokenType, found: Token) {
        let mut diag = Diagnostic::error(format!("expected {}, got {}", expected, found.token_type))
            .with_position(found.position)
            .with_message("unexpected token");
        if expected == TokenType::Ident && found.token_type.is_keyword() {
            diag = diag.with_hint(format!("`{}` is a reserved word.", found.literal));
        }
        self.errors.push(diag);
    }
}

/// Parses `source`, returning the program or the collected diagnostics.
pub fn parse(source: &str) -> Result<Block, Vec<Diagnostic>> {
    let mut parser = Parser::new(Lexer::new(source));
    let program = parser.parse_program();
    if parser.errors.is_empty() {
        Ok(program)
    } else {
        Err(parser.errors)
    }
}
