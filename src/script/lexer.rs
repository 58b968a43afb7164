use super::position::Position;
use super::token::Token;
use super::token_type::{TokenType, lookup_ident};

/// Non-fatal problem found while lexing, such as an unknown escape.
#[derive(Debug, Clone)]
pub struct LexerWarning {
    pub message: String,
    pub position: Position,
}

/// Lexer for the embedded Flux dialect.
///
/// Lines start at 1 and columns at 0. Comments run from `//` to the end of
/// the line.
#[derive(Debug, Clone)]
pub struct Lexer {
    chars: Vec<char>,
    offset: usize,
    ch: Option<char>,
    line: usize,
    column: usize,
    warnings: Vec<LexerWarning>,
}

fn two_char_operator(first: char, second: char) -> Option<TokenType> {
    let token_type = match (first, second) {
        ('=', '=') => TokenType::Eq,
        ('!', '=') => TokenType::NotEq,
        ('<', '=') => TokenType::Lte,
        ('>', '=') => TokenType::Gte,
        ('&', '&') => TokenType::And,
        ('|', '|') => TokenType::Or,
        _ => return None,
    };
    Some(token_type)
}

fn one_char_token(ch: char) -> Option<TokenType> {
    let token_type = match ch {
        '=' => TokenType::Assign,
        '!' => TokenType::Bang,
        '+' => TokenType::Plus,
        '-' => TokenType::Minus,
        '*' => TokenType::Asterisk,
        '/' => TokenType::Slash,
        '%' => TokenType::Percent,
        '<' => TokenType::Lt,
        '>' => TokenType::Gt,
        '(' => TokenType::LParen,
        ')' => TokenType::RParen,
        '{' => TokenType::LBrace,
        '}' => TokenType::RBrace,
        '[' => TokenType::LBracket,
        ']' => TokenType::RBracket,
        ',' => TokenType::Comma,
        ';' => TokenType::Semicolon,
        ':' => TokenType::Colon,
        '.' => TokenType::Dot,
        _ => return None,
    };
    Some(token_type)
}

impl Lexer {
    pub fn new(input: impl Into<String>) -> Self {
        let chars: Vec<char> = input.into().chars().collect();
        let ch = chars.first().copied();
        Self {
            chars,
            offset: 0,
            ch,
            line: 1,
            column: 0,
            warnings: Vec::new(),
        }
    }

    pub fn warnings(&self) -> &[LexerWarning] {
        &self.warnings
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_ignorable();

        let (line, col) = (self.line, self.column);
        let Some(ch) = self.ch else {
            return Token::new(TokenType::Eof, "", line, col);
        };

        if ch == '"' {
            return self.read_string(line, col);
        }
        if is_letter(ch) {
            let ident = self.take_while(|c| is_letter(c) || c.is_ascii_digit());
            return Token::new(lookup_ident(&ident), ident, line, col);
        }
        if ch.is_ascii_digit() {
            let (literal, is_float) = self.read_number();
            let token_type = if is_float { TokenType::Float } else { TokenType::Int };
            return Token::new(token_type, literal, line, col);
        }

        let token_type = match self.peek().and_then(|next| two_char_operator(ch, next)) {
            Some(token_type) => {
                self.advance();
                Some(token_type)
            }
            None => one_char_token(ch),
        };
        self.advance();

        match token_type {
            Some(token_type) => Token::new(token_type, token_type.to_string(), line, col),
            None => Token::new(TokenType::Illegal, ch.to_string(), line, col),
        }
    }

    /// Every token up to and including `Eof`.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.is(TokenType::Eof);
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    fn advance(&mut self) {
        match self.ch {
            Some('\n') => {
                self.line += 1;
                self.column = 0;
            }
            Some(_) => self.column += 1,
            None => return,
        }
        self.offset += 1;
        self.ch = self.chars.get(self.offset).copied();
    }

    fn peek(&self) -> Option<char> {
        self.peek_at(1)
    }

    fn peek_at(&self, distance: usize) -> Option<char> {
        self.chars.get(self.offset + distance).copied()
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let start = self.offset;
        while self.ch.is_some_and(&keep) {
            self.advance();
        }
        self.chars[start..self.offset].iter().collect()
    }

    fn skip_ignorable(&mut self) {
        loop {
            self.take_while(char::is_whitespace);
            if self.ch == Some('/') && self.peek() == Some('/') {
                self.take_while(|c| c != '\n');
                continue;
            }
            return;
        }
    }

    /// Digits with an optional fraction and exponent. `7.x` stays an
    /// integer followed by a member access.
    fn read_number(&mut self) -> (String, bool) {
        let start = self.offset;
        let mut is_float = false;

        self.take_while(|c| c.is_ascii_digit());
        if self.ch == Some('.') && self.peek().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            self.take_while(|c| c.is_ascii_digit());
        }
        if matches!(self.ch, Some('e' | 'E')) && self.exponent_follows() {
            is_float = true;
            self.advance();
            if matches!(self.ch, Some('+' | '-')) {
                self.advance();
            }
            self.take_while(|c| c.is_ascii_digit());
        }

        (self.chars[start..self.offset].iter().collect(), is_float)
    }

    fn exponent_follows(&self) -> bool {
        match self.peek() {
            Some('+' | '-') => self.peek_at(2).is_some_and(|c| c.is_ascii_digit()),
            Some(c) => c.is_ascii_digit(),
            None => false,
        }
    }

    /// Strings end at the closing quote or, unterminated, at the line end.
    fn read_string(&mut self, line: usize, col: usize) -> Token {
        self.advance();
        let mut text = String::new();

        loop {
            match self.ch {
                None | Some('\n' | '\r') => break,
                Some('"') => {
                    self.advance();
                    return Token::new(TokenType::String, text, line, col);
                }
                Some('\\') => {
                    self.advance();
                    match self.read_escape() {
                        Some(escaped) => text.push(escaped),
                        None => break,
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }

        Token::new(TokenType::UnterminatedString, text, line, col)
    }

    fn read_escape(&mut self) -> Option<char> {
        let c = self.ch?;
        let escaped = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            '\\' | '"' => c,
            _ => {
                self.warnings.push(LexerWarning {
                    message: format!(
                        "Unknown escape sequence '\\{}'. Valid escapes are: \\n \\t \\r \\0 \\\\ \\\"",
                        c
                    ),
                    position: Position::new(self.line, self.column),
                });
                c
            }
        };
        self.advance();
        Some(escaped)
    }
}

fn is_letter(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}
