use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Illegal,
    Eof,

    Ident,
    Int,
    Float,
    String,
    UnterminatedString,

    Plus,
    Minus,
    Asterisk,
    Slash,
    Percent,
    Lt,
    Gt,
    Lte,
    Gte,
    Eq,
    NotEq,
    Bang,
    And,
    Or,
    Assign,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,

    Fun,
    Let,
    If,
    Else,
    Return,
    While,
    True,
    False,
    Nil,
}

const KEYWORDS: [(&str, TokenType); 9] = [
    ("fun", TokenType::Fun),
    ("let", TokenType::Let),
    ("if", TokenType::If),
    ("else", TokenType::Else),
    ("return", TokenType::Return),
    ("while", TokenType::While),
    ("true", TokenType::True),
    ("false", TokenType::False),
    ("nil", TokenType::Nil),
];

pub fn lookup_ident(ident: &str) -> TokenType {
    KEYWORDS
        .iter()
        .find(|(word, _)| *word == ident)
        .map_or(TokenType::Ident, |(_, token_type)| *token_type)
}

impl TokenType {
    pub fn is_keyword(self) -> bool {
        KEYWORDS.iter().any(|(_, token_type)| *token_type == self)
    }

    /// Source text of operators and delimiters.
    fn symbol(self) -> Option<&'static str> {
        let s = match self {
            TokenType::Plus => "+",
            TokenType::Minus => "-",
            TokenType::Asterisk => "*",
            TokenType::Slash => "/",
            TokenType::Percent => "%",
            TokenType::Lt => "<",
            TokenType::Gt => ">",
            TokenType::Lte => "<=",
            TokenType::Gte => ">=",
            TokenType::Eq => "==",
            TokenType::NotEq => "!=",
            TokenType::Bang => "!",
            TokenType::And => "&&",
            TokenType::Or => "||",
            TokenType::Assign => "=",
            TokenType::LParen => "(",
            TokenType::RParen => ")",
            TokenType::LBrace => "{",
            TokenType::RBrace => "}",
            TokenType::LBracket => "[",
            TokenType::RBracket => "]",
            TokenType::Comma => ",",
            TokenType::Semicolon => ";",
            TokenType::Colon => ":",
            TokenType::Dot => ".",
            _ => return None,
        };
        Some(s)
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(symbol) = self.symbol() {
            return f.write_str(symbol);
        }
        if let Some((word, _)) = KEYWORDS.iter().find(|(_, token_type)| token_type == self) {
            return f.write_str(&word.to_ascii_uppercase());
        }
        let name = match self {
            TokenType::Illegal => "ILLEGAL",
            TokenType::Eof => "EOF",
            TokenType::Ident => "IDENT",
            TokenType::Int => "INT",
            TokenType::Float => "FLOAT",
            TokenType::String => "STRING",
            _ => "UNTERMINATED_STRING",
        };
        f.write_str(name)
    }
}
