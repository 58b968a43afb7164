use super::token_type::TokenType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Lowest,
    LogicalOr,   // ||
    LogicalAnd,  // &&
    Equals,      // ==, !=
    LessGreater, // <, >, <=, >=
    Sum,         // +, -
    Product,     // *, /, %
    Prefix,      // -x, !x
    Call,        // f(x)
    Index,       // array[index], object.member
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpInfo {
    pub token: TokenType,
    pub precedence: Precedence,
}

// Infix and postfix operators, all left-associative.
pub const OPERATOR_TABLE: &[OpInfo] = &[
    OpInfo {
        token: TokenType::Or,
        precedence: Precedence::LogicalOr,
    },
    OpInfo {
        token: TokenType::And,
        precedence: Precedence::LogicalAnd,
    },
    OpInfo {
        token: TokenType::Eq,
        precedence: Precedence::Equals,
    },
    OpInfo {
        token: TokenType::NotEq,
        precedence: Precedence::Equals,
    },
    OpInfo {
        token: TokenType::Lt,
        precedence: Precedence::LessGreater,
    },
    OpInfo {
        token: TokenType::Gt,
        precedence: Precedence::LessGreater,
    },
    OpInfo {
        token: TokenType::Lte,
        precedence: Precedence::LessGreater,
    },
    OpInfo {
        token: TokenType::Gte,
        precedence: Precedence::LessGreater,
    },
    OpInfo {
        token: TokenType::Plus,
        precedence: Precedence::Sum,
    },
    OpInfo {
        token: TokenType::Minus,
        precedence: Precedence::Sum,
    },
    OpInfo {
        token: TokenType::Asterisk,
        precedence: Precedence::Product,
    },
    OpInfo {
        token: TokenType::Slash,
        precedence: Precedence::Product,
    },
    OpInfo {
        token: TokenType::Percent,
        precedence: Precedence::Product,
    },
    OpInfo {
        token: TokenType::LParen,
        precedence: Precedence::Call,
    },
    OpInfo {
        token: TokenType::LBracket,
        precedence: Precedence::Index,
    },
    OpInfo {
        token: TokenType::Dot,
        precedence: Precedence::Index,
    },
];

pub fn token_precedence(token_type: &TokenType) -> Precedence {
    OPERATOR_TABLE
        .iter()
        .find(|op| op.token == *token_type)
        .map(|op| op.precedence)
        .unwrap_or(Precedence::Lowest)
}
