use std::fmt;

use super::expression::Expression;
use super::position::Position;

#[derive(Debug, Clone)]
pub enum Statement {
    Let {
        name: String,
        value: Expression,
        position: Position,
    },
    Assign {
        target: Expression,
        value: Expression,
        position: Position,
    },
    Return {
        value: Option<Expression>,
        position: Position,
    },
    While {
        condition: Expression,
        body: Block,
        position: Position,
    },
    Expression {
        expression: Expression,
        position: Position,
    },
}

impl Statement {
    pub fn position(&self) -> Position {
        match self {
            Statement::Let { position, .. }
            | Statement::Assign { position, .. }
            | Statement::Return { position, .. }
            | Statement::While { position, .. }
            | Statement::Expression { position, .. } => *position,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Let { name, value, .. } => write!(f, "let {} = {};", name, value),
            Statement::Assign { target, value, .. } => write!(f, "{} = {};", target, value),
            Statement::Return { value: Some(v), .. } => write!(f, "return {};", v),
            Statement::Return { value: None, .. } => write!(f, "return;"),
            Statement::While {
                condition, body, ..
            } => write!(f, "while {} {}", condition, body),
            Statement::Expression { expression, .. } => write!(f, "{}", expression),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub statements: Vec<Statement>,
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ ")?;
        for statement in &self.statements {
            write!(f, "{} ", statement)?;
        }
        write!(f, "}}")
    }
}
