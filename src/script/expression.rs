use std::fmt;
use std::rc::Rc;

use super::statement::Block;

#[derive(Debug, Clone)]
pub enum Expression {
    Identifier(String),
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Nil,
    Prefix {
        operator: String,
        right: Box<Expression>,
    },
    Infix {
        left: Box<Expression>,
        operator: String,
        right: Box<Expression>,
    },
    If {
        condition: Box<Expression>,
        consequence: Block,
        alternative: Option<Block>,
    },
    Function {
        parameters: Rc<[String]>,
        body: Rc<Block>,
    },
    Call {
        function: Box<Expression>,
        arguments: Vec<Expression>,
    },
    Array {
        elements: Vec<Expression>,
    },
    Hash {
        pairs: Vec<(Expression, Expression)>,
    },
    Index {
        left: Box<Expression>,
        index: Box<Expression>,
    },
    Member {
        object: Box<Expression>,
        name: String,
    },
    MethodCall {
        object: Box<Expression>,
        name: String,
        arguments: Vec<Expression>,
    },
    /// Parenthesised, comma separated values: `(a, b)`.
    List {
        elements: Vec<Expression>,
    },
}

impl Expression {
    /// True for expressions that may appear on the left of `=`.
    pub fn is_place(&self) -> bool {
        matches!(
            self,
            Expression::Identifier(_) | Expression::Index { .. } | Expression::Member { .. }
        )
    }
}

fn join(items: &[Expression]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier(name) => write!(f, "{}", name),
            Expression::Integer(value) => write!(f, "{}", value),
            Expression::Float(value) => write!(f, "{}", value),
            Expression::String(value) => write!(f, "{:?}", value),
            Expression::Boolean(value) => write!(f, "{}", value),
            Expression::Nil => write!(f, "nil"),
            Expression::Prefix { operator, right } => write!(f, "({}{})", operator, right),
            Expression::Infix {
                left,
                operator,
                right,
            } => write!(f, "({} {} {})", left, operator, right),
            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                write!(f, "if {} {}", condition, consequence)?;
                if let Some(alt) = alternative {
                    write!(f, " else {}", alt)?;
                }
                Ok(())
            }
            Expression::Function { parameters, body } => {
                write!(f, "fun({}) {}", parameters.join(", "), body)
            }
            Expression::Call {
                function,
                arguments,
            } => write!(f, "{}({})", function, join(arguments)),
            Expression::Array { elements } => write!(f, "[{}]", join(elements)),
            Expression::Hash { pairs } => {
                let pairs = pairs
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{{{}}}", pairs)
            }
            Expression::Index { left, index } => write!(f, "({}[{}])", left, index),
            Expression::Member { object, name } => write!(f, "{}.{}", object, name),
            Expression::MethodCall {
                object,
                name,
                arguments,
            } => write!(f, "{}.{}({})", object, name, join(arguments)),
            Expression::List { elements } => write!(f, "({})", join(elements)),
        }
    }
}
