//! Expression tokenizer and recursive-descent parser.
//!
//! Grammar, left-associative with the usual precedence:
//!
//! ```text
//! expression := term (('+' | '-') term)*
//! term       := factor (('*' | '/') factor)*
//! factor     := number | '(' expression ')'
//! ```
//!
//! There are no unary operators, no implicit multiplication and no
//! exponent operator. Numbers are parsed as `f64`.

use crate::core::Operation;
use crate::error::Result;
use thiserror::Error;

/// Why an expression could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("missing closing parenthesis")]
    MissingClosingParen,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("unexpected token: {0}")]
    UnexpectedToken(String),
}

/// A binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(BinaryOp::Add),
            '-' => Some(BinaryOp::Sub),
            '*' => Some(BinaryOp::Mul),
            '/' => Some(BinaryOp::Div),
            _ => None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
        }
    }

    /// The task operation that evaluates this operator.
    pub fn operation(&self) -> Operation {
        match self {
            BinaryOp::Add => Operation::Addition,
            BinaryOp::Sub => Operation::Subtraction,
            BinaryOp::Mul => Operation::Multiplication,
            BinaryOp::Div => Operation::Division,
        }
    }
}

/// Abstract syntax tree of an arithmetic expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Number(f64),
    Binary {
        op: BinaryOp,
        left: Box<Ast>,
        right: Box<Ast>,
    },
}

impl Ast {
    pub fn binary(op: BinaryOp, left: Ast, right: Ast) -> Self {
        Ast::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Evaluate the tree directly, without decomposition.
    pub fn evaluate(&self) -> Result<f64> {
        match self {
            Ast::Number(value) => Ok(*value),
            Ast::Binary { op, left, right } => {
                op.operation().apply(left.evaluate()?, right.evaluate()?)
            }
        }
    }

    /// Number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        match self {
            Ast::Number(_) => 1,
            Ast::Binary { left, right, .. } => 1 + left.node_count() + right.node_count(),
        }
    }
}

impl std::fmt::Display for Ast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ast::Number(value) => write!(f, "{}", value),
            Ast::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    Op(BinaryOp),
    LParen,
    RParen,
    /// Any other run of characters; a candidate number.
    Atom(&'a str),
}

impl std::fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Op(op) => write!(f, "{}", op.symbol()),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Atom(text) => write!(f, "{}", text),
        }
    }
}

fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut atom_start: Option<usize> = None;

    for (i, c) in input.char_indices() {
        let single = match c {
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            _ => BinaryOp::from_char(c).map(Token::Op),
        };

        if single.is_some() || c.is_whitespace() {
            if let Some(start) = atom_start.take() {
                tokens.push(Token::Atom(&input[start..i]));
            }
            tokens.extend(single);
        } else if atom_start.is_none() {
            atom_start = Some(i);
        }
    }

    if let Some(start) = atom_start {
        tokens.push(Token::Atom(&input[start..]));
    }
    tokens
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Consume the next token if it is one of `ops`.
    fn next_op(&mut self, ops: [BinaryOp; 2]) -> Option<BinaryOp> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(&op) => {
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn expression(&mut self) -> std::result::Result<Ast, ParseError> {
        let mut left = self.term()?;
        while let Some(op) = self.next_op([BinaryOp::Add, BinaryOp::Sub]) {
            let right = self.term()?;
            left = Ast::binary(op, left, right);
        }
        Ok(left)
    }

    fn term(&mut self) -> std::result::Result<Ast, ParseError> {
        let mut left = self.factor()?;
        while let Some(op) = self.next_op([BinaryOp::Mul, BinaryOp::Div]) {
            let right = self.factor()?;
            left = Ast::binary(op, left, right);
        }
        Ok(left)
    }

    fn factor(&mut self) -> std::result::Result<Ast, ParseError> {
        let token = self.next().ok_or(ParseError::UnexpectedEnd)?;

        if token == Token::LParen {
            let inner = self.expression()?;
            return match self.next() {
                Some(Token::RParen) => Ok(inner),
                _ => Err(ParseError::MissingClosingParen),
            };
        }

        match token {
            Token::Atom(text) => text
                .parse::<f64>()
                .map(Ast::Number)
                .map_err(|_| ParseError::InvalidToken(text.to_string())),
            other => Err(ParseError::InvalidToken(other.to_string())),
        }
    }
}

/// Parse an expression string into an AST.
///
/// # Errors
/// - `Empty` when the input has no tokens
/// - `UnexpectedEnd` when input runs out where a number or `(` is expected
/// - `MissingClosingParen` when a `(` is not closed
/// - `InvalidToken` when a token is not a number where one is expected
/// - `UnexpectedToken` when tokens remain after a complete expression
pub fn parse(input: &str) -> std::result::Result<Ast, ParseError> {
    let tokens = tokenize(input);
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut parser = Parser { tokens, pos: 0 };
    let ast = parser.expression()?;

    match parser.next() {
        None => Ok(ast),
        Some(token) => Err(ParseError::UnexpectedToken(token.to_string())),
    }
}
