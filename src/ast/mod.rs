use std::fmt;

use serde::{Deserialize, Serialize};

use crate::runtime::value::Unit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

// ── Operators ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignOp {
    #[serde(rename = "=")]
    Assign,
    #[serde(rename = "+=")]
    Add,
    #[serde(rename = "-=")]
    Subtract,
    #[serde(rename = "*=")]
    Multiply,
    #[serde(rename = "/=")]
    Divide,
}

impl AssignOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Subtract => "-=",
            AssignOp::Multiply => "*=",
            AssignOp::Divide => "/=",
        }
    }

    /// The arithmetic operator a compound assignment applies, if any.
    pub fn arithmetic(&self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Subtract => Some(BinaryOp::Sub),
            AssignOp::Multiply => Some(BinaryOp::Mul),
            AssignOp::Divide => Some(BinaryOp::Div),
        }
    }
}

impl fmt::Display for AssignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

// ── Expressions ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number {
        value: f64,
        loc: SourceLocation,
    },
    Weight {
        value: f64,
        unit: Unit,
        loc: SourceLocation,
    },
    Bool {
        value: bool,
        loc: SourceLocation,
    },
    Str {
        value: String,
        loc: SourceLocation,
    },
    /// Bare name, resolved against loop locals, state, then bindings.
    Identifier {
        name: String,
        loc: SourceLocation,
    },
    /// `state.name`, resolved against state only.
    StateVar {
        name: String,
        loc: SourceLocation,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
        loc: SourceLocation,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        loc: SourceLocation,
    },
    Ternary {
        condition: Box<Expr>,
        then_value: Box<Expr>,
        else_value: Box<Expr>,
        loc: SourceLocation,
    },
    Call {
        name: String,
        arguments: Vec<Expr>,
        loc: SourceLocation,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        loc: SourceLocation,
    },
}

impl Expr {
    pub fn loc(&self) -> SourceLocation {
        match self {
            Expr::Number { loc, .. }
            | Expr::Weight { loc, .. }
            | Expr::Bool { loc, .. }
            | Expr::Str { loc, .. }
            | Expr::Identifier { loc, .. }
            | Expr::StateVar { loc, .. }
            | Expr::Binary { loc, .. }
            | Expr::Unary { loc, .. }
            | Expr::Ternary { loc, .. }
            | Expr::Call { loc, .. }
            | Expr::Index { loc, .. } => *loc,
        }
    }
}

// ── Assignment targets ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum PathComponent {
    Index(Expr),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub name: String,
    /// Written as `state.name` rather than a bare name.
    pub qualified: bool,
    pub path: Vec<PathComponent>,
    pub loc: SourceLocation,
}

// ── Statements ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assignment {
        target: Target,
        op: AssignOp,
        value: Expr,
        loc: SourceLocation,
    },
    If {
        condition: Expr,
        then_body: Vec<Statement>,
        else_body: Vec<Statement>,
        loc: SourceLocation,
    },
    For {
        var: String,
        iterable: Expr,
        body: Vec<Statement>,
        loc: SourceLocation,
    },
}

impl Statement {
    pub fn loc(&self) -> SourceLocation {
        match self {
            Statement::Assignment { loc, .. } => *loc,
            Statement::If { loc, .. } => *loc,
            Statement::For { loc, .. } => *loc,
        }
    }
}
