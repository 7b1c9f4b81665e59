use serde::{Deserialize, Serialize};

pub mod source_map;
pub use source_map::SourceMap;

// ---- Positions ----

/// Byte range within source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// 1-based row/col of the token a node was built from. Runtime values and
/// diagnostics carry these, so they survive into bytecode constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pos {
    pub row: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(row: u32, col: u32) -> Self {
        Pos { row, col }
    }
}

// ---- Expressions ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    BitAnd,
    BitOr,
    ShiftLeft,
    ShiftRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
    Not,
    BitNot,
}

/// `++` or `--`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Number { value: f64, pos: Pos },
    String { value: String, pos: Pos },
    Bool { value: bool, pos: Pos },
    Null { pos: Pos },

    /// Variable reference
    Id { name: String, pos: Pos },

    /// `( expr )`
    Group { inner: Box<Expr>, pos: Pos },

    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        pos: Pos,
    },

    /// `&&` / `||`, which short-circuit.
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
        pos: Pos,
    },

    /// `name = value`
    Assign {
        name: String,
        target: Pos,
        value: Box<Expr>,
        pos: Pos,
    },

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        pos: Pos,
    },

    /// `++x` / `--x`, evaluating to the updated value.
    Prefix {
        op: StepOp,
        name: String,
        target: Pos,
        pos: Pos,
    },

    /// `x++` / `x--`, evaluating to the previous value.
    Postfix {
        op: StepOp,
        name: String,
        target: Pos,
        pos: Pos,
    },

    /// `cond ? then : otherwise`
    Ternary {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
        pos: Pos,
    },

    /// `a, b, c`, which evaluates to the last element.
    Sequence { items: Vec<Expr>, pos: Pos },

    /// `callee(args...)`. Callees are always plain names.
    Call {
        callee: String,
        target: Pos,
        args: Vec<Expr>,
        pos: Pos,
    },
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Number { pos, .. }
            | Expr::String { pos, .. }
            | Expr::Bool { pos, .. }
            | Expr::Null { pos }
            | Expr::Id { pos, .. }
            | Expr::Group { pos, .. }
            | Expr::Binary { pos, .. }
            | Expr::Logical { pos, .. }
            | Expr::Assign { pos, .. }
            | Expr::Unary { pos, .. }
            | Expr::Prefix { pos, .. }
            | Expr::Postfix { pos, .. }
            | Expr::Ternary { pos, .. }
            | Expr::Sequence { pos, .. }
            | Expr::Call { pos, .. } => *pos,
        }
    }
}

// ---- Statements ----

/// A parameter name and where it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// Expression evaluated for its effect; the value is discarded.
    Expression(Expr),

    Print { value: Expr, pos: Pos },

    /// `var name [= init];`
    Var {
        name: String,
        init: Option<Expr>,
        pos: Pos,
    },

    /// `function name(params) { body }`
    Function {
        name: String,
        params: Vec<Param>,
        body: Vec<Stmt>,
        pos: Pos,
    },

    If {
        condition: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
        pos: Pos,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
        pos: Pos,
    },

    /// `for (init; condition; step) body`, any clause may be missing.
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
        pos: Pos,
    },

    Block { body: Vec<Stmt>, pos: Pos },

    Return { value: Option<Expr>, pos: Pos },
    Break { pos: Pos },
    Continue { pos: Pos },
}

impl Stmt {
    pub fn pos(&self) -> Pos {
        match self {
            Stmt::Expression(expr) => expr.pos(),
            Stmt::Print { pos, .. }
            | Stmt::Var { pos, .. }
            | Stmt::Function { pos, .. }
            | Stmt::If { pos, .. }
            | Stmt::While { pos, .. }
            | Stmt::For { pos, .. }
            | Stmt::Block { pos, .. }
            | Stmt::Return { pos, .. }
            | Stmt::Break { pos }
            | Stmt::Continue { pos } => *pos,
        }
    }
}

/// A whole source file: the top-level statement list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Stmt>,
}
