//! Flat AST types using arena allocation.
//!
//! Statements and expressions live in one [`AstArena`] per [`Program`] and
//! refer to their children by `StmtId` / `ExprId`. Every type carries
//! `Clone + Eq + Hash + Debug` so subtrees can be compared and hashed
//! structurally by the analysis memo cache.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Source position reported by the external parser (1-based).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

impl Pos {
    pub const fn new(line: u32, column: u32) -> Self {
        Pos { line, column }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create a new ID from a raw arena index.
            #[inline]
            pub const fn new(index: u32) -> Self {
                $name(index)
            }

            /// Get the index into the arena.
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            /// Get the raw u32 value.
            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl Hash for $name {
            #[inline]
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.0.hash(state);
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

define_id!(
    /// Index of a statement in the program arena.
    StmtId
);
define_id!(
    /// Index of an expression in the program arena.
    ExprId
);

/// Binary operators of the pseudocode language.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Mod,
    Pow,

    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Logical
    And,
    Or,
}

impl BinaryOp {
    /// Parse an operator spelling used by the external parser.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" | "·" | "×" => Self::Mul,
            "/" => Self::Div,
            "div" | "//" => Self::IntDiv,
            "mod" | "%" => Self::Mod,
            "^" | "**" => Self::Pow,
            "=" | "==" => Self::Eq,
            "!=" | "<>" | "≠" => Self::NotEq,
            "<" => Self::Lt,
            "<=" | "≤" => Self::LtEq,
            ">" => Self::Gt,
            ">=" | "≥" => Self::GtEq,
            "and" | "&&" | "AND" => Self::And,
            "or" | "||" | "OR" => Self::Or,
            _ => return None,
        })
    }

    /// Pseudocode spelling used when rendering predicates.
    pub const fn as_symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::IntDiv => "div",
            Self::Mod => "mod",
            Self::Pow => "^",
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "and",
            Self::Or => "or",
        }
    }

    /// Binding strength; higher binds tighter.
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq => 3,
            Self::Add | Self::Sub => 4,
            Self::Mul | Self::Div | Self::IntDiv | Self::Mod => 5,
            Self::Pow => 6,
        }
    }

    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq
        )
    }

    /// The comparison that holds exactly when `self` does not.
    pub const fn negated(self) -> Option<Self> {
        Some(match self {
            Self::Eq => Self::NotEq,
            Self::NotEq => Self::Eq,
            Self::Lt => Self::GtEq,
            Self::LtEq => Self::Gt,
            Self::Gt => Self::LtEq,
            Self::GtEq => Self::Lt,
            _ => return None,
        })
    }

    /// The comparison with operands swapped (`a < b` is `b > a`).
    pub const fn flipped(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::LtEq => Self::GtEq,
            Self::Gt => Self::Lt,
            Self::GtEq => Self::LtEq,
            other => other,
        }
    }
}

/// Literal values. Floats are stored as bits so the node stays `Hash`.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum Literal {
    Int(i64),
    Float(u64),
    Bool(bool),
    Str(String),
}

impl Literal {
    pub fn float(value: f64) -> Self {
        Literal::Float(value.to_bits())
    }
}

/// Expression node.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Option<Pos>,
}

/// Expression kinds.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum ExprKind {
    Ident(String),
    Literal(Literal),
    Binary {
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
    },
    Index {
        target: ExprId,
        index: ExprId,
    },
    Call {
        name: String,
        args: Vec<ExprId>,
    },
    /// Placeholder for a node the adapter rejected.
    Invalid,
}

/// Statement node.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Option<Pos>,
}

/// Statement kinds.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum StmtKind {
    Assign {
        target: ExprId,
        value: ExprId,
    },
    If {
        test: ExprId,
        consequent: StmtId,
        alternate: Option<StmtId>,
    },
    For {
        var: String,
        start: ExprId,
        end: ExprId,
        step: Option<ExprId>,
        downto: bool,
        body: StmtId,
    },
    While {
        test: ExprId,
        body: StmtId,
    },
    /// `repeat body until test`
    Repeat {
        body: StmtId,
        test: ExprId,
    },
    Call {
        name: String,
        args: Vec<ExprId>,
    },
    Return {
        value: Option<ExprId>,
    },
    Block {
        stmts: Vec<StmtId>,
    },
    /// Placeholder for a node the adapter rejected.
    Invalid,
}

impl StmtKind {
    /// Node-type name as used by the external parser.
    pub const fn name(&self) -> &'static str {
        match self {
            StmtKind::Assign { .. } => "Assign",
            StmtKind::If { .. } => "If",
            StmtKind::For { .. } => "For",
            StmtKind::While { .. } => "While",
            StmtKind::Repeat { .. } => "Repeat",
            StmtKind::Call { .. } => "Call",
            StmtKind::Return { .. } => "Return",
            StmtKind::Block { .. } => "Block",
            StmtKind::Invalid => "Invalid",
        }
    }
}

/// Arena holding every node of one program.
#[derive(Clone, Default, Debug)]
pub struct AstArena {
    stmts: Vec<Stmt>,
    exprs: Vec<Expr>,
}

impl AstArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a statement and return its ID.
    pub fn alloc_stmt(&mut self, kind: StmtKind, pos: Option<Pos>) -> StmtId {
        let id = StmtId::new(index_u32(self.stmts.len()));
        self.stmts.push(Stmt { kind, pos });
        id
    }

    /// Allocate an expression and return its ID.
    pub fn alloc_expr(&mut self, kind: ExprKind, pos: Option<Pos>) -> ExprId {
        let id = ExprId::new(index_u32(self.exprs.len()));
        self.exprs.push(Expr { kind, pos });
        id
    }

    #[inline]
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    #[inline]
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "ASTs never approach u32::MAX nodes"
)]
fn index_u32(len: usize) -> u32 {
    len as u32
}

/// Procedure definition.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ProcDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: StmtId,
    pub pos: Option<Pos>,
}

/// A whole translated program: procedures plus optional top-level code.
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub arena: AstArena,
    pub procs: Vec<ProcDef>,
    /// Top-level statements outside any procedure, collected into a block.
    pub main: Option<StmtId>,
    /// Stand-in line per statement index for statements without a
    /// position; `0` where the parser gave one.
    pub(crate) ordinals: Vec<u32>,
}

impl Program {
    #[inline]
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        self.arena.stmt(id)
    }

    #[inline]
    pub fn expr(&self, id: ExprId) -> &Expr {
        self.arena.expr(id)
    }

    /// Look up a procedure by name.
    pub fn proc_named(&self, name: &str) -> Option<&ProcDef> {
        self.procs.iter().find(|p| p.name == name)
    }

    /// Source line of a statement.
    ///
    /// Statements without a position get a stand-in after the last real
    /// line, numbered in visiting order by [`Program::number_unplaced`].
    /// Before numbering they report `0`.
    pub fn line_of(&self, id: StmtId) -> u32 {
        match self.stmt(id).pos {
            Some(pos) => pos.line,
            None => self.ordinals.get(id.index()).copied().unwrap_or(0),
        }
    }

    /// Give every positionless statement other than a block its own
    /// stand-in line, so distinct statements never share a cost unit.
    pub fn number_unplaced(&mut self) {
        let stmt_count = self.arena.stmt_count();
        let mut last_line = (0..stmt_count)
            .filter_map(|i| self.arena.stmt(StmtId::new(index_u32(i))).pos)
            .map(|p| p.line)
            .max()
            .unwrap_or(0);
        let mut ordinals = vec![0; stmt_count];
        let program: &Program = self;
        let roots = program.procs.iter().map(|p| p.body).chain(program.main);
        for root in roots {
            crate::walk::for_each_stmt(program, root, &mut |id| {
                let stmt = program.stmt(id);
                if stmt.pos.is_none()
                    && !matches!(stmt.kind, StmtKind::Block { .. })
                    && ordinals[id.index()] == 0
                {
                    last_line += 1;
                    ordinals[id.index()] = last_line;
                }
            });
        }
        self.ordinals = ordinals;
    }
}

#[cfg(test)]
mod tests;
