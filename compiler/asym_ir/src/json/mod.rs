//! Loose JSON → strict AST adapter.
//!
//! The external parser hands over dictionaries of the shape
//! `{"type": "For", "var": "i", "start": {...}, "end": {...}, "body": {...},
//! "pos": {"line": 2, "column": 1}}`. This is the only place that shape is
//! inspected. Everything it cannot make sense of is reported as an
//! [`AstError`] and replaced by an `Invalid` node, so one malformed subtree
//! never prevents its siblings from being analyzed.

use std::fmt;

use serde_json::{Map, Value};

use crate::ast::{AstArena, BinaryOp, ExprId, ExprKind, Literal, Pos, ProcDef, Program, StmtId, StmtKind};

/// What went wrong while translating a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AstErrorKind {
    /// `type` names a node kind outside the fixed vocabulary.
    UnknownNode { found: String },
    /// A node without a `type` string (or not an object at all).
    Untyped,
    /// A required field is absent.
    MissingField { node: String, field: &'static str },
    /// A field is present but has the wrong shape.
    InvalidField {
        node: String,
        field: &'static str,
        expected: &'static str,
    },
    /// An operator spelling we do not know.
    UnknownOperator { op: String },
}

/// A localized structural error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AstError {
    pub kind: AstErrorKind,
    pub pos: Option<Pos>,
}

impl fmt::Display for AstErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AstErrorKind::UnknownNode { found } => write!(f, "unrecognized node type `{found}`"),
            AstErrorKind::Untyped => write!(f, "node has no `type` field"),
            AstErrorKind::MissingField { node, field } => {
                write!(f, "`{node}` node is missing required field `{field}`")
            }
            AstErrorKind::InvalidField {
                node,
                field,
                expected,
            } => write!(f, "field `{field}` of `{node}` node must be {expected}"),
            AstErrorKind::UnknownOperator { op } => write!(f, "unknown operator `{op}`"),
        }
    }
}

impl fmt::Display for AstError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(pos) = self.pos {
            write!(f, " at {pos}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AstError {}

/// Output of the adapter: the program plus every structural error found.
#[derive(Debug)]
pub struct Lowered {
    pub program: Program,
    pub errors: Vec<AstError>,
}

impl Lowered {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Translate the external parser's JSON into a [`Program`].
///
/// The root may be a `Program` node, a single `ProcDef`, a single
/// statement, or a bare array of any of those.
pub fn program_from_json(root: &Value) -> Lowered {
    let mut adapter = Adapter::default();
    let mut procs = Vec::new();
    let mut main = Vec::new();

    let items: Vec<&Value> = match root {
        Value::Array(items) => items.iter().collect(),
        Value::Object(obj) if node_type(root) == Some("Program") => {
            match obj.get("body").or_else(|| obj.get("statements")) {
                Some(Value::Array(items)) => items.iter().collect(),
                Some(_) => {
                    adapter.invalid_field(root, "Program", "body", "an array");
                    Vec::new()
                }
                None => {
                    adapter.missing(root, "Program", "body");
                    Vec::new()
                }
            }
        }
        other => vec![other],
    };

    for item in items {
        if node_type(item) == Some("ProcDef") {
            procs.push(adapter.lower_proc(item));
        } else {
            main.push(adapter.lower_stmt(item));
        }
    }

    let main = if main.is_empty() {
        None
    } else {
        Some(adapter.arena.alloc_stmt(StmtKind::Block { stmts: main }, None))
    };

    let mut program = Program {
        arena: adapter.arena,
        procs,
        main,
        ordinals: Vec::new(),
    };
    program.number_unplaced();
    Lowered {
        program,
        errors: adapter.errors,
    }
}

fn node_type(value: &Value) -> Option<&str> {
    value.get("type").and_then(Value::as_str)
}

fn pos_of(value: &Value) -> Option<Pos> {
    let pos = value.get("pos")?;
    let line = u32::try_from(pos.get("line")?.as_u64()?).ok()?;
    let column = pos
        .get("column")
        .and_then(Value::as_u64)
        .and_then(|c| u32::try_from(c).ok())
        .unwrap_or(0);
    Some(Pos::new(line, column))
}

#[derive(Default)]
struct Adapter {
    arena: AstArena,
    errors: Vec<AstError>,
}

impl Adapter {
    fn error(&mut self, kind: AstErrorKind, at: &Value) {
        self.errors.push(AstError {
            kind,
            pos: pos_of(at),
        });
    }

    fn missing(&mut self, at: &Value, node: &str, field: &'static str) {
        self.error(
            AstErrorKind::MissingField {
                node: node.to_owned(),
                field,
            },
            at,
        );
    }

    fn invalid_field(&mut self, at: &Value, node: &str, field: &'static str, expected: &'static str) {
        self.error(
            AstErrorKind::InvalidField {
                node: node.to_owned(),
                field,
                expected,
            },
            at,
        );
    }

    fn invalid_stmt(&mut self, at: &Value) -> StmtId {
        self.arena.alloc_stmt(StmtKind::Invalid, pos_of(at))
    }

    fn invalid_expr(&mut self, at: &Value) -> ExprId {
        self.arena.alloc_expr(ExprKind::Invalid, pos_of(at))
    }

    // Procedures

    fn lower_proc(&mut self, value: &Value) -> ProcDef {
        let name = self.name_field(value, "ProcDef", "name");
        let mut params = Vec::new();
        match value.get("params") {
            Some(Value::Array(items)) => {
                for item in items {
                    match ident_name(item) {
                        Some(p) => params.push(p.to_owned()),
                        None => self.invalid_field(item, "ProcDef", "params", "identifiers"),
                    }
                }
            }
            Some(Value::Null) | None => {}
            Some(_) => self.invalid_field(value, "ProcDef", "params", "an array"),
        }
        let body = self.stmt_field(value, "ProcDef", "body");
        ProcDef {
            name,
            params,
            body,
            pos: pos_of(value),
        }
    }

    // Statements

    fn lower_stmt(&mut self, value: &Value) -> StmtId {
        if let Value::Array(items) = value {
            let stmts = items.iter().map(|item| self.lower_stmt(item)).collect();
            return self.arena.alloc_stmt(StmtKind::Block { stmts }, None);
        }
        let Some(ty) = node_type(value) else {
            self.error(AstErrorKind::Untyped, value);
            return self.invalid_stmt(value);
        };
        let pos = pos_of(value);
        let kind = match ty {
            "Assign" => StmtKind::Assign {
                target: self.expr_field(value, ty, "target"),
                value: self.expr_field(value, ty, "value"),
            },
            "If" => StmtKind::If {
                test: self.expr_field(value, ty, "test"),
                consequent: self.stmt_field(value, ty, "consequent"),
                alternate: self.optional_stmt_field(value, "alternate"),
            },
            "For" => StmtKind::For {
                var: self.name_field(value, ty, "var"),
                start: self.expr_field(value, ty, "start"),
                end: self.expr_field(value, ty, "end"),
                step: self.optional_expr_field(value, "step"),
                downto: value
                    .get("downto")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                body: self.stmt_field(value, ty, "body"),
            },
            "While" => StmtKind::While {
                test: self.expr_field(value, ty, "test"),
                body: self.stmt_field(value, ty, "body"),
            },
            "Repeat" => StmtKind::Repeat {
                body: self.stmt_field(value, ty, "body"),
                test: self.expr_field(value, ty, "test"),
            },
            "Call" => StmtKind::Call {
                name: self.name_field(value, ty, "name"),
                args: self.args_field(value, ty),
            },
            "Return" => StmtKind::Return {
                value: self.optional_expr_field(value, "value"),
            },
            "Block" => {
                let stmts = match value.get("body").or_else(|| value.get("statements")) {
                    Some(Value::Array(items)) => {
                        items.iter().map(|item| self.lower_stmt(item)).collect()
                    }
                    Some(_) => {
                        self.invalid_field(value, ty, "body", "an array");
                        Vec::new()
                    }
                    None => {
                        self.missing(value, ty, "body");
                        Vec::new()
                    }
                };
                StmtKind::Block { stmts }
            }
            other => {
                self.error(
                    AstErrorKind::UnknownNode {
                        found: other.to_owned(),
                    },
                    value,
                );
                StmtKind::Invalid
            }
        };
        self.arena.alloc_stmt(kind, pos)
    }

    fn stmt_field(&mut self, value: &Value, node: &str, field: &'static str) -> StmtId {
        match value.get(field) {
            Some(Value::Null) | None => {
                self.missing(value, node, field);
                self.invalid_stmt(value)
            }
            Some(child) => self.lower_stmt(child),
        }
    }

    fn optional_stmt_field(&mut self, value: &Value, field: &'static str) -> Option<StmtId> {
        match value.get(field) {
            Some(Value::Null) | None => None,
            Some(child) => Some(self.lower_stmt(child)),
        }
    }

    // Expressions

    fn lower_expr(&mut self, value: &Value) -> ExprId {
        let pos = pos_of(value);
        let kind = match value {
            Value::Number(num) => ExprKind::Literal(number_literal(num)),
            Value::Bool(b) => ExprKind::Literal(Literal::Bool(*b)),
            Value::String(name) => ExprKind::Ident(name.clone()),
            Value::Object(obj) => match node_type(value) {
                Some("Identifier" | "Ident") => match obj.get("name").and_then(Value::as_str) {
                    Some(name) => ExprKind::Ident(name.to_owned()),
                    None => {
                        self.missing(value, "Identifier", "name");
                        ExprKind::Invalid
                    }
                },
                Some("Literal" | "number" | "Number") => self.lower_literal(value, obj),
                Some("Binary") => self.lower_binary(value, obj),
                Some("Index") => ExprKind::Index {
                    target: self.expr_field(value, "Index", "target"),
                    index: self.expr_field(value, "Index", "index"),
                },
                Some("Call") => ExprKind::Call {
                    name: self.name_field(value, "Call", "name"),
                    args: self.args_field(value, "Call"),
                },
                Some(other) => {
                    self.error(
                        AstErrorKind::UnknownNode {
                            found: other.to_owned(),
                        },
                        value,
                    );
                    ExprKind::Invalid
                }
                None => {
                    self.error(AstErrorKind::Untyped, value);
                    ExprKind::Invalid
                }
            },
            Value::Null | Value::Array(_) => {
                self.error(AstErrorKind::Untyped, value);
                ExprKind::Invalid
            }
        };
        self.arena.alloc_expr(kind, pos)
    }

    fn lower_literal(&mut self, value: &Value, obj: &Map<String, Value>) -> ExprKind {
        match obj.get("value") {
            Some(Value::Number(num)) => ExprKind::Literal(number_literal(num)),
            Some(Value::Bool(b)) => ExprKind::Literal(Literal::Bool(*b)),
            Some(Value::String(s)) => match s.parse::<i64>() {
                Ok(v) => ExprKind::Literal(Literal::Int(v)),
                Err(_) => ExprKind::Literal(Literal::Str(s.clone())),
            },
            Some(_) => {
                self.invalid_field(value, "Literal", "value", "a number, boolean or string");
                ExprKind::Invalid
            }
            None => {
                self.missing(value, "Literal", "value");
                ExprKind::Invalid
            }
        }
    }

    fn lower_binary(&mut self, value: &Value, obj: &Map<String, Value>) -> ExprKind {
        let left = self.expr_field(value, "Binary", "left");
        let right = self.expr_field(value, "Binary", "right");
        match obj.get("op").and_then(Value::as_str) {
            Some(sym) => match BinaryOp::from_symbol(sym) {
                Some(op) => ExprKind::Binary { op, left, right },
                None => {
                    self.error(AstErrorKind::UnknownOperator { op: sym.to_owned() }, value);
                    ExprKind::Invalid
                }
            },
            None => {
                self.missing(value, "Binary", "op");
                ExprKind::Invalid
            }
        }
    }

    fn expr_field(&mut self, value: &Value, node: &str, field: &'static str) -> ExprId {
        match value.get(field) {
            Some(Value::Null) | None => {
                self.missing(value, node, field);
                self.invalid_expr(value)
            }
            Some(child) => self.lower_expr(child),
        }
    }

    fn optional_expr_field(&mut self, value: &Value, field: &'static str) -> Option<ExprId> {
        match value.get(field) {
            Some(Value::Null) | None => None,
            Some(child) => Some(self.lower_expr(child)),
        }
    }

    fn args_field(&mut self, value: &Value, node: &str) -> Vec<ExprId> {
        match value.get("args").or_else(|| value.get("arguments")) {
            Some(Value::Array(items)) => items.iter().map(|item| self.lower_expr(item)).collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                self.invalid_field(value, node, "args", "an array");
                Vec::new()
            }
        }
    }

    /// A name given either as a plain string or as an `Identifier` node.
    fn name_field(&mut self, value: &Value, node: &str, field: &'static str) -> String {
        match value.get(field) {
            Some(child) => match ident_name(child) {
                Some(name) => name.to_owned(),
                None => {
                    self.invalid_field(value, node, field, "a name");
                    String::new()
                }
            },
            None => {
                self.missing(value, node, field);
                String::new()
            }
        }
    }
}

fn ident_name(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Object(obj) => obj.get("name").and_then(Value::as_str),
        _ => None,
    }
}

fn number_literal(num: &serde_json::Number) -> Literal {
    match num.as_i64() {
        Some(v) => Literal::Int(v),
        None => Literal::float(num.as_f64().unwrap_or(0.0)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests;
