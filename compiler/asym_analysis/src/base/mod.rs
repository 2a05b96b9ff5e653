//! Traversal state shared by the statement visitors.
//!
//! One [`BaseAnalyzer`] performs exactly one pass (worst, best or average)
//! over one program. It owns the cost table being built, the stack of
//! multipliers contributed by the enclosing loops and branches, the subtree
//! memo and the derivation trail. Nothing here is shared between passes.

use std::hash::{Hash, Hasher};

use asym_expr::{Bound, Expr};
use asym_ir::{Program, StmtId, StmtKind};
use rustc_hash::{FxHashMap, FxHasher};
use smallvec::SmallVec;

use crate::avg_model::AvgModel;
use crate::options::Case;
use crate::result::{CostRow, RowKind};
use crate::summation::SummationCloser;

/// One entry of the loop/branch context.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Multiplier {
    /// `Σ_{var=lower}^{upper}` for a `for` loop.
    Sum(Bound),
    /// A plain factor: the iteration count of a `while`/`repeat` loop, or
    /// `1/step` for a strided `for`.
    Factor(Expr),
    /// Branch probability; only counted in expected runs.
    Prob(Expr),
}

/// Identity of a statement for memoization.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKey {
    /// Source position plus statement kind.
    Pos { line: u32, column: u32, kind: &'static str },
    /// Structural digest, for nodes without a position. Includes the
    /// stand-in line, so rows replayed from the memo keep their labels.
    Shape(u64),
}

/// Node, case, loop context digest and digest of the local values the
/// subtree reads.
pub type MemoKey = (NodeKey, Case, u64, u64);

/// Why a placeholder was introduced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placeholder {
    pub line: u32,
    pub reason: String,
}

pub struct BaseAnalyzer<'p> {
    program: &'p Program,
    case: Case,
    rows: Vec<CostRow>,
    multipliers: SmallVec<[Multiplier; 4]>,
    memo: FxHashMap<MemoKey, Vec<CostRow>>,
    closer: SummationCloser,
    trail: Vec<String>,
    placeholders: Vec<Placeholder>,
    /// Present in the average case.
    pub(crate) avg: Option<AvgModel>,
}

impl<'p> BaseAnalyzer<'p> {
    pub fn new(program: &'p Program, case: Case, avg: Option<AvgModel>) -> Self {
        BaseAnalyzer {
            program,
            case,
            rows: Vec::new(),
            multipliers: SmallVec::new(),
            memo: FxHashMap::default(),
            closer: SummationCloser::new(),
            trail: Vec::new(),
            placeholders: Vec::new(),
            avg,
        }
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn case(&self) -> Case {
        self.case
    }

    pub fn rows(&self) -> &[CostRow] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut Vec<CostRow> {
        &mut self.rows
    }

    pub fn multipliers(&self) -> &[Multiplier] {
        &self.multipliers
    }

    pub fn in_loop(&self) -> bool {
        self.multipliers
            .iter()
            .any(|m| matches!(m, Multiplier::Sum(_) | Multiplier::Factor(_)))
    }

    pub fn closer(&mut self) -> &mut SummationCloser {
        &mut self.closer
    }

    // Rows

    /// Append a row for `line`. `count` is the per-execution count of the
    /// statement; every active multiplier is applied to it.
    pub fn add_row(&mut self, line: u32, kind: RowKind, count: Expr, note: impl Into<String>) {
        let count_raw = self.wrap(count.clone(), false);
        let closed = self.closer.close(&count_raw);
        let expected_runs = (self.case == Case::Avg).then(|| {
            let weighted = self.wrap(count, true);
            self.closer.close(&weighted)
        });
        let note = note.into();
        tracing::trace!(line, kind = kind.as_str(), count = %closed, "row");
        self.rows.push(CostRow {
            line,
            kind,
            ck: Expr::Cost(line).to_string(),
            count_raw,
            count: closed,
            expected_runs,
            note,
        });
    }

    /// Apply the multiplier stack to `count`, innermost first.
    fn wrap(&self, count: Expr, with_probabilities: bool) -> Expr {
        self.multipliers.iter().rev().fold(count, |acc, m| match m {
            Multiplier::Sum(bound) => Expr::sum(acc, vec![bound.clone()]),
            Multiplier::Factor(f) => f.clone() * acc,
            Multiplier::Prob(p) if with_probabilities => p.clone() * acc,
            Multiplier::Prob(_) => acc,
        })
    }

    pub fn push_multiplier(&mut self, multiplier: Multiplier) {
        self.multipliers.push(multiplier);
    }

    pub fn pop_multiplier(&mut self) -> Option<Multiplier> {
        self.multipliers.pop()
    }

    /// Run `f` with `multipliers` pushed; they are popped again on return.
    pub fn with_multipliers<R>(
        &mut self,
        multipliers: impl IntoIterator<Item = Multiplier>,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let depth = self.multipliers.len();
        self.multipliers.extend(multipliers);
        let out = f(self);
        self.multipliers.truncate(depth);
        out
    }

    // Memo

    /// Digest of the ordered multiplier stack.
    pub fn get_context_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.multipliers.len().hash(&mut hasher);
        for m in &self.multipliers {
            m.hash(&mut hasher);
        }
        hasher.finish()
    }

    pub fn is_cacheable(kind: &StmtKind) -> bool {
        matches!(
            kind,
            StmtKind::Block { .. } | StmtKind::For { .. } | StmtKind::If { .. }
        )
    }

    /// `bindings` digests whatever outside values the subtree's counts
    /// depend on; see [`bindings_digest`].
    pub fn memo_key(&self, id: StmtId, bindings: u64) -> MemoKey {
        let stmt = self.program.stmt(id);
        let node = match stmt.pos {
            Some(pos) => NodeKey::Pos {
                line: pos.line,
                column: pos.column,
                kind: stmt.kind.name(),
            },
            None => NodeKey::Shape(shape_hash(self.program, id)),
        };
        (node, self.case, self.get_context_hash(), bindings)
    }

    pub fn memo_get(&self, key: &MemoKey) -> Option<&[CostRow]> {
        self.memo.get(key).map(Vec::as_slice)
    }

    pub fn memo_set(&mut self, key: MemoKey, rows: Vec<CostRow>) {
        self.memo.insert(key, rows);
    }

    // Trail and placeholders

    pub fn log_step(&mut self, step: impl Into<String>) {
        let step = step.into();
        tracing::debug!(case = %self.case, step = %step, "derivation step");
        self.trail.push(step);
    }

    /// The derivation trail with the closer's steps appended.
    pub fn take_trail(&mut self) -> Vec<String> {
        let mut trail = std::mem::take(&mut self.trail);
        trail.extend(self.closer.take_steps());
        trail
    }

    /// Register the iteration placeholder of the loop at `line`.
    pub fn placeholder(&mut self, line: u32, reason: impl Into<String>) -> Expr {
        if !self.placeholders.iter().any(|p| p.line == line) {
            let reason = reason.into();
            tracing::warn!(line, reason = %reason, "unclassified loop, using placeholder");
            self.placeholders.push(Placeholder { line, reason });
        }
        Expr::Opaque(line)
    }

    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    // Totals

    /// `Σ C_line · count` over every row with a non-zero count, each count
    /// passed through `resolve` first.
    pub fn build_t_open(&self, resolve: impl Fn(&Expr) -> Expr) -> Expr {
        Expr::add_all(
            self.rows
                .iter()
                .filter(|row| !row.effective_count().is_zero())
                .map(|row| Expr::Cost(row.line) * resolve(row.effective_count()))
                .collect(),
        )
    }
}

/// Digest of `(name, value)` for every name read under `root` that
/// `lookup` knows, in name order.
pub fn bindings_digest(program: &Program, root: StmtId, lookup: impl Fn(&str) -> Option<String>) -> u64 {
    let mut names: Vec<String> = Vec::new();
    asym_ir::walk::for_each_stmt(program, root, &mut |id| {
        for expr in asym_ir::walk::stmt_exprs(program, id) {
            names.extend(asym_ir::walk::referenced_idents(program, expr));
        }
    });
    names.sort_unstable();
    names.dedup();
    let mut hasher = FxHasher::default();
    for name in names {
        if let Some(value) = lookup(&name) {
            name.hash(&mut hasher);
            value.hash(&mut hasher);
        }
    }
    hasher.finish()
}

/// Structural digest of a statement subtree, independent of arena indices.
fn shape_hash(program: &Program, id: StmtId) -> u64 {
    let mut hasher = FxHasher::default();
    hash_stmt(program, id, &mut hasher);
    hasher.finish()
}

fn hash_stmt(program: &Program, id: StmtId, hasher: &mut FxHasher) {
    let stmt = program.stmt(id);
    stmt.kind.name().hash(hasher);
    stmt.pos.hash(hasher);
    program.line_of(id).hash(hasher);
    for expr in asym_ir::walk::stmt_exprs(program, id) {
        program.render_expr(expr).hash(hasher);
    }
    match &stmt.kind {
        StmtKind::For { var, downto, .. } => {
            var.hash(hasher);
            downto.hash(hasher);
        }
        StmtKind::Call { name, .. } => name.hash(hasher),
        _ => {}
    }
    let children = asym_ir::walk::child_stmts(program, id);
    children.len().hash(hasher);
    for child in children {
        hash_stmt(program, child, hasher);
    }
}
