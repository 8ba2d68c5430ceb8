//! Static pre-execution screening of Narcissus snippets.
//!
//! The check parses the snippet and rejects any import whose root module
//! grants filesystem, process, environment or socket access. It is a name
//! check over the syntax tree, not a trust boundary.

use crate::{
    ast::{Expr, ExprKind, Module, Stmt, StmtKind},
    error::EngineError,
    parser,
    pipeline::SafetyCheck,
    stdlib,
};

/// Root modules a snippet may not import.
pub const DENYLIST: &[&str] = stdlib::CAPABILITY_MODULES;

/// Outcome of screening one snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(EngineError),
}

impl Verdict {
    pub fn is_ok(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    pub fn reason(&self) -> Option<&EngineError> {
        match self {
            Verdict::Accepted => None,
            Verdict::Rejected(reason) => Some(reason),
        }
    }
}

/// Parses `source` and screens its imports against [`DENYLIST`].
pub fn check(source: &str) -> Verdict {
    let module = match parser::parse_module(source) {
        Ok(module) => module,
        Err(diagnostic) => {
            log::debug!("snippet rejected: {diagnostic}");
            return Verdict::Rejected(EngineError::syntax(&diagnostic, source));
        }
    };
    match forbidden_import(&module) {
        Some(path) => {
            log::debug!("snippet rejected: imports `{}`", path.join("."));
            Verdict::Rejected(EngineError::ForbiddenCapability)
        }
        None => Verdict::Accepted,
    }
}

/// The first import anywhere in `module` whose root segment is denylisted.
pub fn forbidden_import(module: &Module) -> Option<&[String]> {
    in_statements(&module.items)
}

fn denied(path: &[String]) -> bool {
    path.first()
        .is_some_and(|root| DENYLIST.contains(&root.as_str()))
}

fn in_statements(statements: &[Stmt]) -> Option<&[String]> {
    statements.iter().find_map(in_statement)
}

fn in_statement(stmt: &Stmt) -> Option<&[String]> {
    match &stmt.kind {
        StmtKind::Use { path, .. } | StmtKind::UseFrom { path, .. } => {
            denied(path).then_some(path.as_slice())
        }
        StmtKind::VarDecl { initializer, .. } => initializer.as_ref().and_then(in_expr),
        StmtKind::ConstDecl { value, .. } => in_expr(value),
        StmtKind::Function { body, .. } => in_statements(body),
        StmtKind::Expr(expr) => in_expr(expr),
        StmtKind::Block(body) | StmtKind::Loop { body } => in_statements(body),
        StmtKind::If {
            condition,
            then_branch,
            else_branch,
        } => in_expr(condition)
            .or_else(|| in_statements(then_branch))
            .or_else(|| else_branch.as_deref().and_then(in_statements)),
        StmtKind::While { condition, body } => {
            in_expr(condition).or_else(|| in_statements(body))
        }
        StmtKind::For { iterable, body, .. } => in_expr(iterable).or_else(|| in_statements(body)),
        StmtKind::When { subject, arms } => {
            in_expr(subject).or_else(|| arms.iter().find_map(|arm| in_statements(&arm.body)))
        }
        StmtKind::Return(expr) | StmtKind::Break(expr) => expr.as_ref().and_then(in_expr),
        StmtKind::Continue => None,
    }
}

/// Lambda bodies are statement lists and are walked like blocks.
fn in_expr(expr: &Expr) -> Option<&[String]> {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Variable(_) => None,
        ExprKind::Lambda { body, .. } => in_statements(body),
        ExprKind::Binary { left, right, .. } => in_expr(left).or_else(|| in_expr(right)),
        ExprKind::Unary { expr, .. } | ExprKind::Group(expr) => in_expr(expr),
        ExprKind::Assign { target, value } => in_expr(target).or_else(|| in_expr(value)),
        ExprKind::Call { callee, args } => {
            in_expr(callee).or_else(|| args.iter().find_map(in_expr))
        }
        ExprKind::ArrayLiteral(items) | ExprKind::TupleLiteral(items) => {
            items.iter().find_map(in_expr)
        }
        ExprKind::MapLiteral(entries) => entries
            .iter()
            .find_map(|(key, value)| in_expr(key).or_else(|| in_expr(value))),
        ExprKind::Index { target, index } => in_expr(target).or_else(|| in_expr(index)),
        ExprKind::Field { target, .. } => in_expr(target),
    }
}

/// The pipeline strategy backed by [`check`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DenylistAnalyzer;

impl SafetyCheck for DenylistAnalyzer {
    fn check(&self, source: &str) -> Verdict {
        check(source)
    }
}
