use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::{
    ast::{BinaryOp, Expr, ExprKind, Literal, Module, Pattern, Stmt, StmtKind, UnaryOp, WhenArm},
    diagnostics::{Diagnostic, NarcissusError, Result, SourceSpan},
    environment::{Environment, EnvironmentRef, ScopeCell},
    parser, stdlib,
    value::{UserFunction, Value, ValueKind},
};

/// Nested user-function calls allowed before a call fails. Kept well below
/// what a default 2 MiB thread stack can hold.
pub const MAX_CALL_DEPTH: usize = 128;

/// Dead scope handles are first pruned once this many accumulate.
const SCOPE_PRUNE_THRESHOLD: usize = 4096;

/// Tree-walking evaluator over one execution environment.
pub struct Interpreter {
    env: EnvironmentRef,
    depth: usize,
    /// Every scope created while evaluating, so [`Interpreter::release`] can
    /// break the cycles closures form with their defining scope.
    scopes: Vec<Weak<ScopeCell>>,
    prune_at: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// A standalone interpreter with only the builtins installed.
    pub fn new() -> Self {
        let env = Environment::new();
        stdlib::install_builtins(&env);
        Self::with_environment(env)
    }

    /// Evaluates against a prepared root scope. Nothing is installed; the
    /// caller decides what the snippet can see.
    pub fn with_environment(env: EnvironmentRef) -> Self {
        let scopes = vec![Rc::downgrade(&env)];
        Self {
            env,
            depth: 0,
            scopes,
            prune_at: SCOPE_PRUNE_THRESHOLD,
        }
    }

    pub fn environment(&self) -> &EnvironmentRef {
        &self.env
    }

    /// Empties every scope this interpreter created or was given. Functions
    /// hold their defining scope, which usually holds them back; clearing
    /// the bindings lets those scopes drop. Values evaluated earlier that
    /// capture a scope stop resolving its names afterwards.
    pub fn release(self) {
        let mut cleared = 0;
        for scope in self.scopes.iter().filter_map(Weak::upgrade) {
            let bindings = scope.borrow_mut().take();
            drop(bindings);
            cleared += 1;
        }
        log::trace!("released {cleared} live scopes");
    }

    fn child_scope(&mut self, parent: &EnvironmentRef) -> EnvironmentRef {
        let child = Environment::with_parent(Rc::clone(parent));
        if self.scopes.len() >= self.prune_at {
            self.scopes.retain(|scope| scope.strong_count() > 0);
            self.prune_at = (self.scopes.len() * 2).max(SCOPE_PRUNE_THRESHOLD);
        }
        self.scopes.push(Rc::downgrade(&child));
        child
    }

    /// A child of the current scope.
    fn nested_scope(&mut self) -> EnvironmentRef {
        let parent = Rc::clone(&self.env);
        self.child_scope(&parent)
    }

    pub fn eval_source(&mut self, source: &str) -> Result<Value> {
        let module = parser::parse_module(source)?;
        self.eval_module(&module)
    }

    pub fn eval_module(&mut self, module: &Module) -> Result<Value> {
        let mut last_value: Option<Value> = None;
        for stmt in &module.items {
            match self.execute_statement(stmt)? {
                FlowControl::Next => {}
                FlowControl::NextValue(value) => last_value = Some(value),
                FlowControl::Return(value) => return Ok(value),
                FlowControl::Break(_) => {
                    return Err(runtime("`break` outside loop", stmt.span));
                }
                FlowControl::Continue => {
                    return Err(runtime("`continue` outside loop", stmt.span));
                }
            }
        }
        Ok(last_value.unwrap_or_else(Value::unit))
    }

    fn execute_statement(&mut self, stmt: &Stmt) -> Result<FlowControl> {
        match &stmt.kind {
            StmtKind::VarDecl { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::unit(),
                };
                self.env.borrow_mut().define(name.clone(), value, true);
                Ok(FlowControl::Next)
            }
            StmtKind::ConstDecl { name, value } => {
                let evaluated = self.evaluate(value)?;
                self.env.borrow_mut().define(name.clone(), evaluated, false);
                Ok(FlowControl::Next)
            }
            StmtKind::Function { name, params, body } => {
                let function = UserFunction {
                    name: Some(name.clone()),
                    params: params.clone(),
                    body: body.clone(),
                    env: Rc::clone(&self.env),
                };
                self.env.borrow_mut().define(
                    name.clone(),
                    Value::new(ValueKind::Function(function)),
                    false,
                );
                Ok(FlowControl::Next)
            }
            StmtKind::Use { path, alias } => {
                let value = self.resolve_path(path, stmt.span)?;
                let binding = match alias {
                    Some(alias) => alias.clone(),
                    None => path.last().cloned().unwrap_or_default(),
                };
                self.env.borrow_mut().define(binding, value, false);
                Ok(FlowControl::Next)
            }
            StmtKind::UseFrom { path, names } => {
                let module = self.resolve_path(path, stmt.span)?;
                for imported in names {
                    let value = member(&module, &imported.name, stmt.span)?;
                    self.env
                        .borrow_mut()
                        .define(imported.binding(), value, false);
                }
                Ok(FlowControl::Next)
            }
            StmtKind::Expr(expr) => {
                let value = self.evaluate(expr)?;
                Ok(FlowControl::NextValue(value))
            }
            StmtKind::Block(statements) => self.execute_block(statements),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute_block(then_branch)
                } else if let Some(branch) = else_branch {
                    self.execute_block(branch)
                } else {
                    Ok(FlowControl::Next)
                }
            }
            StmtKind::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute_block(body)? {
                        FlowControl::Next | FlowControl::NextValue(_) | FlowControl::Continue => {}
                        FlowControl::Break(None) => break,
                        FlowControl::Break(Some(value)) => {
                            return Ok(FlowControl::NextValue(value));
                        }
                        FlowControl::Return(value) => return Ok(FlowControl::Return(value)),
                    }
                }
                Ok(FlowControl::Next)
            }
            StmtKind::Loop { body } => {
                loop {
                    match self.execute_block(body)? {
                        FlowControl::Next | FlowControl::NextValue(_) | FlowControl::Continue => {}
                        FlowControl::Break(None) => break,
                        FlowControl::Break(Some(value)) => {
                            return Ok(FlowControl::NextValue(value));
                        }
                        FlowControl::Return(value) => return Ok(FlowControl::Return(value)),
                    }
                }
                Ok(FlowControl::Next)
            }
            StmtKind::For {
                binding,
                iterable,
                body,
            } => {
                let iterable_value = self.evaluate(iterable)?;
                for item in iterate(&iterable_value, iterable.span)? {
                    let child = self.nested_scope();
                    child.borrow_mut().define(binding.clone(), item, true);
                    let flow = self.scoped(child, |interp| interp.execute_block(body))?;
                    match flow {
                        FlowControl::Next | FlowControl::NextValue(_) | FlowControl::Continue => {}
                        FlowControl::Break(None) => break,
                        FlowControl::Break(Some(value)) => {
                            return Ok(FlowControl::NextValue(value));
                        }
                        FlowControl::Return(value) => return Ok(FlowControl::Return(value)),
                    }
                }
                Ok(FlowControl::Next)
            }
            StmtKind::When { subject, arms } => {
                let value = self.evaluate(subject)?;
                for arm in arms {
                    if let Some(env) = self.match_arm(arm, &value) {
                        return self.scoped(env, |interp| interp.execute_block(&arm.body));
                    }
                }
                Ok(FlowControl::Next)
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::unit(),
                };
                Ok(FlowControl::Return(value))
            }
            StmtKind::Break(expr) => {
                let value = match expr {
                    Some(expr) => Some(self.evaluate(expr)?),
                    None => None,
                };
                Ok(FlowControl::Break(value))
            }
            StmtKind::Continue => Ok(FlowControl::Continue),
        }
    }

    /// Runs `body` with `env` as the current scope, restoring the previous
    /// scope whether or not it fails.
    fn scoped<T>(
        &mut self,
        env: EnvironmentRef,
        body: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let prev = std::mem::replace(&mut self.env, env);
        let result = body(self);
        self.env = prev;
        result
    }

    fn execute_block(&mut self, statements: &[Stmt]) -> Result<FlowControl> {
        let child = self.nested_scope();
        self.scoped(child, |interp| {
            let mut last_value: Option<Value> = None;
            for stmt in statements {
                match interp.execute_statement(stmt)? {
                    FlowControl::Next => {}
                    FlowControl::NextValue(value) => last_value = Some(value),
                    other => return Ok(other),
                }
            }
            Ok(match last_value {
                Some(value) => FlowControl::NextValue(value),
                None => FlowControl::Next,
            })
        })
    }

    fn resolve_path(&self, path: &[String], span: SourceSpan) -> Result<Value> {
        let Some((root, rest)) = path.split_first() else {
            return Err(runtime("empty module path", span));
        };
        let mut current = stdlib::resolve_module(root).ok_or_else(|| {
            NarcissusError::from(
                Diagnostic::runtime(format!("unknown module `{root}`"))
                    .with_span(span)
                    .with_note(format!("available modules: {}", stdlib::MODULES.join(", "))),
            )
        })?;
        for segment in rest {
            current = member(&current, segment, span)?;
        }
        Ok(current)
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(literal(lit)),
            ExprKind::Variable(name) => Environment::get(&self.env, name, expr.span),
            ExprKind::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                let left_value = self.evaluate(left)?;
                if !left_value.is_truthy() {
                    return Ok(Value::bool(false));
                }
                Ok(Value::bool(self.evaluate(right)?.is_truthy()))
            }
            ExprKind::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                let left_value = self.evaluate(left)?;
                if left_value.is_truthy() {
                    return Ok(Value::bool(true));
                }
                Ok(Value::bool(self.evaluate(right)?.is_truthy()))
            }
            ExprKind::Binary { op, left, right } => {
                let left_value = self.evaluate(left)?;
                let right_value = self.evaluate(right)?;
                binary(*op, left_value, right_value, expr.span)
            }
            ExprKind::Unary { op, expr: right } => {
                let value = self.evaluate(right)?;
                unary(*op, value, expr.span)
            }
            ExprKind::Assign { target, value } => {
                let value = self.evaluate(value)?;
                match &target.kind {
                    ExprKind::Variable(name) => {
                        Environment::assign(&self.env, name, value.clone(), target.span)?;
                    }
                    ExprKind::Field {
                        target: owner,
                        field,
                    } => self.assign_field(owner, field, value.clone())?,
                    ExprKind::Index {
                        target: owner,
                        index,
                    } => self.assign_index(owner, index, value.clone())?,
                    _ => return Err(runtime("invalid assignment target", target.span)),
                }
                Ok(value)
            }
            ExprKind::Call { callee, args } => {
                let callee_value = self.evaluate(callee)?;
                let mut eval_args = Vec::with_capacity(args.len());
                for arg in args {
                    eval_args.push(self.evaluate(arg)?);
                }
                self.call(callee_value, eval_args, expr.span)
            }
            ExprKind::ArrayLiteral(elements) | ExprKind::TupleLiteral(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate(element)?);
                }
                Ok(Value::array(values))
            }
            ExprKind::MapLiteral(entries) => {
                let mut map = IndexMap::new();
                for (key_expr, value_expr) in entries {
                    let key_val = self.evaluate(key_expr)?;
                    let key = match &*key_val.0 {
                        ValueKind::String(s) => s.clone(),
                        ValueKind::Int(n) => n.to_string(),
                        _ => return Err(runtime("map keys must be String or Int", key_expr.span)),
                    };
                    let value = self.evaluate(value_expr)?;
                    map.insert(key, value);
                }
                Ok(Value::map(map))
            }
            ExprKind::Group(inner) => self.evaluate(inner),
            ExprKind::Index { target, index } => {
                let target_value = self.evaluate(target)?;
                let index_value = self.evaluate(index)?;
                index_into(&target_value, &index_value, expr.span)
            }
            ExprKind::Field { target, field } => {
                let target_value = self.evaluate(target)?;
                member(&target_value, field, expr.span)
            }
            ExprKind::Lambda { params, body } => {
                let function = UserFunction {
                    name: None,
                    params: params.clone(),
                    body: body.clone(),
                    env: Rc::clone(&self.env),
                };
                Ok(Value::new(ValueKind::Function(function)))
            }
        }
    }

    fn call(&mut self, callee: Value, args: Vec<Value>, span: SourceSpan) -> Result<Value> {
        match &*callee.0 {
            ValueKind::NativeFunction(fun) => fun.call(&args).map_err(|err| at_call_site(err, span)),
            ValueKind::Function(fun) => {
                if args.len() != fun.params.len() {
                    return Err(runtime(
                        format!(
                            "function `{}` expected {} arguments but received {}",
                            fun.name.as_deref().unwrap_or("anonymous"),
                            fun.params.len(),
                            args.len()
                        ),
                        span,
                    ));
                }
                if self.depth >= MAX_CALL_DEPTH {
                    return Err(runtime("maximum recursion depth exceeded", span));
                }
                let frame = self.child_scope(&fun.env);
                for (name, value) in fun.params.iter().zip(args) {
                    frame.borrow_mut().define(name.clone(), value, true);
                }
                self.depth += 1;
                let result = self.scoped(frame, |interp| {
                    let mut result = Value::unit();
                    for stmt in &fun.body {
                        match interp.execute_statement(stmt)? {
                            FlowControl::Next => {}
                            FlowControl::NextValue(value) => result = value,
                            FlowControl::Return(value) => return Ok(value),
                            FlowControl::Break(_) | FlowControl::Continue => {
                                return Err(runtime(
                                    "loop control flow cannot escape a function",
                                    stmt.span,
                                ));
                            }
                        }
                    }
                    Ok(result)
                });
                self.depth -= 1;
                result
            }
            _ => Err(runtime(
                format!("value of type {} is not callable", callee.type_name()),
                span,
            )),
        }
    }

    fn assign_index(&mut self, target: &Expr, index: &Expr, value: Value) -> Result<()> {
        let target_value = self.evaluate(target)?;
        let index_value = self.evaluate(index)?;
        let updated = replace_at(&target_value, &index_value, value, index.span)?;
        self.write_back(target, updated)
    }

    fn assign_field(&mut self, target: &Expr, field: &str, value: Value) -> Result<()> {
        let target_value = self.evaluate(target)?;
        let updated = replace_field(&target_value, field, value, target.span)?;
        self.write_back(target, updated)
    }

    /// Stores a rebuilt aggregate back through the place expression it came
    /// from, rebuilding each enclosing aggregate on the way up.
    fn write_back(&mut self, target: &Expr, new_value: Value) -> Result<()> {
        match &target.kind {
            ExprKind::Variable(name) => Environment::assign(&self.env, name, new_value, target.span),
            ExprKind::Field {
                target: owner,
                field,
            } => {
                let owner_value = self.evaluate(owner)?;
                let updated = replace_field(&owner_value, field, new_value, target.span)?;
                self.write_back(owner, updated)
            }
            ExprKind::Index {
                target: owner,
                index,
            } => {
                let owner_value = self.evaluate(owner)?;
                let index_value = self.evaluate(index)?;
                let updated = replace_at(&owner_value, &index_value, new_value, index.span)?;
                self.write_back(owner, updated)
            }
            _ => Err(runtime("cannot assign to computed expression", target.span)),
        }
    }

    fn match_arm(&mut self, arm: &WhenArm, value: &Value) -> Option<EnvironmentRef> {
        let env = self.nested_scope();
        bind_pattern(&env, &arm.pattern, value).then_some(env)
    }
}

enum FlowControl {
    Next,
    NextValue(Value),
    Return(Value),
    Break(Option<Value>),
    Continue,
}

fn runtime(message: impl Into<String>, span: SourceSpan) -> NarcissusError {
    NarcissusError::from(Diagnostic::runtime(message).with_span(span))
}

fn at_call_site(err: NarcissusError, span: SourceSpan) -> NarcissusError {
    match err {
        NarcissusError::Diagnostic(diagnostic) if diagnostic.span.is_none() => {
            NarcissusError::Diagnostic(diagnostic.with_span(span))
        }
        other => other,
    }
}

fn literal(literal: &Literal) -> Value {
    match literal {
        Literal::Int(n) => Value::int(*n),
        Literal::Float(n) => Value::float(*n),
        Literal::Bool(b) => Value::bool(*b),
        Literal::String(s) => Value::string(s.clone()),
        Literal::None => Value::unit(),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value, span: SourceSpan) -> Result<Value> {
    use BinaryOp::*;
    match op {
        Add => match (&*left.0, &*right.0) {
            (ValueKind::String(a), ValueKind::String(b)) => Ok(Value::string(format!("{a}{b}"))),
            (ValueKind::String(a), _) => Ok(Value::string(format!("{a}{right}"))),
            (ValueKind::Array(a), ValueKind::Array(b)) => {
                Ok(Value::array(a.iter().chain(b).cloned().collect()))
            }
            _ => numeric(&left, &right, span, i64::checked_add, |a, b| a + b),
        },
        Sub => numeric(&left, &right, span, i64::checked_sub, |a, b| a - b),
        Mul => numeric(&left, &right, span, i64::checked_mul, |a, b| a * b),
        Div => {
            if left.is_int() && right.is_int() {
                let divisor = integer(&right);
                if divisor == 0 {
                    return Err(runtime("division by zero", span));
                }
                let dividend = integer(&left);
                if dividend % divisor == 0 {
                    return Ok(Value::int(dividend / divisor));
                }
                return Ok(Value::float(dividend as f64 / divisor as f64));
            }
            numeric(&left, &right, span, |_, _| None, |a, b| a / b)
        }
        Mod => {
            if right.is_int() && integer(&right) == 0 {
                return Err(runtime("modulo by zero", span));
            }
            numeric(&left, &right, span, i64::checked_rem, |a, b| a % b)
        }
        Equal => Ok(Value::bool(equal(&left, &right))),
        NotEqual => Ok(Value::bool(!equal(&left, &right))),
        Less => comparison(&left, &right, span, |ord| ord.is_lt()),
        LessEqual => comparison(&left, &right, span, |ord| ord.is_le()),
        Greater => comparison(&left, &right, span, |ord| ord.is_gt()),
        GreaterEqual => comparison(&left, &right, span, |ord| ord.is_ge()),
        And => Ok(Value::bool(left.is_truthy() && right.is_truthy())),
        Or => Ok(Value::bool(left.is_truthy() || right.is_truthy())),
    }
}

fn unary(op: UnaryOp, value: Value, span: SourceSpan) -> Result<Value> {
    match op {
        UnaryOp::Negate => match &*value.0 {
            ValueKind::Int(n) => Ok(n
                .checked_neg()
                .map(Value::int)
                .unwrap_or_else(|| Value::float(-(*n as f64)))),
            ValueKind::Float(n) => Ok(Value::float(-n)),
            _ => Err(runtime("unary `-` expects numeric value", span)),
        },
        UnaryOp::Not => Ok(Value::bool(!value.is_truthy())),
    }
}

fn integer(value: &Value) -> i64 {
    match &*value.0 {
        ValueKind::Int(n) => *n,
        _ => 0,
    }
}

/// Integer operands stay integers unless the operation overflows, in which
/// case the float form is used.
fn numeric(
    left: &Value,
    right: &Value,
    span: SourceSpan,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> Result<Value> {
    if let (ValueKind::Int(a), ValueKind::Int(b)) = (&*left.0, &*right.0) {
        if let Some(result) = int_op(*a, *b) {
            return Ok(Value::int(result));
        }
    }
    let left_num = number(left, span)?;
    let right_num = number(right, span)?;
    Ok(Value::float(float_op(left_num, right_num)))
}

fn comparison(
    left: &Value,
    right: &Value,
    span: SourceSpan,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<Value> {
    if let (Some(a), Some(b)) = (left.as_str(), right.as_str()) {
        return Ok(Value::bool(accept(a.cmp(b))));
    }
    let left_num = number(left, span)?;
    let right_num = number(right, span)?;
    match left_num.partial_cmp(&right_num) {
        Some(ordering) => Ok(Value::bool(accept(ordering))),
        None => Ok(Value::bool(false)),
    }
}

fn number(value: &Value, span: SourceSpan) -> Result<f64> {
    match &*value.0 {
        ValueKind::Int(n) => Ok(*n as f64),
        ValueKind::Float(n) => Ok(*n),
        _ => Err(runtime(
            format!("expected numeric value, found {}", value.type_name()),
            span,
        )),
    }
}

fn position(index: &Value, len: usize, span: SourceSpan) -> Result<usize> {
    let ValueKind::Int(raw) = &*index.0 else {
        return Err(runtime("index must be Int", span));
    };
    let resolved = if *raw < 0 { len as i64 + raw } else { *raw };
    if resolved < 0 || resolved as usize >= len {
        return Err(runtime(format!("index {raw} out of bounds"), span));
    }
    Ok(resolved as usize)
}

fn index_into(target: &Value, index: &Value, span: SourceSpan) -> Result<Value> {
    match &*target.0 {
        ValueKind::Array(values) => Ok(values[position(index, values.len(), span)?].clone()),
        ValueKind::String(text) => {
            let chars: Vec<char> = text.chars().collect();
            let at = position(index, chars.len(), span)?;
            Ok(Value::string(chars[at].to_string()))
        }
        ValueKind::Map(map) => {
            let key = match &*index.0 {
                ValueKind::String(s) => s.clone(),
                ValueKind::Int(n) => n.to_string(),
                _ => return Err(runtime("map keys must be String or Int", span)),
            };
            map.get(&key)
                .cloned()
                .ok_or_else(|| runtime(format!("missing key `{key}`"), span))
        }
        _ => Err(runtime(
            format!("cannot index into value of type {}", target.type_name()),
            span,
        )),
    }
}

fn replace_at(target: &Value, index: &Value, value: Value, span: SourceSpan) -> Result<Value> {
    match &*target.0 {
        ValueKind::Array(elements) => {
            let at = position(index, elements.len(), span)?;
            let mut updated = elements.clone();
            updated[at] = value;
            Ok(Value::array(updated))
        }
        ValueKind::Map(_) => match index.as_str() {
            Some(key) => replace_field(target, key, value, span),
            None => Err(runtime("map keys must be String", span)),
        },
        _ => Err(runtime("index assignment expects array or map target", span)),
    }
}

fn replace_field(target: &Value, field: &str, value: Value, span: SourceSpan) -> Result<Value> {
    match &*target.0 {
        ValueKind::Map(map) => {
            let mut updated = map.clone();
            updated.insert(field.to_string(), value);
            Ok(Value::map(updated))
        }
        _ => Err(runtime("field assignment expects map target", span)),
    }
}

/// Field access on maps and modules.
fn member(target: &Value, field: &str, span: SourceSpan) -> Result<Value> {
    match &*target.0 {
        ValueKind::Map(map) => map
            .get(field)
            .cloned()
            .ok_or_else(|| runtime(format!("missing field `{field}`"), span)),
        ValueKind::Module(module) => module.exports.get(field).cloned().ok_or_else(|| {
            runtime(
                format!("module `{}` has no member `{field}`", module.name),
                span,
            )
        }),
        _ => Err(runtime(
            format!("field access expects map or module, found {}", target.type_name()),
            span,
        )),
    }
}

fn iterate(value: &Value, span: SourceSpan) -> Result<Vec<Value>> {
    match &*value.0 {
        ValueKind::Array(values) => Ok(values.clone()),
        ValueKind::String(text) => Ok(text.chars().map(|c| Value::string(c.to_string())).collect()),
        ValueKind::Map(map) => Ok(map
            .iter()
            .map(|(key, value)| Value::array(vec![Value::string(key.clone()), value.clone()]))
            .collect()),
        _ => Err(runtime(
            format!("value of type {} is not iterable", value.type_name()),
            span,
        )),
    }
}

fn bind_pattern(env: &EnvironmentRef, pattern: &Pattern, value: &Value) -> bool {
    match pattern {
        Pattern::Wildcard => true,
        Pattern::Literal(lit) => equal(&literal(lit), value),
        Pattern::Identifier(name) => {
            env.borrow_mut().define(name.clone(), value.clone(), true);
            true
        }
        Pattern::Tuple(patterns) => match &*value.0 {
            ValueKind::Array(elements) if patterns.len() == elements.len() => patterns
                .iter()
                .zip(elements)
                .all(|(pat, elem)| bind_pattern(env, pat, elem)),
            _ => false,
        },
    }
}

pub(crate) fn equal(left: &Value, right: &Value) -> bool {
    match (&*left.0, &*right.0) {
        (ValueKind::Unit, ValueKind::Unit) => true,
        (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
        (ValueKind::Int(a), ValueKind::Int(b)) => a == b,
        (ValueKind::Int(a), ValueKind::Float(b)) | (ValueKind::Float(b), ValueKind::Int(a)) => {
            (*a as f64) == *b
        }
        (ValueKind::Float(a), ValueKind::Float(b)) => a == b,
        (ValueKind::String(a), ValueKind::String(b)) => a == b,
        (ValueKind::Array(a), ValueKind::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(l, r)| equal(l, r))
        }
        (ValueKind::Map(a), ValueKind::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, value)| b.get(key).is_some_and(|rhs| equal(value, rhs)))
        }
        _ => false,
    }
}
