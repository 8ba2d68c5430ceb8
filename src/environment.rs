use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::{
    diagnostics::{Diagnostic, NarcissusError, SourceSpan},
    value::Value,
};

pub type ScopeCell = RefCell<Environment>;
pub type EnvironmentRef = Rc<ScopeCell>;

/// One lexical scope. The root scope of a run is the execution environment
/// handed to the interpreter; nested scopes chain back to it.
#[derive(Default)]
pub struct Environment {
    parent: Option<EnvironmentRef>,
    bindings: IndexMap<String, Binding>,
}

impl Environment {
    pub fn new() -> EnvironmentRef {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn with_parent(parent: EnvironmentRef) -> EnvironmentRef {
        Rc::new(RefCell::new(Self {
            parent: Some(parent),
            bindings: IndexMap::new(),
        }))
    }

    pub fn define(&mut self, name: impl Into<String>, value: Value, mutable: bool) {
        self.bindings.insert(name.into(), Binding { value, mutable });
    }

    /// Whether `name` is bound in this scope, ignoring parents.
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// Detaches the scope from its parent and hands back everything it
    /// held, leaving it empty.
    pub fn take(&mut self) -> (Option<EnvironmentRef>, IndexMap<String, Binding>) {
        (self.parent.take(), std::mem::take(&mut self.bindings))
    }

    pub fn assign(
        env: &EnvironmentRef,
        name: &str,
        value: Value,
        span: SourceSpan,
    ) -> Result<(), NarcissusError> {
        let parent = {
            let mut scope = env.borrow_mut();
            match scope.bindings.get_mut(name) {
                Some(binding) if !binding.mutable => {
                    return Err(NarcissusError::from(
                        Diagnostic::runtime(format!("cannot assign to immutable binding `{name}`"))
                            .with_span(span),
                    ));
                }
                Some(binding) => {
                    binding.value = value;
                    return Ok(());
                }
                None => scope.parent.clone(),
            }
        };
        match parent {
            Some(parent) => Environment::assign(&parent, name, value, span),
            None => Err(undefined(name, span)),
        }
    }

    pub fn get(
        env: &EnvironmentRef,
        name: &str,
        span: SourceSpan,
    ) -> Result<Value, NarcissusError> {
        let parent = {
            let scope = env.borrow();
            if let Some(binding) = scope.bindings.get(name) {
                return Ok(binding.value.clone());
            }
            scope.parent.clone()
        };
        match parent {
            Some(parent) => Environment::get(&parent, name, span),
            None => Err(undefined(name, span)),
        }
    }
}

fn undefined(name: &str, span: SourceSpan) -> NarcissusError {
    NarcissusError::from(
        Diagnostic::runtime(format!("undefined variable `{name}`")).with_span(span),
    )
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    pub mutable: bool,
}
