use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::value::Value;

pub type Env = Rc<RefCell<Scope>>;

/// Lexical scope with a link to its enclosing scope.
#[derive(Default)]
pub struct Scope {
    vars: HashMap<String, Value>,
    parent: Option<Env>,
}

impl Scope {
    pub fn global() -> Env {
        Rc::new(RefCell::new(Scope::default()))
    }

    pub fn child(parent: &Env) -> Env {
        Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: Some(Rc::clone(parent)),
        }))
    }

    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn clear(&mut self) {
        self.vars.clear();
    }
}

pub fn lookup(env: &Env, name: &str) -> Option<Value> {
    let mut current = Rc::clone(env);
    loop {
        let next = {
            let scope = current.borrow();
            if let Some(value) = scope.vars.get(name) {
                return Some(value.clone());
            }
            scope.parent.clone()
        };
        current = next?;
    }
}

/// Rebinds an existing name in the nearest scope that defines it.
/// Returns the value back when no scope does.
pub fn assign(env: &Env, name: &str, value: Value) -> Result<(), Value> {
    let mut current = Rc::clone(env);
    loop {
        let next = {
            let mut scope = current.borrow_mut();
            if let Some(slot) = scope.vars.get_mut(name) {
                *slot = value;
                return Ok(());
            }
            scope.parent.clone()
        };
        match next {
            Some(parent) => current = parent,
            None => return Err(value),
        }
    }
}
