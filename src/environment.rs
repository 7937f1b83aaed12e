use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{LoxError, Result};
use crate::value::Value;

/// One frame of the lexical scope chain: a name table plus an optional link
/// to the enclosing frame. Frames are shared by reference; every function
/// value keeps its defining frame alive through its closure.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Insertion establishes the binding; re-defining an existing name in the
    /// same frame silently replaces it.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str, line: usize) -> Result<Value> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    /// Updates an existing binding, walking the chain upward. Never inserts.
    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<()> {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    /// Read a binding exactly `depth` frames up the chain. The resolver
    /// guarantees both the hop count and the presence of the name.
    pub fn get_at(
        env: &Rc<RefCell<Environment>>,
        depth: usize,
        name: &str,
        line: usize,
    ) -> Result<Value> {
        Self::ancestor(env, depth).borrow().values.get(name).cloned().ok_or_else(|| {
            LoxError::runtime(line, format!("Undefined variable '{}'.", name))
        })
    }

    /// Write a binding exactly `depth` frames up the chain.
    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        depth: usize,
        name: &str,
        value: Value,
        line: usize,
    ) -> Result<()> {
        let target = Self::ancestor(env, depth);
        let mut target = target.borrow_mut();

        if target.values.contains_key(name) {
            target.values.insert(name.to_string(), value);
            Ok(())
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    fn ancestor(env: &Rc<RefCell<Environment>>, depth: usize) -> Rc<RefCell<Environment>> {
        let mut current = env.clone();

        for _ in 0..depth {
            let next = current
                .borrow()
                .enclosing
                .clone()
                .expect("resolver recorded a depth deeper than the environment chain");
            current = next;
        }

        current
    }
}
