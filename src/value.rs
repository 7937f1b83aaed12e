use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::environment::Environment;
use crate::expr::FunctionExpr;

/// A Lox runtime value.
///
/// `Nil`, booleans, numbers and strings compare by value; functions, classes
/// and instances compare by identity.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Function(Rc<LoxFunction>),
    Class(Rc<LoxClass>),
    Instance(Rc<LoxInstance>),
    NativeFunction {
        name: String,
        arity: usize,
        func: fn(&[Value]) -> std::result::Result<Value, String>,
    },
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,

            (Value::Bool(a), Value::Bool(b)) => a == b,

            (Value::Number(a), Value::Number(b)) => a == b,

            (Value::String(a), Value::String(b)) => a == b,

            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),

            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),

            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),

            (
                Value::NativeFunction { func: a, .. },
                Value::NativeFunction { func: b, .. },
            ) => *a as usize == *b as usize,

            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),

            Value::Bool(b) => write!(f, "{}", b),

            // Rust's f64 Display is the shortest round-trip form and prints
            // integer-valued doubles without a trailing `.0`.
            Value::Number(n) => write!(f, "{}", n),

            Value::String(s) => write!(f, "{}", s),

            Value::Function(fun) => match &fun.declaration.name {
                Some(name) => write!(f, "<fn {}>", name.lexeme),
                None => write!(f, "<fn>"),
            },

            Value::Class(class) => write!(f, "<class {}>", class.name),

            Value::Instance(instance) => write!(f, "<instance of {}>", instance.class.name),

            Value::NativeFunction { name, .. } => write!(f, "<native fn {}>", name),
        }
    }
}

/// A user function value: the shared declaration plus the environment
/// captured at its definition site.
pub struct LoxFunction {
    pub declaration: Rc<FunctionExpr>,
    pub closure: Rc<RefCell<Environment>>,
    pub is_initializer: bool,
}

impl LoxFunction {
    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// Rebind this method to an instance: a fresh one-slot environment
    /// defining `this`, chained onto the original closure.
    pub fn bind(&self, instance: Rc<LoxInstance>) -> LoxFunction {
        let mut environment = Environment::with_enclosing(self.closure.clone());
        environment.define("this", Value::Instance(instance));

        LoxFunction {
            declaration: self.declaration.clone(),
            closure: Rc::new(RefCell::new(environment)),
            is_initializer: self.is_initializer,
        }
    }
}

impl fmt::Debug for LoxFunction {
    // The closure chain can reach back to this function; print the name only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.declaration.name {
            Some(name) => write!(f, "LoxFunction({})", name.lexeme),
            None => write!(f, "LoxFunction(<anonymous>)"),
        }
    }
}

pub struct LoxClass {
    pub name: String,
    pub superclass: Option<Rc<LoxClass>>,
    pub methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    /// Look up a method here or anywhere up the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.clone());
        }

        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    /// Calling a class runs `init` when present, so the class arity is the
    /// initializer's arity.
    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }
}

impl fmt::Debug for LoxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LoxClass({})", self.name)
    }
}

pub struct LoxInstance {
    pub class: Rc<LoxClass>,
    pub fields: RefCell<HashMap<String, Value>>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        LoxInstance {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    /// Property access: fields shadow methods; a method comes out bound to
    /// the receiving instance.
    pub fn get(instance: &Rc<LoxInstance>, name: &str) -> Option<Value> {
        if let Some(value) = instance.fields.borrow().get(name) {
            return Some(value.clone());
        }

        instance
            .class
            .find_method(name)
            .map(|method| Value::Function(Rc::new(method.bind(instance.clone()))))
    }

    pub fn set(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }
}

impl fmt::Debug for LoxInstance {
    // Field values can refer back to this instance; print the class only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LoxInstance({})", self.class.name)
    }
}
