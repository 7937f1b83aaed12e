use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::expr::{Expr, FunctionExpr};
use crate::stmt::Stmt;
use crate::token::{Token, TokenType};
use crate::value::{LoxClass, LoxFunction, LoxInstance, Value};

/// Outcome of executing one statement.
///
/// `return`, `break` and `continue` travel up the statement-execution call
/// stack as ordinary values instead of host exceptions; block and loop
/// executors consume them.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Tree-walk evaluator.
///
/// Holds the `globals` frame (seeded with `clock`), the frame currently in
/// scope, the resolver's id→depth side-table, and the sink `print` writes to.
pub struct Interpreter<W: Write> {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<usize, usize>,
    output: W,
}

impl<W: Write> Interpreter<W> {
    pub fn new(output: W) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction {
                name: "clock".to_string(),
                arity: 0,
                func: clock_native,
            },
        );

        Interpreter {
            environment: globals.clone(),
            globals,
            locals: HashMap::new(),
            output,
        }
    }

    /// Resolver callback: this occurrence of a variable lives `depth` frames
    /// up the chain. Unrecorded occurrences are globals.
    pub fn note_local(&mut self, id: usize, depth: usize) {
        self.locals.insert(id, depth);
    }

    /// Depth recorded for a node id, if the occurrence resolved as a local.
    pub fn local_depth(&self, id: usize) -> Option<usize> {
        self.locals.get(&id).copied()
    }

    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        for stmt in statements {
            self.execute(stmt)?;
        }

        Ok(())
    }

    pub fn into_output(self) -> W {
        self.output
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement execution
    // ─────────────────────────────────────────────────────────────────────────

    pub fn execute(&mut self, stmt: &Stmt) -> Result<Signal> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(Signal::Normal)
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                writeln!(self.output, "{}", value)?;

                Ok(Signal::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value: Value = if let Some(expr) = initializer {
                    self.evaluate(expr)?
                } else {
                    Value::Nil
                };

                self.environment.borrow_mut().define(&name.lexeme, value);

                Ok(Signal::Normal)
            }

            Stmt::Block(statements) => {
                let environment = Rc::new(RefCell::new(Environment::with_enclosing(
                    self.environment.clone(),
                )));

                self.execute_block(statements, environment)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Signal::Normal)
                }
            }

            Stmt::Loop {
                condition,
                body,
                increment,
            } => {
                loop {
                    if !is_truthy(&self.evaluate(condition)?) {
                        break;
                    }

                    match self.execute(body)? {
                        Signal::Break => break,

                        Signal::Return(value) => return Ok(Signal::Return(value)),

                        // `continue` skips the rest of the body but still
                        // runs the increment of a desugared `for`.
                        Signal::Normal | Signal::Continue => {}
                    }

                    if let Some(increment) = increment {
                        self.evaluate(increment)?;
                    }
                }

                Ok(Signal::Normal)
            }

            Stmt::Return { value, .. } => {
                let value: Value = if let Some(expr) = value {
                    self.evaluate(expr)?
                } else {
                    Value::Nil
                };

                Ok(Signal::Return(value))
            }

            Stmt::Break { .. } => Ok(Signal::Break),

            Stmt::Continue { .. } => Ok(Signal::Continue),

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                self.execute_class(name, superclass.as_ref(), methods)?;

                Ok(Signal::Normal)
            }
        }
    }

    /// Run `statements` in `environment`, restoring the previous frame on
    /// every exit path, error or signal alike.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<Signal> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let mut signal = Signal::Normal;

        for stmt in statements {
            match self.execute(stmt) {
                Ok(Signal::Normal) => {}

                Ok(other) => {
                    signal = other;
                    break;
                }

                Err(e) => {
                    self.environment = previous;
                    return Err(e);
                }
            }
        }

        self.environment = previous;

        Ok(signal)
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionExpr>],
    ) -> Result<()> {
        let superclass_value: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),

                _ => {
                    return Err(LoxError::runtime(
                        name.line,
                        "Superclass must be a class.",
                    ));
                }
            },

            None => None,
        };

        // Two-step definition so methods can close over the class name.
        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Nil);

        // Methods close over an extra frame holding `super` when inheriting.
        let method_closure = if let Some(superclass) = &superclass_value {
            let environment = Rc::new(RefCell::new(Environment::with_enclosing(
                self.environment.clone(),
            )));

            environment
                .borrow_mut()
                .define("super", Value::Class(superclass.clone()));

            environment
        } else {
            self.environment.clone()
        };

        let mut method_map: HashMap<String, Rc<LoxFunction>> = HashMap::new();

        for method in methods {
            let method_name = method
                .name
                .as_ref()
                .map(|token| token.lexeme.clone())
                .unwrap_or_default();

            let function = LoxFunction {
                declaration: method.clone(),
                closure: method_closure.clone(),
                is_initializer: method_name == "init",
            };

            method_map.insert(method_name, Rc::new(function));
        }

        let class = Value::Class(Rc::new(LoxClass {
            name: name.lexeme.clone(),
            superclass: superclass_value,
            methods: method_map,
        }));

        self.environment
            .borrow_mut()
            .assign(&name.lexeme, class, name.line)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression evaluation
    // ─────────────────────────────────────────────────────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(token) => self.evaluate_literal(token),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_value = self.evaluate(left)?;

                // The result is the operand itself, never a coerced boolean.
                match operator.token_type {
                    TokenType::OR if is_truthy(&left_value) => Ok(left_value),

                    TokenType::AND if !is_truthy(&left_value) => Ok(left_value),

                    _ => self.evaluate(right),
                }
            }

            Expr::Variable { id, name } => self.lookup_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(depth) => Environment::assign_at(
                        &self.environment,
                        *depth,
                        &name.lexeme,
                        value.clone(),
                        name.line,
                    )?,

                    None => {
                        self.globals
                            .borrow_mut()
                            .assign(&name.lexeme, value.clone(), name.line)?;
                    }
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => self.evaluate_call(callee, paren, arguments),

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => LoxInstance::get(&instance, &name.lexeme)
                    .ok_or_else(|| {
                        LoxError::runtime(
                            name.line,
                            format!("Undefined property '{}'.", name.lexeme),
                        )
                    }),

                _ => Err(LoxError::runtime(
                    name.line,
                    "Only instances have properties.",
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    let value = self.evaluate(value)?;

                    instance.set(&name.lexeme, value.clone());

                    Ok(value)
                }

                _ => Err(LoxError::runtime(name.line, "Only instances have fields.")),
            },

            Expr::This { id, keyword } => self.lookup_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),

            Expr::Function(declaration) => {
                let function = Value::Function(Rc::new(LoxFunction {
                    declaration: declaration.clone(),
                    closure: self.environment.clone(),
                    is_initializer: false,
                }));

                // A named function expression also binds its name, so
                // recursive references resolve through the closure.
                if let Some(name) = &declaration.name {
                    self.environment
                        .borrow_mut()
                        .define(&name.lexeme, function.clone());
                }

                Ok(function)
            }
        }
    }

    fn lookup_variable(&self, id: usize, name: &Token) -> Result<Value> {
        match self.locals.get(&id) {
            Some(depth) => {
                Environment::get_at(&self.environment, *depth, &name.lexeme, name.line)
            }

            None => self.globals.borrow().get(&name.lexeme, name.line),
        }
    }

    fn evaluate_literal(&self, token: &Token) -> Result<Value> {
        match &token.token_type {
            TokenType::NUMBER(n) => Ok(Value::Number(*n)),

            TokenType::STRING(s) => Ok(Value::String(s.clone())),

            TokenType::TRUE => Ok(Value::Bool(true)),

            TokenType::FALSE => Ok(Value::Bool(false)),

            TokenType::NIL => Ok(Value::Nil),

            _ => Err(LoxError::runtime(token.line, "Invalid literal.")),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value> {
        let value: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match value {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operand must be a number.",
                )),
            },

            TokenType::BANG => Ok(Value::Bool(!is_truthy(&value))),

            _ => Err(LoxError::runtime(operator.line, "Invalid unary operator.")),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value> {
        // Operands evaluate left to right before the operator applies.
        let left_value: Value = self.evaluate(left)?;
        let right_value: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),

                // Mixed concatenation stringifies the number like `print`.
                (Value::String(a), Value::Number(b)) => {
                    Ok(Value::String(format!("{}{}", a, Value::Number(b))))
                }

                (Value::Number(a), Value::String(b)) => {
                    Ok(Value::String(format!("{}{}", Value::Number(a), b)))
                }

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be numbers or strings.",
                )),
            },

            TokenType::MINUS => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be numbers.",
                )),
            },

            TokenType::STAR => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be numbers.",
                )),
            },

            TokenType::SLASH => match (left_value, right_value) {
                // IEEE-754 semantics; dividing by zero yields an infinity.
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be numbers.",
                )),
            },

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_value == right_value)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left_value != right_value)),

            TokenType::LESS => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be numbers.",
                )),
            },

            TokenType::LESS_EQUAL => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be numbers.",
                )),
            },

            TokenType::GREATER => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be numbers.",
                )),
            },

            TokenType::GREATER_EQUAL => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be numbers.",
                )),
            },

            _ => Err(LoxError::runtime(operator.line, "Invalid binary operator.")),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calls, construction and method dispatch
    // ─────────────────────────────────────────────────────────────────────────

    fn evaluate_call(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> Result<Value> {
        let callee_value = self.evaluate(callee)?;

        let mut argument_values: Vec<Value> = Vec::with_capacity(arguments.len());

        for argument in arguments {
            argument_values.push(self.evaluate(argument)?);
        }

        match callee_value {
            Value::Function(function) => {
                check_arity(function.arity(), argument_values.len(), paren)?;

                self.call_function(&function, argument_values, paren.line)
            }

            Value::Class(class) => {
                check_arity(class.arity(), argument_values.len(), paren)?;

                self.instantiate(&class, argument_values, paren.line)
            }

            Value::NativeFunction { arity, func, .. } => {
                check_arity(arity, argument_values.len(), paren)?;

                func(&argument_values).map_err(|msg| LoxError::runtime(paren.line, msg))
            }

            _ => Err(LoxError::runtime(
                paren.line,
                "Can only call functions and classes.",
            )),
        }
    }

    /// Invoke a user function: parameters bind into a fresh frame chained on
    /// the closure, the body runs as a block, and a `Return` signal becomes
    /// the call's result. Initializers always yield `this`.
    pub fn call_function(
        &mut self,
        function: &LoxFunction,
        arguments: Vec<Value>,
        line: usize,
    ) -> Result<Value> {
        let mut environment = Environment::with_enclosing(function.closure.clone());

        for (param, argument) in function.declaration.params.iter().zip(arguments) {
            environment.define(&param.lexeme, argument);
        }

        let signal = self.execute_block(
            &function.declaration.body,
            Rc::new(RefCell::new(environment)),
        )?;

        if function.is_initializer {
            // `this` sits in the bound method's one-slot closure frame.
            return Environment::get_at(&function.closure, 0, "this", line);
        }

        match signal {
            Signal::Return(value) => Ok(value),

            _ => Ok(Value::Nil),
        }
    }

    fn instantiate(
        &mut self,
        class: &Rc<LoxClass>,
        arguments: Vec<Value>,
        line: usize,
    ) -> Result<Value> {
        let instance = Rc::new(LoxInstance::new(class.clone()));

        if let Some(initializer) = class.find_method("init") {
            let bound = initializer.bind(instance.clone());
            self.call_function(&bound, arguments, line)?;
        }

        Ok(Value::Instance(instance))
    }

    fn evaluate_super(&mut self, id: usize, keyword: &Token, method: &Token) -> Result<Value> {
        let depth = *self.locals.get(&id).ok_or_else(|| {
            LoxError::runtime(keyword.line, "Can't use 'super' outside of a class.")
        })?;

        let superclass = match Environment::get_at(
            &self.environment,
            depth,
            "super",
            keyword.line,
        )? {
            Value::Class(class) => class,

            _ => {
                return Err(LoxError::runtime(
                    keyword.line,
                    "Can't use 'super' in a class with no superclass.",
                ));
            }
        };

        // `this` lives one frame below the `super` frame.
        let instance = match Environment::get_at(
            &self.environment,
            depth - 1,
            "this",
            keyword.line,
        )? {
            Value::Instance(instance) => instance,

            _ => {
                return Err(LoxError::runtime(
                    keyword.line,
                    "Can't use 'super' outside of a method.",
                ));
            }
        };

        let resolved = superclass.find_method(&method.lexeme).ok_or_else(|| {
            LoxError::runtime(
                method.line,
                format!("Undefined property '{}'.", method.lexeme),
            )
        })?;

        Ok(Value::Function(Rc::new(resolved.bind(instance))))
    }
}

fn check_arity(expected: usize, got: usize, paren: &Token) -> Result<()> {
    if expected != got {
        return Err(LoxError::runtime(
            paren.line,
            format!("Expected {} arguments, got {}.", expected, got),
        ));
    }

    Ok(())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Nil => false,

        Value::Bool(b) => *b,

        _ => true,
    }
}

fn clock_native(_args: &[Value]) -> std::result::Result<Value, String> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("Clock error: {}", e))?
        .as_secs_f64();

    Ok(Value::Number(timestamp))
}
