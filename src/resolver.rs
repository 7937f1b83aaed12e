//! Static resolution pass for the Lox interpreter.
//!
//! This module performs a single AST walk to:
//! 1. **Build lexical scopes**: maintains a stack of `HashMap<String, bool>`
//!    tracking declared (false) and fully defined (true) names in each nested
//!    block or function.
//! 2. **Enforce static rules**: reports errors such as redeclaration in the
//!    same scope, reading a variable in its own initializer, invalid `return`
//!    outside functions, `break`/`continue` outside loops, and illegal use of
//!    `this`/`super` outside of class methods.
//! 3. **Record binding distances**: for every variable occurrence
//!    (`Expr::Variable`, `Expr::Assign`, `Expr::This`, `Expr::Super`), calls
//!    back into the interpreter to note whether it is a local (and at what
//!    depth) or a global. This enables the runtime to perform O(1) lookups by
//!    climbing exactly the right number of environment frames.
//!
//! Errors go to the diagnostics sink and set `had_error`; the walk itself
//! never aborts, so one pass surfaces every scope-structural problem in the
//! program. The driver must not evaluate when `had_error` is set.

use std::collections::HashMap;
use std::io::Write;

use log::{debug, info};

use crate::error::{Diagnostics, LoxError};
use crate::expr::{Expr, FunctionExpr};
use crate::interpreter::Interpreter;
use crate::stmt::Stmt;
use crate::token::Token;

/// Are we inside a user function? Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ClassType {
    /// Not inside any class
    None,

    /// Inside a class declaration _without_ a superclass
    Class,

    /// Inside a class declaration _with_ a superclass
    Subclass,
}

/// Are we inside a loop body? Used to validate `break` and `continue`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum LoopType {
    None,
    Loop,
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances (locals vs. globals) by calling back into the interpreter.
pub struct Resolver<'a, W: Write> {
    interpreter: &'a mut Interpreter<W>,
    diagnostics: &'a mut Diagnostics,
    scopes: Vec<HashMap<String, bool>>, // false=declared, true=defined
    current_function: FunctionType,
    current_class: ClassType,
    current_loop: LoopType,
}

impl<'a, W: Write> Resolver<'a, W> {
    /// Create a new resolver bound to the given interpreter and sink.
    pub fn new(interpreter: &'a mut Interpreter<W>, diagnostics: &'a mut Diagnostics) -> Self {
        info!("Resolver instantiated");
        Resolver {
            interpreter,
            diagnostics,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            current_loop: LoopType::None,
        }
    }

    /// Walk all top-level statements.
    pub fn resolve(&mut self, statements: &[Stmt]) {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                // 1. Declare & define the class name so method bodies can
                //    refer to it.
                self.declare(name);
                self.define(name);

                // 2. Self-inheritance guard.
                if let Some(Expr::Variable {
                    name: super_name, ..
                }) = superclass
                {
                    if super_name.lexeme == name.lexeme {
                        self.diagnostics.report(&LoxError::resolve(
                            super_name,
                            "A class can't inherit from itself.",
                        ));
                    }
                }

                // 3. Save and enter the class context.
                let enclosing_class: ClassType = self.current_class;

                self.current_class = if superclass.is_some() {
                    ClassType::Subclass
                } else {
                    ClassType::Class
                };

                // 4. If there is a superclass, resolve it and open the
                //    synthetic scope that binds `super`.
                if let Some(superclass) = superclass {
                    self.resolve_expr(superclass);

                    self.begin_scope();
                    self.scope_insert("super", true);
                }

                // 5. Open the implicit `this` scope for methods.
                self.begin_scope();
                self.scope_insert("this", true);

                // 6. Resolve each method in its own function context.
                for method in methods {
                    let kind = match &method.name {
                        Some(token) if token.lexeme == "init" => FunctionType::Initializer,
                        _ => FunctionType::Method,
                    };

                    self.resolve_function(kind, method);
                }

                // 7. Close the `this` scope, then the `super` scope if we
                //    opened one.
                self.end_scope();

                if superclass.is_some() {
                    self.end_scope();
                }

                // 8. Restore the outer class context.
                self.current_class = enclosing_class;
            }

            Stmt::Block(statements) => {
                // 1. Push a new anonymous scope for `{ ... }`.
                self.begin_scope();

                for s in statements {
                    self.resolve_stmt(s);
                }

                // 2. Pop the block scope.
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // 1. Declare the variable name (marked but not yet defined).
                self.declare(name);

                // 2. Resolve the initializer expression, if any. The order
                //    guarantees the self-reference error.
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }

                // 3. Define the variable so it is readable in this scope.
                self.define(name);
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);

                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::Loop {
                condition,
                body,
                increment,
            } => {
                // 1. Resolve the condition outside the loop context.
                self.resolve_expr(condition);

                // 2. The body may `break`/`continue`.
                let enclosing_loop = self.current_loop;
                self.current_loop = LoopType::Loop;

                self.resolve_stmt(body);

                self.current_loop = enclosing_loop;

                // 3. The increment of a desugared `for`.
                if let Some(increment) = increment {
                    self.resolve_expr(increment);
                }
            }

            Stmt::Return { keyword, value } => {
                // 1. Ensure we are inside a function or method at all.
                if self.current_function == FunctionType::None {
                    self.diagnostics.report(&LoxError::resolve(
                        keyword,
                        "Can't return from top-level code.",
                    ));
                }

                // 2. In an initializer, only a bare `return;` is allowed; it
                //    yields `this`.
                if self.current_function == FunctionType::Initializer && value.is_some() {
                    self.diagnostics.report(&LoxError::resolve(
                        keyword,
                        "Can't return a value from an initializer.",
                    ));
                }

                if let Some(expr) = value {
                    self.resolve_expr(expr);
                }
            }

            Stmt::Break { keyword } => {
                if self.current_loop == LoopType::None {
                    self.diagnostics.report(&LoxError::resolve(
                        keyword,
                        "Can't use 'break' outside of a loop.",
                    ));
                }
            }

            Stmt::Continue { keyword } => {
                if self.current_loop == LoopType::None {
                    self.diagnostics.report(&LoxError::resolve(
                        keyword,
                        "Can't use 'continue' outside of a loop.",
                    ));
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {
                // Literals have no sub-expressions.
            }

            Expr::Grouping(inner) => {
                self.resolve_expr(inner);
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right);
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable { id, name } => {
                // 1. Prevent reading a variable in its own initializer.
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.diagnostics.report(&LoxError::resolve(
                            name,
                            "Variable cannot be accessed from its own initializer",
                        ));
                    }
                }

                // 2. Bind this variable occurrence at its lexical depth.
                self.resolve_local(*id, name);
            }

            Expr::Assign { id, name, value } => {
                // Resolve the right-hand side first, then bind the target.
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);

                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            Expr::Get { object, .. } => {
                self.resolve_expr(object);
            }

            Expr::Set { object, value, .. } => {
                self.resolve_expr(object);
                self.resolve_expr(value);
            }

            Expr::This { id, keyword } => {
                // `this` is only valid inside class methods.
                if self.current_class == ClassType::None {
                    self.diagnostics.report(&LoxError::resolve(
                        keyword,
                        "Can't use 'this' outside of a class.",
                    ));
                    return;
                }

                self.resolve_local(*id, keyword);
            }

            Expr::Super { id, keyword, .. } => {
                // 1. Disallow outside any class.
                if self.current_class == ClassType::None {
                    self.diagnostics.report(&LoxError::resolve(
                        keyword,
                        "Can't use 'super' outside of a class.",
                    ));
                    return;
                }

                // 2. Disallow in a class with no superclass.
                if self.current_class != ClassType::Subclass {
                    self.diagnostics.report(&LoxError::resolve(
                        keyword,
                        "Can't use 'super' in a class with no superclass.",
                    ));
                    return;
                }

                // 3. Valid. Bind 'super' like a local variable.
                self.resolve_local(*id, keyword);
            }

            Expr::Function(declaration) => {
                // A named function expression binds its name in the current
                // scope, visible to its own body for recursion.
                if let Some(name) = &declaration.name {
                    self.declare(name);
                    self.define(name);
                }

                self.resolve_function(FunctionType::Function, declaration);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body.
    ///
    /// `kind` distinguishes plain functions from methods and initializers.
    /// The loop context resets here: `break` cannot cross a function
    /// boundary.
    fn resolve_function(&mut self, kind: FunctionType, declaration: &FunctionExpr) {
        // 1. Save the enclosing contexts so we can restore them later.
        let enclosing_function = self.current_function;
        let enclosing_loop = self.current_loop;

        self.current_function = kind;
        self.current_loop = LoopType::None;

        // 2. Begin a new lexical scope for the parameters & body.
        self.begin_scope();

        // 3. Declare and immediately define each parameter.
        for param in &declaration.params {
            self.declare(param);
            self.define(param);
        }

        // 4. Resolve the body under the current context.
        for stmt in &declaration.body {
            self.resolve_stmt(stmt);
        }

        // 5. Pop the parameter/body scope and restore contexts.
        self.end_scope();

        self.current_function = enclosing_function;
        self.current_loop = enclosing_loop;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn scope_insert(&mut self, name: &str, defined: bool) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), defined);
        }
    }

    fn declare(&mut self, name: &Token) {
        // Globals are not tracked here; an unfound name is assumed global at
        // evaluation time.
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                self.diagnostics.report(&LoxError::resolve(
                    name,
                    "Already a variable with this name in this scope.",
                ));
            }

            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding-distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as either a local at depth `d`, or a global if
    /// not found in any scope.
    fn resolve_local(&mut self, id: usize, name: &Token) {
        // Search each scope from innermost outward.
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                self.interpreter.note_local(id, depth);
                return;
            }
        }

        // Not found in any scope: it's a global.
        debug!("Resolved '{}' as global", name.lexeme);
    }
}
