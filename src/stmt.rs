use std::rc::Rc;

use crate::expr::{Expr, FunctionExpr};
use crate::token::Token;

#[derive(Debug, Clone)]
pub enum Stmt {
    Expression(Expr),

    Print(Expr),

    Var {
        name: Token,
        initializer: Option<Expr>,
    },

    Block(Vec<Stmt>),

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    // Both `while` and the desugared `for`. The increment lives on the loop
    // node, not in the body, so `continue` still executes it.
    Loop {
        condition: Expr,
        body: Box<Stmt>,
        increment: Option<Expr>,
    },

    Return {
        keyword: Token,
        value: Option<Expr>,
    },

    Break {
        keyword: Token,
    },

    Continue {
        keyword: Token,
    },

    Class {
        name: Token,
        // Always an `Expr::Variable` naming the superclass.
        superclass: Option<Expr>,
        methods: Vec<Rc<FunctionExpr>>,
    },
}
