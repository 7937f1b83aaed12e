//! Centralised error hierarchy for the **Lox interpreter**.
//!
//! All subsystems (scanner, parser, resolver, runtime, CLI) convert their
//! internal failure modes into one of the variants defined here. This enables
//! a uniform `Result<T>` alias throughout the crate and ergonomic
//! inter-operation with `anyhow`, while still preserving rich diagnostic
//! detail.
//!
//! The module does not print diagnostics itself; [`Diagnostics`] is the sink
//! that renders errors and owns the sticky `had_error` / `had_runtime_error`
//! flags the driver consults for its exit code.

use std::io;

use log::{debug, info};
use thiserror::Error;

use crate::token::{Token, TokenType};

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human-readable description.
        message: String,

        /// 1-based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error, anchored to the offending token.
    #[error("[line {line}] Error {location}: {message}")]
    Parse {
        message: String,
        line: usize,
        /// `at 'lexeme'`, or `at end` for the EOF token.
        location: String,
    },

    /// Static-analysis or resolution failure (e.g. early-binding errors).
    #[error("[line {line}] Error {location}: {message}")]
    Resolve {
        message: String,
        line: usize,
        location: String,
    },

    /// Runtime evaluation error.
    #[error("{message}\n[line {line}]")]
    Runtime { message: String, line: usize },

    /// Wrapper around `std::io::Error` (transparent). Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating Parse error: line={}, msg={}",
            token.line, message
        );

        LoxError::Parse {
            message,
            line: token.line,
            location: location_of(token),
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating Resolve error: line={}, msg={}",
            token.line, message
        );

        LoxError::Resolve {
            message,
            line: token.line,
            location: location_of(token),
        }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Runtime error: line={}, msg={}", line, message);

        LoxError::Runtime { message, line }
    }
}

fn location_of(token: &Token) -> String {
    if token.token_type == TokenType::EOF {
        "at end".to_string()
    } else {
        format!("at '{}'", token.lexeme)
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;

/// Diagnostics sink threaded explicitly through the pipeline.
///
/// Static errors (lex/parse/resolve) set `had_error`; runtime errors set
/// `had_runtime_error`. The REPL clears the flags between lines while the
/// interpreter keeps its global bindings.
#[derive(Debug, Default)]
pub struct Diagnostics {
    had_error: bool,
    had_runtime_error: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render the error to stderr and set the matching sticky flag.
    pub fn report(&mut self, error: &LoxError) {
        debug!("Reporting diagnostic: {}", error);

        eprintln!("{}", error);

        match error {
            LoxError::Runtime { .. } => self.had_runtime_error = true,
            _ => self.had_error = true,
        }
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    pub fn clear(&mut self) {
        self.had_error = false;
        self.had_runtime_error = false;
    }
}
