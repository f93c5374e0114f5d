// AISpec compiler for the SPAK kernel

//! Compiles AISpec source text into a typed [`SystemSpec`].
//!
//! The pipeline is the classical two stages: [`parser`] turns source text
//! into a positioned parse tree, and [`transform`] folds the tree into the
//! AST value, enforcing its structural invariants. [`canon`] is the inverse
//! direction, rendering a spec back into canonical source.
//!
//! On failure a [`ParseError`] carries the file path (when known), line,
//! column, and the offending token; no partial AST is ever returned.

use std::path::{Path, PathBuf};

use thiserror::Error;

use spak_error::{ErrorClass, ErrorDomain, KernelError};
use spak_types::SystemSpec;

pub mod canon;
pub mod lexer;
pub mod parser;
pub mod transform;

pub use canon::write_system;

/// Error raised while compiling AISpec source.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// Lexical failure: illegal character, unterminated string or comment.
    #[error("{}: {message}", location(.path, .line, .column))]
    Lex {
        path: Option<PathBuf>,
        line: u32,
        column: u32,
        message: String,
    },

    /// A token that does not fit the grammar.
    #[error("{}: unexpected token {token}, expected {expected}", location(.path, .line, .column))]
    Syntax {
        path: Option<PathBuf>,
        line: u32,
        column: u32,
        token: String,
        expected: String,
    },

    /// A well-formed parse tree that violates an AST invariant.
    #[error("{}: {message}", location(.path, .line, .column))]
    Invalid {
        path: Option<PathBuf>,
        line: u32,
        column: u32,
        message: String,
    },

    /// The spec file could not be read.
    #[error("failed to read spec file {path}: {message}")]
    Io { path: PathBuf, message: String },
}

fn location(path: &Option<PathBuf>, line: &u32, column: &u32) -> String {
    match path {
        Some(path) => format!("{}:{}:{}", path.display(), line, column),
        None => format!("line {}, column {}", line, column),
    }
}

impl ParseError {
    /// Attach the source file path to a position-carrying error.
    pub fn with_path(mut self, file: &Path) -> Self {
        match &mut self {
            ParseError::Lex { path, .. }
            | ParseError::Syntax { path, .. }
            | ParseError::Invalid { path, .. } => {
                *path = Some(file.to_path_buf());
            }
            ParseError::Io { .. } => {}
        }
        self
    }

    /// 1-based source position, when the error carries one.
    pub fn position(&self) -> Option<(u32, u32)> {
        match self {
            ParseError::Lex { line, column, .. }
            | ParseError::Syntax { line, column, .. }
            | ParseError::Invalid { line, column, .. } => Some((*line, *column)),
            ParseError::Io { .. } => None,
        }
    }
}

impl KernelError for ParseError {
    fn domain(&self) -> ErrorDomain {
        ErrorDomain::Compiler
    }

    fn class(&self) -> ErrorClass {
        match self {
            ParseError::Lex { .. } | ParseError::Syntax { .. } => ErrorClass::Parse,
            ParseError::Invalid { .. } => ErrorClass::InvalidSpec,
            ParseError::Io { .. } => ErrorClass::Io,
        }
    }
}

/// The AISpec compiler front door.
#[derive(Debug, Default)]
pub struct Compiler;

impl Compiler {
    pub fn new() -> Self {
        Self
    }

    /// Parse then transform: source text to a [`SystemSpec`].
    pub fn compile(&self, source: &str) -> Result<SystemSpec, ParseError> {
        let tree = parser::parse(source)?;
        transform::lower(tree)
    }

    /// Read a spec file and compile it; errors carry the path.
    pub fn compile_file(&self, path: &Path) -> Result<SystemSpec, ParseError> {
        let source = std::fs::read_to_string(path).map_err(|e| ParseError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "compiling spec file");
        self.compile(&source).map_err(|e| e.with_path(path))
    }

    /// Parse only, discarding the tree. Transformer validation is not
    /// consulted.
    pub fn validate_syntax(&self, source: &str) -> bool {
        parser::parse(source).is_ok()
    }
}
