// AgentScript: the restricted artifact and sandbox language

//! The small scripting language synthesized component artifacts are written
//! in, and the restricted evaluation substrate behind the `ExecuteCode`
//! effect.
//!
//! One language serves both roles: the structural verifier parses artifacts
//! with [`parser`], the dynamic verifier and the recursion handler execute
//! component methods through [`ComponentInstance`], and the code handler
//! evaluates snippets with [`run_snippet`]. Effect builtins (`llm`, `math`,
//! `read_file`, ...) bridge into `perform`, which is how in-process
//! synthesized code reaches the ambient runtime.
//!
//! Restriction model: imports are limited to a safe module allowlist,
//! attribute access is guarded (method calls on known receiver shapes only),
//! item access and iteration are bounds- and type-checked, and `print`
//! output is captured, never written to the process stdout.

pub mod ast;
pub mod interp;
pub mod parser;

use thiserror::Error;

pub use ast::{ComponentDecl, MethodDecl, ScriptFile, Stmt};
pub use interp::{run_snippet, ComponentInstance, Module, Session, DEFAULT_OUTPUT_BUDGET};

/// Error raised while compiling or evaluating AgentScript.
///
/// The `Parse` and `Restricted` variants are the "compile" class folded into
/// `Compilation Error:` result strings; everything else is the runtime
/// class.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    Restricted(String),

    #[error("unknown name '{0}'")]
    UnknownName(String),

    #[error("{method}() got an unexpected argument '{name}'")]
    UnknownArgument { method: String, name: String },

    #[error("{method}() missing required argument '{name}'")]
    MissingArgument { method: String, name: String },

    #[error("{method}() takes {expected} argument(s) but {got} were given")]
    ArityMismatch {
        method: String,
        expected: usize,
        got: usize,
    },

    #[error("{0}")]
    Type(String),

    #[error("{0}")]
    Index(String),

    #[error("{0}")]
    Attribute(String),

    /// An effect performed by the script failed or went unhandled.
    #[error("{0}")]
    Effect(String),

    #[error("execution timed out")]
    Timeout,
}

impl ScriptError {
    /// Compile-class errors are rendered as `Compilation Error: ...`.
    pub fn is_compile(&self) -> bool {
        matches!(self, ScriptError::Parse(_) | ScriptError::Restricted(_))
    }

    /// True for the argument-binding failures that indicate the *caller*
    /// (typically a test vector) is invoking a method incorrectly.
    pub fn is_bad_invocation(&self) -> bool {
        matches!(
            self,
            ScriptError::UnknownArgument { .. }
                | ScriptError::MissingArgument { .. }
                | ScriptError::ArityMismatch { .. }
        )
    }
}

impl ScriptFile {
    /// Parse and apply the compile-time restriction walk.
    pub fn compile(source: &str) -> Result<ScriptFile, ScriptError> {
        let file = parser::parse_script(source)?;
        check_restrictions(&file)?;
        Ok(file)
    }
}

/// Reject imports outside the safe module allowlist, wherever they appear.
fn check_restrictions(file: &ScriptFile) -> Result<(), ScriptError> {
    check_stmts(&file.statements)?;
    for component in &file.components {
        for method in &component.methods {
            check_stmts(&method.body)?;
        }
    }
    Ok(())
}

fn check_stmts(stmts: &[Stmt]) -> Result<(), ScriptError> {
    for stmt in stmts {
        match stmt {
            Stmt::Import(name) => {
                if Module::from_name(name).is_none() {
                    return Err(ScriptError::Restricted(format!(
                        "import of '{}' is not permitted",
                        name
                    )));
                }
            }
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                check_stmts(then_branch)?;
                if let Some(else_branch) = else_branch {
                    check_stmts(else_branch)?;
                }
            }
            Stmt::For { body, .. } => check_stmts(body)?,
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowlisted_imports_compile() {
        assert!(ScriptFile::compile("import re\nimport math\nimport json").is_ok());
    }

    #[test]
    fn disallowed_import_is_restricted() {
        let err = ScriptFile::compile("import os; os.system('rm -rf /')").unwrap_err();
        assert!(matches!(err, ScriptError::Restricted(_)));
        assert!(err.is_compile());
        assert!(err.to_string().contains("'os'"));
    }

    #[test]
    fn nested_imports_are_checked() {
        let source = r#"
            component Sneaky {
                fn run() {
                    if true {
                        import subprocess
                    }
                }
            }
        "#;
        assert!(ScriptFile::compile(source).is_err());
    }

    #[test]
    fn bad_invocation_classification() {
        let err = ScriptError::MissingArgument {
            method: "calculate".to_string(),
            name: "a".to_string(),
        };
        assert!(err.is_bad_invocation());
        assert!(!ScriptError::UnknownName("x".to_string()).is_bad_invocation());
    }
}
