// SPAK error handling framework
// Central location for the kernel-wide error taxonomy

//! Shared error contract for the SPAK crates.
//!
//! Concrete error enums live in their owning crates (`spak-compiler`,
//! `spak-engine`, ...); this crate pins down the taxonomy they classify
//! into, so callers can branch on [`ErrorClass`] without depending on every
//! producer.
//!
//! Two spec-level categories are deliberately absent: sandbox failures are
//! folded into the effect's result string and never surface as errors, and
//! verifier mismatches are returned as finding lists, not `Err` values.

use std::fmt;

pub use thiserror;

/// Error domains representing the components of the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorDomain {
    /// Spec compilation
    Compiler,
    /// Effect runtime and handlers
    Engine,
    /// Structural and dynamic verification
    Verifier,
    /// Interactive shell
    Shell,
}

impl fmt::Display for ErrorDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorDomain::Compiler => write!(f, "compiler"),
            ErrorDomain::Engine => write!(f, "engine"),
            ErrorDomain::Verifier => write!(f, "verifier"),
            ErrorDomain::Shell => write!(f, "shell"),
        }
    }
}

/// The kernel error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorClass {
    /// Malformed spec source; fatal to the operation, no AST is produced.
    Parse,
    /// No handler accepted an effect.
    UnhandledEffect,
    /// A handler accepted an effect but could not produce a result.
    HandlerFailure,
    /// An effect was performed with no ambient runtime installed; the
    /// condition carries the effect so a host can intercept and resume.
    EffectRequested,
    /// A synthesized artifact could not be found or loaded.
    ArtifactLoad,
    /// Underlying I/O failure.
    Io,
    /// A structurally invalid spec tree (duplicate names, bad arity).
    InvalidSpec,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Parse => write!(f, "parse"),
            ErrorClass::UnhandledEffect => write!(f, "unhandled-effect"),
            ErrorClass::HandlerFailure => write!(f, "handler-failure"),
            ErrorClass::EffectRequested => write!(f, "effect-requested"),
            ErrorClass::ArtifactLoad => write!(f, "artifact-load"),
            ErrorClass::Io => write!(f, "io"),
            ErrorClass::InvalidSpec => write!(f, "invalid-spec"),
        }
    }
}

/// Trait implemented by every SPAK error enum.
pub trait KernelError: std::error::Error {
    /// The component this error originates from.
    fn domain(&self) -> ErrorDomain;

    /// The taxonomy class this error belongs to.
    fn class(&self) -> ErrorClass;
}

/// Boxed kernel error for heterogeneous propagation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms_are_stable() {
        assert_eq!(ErrorDomain::Engine.to_string(), "engine");
        assert_eq!(ErrorClass::UnhandledEffect.to_string(), "unhandled-effect");
    }
}
