// Engine error types

use thiserror::Error;
use uuid::Uuid;

use spak_compiler::ParseError;
use spak_error::{ErrorClass, ErrorDomain, KernelError};
use spak_types::EffectKind;

use crate::effect::Effect;

/// Unique identifier for a suspended computation awaiting an effect result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SuspensionToken(Uuid);

impl SuspensionToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SuspensionToken {
    fn default() -> Self {
        Self::new()
    }
}

/// The effect-unhandled condition: an effect was performed with no ambient
/// runtime installed. A host that drives policies itself can intercept this,
/// perform the effect out-of-band, and resume the suspended policy with the
/// result on its next `step`.
#[derive(Debug)]
pub struct EffectRequest {
    pub effect: Effect,
    pub token: SuspensionToken,
}

impl EffectRequest {
    pub fn new(effect: Effect) -> Self {
        Self {
            effect,
            token: SuspensionToken::new(),
        }
    }
}

/// Error types for effect runtime operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Every handler in the chain declined the effect.
    #[error("Unhandled Effect: {0}")]
    UnhandledEffect(EffectKind),

    /// A handler accepted the effect but could not produce a result.
    #[error("handler failure: {0}")]
    Handler(String),

    /// No ambient runtime was installed when the effect was performed.
    #[error("no ambient runtime installed; {} effect requested", .0.effect.kind())]
    Requested(Box<EffectRequest>),

    /// A synthesized artifact could not be found, read, or compiled.
    #[error("artifact error: {0}")]
    ArtifactLoad(String),

    /// A sub-agent spec failed to compile during recursion.
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("io error: {0}")]
    Io(String),
}

impl EngineError {
    pub fn handler(message: impl Into<String>) -> Self {
        EngineError::Handler(message.into())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e.to_string())
    }
}

impl KernelError for EngineError {
    fn domain(&self) -> ErrorDomain {
        ErrorDomain::Engine
    }

    fn class(&self) -> ErrorClass {
        match self {
            EngineError::UnhandledEffect(_) => ErrorClass::UnhandledEffect,
            EngineError::Handler(_) => ErrorClass::HandlerFailure,
            EngineError::Requested(_) => ErrorClass::EffectRequested,
            EngineError::ArtifactLoad(_) => ErrorClass::ArtifactLoad,
            EngineError::Parse(e) => e.class(),
            EngineError::Io(_) => ErrorClass::Io,
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{Effect, MathOperation};

    #[test]
    fn suspension_tokens_are_unique() {
        assert_ne!(SuspensionToken::new(), SuspensionToken::new());
    }

    #[test]
    fn unhandled_effect_names_the_kind() {
        let err = EngineError::UnhandledEffect(EffectKind::Generate);
        assert_eq!(err.to_string(), "Unhandled Effect: Generate");
    }

    #[test]
    fn requested_carries_the_effect() {
        let request = EffectRequest::new(Effect::Math(MathOperation::new("add", 1.0, 2.0)));
        let err = EngineError::Requested(Box::new(request));
        match &err {
            EngineError::Requested(request) => {
                assert_eq!(request.effect.kind(), EffectKind::Math)
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
