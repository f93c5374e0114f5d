// SPAK effect runtime

//! The algebraic effect runtime of the spec-driven agent kernel.
//!
//! Components interact with the outside world exclusively through
//! [`perform`]: an [`Effect`] value is dispatched to the ambient
//! [`Runtime`], which walks its handler chain newest-first and returns the
//! first non-declining handler's result. Synthesized AgentScript code
//! reaches the same path through the [`script`] module's effect builtins.
//!
//! Execution is single-threaded and cooperative: policies suspend only at
//! `perform`, handlers run synchronously on the calling thread, and the
//! [`ambient::AmbientGuard`] realizes the save-set-restore contract that
//! keeps recursion isolated.

pub mod agent;
pub mod ambient;
pub mod effect;
pub mod error;
pub mod handlers;
pub mod loader;
pub mod runtime;
pub mod script;

pub use agent::{Agent, AgentDescriptor, Policy, PolicyStep, StepOutcome};
pub use ambient::{ambient_runtime, perform, AmbientGuard};
pub use effect::{
    ChatMessage, CodeExecution, Effect, FileRead, FileWrite, LlmRequest, MathOperation, Message,
    SubTask, UserInput, UserOutput,
};
pub use error::{EffectRequest, EngineError, EngineResult, SuspensionToken};
pub use loader::{ArtifactLoader, ARTIFACT_EXT};
pub use runtime::{Handler, HandlerOutcome, Runtime, TraceEntry};
