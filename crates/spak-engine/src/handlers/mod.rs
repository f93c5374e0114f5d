// Built-in effect handlers

//! The kernel's built-in handler set.
//!
//! Each handler declares the effect kinds it accepts through `can_handle`
//! and declines everything else, so hosts can mix and match capabilities per
//! runtime. Registration order is priority order: a later registration
//! overlays an earlier one for the kinds it accepts.

pub mod code;
pub mod fs;
pub mod llm;
pub mod math;
pub mod message;
pub mod recurse;
pub mod user;

pub use code::CodeHandler;
pub use fs::FileSystemHandler;
pub use llm::{CompletionProvider, LlmHandler, ScriptedProvider};
pub use math::MathHandler;
pub use message::MessageBusHandler;
pub use recurse::RecursionHandler;
pub use user::UserInteractionHandler;
