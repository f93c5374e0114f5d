// Effect kind tags used for handler routing

use std::fmt;

use serde::{Deserialize, Serialize};

/// The tag of an effect variant.
///
/// Handlers are selected by kind alone; payload content never participates
/// in routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// Request text generation from an LLM.
    Generate,
    /// Evaluate code in the restricted sandbox.
    ExecuteCode,
    /// Read a UTF-8 file.
    ReadFile,
    /// Write a UTF-8 file, creating parent directories.
    WriteFile,
    /// Binary arithmetic.
    Math,
    /// Pop one entry from the user input queue.
    Listen,
    /// Emit a message to the user.
    Reply,
    /// Send a directed or broadcast message on the bus.
    SendMessage,
    /// Spawn an isolated sub-agent.
    Recurse,
}

impl EffectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectKind::Generate => "Generate",
            EffectKind::ExecuteCode => "ExecuteCode",
            EffectKind::ReadFile => "ReadFile",
            EffectKind::WriteFile => "WriteFile",
            EffectKind::Math => "Math",
            EffectKind::Listen => "Listen",
            EffectKind::Reply => "Reply",
            EffectKind::SendMessage => "SendMessage",
            EffectKind::Recurse => "Recurse",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
