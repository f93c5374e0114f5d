// Effect definitions
// The tagged effect variants pre-declared by the kernel, with their payloads.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use spak_types::EffectKind;

/// One turn of an LLM conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Payload of `Generate`: a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmRequest {
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub stop: Option<Vec<String>>,
}

impl LlmRequest {
    /// A single-turn user prompt.
    pub fn prompt(content: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(content)],
            model: None,
            stop: None,
        }
    }
}

fn default_timeout() -> u64 {
    5
}

/// Payload of `ExecuteCode`: a sandboxed evaluation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeExecution {
    pub code: String,
    /// Wall-clock budget in seconds; enforcement is the handler's duty.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl CodeExecution {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRead {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileWrite {
    pub path: PathBuf,
    pub content: String,
}

/// Payload of `Math`: a binary arithmetic request.
///
/// `op` stays an open string so unknown operations can reach the handler
/// and fail there, rather than being unrepresentable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MathOperation {
    pub op: String,
    pub a: f64,
    pub b: f64,
}

impl MathOperation {
    pub fn new(op: impl Into<String>, a: f64, b: f64) -> Self {
        Self {
            op: op.into(),
            a,
            b,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInput {
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOutput {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub recipient: Option<String>,
    pub content: String,
    #[serde(default)]
    pub broadcast: bool,
}

/// Payload of `Recurse`: a task for an isolated sub-agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTask {
    pub query: String,
    pub spec_path: Option<PathBuf>,
    #[serde(default)]
    pub context: String,
}

/// A request-for-capability value, resolved by handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// Request text generation from an LLM; resolves to text.
    Generate(LlmRequest),
    /// Evaluate code in the restricted sandbox; resolves to text.
    ExecuteCode(CodeExecution),
    /// Read a UTF-8 file; resolves to its contents.
    ReadFile(FileRead),
    /// Write a UTF-8 file; resolves to unit.
    WriteFile(FileWrite),
    /// Binary arithmetic; resolves to a number.
    Math(MathOperation),
    /// Pop one queued user input; resolves to text.
    Listen(UserInput),
    /// Emit a message to the user; resolves to text.
    Reply(UserOutput),
    /// Directed or broadcast bus message; resolves to text.
    SendMessage(Message),
    /// Spawn an isolated sub-agent; resolves to its result as text.
    Recurse(SubTask),
}

impl Effect {
    pub fn kind(&self) -> EffectKind {
        match self {
            Effect::Generate(_) => EffectKind::Generate,
            Effect::ExecuteCode(_) => EffectKind::ExecuteCode,
            Effect::ReadFile(_) => EffectKind::ReadFile,
            Effect::WriteFile(_) => EffectKind::WriteFile,
            Effect::Math(_) => EffectKind::Math,
            Effect::Listen(_) => EffectKind::Listen,
            Effect::Reply(_) => EffectKind::Reply,
            Effect::SendMessage(_) => EffectKind::SendMessage,
            Effect::Recurse(_) => EffectKind::Recurse,
        }
    }

    /// Short payload rendering recorded in the runtime trace.
    pub fn payload_summary(&self) -> String {
        let text = match self {
            Effect::Generate(req) => req
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default(),
            Effect::ExecuteCode(exec) => exec.code.clone(),
            Effect::ReadFile(read) => read.path.display().to_string(),
            Effect::WriteFile(write) => write.path.display().to_string(),
            Effect::Math(op) => format!("{}({}, {})", op.op, op.a, op.b),
            Effect::Listen(input) => input.prompt.clone().unwrap_or_default(),
            Effect::Reply(output) => output.message.clone(),
            Effect::SendMessage(message) => message.content.clone(),
            Effect::Recurse(task) => task.query.clone(),
        };
        truncate(&text, 80)
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let head: String = text.chars().take(limit).collect();
    format!("{}...", head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_variants() {
        assert_eq!(
            Effect::Math(MathOperation::new("add", 1.0, 2.0)).kind(),
            EffectKind::Math
        );
        assert_eq!(
            Effect::Listen(UserInput::default()).kind(),
            EffectKind::Listen
        );
    }

    #[test]
    fn summaries_are_truncated() {
        let long = "x".repeat(200);
        let effect = Effect::ExecuteCode(CodeExecution::new(long));
        assert!(effect.payload_summary().chars().count() <= 83);
    }
}
