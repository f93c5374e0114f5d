// LLM handler
// Translates Generate effects into provider completions.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::Arc;

use spak_types::Value;

use crate::effect::{ChatMessage, Effect};
use crate::error::{EngineError, EngineResult};
use crate::runtime::{Handler, HandlerOutcome};

/// The seam behind which real provider wiring lives.
///
/// A provider receives the resolved model name, the full message list, and
/// optional stop sequences, and returns the textual content of the first
/// completion.
pub trait CompletionProvider: Debug {
    fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        stop: Option<&[String]>,
    ) -> EngineResult<String>;
}

/// Deterministic provider: answers from a queue of canned completions.
///
/// Used by the dynamic verifier and tests; an exhausted queue is a handler
/// failure so forgotten seeds surface loudly.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    responses: RefCell<VecDeque<String>>,
}

impl ScriptedProvider {
    pub fn new(responses: impl IntoIterator<Item = String>) -> Self {
        Self {
            responses: RefCell::new(responses.into_iter().collect()),
        }
    }

    /// Queue one more canned completion.
    pub fn push(&self, response: impl Into<String>) {
        self.responses.borrow_mut().push_back(response.into());
    }
}

impl CompletionProvider for ScriptedProvider {
    fn complete(
        &self,
        _model: &str,
        _messages: &[ChatMessage],
        _stop: Option<&[String]>,
    ) -> EngineResult<String> {
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| EngineError::handler("scripted provider has no completion queued"))
    }
}

/// Accepts `Generate`. Provider selection and the default model are fixed at
/// construction.
#[derive(Debug)]
pub struct LlmHandler {
    provider: Arc<dyn CompletionProvider>,
    default_model: String,
}

impl LlmHandler {
    pub fn new(provider: Arc<dyn CompletionProvider>, default_model: impl Into<String>) -> Self {
        Self {
            provider,
            default_model: default_model.into(),
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }
}

impl Handler for LlmHandler {
    fn name(&self) -> &'static str {
        "llm"
    }

    fn can_handle(&self, effect: &Effect) -> bool {
        matches!(effect, Effect::Generate(_))
    }

    fn handle(&self, effect: &Effect) -> EngineResult<HandlerOutcome> {
        let Effect::Generate(request) = effect else {
            return Ok(HandlerOutcome::Declined);
        };
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        tracing::debug!(model, messages = request.messages.len(), "completing");
        let content =
            self.provider
                .complete(model, &request.messages, request.stop.as_deref())?;
        Ok(HandlerOutcome::Handled(Value::Text(content)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::LlmRequest;

    #[test]
    fn answers_from_the_queue_in_order() {
        let provider = Arc::new(ScriptedProvider::new(["one".to_string(), "two".to_string()]));
        let handler = LlmHandler::new(provider, "test-model");

        let effect = Effect::Generate(LlmRequest::prompt("hi"));
        assert_eq!(
            handler.handle(&effect).unwrap(),
            HandlerOutcome::Handled(Value::Text("one".to_string()))
        );
        assert_eq!(
            handler.handle(&effect).unwrap(),
            HandlerOutcome::Handled(Value::Text("two".to_string()))
        );
    }

    #[test]
    fn exhausted_queue_is_a_handler_failure() {
        let handler = LlmHandler::new(Arc::new(ScriptedProvider::default()), "test-model");
        let err = handler
            .handle(&Effect::Generate(LlmRequest::prompt("hi")))
            .unwrap_err();
        assert!(matches!(err, EngineError::Handler(_)));
    }

    #[test]
    fn declines_other_kinds() {
        let handler = LlmHandler::new(Arc::new(ScriptedProvider::default()), "test-model");
        let effect = Effect::Math(crate::effect::MathOperation::new("add", 1.0, 2.0));
        assert!(!handler.can_handle(&effect));
    }
}
