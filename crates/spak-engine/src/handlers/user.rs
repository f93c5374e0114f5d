// User interaction handler

use std::cell::RefCell;
use std::collections::VecDeque;

use spak_types::Value;

use crate::effect::Effect;
use crate::error::EngineResult;
use crate::runtime::{Handler, HandlerOutcome};

/// Returned by `Listen` when the input queue is empty.
pub const EMPTY_INPUT_SENTINEL: &str = "User provided no input (Mock)";

/// Accepts `Listen` and `Reply`.
///
/// Inputs come from a configured queue, which keeps the handler
/// deterministic under test; `Reply` prints the agent's message and returns
/// a fixed acknowledgement.
#[derive(Debug, Default)]
pub struct UserInteractionHandler {
    input_queue: RefCell<VecDeque<String>>,
}

impl UserInteractionHandler {
    pub fn new(inputs: impl IntoIterator<Item = String>) -> Self {
        Self {
            input_queue: RefCell::new(inputs.into_iter().collect()),
        }
    }

    pub fn queue_input(&self, input: impl Into<String>) {
        self.input_queue.borrow_mut().push_back(input.into());
    }
}

impl Handler for UserInteractionHandler {
    fn name(&self) -> &'static str {
        "user"
    }

    fn can_handle(&self, effect: &Effect) -> bool {
        matches!(effect, Effect::Listen(_) | Effect::Reply(_))
    }

    fn handle(&self, effect: &Effect) -> EngineResult<HandlerOutcome> {
        match effect {
            Effect::Listen(_) => {
                let input = self
                    .input_queue
                    .borrow_mut()
                    .pop_front()
                    .unwrap_or_else(|| EMPTY_INPUT_SENTINEL.to_string());
                Ok(HandlerOutcome::Handled(Value::Text(input)))
            }
            Effect::Reply(output) => {
                println!("AGENT SAYS: {}", output.message);
                tracing::info!(message = %output.message, "agent reply");
                Ok(HandlerOutcome::Handled(Value::Text("Replied".to_string())))
            }
            _ => Ok(HandlerOutcome::Declined),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{UserInput, UserOutput};

    #[test]
    fn listen_pops_in_order_then_returns_sentinel() {
        let handler =
            UserInteractionHandler::new(["Hello".to_string(), "Goodbye".to_string()]);

        let listen = Effect::Listen(UserInput::default());
        assert_eq!(
            handler.handle(&listen).unwrap(),
            HandlerOutcome::Handled(Value::Text("Hello".to_string()))
        );
        assert_eq!(
            handler.handle(&listen).unwrap(),
            HandlerOutcome::Handled(Value::Text("Goodbye".to_string()))
        );
        assert_eq!(
            handler.handle(&listen).unwrap(),
            HandlerOutcome::Handled(Value::Text(EMPTY_INPUT_SENTINEL.to_string()))
        );
    }

    #[test]
    fn reply_acknowledges() {
        let handler = UserInteractionHandler::default();
        let outcome = handler
            .handle(&Effect::Reply(UserOutput {
                message: "done".to_string(),
            }))
            .unwrap();
        assert_eq!(outcome, HandlerOutcome::Handled(Value::Text("Replied".to_string())));
    }
}
