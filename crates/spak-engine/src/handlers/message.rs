// Message bus handler

use spak_types::Value;

use crate::effect::Effect;
use crate::error::EngineResult;
use crate::runtime::{Handler, HandlerOutcome};

/// Accepts `SendMessage`; logs the traffic with a prefix distinguishing
/// broadcast from directed delivery.
#[derive(Debug, Default)]
pub struct MessageBusHandler;

impl Handler for MessageBusHandler {
    fn name(&self) -> &'static str {
        "bus"
    }

    fn can_handle(&self, effect: &Effect) -> bool {
        matches!(effect, Effect::SendMessage(_))
    }

    fn handle(&self, effect: &Effect) -> EngineResult<HandlerOutcome> {
        let Effect::SendMessage(message) = effect else {
            return Ok(HandlerOutcome::Declined);
        };
        let prefix = if message.broadcast {
            "[BROADCAST]".to_string()
        } else {
            format!("[TO: {}]", message.recipient.as_deref().unwrap_or("?"))
        };
        println!("{} {}", prefix, message.content);
        tracing::info!(target: "spak::bus", %prefix, content = %message.content, "message sent");
        Ok(HandlerOutcome::Handled(Value::Text("Sent".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::Message;

    #[test]
    fn directed_and_broadcast_both_acknowledge() {
        let handler = MessageBusHandler;
        for message in [
            Message {
                recipient: Some("worker".to_string()),
                content: "start".to_string(),
                broadcast: false,
            },
            Message {
                recipient: None,
                content: "shutdown".to_string(),
                broadcast: true,
            },
        ] {
            let outcome = handler.handle(&Effect::SendMessage(message)).unwrap();
            assert_eq!(outcome, HandlerOutcome::Handled(Value::Text("Sent".to_string())));
        }
    }
}
