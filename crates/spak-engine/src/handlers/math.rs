// Arithmetic handler

use spak_types::Value;

use crate::effect::Effect;
use crate::error::{EngineError, EngineResult};
use crate::runtime::{Handler, HandlerOutcome};

/// Accepts `Math` with `op` in {add, sub, mul, div}.
///
/// Division by zero resolves to positive infinity rather than failing; an
/// unknown op name is a handler failure.
#[derive(Debug, Default)]
pub struct MathHandler;

impl Handler for MathHandler {
    fn name(&self) -> &'static str {
        "math"
    }

    fn can_handle(&self, effect: &Effect) -> bool {
        matches!(effect, Effect::Math(_))
    }

    fn handle(&self, effect: &Effect) -> EngineResult<HandlerOutcome> {
        let Effect::Math(op) = effect else {
            return Ok(HandlerOutcome::Declined);
        };
        let result = match op.op.as_str() {
            "add" => op.a + op.b,
            "sub" => op.a - op.b,
            "mul" => op.a * op.b,
            "div" => {
                if op.b == 0.0 {
                    f64::INFINITY
                } else {
                    op.a / op.b
                }
            }
            other => {
                return Err(EngineError::handler(format!(
                    "unknown math operation: {}",
                    other
                )))
            }
        };
        Ok(HandlerOutcome::Handled(Value::Number(result)))
    }
}
