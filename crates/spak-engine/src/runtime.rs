// Effect runtime
// Ordered handler chain plus an append-only trace of resolved effects.

use std::cell::RefCell;
use std::sync::Arc;

use spak_types::{EffectKind, Value};

use crate::effect::Effect;
use crate::error::{EngineError, EngineResult};

/// What a handler did with an offered effect.
///
/// Declining is distinct from failing: a handler that does not recognize an
/// effect declines, and resolution moves on down the chain.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    Handled(Value),
    Declined,
}

/// A value that accepts some effect kinds and produces results.
///
/// Handlers are selected by effect kind only; payload content is not part of
/// routing. A handler that accepts a kind may still fail (`Err`), which
/// surfaces to the performer.
pub trait Handler {
    /// Stable name used in logs and capability listings.
    fn name(&self) -> &'static str;

    /// True when this handler recognizes the effect's kind.
    fn can_handle(&self, effect: &Effect) -> bool;

    /// Resolve the effect, or decline it.
    fn handle(&self, effect: &Effect) -> EngineResult<HandlerOutcome>;
}

/// One record of the append-only effect trace.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub kind: EffectKind,
    pub summary: String,
}

/// The dispatch substrate: an ordered handler chain and a trace.
///
/// The chain is walked newest-registration-first, so a host can overlay a
/// specialized handler without removing defaults.
#[derive(Default)]
pub struct Runtime {
    handlers: Vec<Arc<dyn Handler>>,
    trace: RefCell<Vec<TraceEntry>>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("handlers", &self.handler_names())
            .field("trace_len", &self.trace.borrow().len())
            .finish()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a runtime from a ready handler list, oldest first.
    pub fn with_handlers(handlers: Vec<Arc<dyn Handler>>) -> Self {
        Self {
            handlers,
            trace: RefCell::new(Vec::new()),
        }
    }

    /// Register a handler. The most recently registered handler has the
    /// highest priority.
    pub fn register_handler(&mut self, handler: Arc<dyn Handler>) {
        self.handlers.push(handler);
    }

    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Resolve an effect through the chain.
    ///
    /// The effect is recorded in the trace, then offered newest-to-oldest;
    /// the first non-declining handler's result is returned. If every
    /// handler declines, the effect is unhandled.
    pub fn resolve(&self, effect: &Effect) -> EngineResult<Value> {
        self.trace.borrow_mut().push(TraceEntry {
            kind: effect.kind(),
            summary: effect.payload_summary(),
        });

        for handler in self.handlers.iter().rev() {
            if !handler.can_handle(effect) {
                continue;
            }
            tracing::debug!(handler = handler.name(), kind = %effect.kind(), "offering effect");
            match handler.handle(effect)? {
                HandlerOutcome::Handled(value) => return Ok(value),
                HandlerOutcome::Declined => continue,
            }
        }

        Err(EngineError::UnhandledEffect(effect.kind()))
    }

    /// Snapshot of the trace so far, in program order.
    pub fn trace(&self) -> Vec<TraceEntry> {
        self.trace.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::MathOperation;

    /// Test double: answers `Math` effects with a fixed value.
    struct FixedMath {
        name: &'static str,
        value: f64,
    }

    impl Handler for FixedMath {
        fn name(&self) -> &'static str {
            self.name
        }

        fn can_handle(&self, effect: &Effect) -> bool {
            matches!(effect, Effect::Math(_))
        }

        fn handle(&self, _effect: &Effect) -> EngineResult<HandlerOutcome> {
            Ok(HandlerOutcome::Handled(Value::Number(self.value)))
        }
    }

    struct AlwaysDecline;

    impl Handler for AlwaysDecline {
        fn name(&self) -> &'static str {
            "decline"
        }

        fn can_handle(&self, _effect: &Effect) -> bool {
            true
        }

        fn handle(&self, _effect: &Effect) -> EngineResult<HandlerOutcome> {
            Ok(HandlerOutcome::Declined)
        }
    }

    fn math_effect() -> Effect {
        Effect::Math(MathOperation::new("add", 2.0, 3.0))
    }

    #[test]
    fn newest_registered_handler_wins() {
        let mut runtime = Runtime::new();
        runtime.register_handler(Arc::new(FixedMath {
            name: "a",
            value: 1.0,
        }));
        runtime.register_handler(Arc::new(FixedMath {
            name: "b",
            value: 2.0,
        }));

        let value = runtime.resolve(&math_effect()).unwrap();
        assert_eq!(value, Value::Number(2.0));
    }

    #[test]
    fn declined_effects_fall_through() {
        let mut runtime = Runtime::new();
        runtime.register_handler(Arc::new(FixedMath {
            name: "base",
            value: 7.0,
        }));
        runtime.register_handler(Arc::new(AlwaysDecline));

        let value = runtime.resolve(&math_effect()).unwrap();
        assert_eq!(value, Value::Number(7.0));
    }

    #[test]
    fn unhandled_when_every_handler_declines() {
        let mut runtime = Runtime::new();
        runtime.register_handler(Arc::new(AlwaysDecline));

        let err = runtime.resolve(&math_effect()).unwrap_err();
        assert!(matches!(err, EngineError::UnhandledEffect(EffectKind::Math)));
    }

    #[test]
    fn trace_preserves_program_order() {
        let mut runtime = Runtime::new();
        runtime.register_handler(Arc::new(FixedMath {
            name: "m",
            value: 0.0,
        }));

        runtime.resolve(&math_effect()).unwrap();
        runtime
            .resolve(&Effect::Math(MathOperation::new("mul", 6.0, 7.0)))
            .unwrap();

        let trace = runtime.trace();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace[0].summary, "add(2, 3)");
        assert_eq!(trace[1].summary, "mul(6, 7)");
    }
}
