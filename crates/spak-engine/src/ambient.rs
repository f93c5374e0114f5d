// Ambient runtime slot
// A process-scoped (thread-local) slot holding at most one live runtime, so
// in-process synthesized code can perform effects transparently.

use std::cell::RefCell;
use std::sync::Arc;

use spak_types::Value;

use crate::effect::Effect;
use crate::error::{EffectRequest, EngineError, EngineResult};
use crate::runtime::Runtime;

thread_local! {
    static AMBIENT: RefCell<Option<Arc<Runtime>>> = const { RefCell::new(None) };
}

/// The currently installed ambient runtime, if any.
pub fn ambient_runtime() -> Option<Arc<Runtime>> {
    AMBIENT.with(|slot| slot.borrow().clone())
}

/// Scoped installation of an ambient runtime.
///
/// Installation swaps the slot and the guard restores the previous occupant
/// on drop, so save-set-restore holds on every exit path, including unwinds.
/// Recursion nests naturally: each sub-runtime installs over its parent and
/// the parent comes back when the guard goes out of scope.
#[must_use = "dropping the guard immediately uninstalls the runtime"]
pub struct AmbientGuard {
    previous: Option<Arc<Runtime>>,
}

impl AmbientGuard {
    pub fn install(runtime: Arc<Runtime>) -> Self {
        let previous = AMBIENT.with(|slot| slot.borrow_mut().replace(runtime));
        Self { previous }
    }
}

impl Drop for AmbientGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        AMBIENT.with(|slot| {
            *slot.borrow_mut() = previous;
        });
    }
}

/// Perform an effect.
///
/// With an ambient runtime installed, the effect is dispatched to it and the
/// result returned synchronously. Without one, the effect-unhandled
/// condition is signalled: the error carries the effect and a suspension
/// token so a host driving policies itself can intercept and resume.
pub fn perform(effect: Effect) -> EngineResult<Value> {
    match ambient_runtime() {
        Some(runtime) => runtime.resolve(&effect),
        None => Err(EngineError::Requested(Box::new(EffectRequest::new(effect)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::MathOperation;
    use crate::handlers::MathHandler;

    fn math_runtime() -> Arc<Runtime> {
        let mut runtime = Runtime::new();
        runtime.register_handler(Arc::new(MathHandler));
        Arc::new(runtime)
    }

    #[test]
    fn perform_without_runtime_signals_request() {
        assert!(ambient_runtime().is_none());
        let err = perform(Effect::Math(MathOperation::new("add", 1.0, 1.0))).unwrap_err();
        match err {
            EngineError::Requested(request) => {
                assert_eq!(request.effect.kind(), spak_types::EffectKind::Math)
            }
            other => panic!("expected request condition, got {:?}", other),
        }
    }

    #[test]
    fn guard_installs_and_restores() {
        let outer = math_runtime();
        let guard = AmbientGuard::install(outer.clone());
        assert!(ambient_runtime().is_some());

        {
            let inner = math_runtime();
            let _inner_guard = AmbientGuard::install(inner.clone());
            assert!(Arc::ptr_eq(&ambient_runtime().unwrap(), &inner));
        }

        assert!(Arc::ptr_eq(&ambient_runtime().unwrap(), &outer));
        drop(guard);
        assert!(ambient_runtime().is_none());
    }

    #[test]
    fn guard_restores_on_panic() {
        let outer = math_runtime();
        let _guard = AmbientGuard::install(outer.clone());

        let result = std::panic::catch_unwind(|| {
            let _inner = AmbientGuard::install(math_runtime());
            panic!("boom");
        });
        assert!(result.is_err());

        assert!(Arc::ptr_eq(&ambient_runtime().unwrap(), &outer));
    }

    #[test]
    fn perform_dispatches_through_ambient_runtime() {
        let _guard = AmbientGuard::install(math_runtime());
        let value = perform(Effect::Math(MathOperation::new("mul", 6.0, 7.0))).unwrap();
        assert_eq!(value, Value::Number(42.0));
    }
}
