// End-to-end scenarios for the effect runtime and sandbox.

use std::sync::Arc;

use spak_engine::handlers::{CodeHandler, MathHandler};
use spak_engine::{
    perform, Agent, AgentDescriptor, AmbientGuard, CodeExecution, Effect, EngineError,
    MathOperation, Policy, PolicyStep, Runtime,
};
use spak_types::{EffectKind, Value};

/// A policy that performs one sandboxed execution and returns its output.
struct ExecOnce {
    code: String,
    started: bool,
}

impl Policy for ExecOnce {
    fn resume(&mut self, signal: Option<Value>) -> spak_engine::EngineResult<PolicyStep> {
        if !self.started {
            self.started = true;
            return Ok(PolicyStep::Perform(Effect::ExecuteCode(CodeExecution::new(
                self.code.clone(),
            ))));
        }
        Ok(PolicyStep::Done(signal.unwrap_or(Value::Unit)))
    }
}

#[test]
fn sandbox_containment_leaves_the_filesystem_alone() {
    let dir = tempfile::tempdir().unwrap();
    let canary = dir.path().join("canary.txt");
    std::fs::write(&canary, "intact").unwrap();

    let mut runtime = Runtime::new();
    runtime.register_handler(Arc::new(CodeHandler::new()));

    let mut agent = Agent::new(
        AgentDescriptor::new("Hostile", "tries to escape the sandbox"),
        Value::Unit,
        Box::new(ExecOnce {
            code: "import os; os.system('rm -rf /')".to_string(),
            started: false,
        }),
    );

    let result = runtime.run(&mut agent).unwrap();
    let text = result.as_text().unwrap();
    assert!(
        text.starts_with("Compilation Error:") || text.starts_with("Runtime Error:"),
        "got: {}",
        text
    );

    // The attempt is confined to the returned string.
    assert_eq!(std::fs::read_to_string(&canary).unwrap(), "intact");
}

#[test]
fn sandboxed_code_reaches_effects_through_the_ambient_runtime() {
    let mut runtime = Runtime::new();
    runtime.register_handler(Arc::new(MathHandler));
    runtime.register_handler(Arc::new(CodeHandler::new()));
    let runtime = Arc::new(runtime);
    let _guard = AmbientGuard::install(runtime.clone());

    let value = perform(Effect::ExecuteCode(CodeExecution::new(
        "print(math('div', 1, 0))",
    )))
    .unwrap();
    assert_eq!(value, Value::Text("inf\n".to_string()));

    // Both the outer execution and the nested math effect hit the trace.
    let kinds: Vec<EffectKind> = runtime.trace().into_iter().map(|t| t.kind).collect();
    assert_eq!(kinds, vec![EffectKind::ExecuteCode, EffectKind::Math]);
}

#[test]
fn unhandled_effects_surface_to_the_step_caller() {
    let runtime = Runtime::new(); // no handlers at all

    let mut agent = Agent::new(
        AgentDescriptor::new("Lonely", "performs with no handlers"),
        Value::Unit,
        Box::new(ExecOnce {
            code: "print(1)".to_string(),
            started: false,
        }),
    );

    let err = runtime.step(&mut agent, None).unwrap_err();
    assert!(matches!(
        err,
        EngineError::UnhandledEffect(EffectKind::ExecuteCode)
    ));
}

#[test]
fn math_scenarios_from_the_contract() {
    let mut runtime = Runtime::new();
    runtime.register_handler(Arc::new(MathHandler));
    let _guard = AmbientGuard::install(Arc::new(runtime));

    let inf = perform(Effect::Math(MathOperation::new("div", 1.0, 0.0))).unwrap();
    assert_eq!(inf, Value::Number(f64::INFINITY));

    let answer = perform(Effect::Math(MathOperation::new("mul", 6.0, 7.0))).unwrap();
    assert_eq!(answer, Value::Number(42.0));

    let err = perform(Effect::Math(MathOperation::new("hyperop", 2.0, 3.0))).unwrap_err();
    assert!(matches!(err, EngineError::Handler(_)));
}
