// Restricted-code handler
// Evaluates ExecuteCode payloads in the AgentScript sandbox.

use std::cell::RefCell;
use std::time::Duration;

use spak_types::Value;

use crate::effect::Effect;
use crate::error::EngineResult;
use crate::runtime::{Handler, HandlerOutcome};
use crate::script::{run_snippet, Session, DEFAULT_OUTPUT_BUDGET};

/// Accepts `ExecuteCode`.
///
/// The handler owns one persistent sandbox session: variables survive across
/// executions, so a REPL-style caller can build up state. Sandbox failures
/// of either class are folded into the result string and never re-raised.
#[derive(Debug)]
pub struct CodeHandler {
    session: RefCell<Session>,
    output_budget: usize,
}

impl CodeHandler {
    pub fn new() -> Self {
        Self {
            session: RefCell::new(Session::new()),
            output_budget: DEFAULT_OUTPUT_BUDGET,
        }
    }

    pub fn with_output_budget(mut self, budget: usize) -> Self {
        self.output_budget = budget;
        self
    }
}

impl Default for CodeHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler for CodeHandler {
    fn name(&self) -> &'static str {
        "code"
    }

    fn can_handle(&self, effect: &Effect) -> bool {
        matches!(effect, Effect::ExecuteCode(_))
    }

    fn handle(&self, effect: &Effect) -> EngineResult<HandlerOutcome> {
        let Effect::ExecuteCode(execution) = effect else {
            return Ok(HandlerOutcome::Declined);
        };
        let timeout = Duration::from_secs(execution.timeout_secs.max(1));
        let result = run_snippet(
            &mut self.session.borrow_mut(),
            &execution.code,
            self.output_budget,
            timeout,
        );
        Ok(HandlerOutcome::Handled(Value::Text(result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::CodeExecution;

    fn run(handler: &CodeHandler, code: &str) -> String {
        match handler
            .handle(&Effect::ExecuteCode(CodeExecution::new(code)))
            .unwrap()
        {
            HandlerOutcome::Handled(Value::Text(text)) => text,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn sandbox_failures_are_results_not_errors() {
        let handler = CodeHandler::new();
        let result = run(&handler, "import os; os.system('rm -rf /')");
        assert!(result.starts_with("Compilation Error:"));

        let result = run(&handler, "boom()");
        assert!(result.starts_with("Runtime Error:"));
    }

    #[test]
    fn state_persists_across_executions() {
        let handler = CodeHandler::new();
        assert_eq!(
            run(&handler, "let x = 40"),
            "Executed successfully (no output)."
        );
        assert_eq!(run(&handler, "print(x + 2)"), "42\n");
    }
}
