// Recursion handler
// Spawns isolated sub-agents for Recurse effects.

use std::sync::Arc;

use spak_types::Value;

use spak_compiler::Compiler;

use crate::ambient::AmbientGuard;
use crate::effect::{Effect, SubTask};
use crate::error::{EngineError, EngineResult};
use crate::loader::ArtifactLoader;
use crate::runtime::{Handler, HandlerOutcome, Runtime};

/// Accepts `Recurse`.
///
/// Each sub-task gets a fresh runtime holding only the granted handlers:
/// parent capabilities are never inherited, traces stay local to the child,
/// and the previous ambient runtime is restored on every exit path. The
/// sub-agent's failure is folded into the returned text, not re-raised.
pub struct RecursionHandler {
    compiler: Compiler,
    loader: ArtifactLoader,
    grants: Vec<Arc<dyn Handler>>,
}

impl std::fmt::Debug for RecursionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecursionHandler")
            .field("loader", &self.loader)
            .field("grants", &self.grants.iter().map(|h| h.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl RecursionHandler {
    /// `grants` is the complete capability set of every spawned child.
    pub fn new(loader: ArtifactLoader, grants: Vec<Arc<dyn Handler>>) -> Self {
        Self {
            compiler: Compiler::new(),
            loader,
            grants,
        }
    }

    fn spawn(&self, task: &SubTask) -> EngineResult<Value> {
        let spec_path = task
            .spec_path
            .as_ref()
            .ok_or_else(|| EngineError::ArtifactLoad("sub-task carries no spec path".to_string()))?;

        // The entry operation comes from the compiled spec of the sub-agent,
        // and the loader finds the component implementing it.
        let spec = self.compiler.compile_file(spec_path)?;
        let (instance, operation) = self.loader.load_entry(&spec)?;

        tracing::info!(
            system = %spec.name,
            component = instance.name(),
            %operation,
            query = %task.query,
            "spawning sub-agent"
        );

        let mut child = Runtime::new();
        for handler in &self.grants {
            child.register_handler(handler.clone());
        }

        // Save-swap-restore: the guard reinstates the parent runtime even on
        // the failure path below.
        let _guard = AmbientGuard::install(Arc::new(child));
        instance
            .call_positional(&operation, vec![Value::Text(task.query.clone())])
            .map_err(|e| EngineError::handler(e.to_string()))
    }
}

impl Handler for RecursionHandler {
    fn name(&self) -> &'static str {
        "recurse"
    }

    fn can_handle(&self, effect: &Effect) -> bool {
        matches!(effect, Effect::Recurse(_))
    }

    fn handle(&self, effect: &Effect) -> EngineResult<HandlerOutcome> {
        let Effect::Recurse(task) = effect else {
            return Ok(HandlerOutcome::Declined);
        };
        let text = match self.spawn(task) {
            Ok(value) => value.to_string(),
            Err(e) => format!("Sub-agent failed: {}", e),
        };
        Ok(HandlerOutcome::Handled(Value::Text(text)))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::ambient::{ambient_runtime, perform};
    use crate::effect::MathOperation;
    use crate::handlers::MathHandler;

    fn write_fixture(dir: &Path) -> std::path::PathBuf {
        let spec_path = dir.join("SPEC.calc.md");
        std::fs::write(
            &spec_path,
            r#"
            system CalculatorAgent {
                component Solver {
                    function answer(query: Text) -> Text;
                }
                workflow answer(query: Text) {
                    step solve { multiply the numbers in the query }
                }
            }
            "#,
        )
        .unwrap();
        std::fs::write(
            dir.join("solver.ags"),
            r#"
            component Solver {
                fn answer(query) {
                    import re
                    let nums = re.find_all('[0-9]+', query)
                    return str(math('mul', num(nums[0]), num(nums[1])))
                }
            }
            "#,
        )
        .unwrap();
        spec_path
    }

    #[test]
    fn spawns_child_with_granted_handlers_only() {
        let dir = tempfile::tempdir().unwrap();
        let spec_path = write_fixture(dir.path());

        let recursion = RecursionHandler::new(
            ArtifactLoader::new(dir.path()),
            vec![Arc::new(MathHandler)],
        );

        let mut parent = Runtime::new();
        parent.register_handler(Arc::new(recursion));
        let parent = Arc::new(parent);
        let _guard = AmbientGuard::install(parent.clone());

        let value = perform(Effect::Recurse(SubTask {
            query: "what is 6 times 7".to_string(),
            spec_path: Some(spec_path),
            context: String::new(),
        }))
        .unwrap();
        assert_eq!(value, Value::Text("42".to_string()));

        // The parent runtime is back in the ambient slot, and the child's
        // effects never reached its trace.
        assert!(Arc::ptr_eq(&ambient_runtime().unwrap(), &parent));
        let kinds: Vec<_> = parent.trace().into_iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![spak_types::EffectKind::Recurse]);
    }

    #[test]
    fn child_cannot_reach_parent_capabilities() {
        let dir = tempfile::tempdir().unwrap();
        let spec_path = dir.path().join("SPEC.llm.md");
        std::fs::write(
            &spec_path,
            r#"
            system Asker {
                component Querier {
                    function answer(query: Text) -> Text;
                }
                workflow answer(query: Text) {
                    step ask { forward the query to the model }
                }
            }
            "#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("querier.ags"),
            "component Querier { fn answer(query) { return llm(query) } }",
        )
        .unwrap();

        // Parent has an LLM handler; the child is granted only Math, so the
        // sub-agent's Generate goes unhandled.
        let recursion = RecursionHandler::new(
            ArtifactLoader::new(dir.path()),
            vec![Arc::new(MathHandler)],
        );
        let mut parent = Runtime::new();
        parent.register_handler(Arc::new(crate::handlers::LlmHandler::new(
            Arc::new(crate::handlers::ScriptedProvider::new(["hi".to_string()])),
            "test-model",
        )));
        parent.register_handler(Arc::new(recursion));
        let parent = Arc::new(parent);
        let _guard = AmbientGuard::install(parent.clone());

        let value = perform(Effect::Recurse(SubTask {
            query: "hello".to_string(),
            spec_path: Some(spec_path),
            context: String::new(),
        }))
        .unwrap();
        let text = value.as_text().unwrap().to_string();
        assert!(text.starts_with("Sub-agent failed:"), "got: {}", text);
        assert!(text.contains("Unhandled Effect: Generate"), "got: {}", text);

        // Parent resumes normally after the failed recursion.
        let after = perform(Effect::Math(MathOperation::new("add", 40.0, 2.0)));
        assert!(after.is_err());
        let value = perform(Effect::Generate(crate::effect::LlmRequest::prompt("x"))).unwrap();
        assert_eq!(value, Value::Text("hi".to_string()));
    }

    #[test]
    fn missing_spec_path_is_an_error_string() {
        let dir = tempfile::tempdir().unwrap();
        let handler =
            RecursionHandler::new(ArtifactLoader::new(dir.path()), vec![]);
        let outcome = handler
            .handle(&Effect::Recurse(SubTask {
                query: "q".to_string(),
                spec_path: None,
                context: String::new(),
            }))
            .unwrap();
        match outcome {
            HandlerOutcome::Handled(Value::Text(text)) => {
                assert!(text.starts_with("Sub-agent failed:"))
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
