// Builder: LLM-backed synthesis of artifacts and test vectors
// Synthesis goes through the Generate effect, so provider wiring stays
// behind the ambient runtime's handler chain.

use spak_engine::{perform, ChatMessage, Effect, LlmRequest};
use spak_types::{ComponentSpec, Value};

/// One recorded LLM interaction.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub kind: &'static str,
    pub component: Option<String>,
    pub prompt: String,
    pub response: String,
}

/// Synthesizes AgentScript implementations and YAML test vectors from
/// component specs, keeping a conversation history for `history`.
#[derive(Debug, Default)]
pub struct Builder {
    history: Vec<HistoryEntry>,
}

const IMPLEMENT_SYSTEM_PROMPT: &str = "You are an expert AgentScript engineer specialized in \
    spec-driven development. Implement components that strictly match the provided formal \
    specification. Reply with a single fenced code block containing the full artifact.";

const TEST_SYSTEM_PROMPT: &str = "You are a test engineer. Produce YAML test vectors for the \
    provided component specification. Reply with a single fenced code block containing the \
    full YAML file.";

const REPAIR_SYSTEM_PROMPT: &str = "You are a silent code repair machine. Output only the \
    requested file content in a single fenced code block.";

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Synthesize an implementation for a component. Provider failures are
    /// rendered as a commented artifact carrying an actionable hint, never
    /// raised.
    pub fn implement_component(&mut self, component: &ComponentSpec, context: &str) -> String {
        let prompt = implement_prompt(component, context);
        tracing::info!(component = %component.name, "synthesizing implementation");
        self.generate("implement", Some(&component.name), IMPLEMENT_SYSTEM_PROMPT, &prompt)
            .unwrap_or_else(|hint| hint)
    }

    /// Synthesize YAML test vectors for a component.
    pub fn generate_tests(&mut self, component: &ComponentSpec, system_name: &str) -> String {
        let prompt = tests_prompt(component, system_name);
        tracing::info!(component = %component.name, "generating test vectors");
        self.generate("generate_tests", Some(&component.name), TEST_SYSTEM_PROMPT, &prompt)
            .unwrap_or_else(|hint| hint)
    }

    /// Repair an implementation against a verification error log. Returns
    /// the original code when the provider is unreachable.
    pub fn fix_implementation(&mut self, code: &str, error_log: &str) -> String {
        let prompt = format!(
            "The following AgentScript artifact failed verification. Fix the code so it \
             satisfies the specification and resolves the errors.\n\nCODE:\n{}\n\nERROR LOG:\n{}",
            code, error_log
        );
        tracing::info!("repairing implementation");
        self.generate("fix_implementation", None, REPAIR_SYSTEM_PROMPT, &prompt)
            .unwrap_or_else(|_| code.to_string())
    }

    /// Repair a test vector file against an error log. Returns the original
    /// YAML when the provider is unreachable.
    pub fn fix_tests(&mut self, yaml: &str, error_log: &str) -> String {
        let prompt = format!(
            "The following YAML test vectors call the implementation incorrectly. Fix the \
             vectors to match the component's method signatures.\n\nTESTS:\n{}\n\nERROR LOG:\n{}",
            yaml, error_log
        );
        tracing::info!("repairing test vectors");
        self.generate("fix_tests", None, REPAIR_SYSTEM_PROMPT, &prompt)
            .unwrap_or_else(|_| yaml.to_string())
    }

    /// Perform one Generate effect and record it. `Err` carries the rendered
    /// provider hint.
    fn generate(
        &mut self,
        kind: &'static str,
        component: Option<&str>,
        system_prompt: &str,
        prompt: &str,
    ) -> Result<String, String> {
        let request = LlmRequest {
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(prompt)],
            model: None,
            stop: None,
        };

        match perform(Effect::Generate(request)) {
            Ok(Value::Text(response)) => {
                let result = extract_fenced_block(&response);
                self.history.push(HistoryEntry {
                    kind,
                    component: component.map(str::to_string),
                    prompt: prompt.to_string(),
                    response,
                });
                Ok(result)
            }
            Ok(other) => Ok(other.to_string()),
            Err(e) => Err(provider_hint(&e.to_string())),
        }
    }
}

fn implement_prompt(component: &ComponentSpec, context: &str) -> String {
    format!(
        "Implement the following component as an AgentScript artifact. Declare \
         `component {name}` with one `fn` per specified function. Use the effect builtins \
         (llm, math, read_file, write_file, listen, reply, send_message, recurse) for any \
         outside interaction.\n\nSPECIFICATION:\n{spec}\n{context}",
        name = component.name,
        spec = render_component(component),
        context = context
    )
}

fn tests_prompt(component: &ComponentSpec, system_name: &str) -> String {
    format!(
        "Write YAML test vectors for this component. The file must have top-level keys \
         `system` ({system}), `component` ({name}), and `tests`, where each test has `name`, \
         `function`, `input` (argument map), and `expected`.\n\nSPECIFICATION:\n{spec}",
        system = system_name,
        name = component.name,
        spec = render_component(component)
    )
}

/// Compact textual rendering of a component spec for prompts.
fn render_component(component: &ComponentSpec) -> String {
    let mut out = format!("component {}\n", component.name);
    if !component.description.is_empty() {
        out.push_str(&format!("  description: {}\n", component.description));
    }
    for function in &component.functions {
        let params: Vec<String> = function
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name, p.ty))
            .collect();
        out.push_str(&format!(
            "  function {}({}) -> {}\n",
            function.name,
            params.join(", "),
            function.return_type
        ));
        if let Some(body) = &function.body {
            out.push_str(&format!("    logic: {}\n", body));
        }
    }
    for invariant in &component.invariants {
        out.push_str(&format!("  invariant: {}\n", invariant));
    }
    for constraint in &component.constraints {
        out.push_str(&format!("  constraint: {}\n", constraint));
    }
    out
}

/// Pull the contents of the first fenced code block, or fall back to the
/// whole reply trimmed.
fn extract_fenced_block(text: &str) -> String {
    let Some(open) = text.find("```") else {
        return text.trim().to_string();
    };
    let after_fence = &text[open + 3..];
    // Skip the language tag on the fence line.
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    match body.find("```") {
        Some(close) => body[..close].trim().to_string(),
        None => body.trim().to_string(),
    }
}

fn provider_hint(error: &str) -> String {
    format!(
        "// Error: could not reach the completion provider.\n\
         // {}\n\
         // ACTION: configure a provider for the LLM handler (see --canned for a scripted\n\
         // provider), then run 'build' again.\n",
        error
    )
}
