// Canonical AISpec writer
// Renders a SystemSpec back into source text such that recompiling yields a
// structurally equal tree.

use std::fmt::Write;

use spak_types::{ComponentSpec, EffectSpec, Field, SystemSpec, WorkflowSpec};

/// Render a [`SystemSpec`] as canonical AISpec source.
///
/// Categories are emitted components-first, then effects, workflows, and
/// imports; order within each category is preserved. Opaque members
/// (invariants, constraints) are emitted last inside a component because an
/// opaque body extends to the enclosing `}` on re-parse.
pub fn write_system(spec: &SystemSpec) -> String {
    let mut out = String::new();

    if !spec.metadata.is_empty() {
        out.push_str("meta {\n");
        for (key, value) in &spec.metadata {
            let _ = writeln!(out, "    {} = \"{}\"", key, value);
        }
        out.push_str("}\n\n");
    }

    let _ = writeln!(out, "system {} {{", spec.name);
    for component in &spec.components {
        write_component(&mut out, component);
    }
    for effect in &spec.effects {
        write_effect(&mut out, effect);
    }
    for workflow in &spec.workflows {
        write_workflow(&mut out, workflow);
    }
    for import in &spec.imports {
        let _ = writeln!(out, "    import {}", import);
    }
    out.push_str("}\n");
    out
}

fn write_component(out: &mut String, component: &ComponentSpec) {
    let _ = writeln!(out, "    component {} {{", component.name);
    if !component.description.is_empty() {
        let _ = writeln!(out, "        description: \"{}\"", component.description);
    }
    for state in &component.states {
        let _ = writeln!(out, "        state {} {{", state.name);
        for field in &state.fields {
            let _ = writeln!(out, "            {}: {}", field.name, field.ty);
        }
        out.push_str("        }\n");
    }
    for function in &component.functions {
        match &function.body {
            Some(body) => {
                let _ = writeln!(
                    out,
                    "        function {}({}) -> {} {{ {} }}",
                    function.name,
                    render_params(&function.params),
                    function.return_type,
                    body
                );
            }
            None => {
                let _ = writeln!(
                    out,
                    "        function {}({}) -> {};",
                    function.name,
                    render_params(&function.params),
                    function.return_type
                );
            }
        }
    }
    for invariant in &component.invariants {
        let _ = writeln!(out, "        invariant: {}", invariant);
    }
    for constraint in &component.constraints {
        let _ = writeln!(out, "        constraint: {}", constraint);
    }
    out.push_str("    }\n");
}

fn write_effect(out: &mut String, effect: &EffectSpec) {
    let _ = writeln!(out, "    effect {} {{", effect.name);
    for op in &effect.operations {
        let _ = writeln!(
            out,
            "        operation {}({}) -> {};",
            op.name,
            render_params(&op.params),
            op.return_type
        );
    }
    out.push_str("    }\n");
}

fn write_workflow(out: &mut String, workflow: &WorkflowSpec) {
    let _ = writeln!(
        out,
        "    workflow {}({}) {{",
        workflow.name,
        render_params(&workflow.params)
    );
    for step in &workflow.steps {
        let (name, body) = split_step(step);
        let _ = writeln!(out, "        step {} {{ {} }}", name, body);
    }
    out.push_str("    }\n");
}

fn render_params(params: &[Field]) -> String {
    params
        .iter()
        .map(|p| format!("{}: {}", p.name, p.ty))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Split a `Step <name>: <body>` descriptor back into its parts.
fn split_step(descriptor: &str) -> (&str, &str) {
    let rest = descriptor.strip_prefix("Step ").unwrap_or(descriptor);
    match rest.split_once(':') {
        Some((name, body)) => (name.trim(), body.trim()),
        None => (rest.trim(), ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Compiler;

    #[test]
    fn round_trips_structurally() {
        let source = r#"
            meta { version = "0.2" }
            system Assistant {
                component Chat {
                    description: "Conversational front-end"
                    state Memory {
                        history: List[Text]
                    }
                    function chat(message: Text) -> Text;
                    function summarize(limit: Int) -> Result[Text] { condense the history }
                    invariant: history is append-only
                }
                effect Net {
                    operation fetch(url: Text, headers: Map[Text, Text]) -> Text;
                }
                workflow respond(query: Text) {
                    step understand { parse the query }
                    step answer { reply with the result }
                }
                import Common
            }
        "#;
        let compiler = Compiler::new();
        let first = compiler.compile(source).unwrap();
        let rendered = write_system(&first);
        let second = compiler.compile(&rendered).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn step_descriptors_split_back() {
        assert_eq!(split_step("Step plan: think hard"), ("plan", "think hard"));
        assert_eq!(split_step("Step solo:"), ("solo", ""));
    }
}
