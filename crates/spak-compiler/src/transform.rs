// Parse tree to AST transformation
// Folds a positioned parse tree into a SystemSpec and enforces the tree's
// structural invariants.

use std::collections::BTreeMap;
use std::collections::HashSet;

use spak_types::{
    ComponentSpec, EffectSpec, Field, FunctionSpec, StateSpec, SystemSpec, TypeRef, WorkflowSpec,
};

use crate::parser::{
    ComponentNode, DeclNode, EffectNode, FieldNode, FunctionNode, MemberNode, SpecTree, TypeNode,
    WorkflowNode,
};
use crate::ParseError;

/// Lower a parse tree into a [`SystemSpec`].
///
/// Declaration order is preserved within each category. Violations of the
/// AST invariants (duplicate names per category, duplicate function names
/// within a component, generic arity floors) are reported with the position
/// of the offending declaration.
pub fn lower(tree: SpecTree) -> Result<SystemSpec, ParseError> {
    let mut spec = SystemSpec::new(tree.system.name.clone());

    // Later metadata keys override earlier ones.
    let mut metadata = BTreeMap::new();
    for (key, value) in tree.meta {
        metadata.insert(key, value);
    }
    spec.metadata = metadata;

    let mut component_names = HashSet::new();
    let mut effect_names = HashSet::new();
    let mut workflow_names = HashSet::new();

    for decl in tree.system.decls {
        match decl {
            DeclNode::Component(node) => {
                require_unique(&mut component_names, &node.name, "component", node.line, node.column)?;
                spec.components.push(lower_component(node)?);
            }
            DeclNode::Effect(node) => {
                require_unique(&mut effect_names, &node.name, "effect", node.line, node.column)?;
                spec.effects.push(lower_effect(node)?);
            }
            DeclNode::Workflow(node) => {
                require_unique(&mut workflow_names, &node.name, "workflow", node.line, node.column)?;
                spec.workflows.push(lower_workflow(node)?);
            }
            DeclNode::Import { name, .. } => spec.imports.push(name),
        }
    }

    Ok(spec)
}

fn require_unique(
    seen: &mut HashSet<String>,
    name: &str,
    category: &str,
    line: u32,
    column: u32,
) -> Result<(), ParseError> {
    if !seen.insert(name.to_string()) {
        return Err(ParseError::Invalid {
            path: None,
            line,
            column,
            message: format!("duplicate {} name `{}`", category, name),
        });
    }
    Ok(())
}

fn lower_component(node: ComponentNode) -> Result<ComponentSpec, ParseError> {
    let mut component = ComponentSpec::new(node.name);
    let mut function_names = HashSet::new();

    for member in node.members {
        match member {
            // Description assignments overwrite; everything else appends in
            // source order.
            MemberNode::Description(text) => component.description = text,
            MemberNode::State { name, fields } => {
                component.states.push(StateSpec {
                    name,
                    fields: lower_fields(fields)?,
                });
            }
            MemberNode::Function(function) => {
                require_unique(
                    &mut function_names,
                    &function.name,
                    "function",
                    function.line,
                    function.column,
                )?;
                component.functions.push(lower_function(function)?);
            }
            MemberNode::Invariant(text) => component.invariants.push(text),
            MemberNode::Constraint(text) => component.constraints.push(text),
        }
    }

    Ok(component)
}

fn lower_function(node: FunctionNode) -> Result<FunctionSpec, ParseError> {
    Ok(FunctionSpec {
        name: node.name,
        params: lower_fields(node.params)?,
        return_type: lower_type(node.return_type)?,
        body: node.body,
    })
}

fn lower_effect(node: EffectNode) -> Result<EffectSpec, ParseError> {
    let mut operations = Vec::new();
    let mut names = HashSet::new();
    for op in node.operations {
        require_unique(&mut names, &op.name, "operation", op.line, op.column)?;
        // Operations are uniformly bodiless functions.
        operations.push(lower_function(op)?);
    }
    Ok(EffectSpec {
        name: node.name,
        operations,
    })
}

fn lower_workflow(node: WorkflowNode) -> Result<WorkflowSpec, ParseError> {
    Ok(WorkflowSpec {
        name: node.name,
        params: lower_fields(node.params)?,
        steps: node
            .steps
            .into_iter()
            .map(|step| format!("Step {}: {}", step.name, step.body))
            .collect(),
    })
}

fn lower_fields(nodes: Vec<FieldNode>) -> Result<Vec<Field>, ParseError> {
    nodes
        .into_iter()
        .map(|node| {
            Ok(Field {
                name: node.name,
                ty: lower_type(node.ty)?,
            })
        })
        .collect()
}

fn lower_type(node: TypeNode) -> Result<TypeRef, ParseError> {
    let minimum = match node.name.as_str() {
        "List" | "Result" => Some(1),
        "Map" => Some(2),
        _ => None,
    };
    if let Some(minimum) = minimum {
        if node.args.len() < minimum {
            return Err(ParseError::Invalid {
                path: None,
                line: node.line,
                column: node.column,
                message: format!(
                    "`{}` requires at least {} type argument(s), found {}",
                    node.name,
                    minimum,
                    node.args.len()
                ),
            });
        }
    }

    let args = node
        .args
        .into_iter()
        .map(lower_type)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TypeRef {
        name: node.name,
        args,
    })
}
