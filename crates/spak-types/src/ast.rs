// AISpec abstract syntax tree definitions

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A reference to a type in an AISpec declaration.
///
/// Simple types carry no arguments; the generic forms (`List`, `Map`,
/// `Result`) carry one or more nested references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    pub name: String,
    #[serde(default)]
    pub args: Vec<TypeRef>,
}

impl TypeRef {
    /// Create a simple named type with no arguments.
    pub fn simple(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Create a generic type with nested arguments.
    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    pub fn is_generic(&self) -> bool {
        !self.args.is_empty()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            let rendered: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
            write!(f, "[{}]", rendered.join(", "))?;
        }
        Ok(())
    }
}

/// A named, typed slot: a state field or a function parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: TypeRef,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A function declared on a component, or an operation declared on an effect.
///
/// Effect operations are represented uniformly as functions with no body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Field>,
    pub return_type: TypeRef,
    /// Opaque logic body, trimmed. `None` for bodiless declarations.
    #[serde(default)]
    pub body: Option<String>,
}

/// A named state record on a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSpec {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// An effect declaration: a capability surface of named operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectSpec {
    pub name: String,
    #[serde(default)]
    pub operations: Vec<FunctionSpec>,
}

/// A workflow declaration.
///
/// Steps are kept as textual descriptors of the form `Step <name>: <body>`;
/// the kernel treats step bodies as uninterpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Field>,
    #[serde(default)]
    pub steps: Vec<String>,
}

/// A component: the unit of synthesis and verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub states: Vec<StateSpec>,
    #[serde(default)]
    pub functions: Vec<FunctionSpec>,
    #[serde(default)]
    pub invariants: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
}

impl ComponentSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            states: Vec::new(),
            functions: Vec::new(),
            invariants: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Look up a declared function by name.
    pub fn function(&self, name: &str) -> Option<&FunctionSpec> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// The root of a compiled AISpec: one system with its declarations gathered
/// by category, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SystemSpec {
    pub name: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
    #[serde(default)]
    pub effects: Vec<EffectSpec>,
    #[serde(default)]
    pub workflows: Vec<WorkflowSpec>,
    #[serde(default)]
    pub imports: Vec<String>,
}

/// The canonical entry point of a system, used when a sub-agent is spawned
/// against its spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryOperation {
    /// Component declaring the entry operation, when the spec names one.
    pub component: Option<String>,
    /// Name of the operation to invoke with the task query.
    pub operation: String,
}

impl SystemSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Look up a component by name.
    pub fn component(&self, name: &str) -> Option<&ComponentSpec> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Resolve the canonical entry operation for this system.
    ///
    /// A workflow taking exactly one parameter is preferred; failing that,
    /// a system exposing a single function across all components uses it.
    /// Systems with neither have no derivable entry point.
    pub fn entry_operation(&self) -> Option<EntryOperation> {
        if let Some(workflow) = self.workflows.iter().find(|w| w.params.len() == 1) {
            let component = self
                .components
                .iter()
                .find(|c| c.function(&workflow.name).is_some())
                .map(|c| c.name.clone());
            return Some(EntryOperation {
                component,
                operation: workflow.name.clone(),
            });
        }

        let mut functions = self
            .components
            .iter()
            .flat_map(|c| c.functions.iter().map(move |f| (&c.name, &f.name)));
        let (component, operation) = functions.next()?;
        if functions.next().is_some() {
            return None;
        }
        Some(EntryOperation {
            component: Some(component.clone()),
            operation: operation.clone(),
        })
    }
}

/// True when `name` is a well-formed AISpec identifier:
/// `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_ref_rendering() {
        let simple = TypeRef::simple("Int");
        assert_eq!(simple.to_string(), "Int");

        let nested = TypeRef::generic(
            "Map",
            vec![
                TypeRef::simple("Text"),
                TypeRef::generic("List", vec![TypeRef::simple("Int")]),
            ],
        );
        assert_eq!(nested.to_string(), "Map[Text, List[Int]]");
    }

    #[test]
    fn identifier_validity() {
        assert!(is_valid_identifier("foo"));
        assert!(is_valid_identifier("_bar9"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("9lives"));
        assert!(!is_valid_identifier("has-dash"));
    }

    #[test]
    fn entry_operation_prefers_unary_workflow() {
        let mut spec = SystemSpec::new("Demo");
        let mut solver = ComponentSpec::new("Solver");
        solver.functions.push(FunctionSpec {
            name: "answer".to_string(),
            params: vec![Field::new("query", TypeRef::simple("Text"))],
            return_type: TypeRef::simple("Text"),
            body: None,
        });
        spec.components.push(solver);
        spec.workflows.push(WorkflowSpec {
            name: "answer".to_string(),
            params: vec![Field::new("query", TypeRef::simple("Text"))],
            steps: vec![],
        });

        let entry = spec.entry_operation().unwrap();
        assert_eq!(entry.operation, "answer");
        assert_eq!(entry.component.as_deref(), Some("Solver"));
    }

    #[test]
    fn entry_operation_falls_back_to_sole_function() {
        let mut spec = SystemSpec::new("Demo");
        let mut solver = ComponentSpec::new("Solver");
        solver.functions.push(FunctionSpec {
            name: "calculate".to_string(),
            params: vec![],
            return_type: TypeRef::simple("Number"),
            body: None,
        });
        spec.components.push(solver);

        let entry = spec.entry_operation().unwrap();
        assert_eq!(entry.operation, "calculate");
        assert_eq!(entry.component.as_deref(), Some("Solver"));
    }

    #[test]
    fn entry_operation_absent_when_ambiguous() {
        let mut spec = SystemSpec::new("Demo");
        let mut comp = ComponentSpec::new("Multi");
        for name in ["first", "second"] {
            comp.functions.push(FunctionSpec {
                name: name.to_string(),
                params: vec![],
                return_type: TypeRef::simple("Unit"),
                body: None,
            });
        }
        spec.components.push(comp);
        assert!(spec.entry_operation().is_none());
    }
}
