// Behavioral test vector model

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised when a test vector file cannot be read or decoded.
#[derive(Debug, Error)]
pub enum VectorError {
    #[error("failed to read test file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed test file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// One behavioral test: call `function` with `input`, expect `expected`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestVector {
    pub name: String,
    pub function: String,
    #[serde(default)]
    pub input: BTreeMap<String, serde_json::Value>,
    pub expected: serde_json::Value,
}

/// A YAML test file: vectors for one component of one system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestFile {
    pub system: String,
    pub component: String,
    #[serde(default)]
    pub tests: Vec<TestVector>,
}

impl TestFile {
    pub fn from_yaml(source: &str) -> Result<Self, VectorError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, VectorError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_yaml(&source)
    }

    pub fn to_yaml(&self) -> Result<String, VectorError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Conventional file name for a component's vectors:
    /// `tests.<component_lowercase>.yaml`.
    pub fn conventional_name(component: &str) -> String {
        format!("tests.{}.yaml", component.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_conventional_layout() {
        let source = r#"
system: CalculatorAgent
component: Solver
tests:
  - name: simple_add
    function: calculate
    input: {a: 2, b: 3, op: add}
    expected: 5
  - name: greeting
    function: greet
    expected: "hello"
"#;
        let file = TestFile::from_yaml(source).unwrap();
        assert_eq!(file.system, "CalculatorAgent");
        assert_eq!(file.component, "Solver");
        assert_eq!(file.tests.len(), 2);
        assert_eq!(file.tests[0].input.len(), 3);
        assert!(file.tests[1].input.is_empty());
    }

    #[test]
    fn conventional_name_lowercases() {
        assert_eq!(TestFile::conventional_name("Solver"), "tests.solver.yaml");
    }
}
