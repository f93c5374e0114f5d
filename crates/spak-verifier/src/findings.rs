// Verifier finding taxonomy
// Structured findings instead of free-form strings, so repair diagnosis can
// branch on variants rather than substring-matching error logs.

use std::fmt;
use std::path::PathBuf;

/// A structural conformance failure. Non-fatal; accumulated into a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralFinding {
    /// No artifact declares the component.
    MissingComponent { component: String },
    /// The artifact exists but lacks a declared method.
    MissingMethod { component: String, method: String },
    /// An artifact failed to parse as AgentScript.
    ArtifactParse { path: PathBuf, message: String },
}

impl fmt::Display for StructuralFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuralFinding::MissingComponent { component } => {
                write!(f, "Missing implementation for Component '{}'", component)
            }
            StructuralFinding::MissingMethod { component, method } => {
                write!(f, "Method '{}' missing in {}", method, component)
            }
            StructuralFinding::ArtifactParse { path, message } => {
                write!(f, "Syntax Error in {}: {}", path.display(), message)
            }
        }
    }
}

/// A behavioral expectation failure. Non-fatal; accumulated into a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BehavioralFinding {
    /// The call succeeded but the result did not soft-match.
    Mismatch {
        test: String,
        expected: String,
        actual: String,
    },
    /// The call raised a runtime error.
    ///
    /// `bad_invocation` marks argument-binding failures: the test vector is
    /// calling the method incorrectly, rather than the implementation
    /// misbehaving.
    TestError {
        test: String,
        message: String,
        bad_invocation: bool,
    },
    /// The component artifact could not be loaded or instantiated.
    LoadError { component: String, message: String },
    /// The test file itself was unusable.
    Harness { message: String },
}

impl BehavioralFinding {
    pub fn is_bad_invocation(&self) -> bool {
        matches!(
            self,
            BehavioralFinding::TestError {
                bad_invocation: true,
                ..
            }
        )
    }
}

impl fmt::Display for BehavioralFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BehavioralFinding::Mismatch {
                test,
                expected,
                actual,
            } => {
                write!(f, "{}: Expected '{}', got '{}'", test, expected, actual)
            }
            BehavioralFinding::TestError { test, message, .. } => {
                write!(f, "{}: Runtime Error: {}", test, message)
            }
            BehavioralFinding::LoadError { component, message } => {
                write!(f, "Module Load Error ({}): {}", component, message)
            }
            BehavioralFinding::Harness { message } => {
                write!(f, "General Test Failure: {}", message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms_match_the_reporting_contract() {
        let finding = StructuralFinding::MissingComponent {
            component: "Solver".to_string(),
        };
        assert_eq!(
            finding.to_string(),
            "Missing implementation for Component 'Solver'"
        );

        let finding = StructuralFinding::MissingMethod {
            component: "Solver".to_string(),
            method: "calculate".to_string(),
        };
        assert_eq!(finding.to_string(), "Method 'calculate' missing in Solver");

        let finding = BehavioralFinding::Mismatch {
            test: "t1".to_string(),
            expected: "42".to_string(),
            actual: "43".to_string(),
        };
        assert_eq!(finding.to_string(), "t1: Expected '42', got '43'");
    }
}
