// Composite verification against real artifact and test-vector files.

use std::path::{Path, PathBuf};

use spak_compiler::Compiler;
use spak_types::SystemSpec;
use spak_verifier::{BehavioralFinding, StructuralFinding, Verifier};

struct Fixture {
    _dir: tempfile::TempDir,
    src_dir: PathBuf,
    test_dir: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let src_dir = dir.path().join("src");
    let test_dir = dir.path().join("tests");
    std::fs::create_dir_all(&src_dir).unwrap();
    std::fs::create_dir_all(&test_dir).unwrap();
    Fixture {
        _dir: dir,
        src_dir,
        test_dir,
    }
}

fn calculator_spec() -> SystemSpec {
    Compiler::new()
        .compile(
            r#"
            system CalculatorAgent {
                component Solver {
                    description: "Evaluates arithmetic requests"
                    function calculate(a: Float, b: Float, op: Text) -> Float;
                    function greet(name: Text) -> Text;
                }
            }
            "#,
        )
        .unwrap()
}

fn write(path: &Path, content: &str) {
    std::fs::write(path, content).unwrap();
}

const SOLVER_ARTIFACT: &str = r#"
component Solver {
    fn calculate(a, b, op) {
        return math(op, a, b)
    }

    fn greet(name) {
        return "Hello, " + name + "!"
    }
}
"#;

const SOLVER_TESTS: &str = r#"
system: CalculatorAgent
component: Solver
tests:
  - name: adds_two_numbers
    function: calculate
    input: {a: 2, b: 3, op: add}
    expected: 5
  - name: multiplies_exactly
    function: calculate
    input: {a: 6, b: 7, op: mul}
    expected: 42
  - name: greets_by_name
    function: greet
    input: {name: "Ada"}
    expected: "Hello, Ada"
"#;

#[test]
fn verify_spec_passes_on_conforming_artifacts() {
    let fx = fixture();
    write(&fx.src_dir.join("solver.ags"), SOLVER_ARTIFACT);
    write(&fx.test_dir.join("tests.solver.yaml"), SOLVER_TESTS);

    let report = Verifier::new().verify_spec(&calculator_spec(), &fx.src_dir, &fx.test_dir);
    assert!(report.passed(), "findings: {:?}", report.messages());
}

#[test]
fn mismatches_report_expected_and_got() {
    let fx = fixture();
    write(
        &fx.src_dir.join("solver.ags"),
        r#"
        component Solver {
            fn calculate(a, b, op) { return "43" }
            fn greet(name) { return "Hello, " + name + "!" }
        }
        "#,
    );
    write(
        &fx.test_dir.join("tests.solver.yaml"),
        r#"
system: CalculatorAgent
component: Solver
tests:
  - name: exact_answer
    function: calculate
    input: {a: 6, b: 7, op: mul}
    expected: "42"
"#,
    );

    let report = Verifier::new().verify_spec(&calculator_spec(), &fx.src_dir, &fx.test_dir);
    assert!(!report.passed());
    let rendered = report.messages().join("\n");
    assert!(
        rendered.contains("Expected '42', got '43'"),
        "got: {}",
        rendered
    );
}

#[test]
fn bad_invocations_are_distinguished_from_logic_errors() {
    let fx = fixture();
    write(&fx.src_dir.join("solver.ags"), SOLVER_ARTIFACT);
    write(
        &fx.test_dir.join("tests.solver.yaml"),
        r#"
system: CalculatorAgent
component: Solver
tests:
  - name: wrong_argument_name
    function: calculate
    input: {first: 2, second: 3, operation: add}
    expected: 5
"#,
    );

    let report = Verifier::new().verify_spec(&calculator_spec(), &fx.src_dir, &fx.test_dir);
    assert_eq!(report.behavioral.len(), 1);
    assert!(report.behavioral[0].is_bad_invocation());
    assert!(report.behavioral[0].to_string().contains("Runtime Error:"));
}

#[test]
fn missing_artifact_shows_in_structural_and_skipped_dynamically() {
    let fx = fixture();
    // No artifact written; the test file exists but cannot load.
    write(&fx.test_dir.join("tests.solver.yaml"), SOLVER_TESTS);

    let report = Verifier::new().verify_spec(&calculator_spec(), &fx.src_dir, &fx.test_dir);
    assert!(report
        .structural
        .contains(&StructuralFinding::MissingComponent {
            component: "Solver".to_string()
        }));
    assert!(matches!(
        report.behavioral.first(),
        Some(BehavioralFinding::LoadError { .. })
    ));
}

#[test]
fn ambient_runtime_is_cleared_after_dynamic_runs() {
    let fx = fixture();
    write(&fx.src_dir.join("solver.ags"), SOLVER_ARTIFACT);
    write(&fx.test_dir.join("tests.solver.yaml"), SOLVER_TESTS);

    Verifier::new().verify_spec(&calculator_spec(), &fx.src_dir, &fx.test_dir);
    assert!(spak_engine::ambient_runtime().is_none());
}
