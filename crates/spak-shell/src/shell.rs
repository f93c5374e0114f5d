// Interactive kernel shell
// Line-based REPL over the compiler, builder, verifier, and effect runtime.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;
use walkdir::WalkDir;

use spak_compiler::Compiler;
use spak_engine::handlers::{
    CodeHandler, CompletionProvider, FileSystemHandler, LlmHandler, MathHandler,
    RecursionHandler,
};
use spak_engine::{AmbientGuard, ArtifactLoader, Runtime, ARTIFACT_EXT};
use spak_types::{SystemSpec, TestFile, Value};
use spak_verifier::{StructuralFinding, Verifier};

use crate::builder::Builder;

/// Shell construction parameters.
pub struct ShellConfig {
    pub src_dir: PathBuf,
    pub test_dir: PathBuf,
    pub model: String,
    pub provider: Arc<dyn CompletionProvider>,
}

/// The spec-driven build shell.
pub struct Shell {
    compiler: Compiler,
    verifier: Verifier,
    builder: Builder,
    config: ShellConfig,
    specs: BTreeMap<String, SystemSpec>,
    active: Option<String>,
}

impl Shell {
    pub fn new(config: ShellConfig) -> Self {
        Self {
            compiler: Compiler::new(),
            verifier: Verifier::with_provider(config.provider.clone()),
            builder: Builder::new(),
            config,
            specs: BTreeMap::new(),
            active: None,
        }
    }

    /// Interactive loop over stdin. Returns on `exit` or EOF.
    pub fn run(&mut self) -> anyhow::Result<()> {
        println!(
            "Welcome to the {}. Type {} to list commands.",
            "spec-driven agent kernel shell".bold(),
            "help".cyan()
        );
        loop {
            print!("(spak) ");
            io::stdout().flush()?;
            let mut line = String::new();
            if io::stdin().read_line(&mut line)? == 0 {
                break;
            }
            if self.dispatch(line.trim()) {
                break;
            }
        }
        Ok(())
    }

    /// Execute one command line. Returns true when the shell should exit.
    pub fn dispatch(&mut self, line: &str) -> bool {
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };
        match command {
            "" => {}
            "load" => self.cmd_load(rest),
            "list" => self.cmd_list(),
            "use" => self.cmd_use(rest),
            "show" => self.cmd_show(),
            "build" => self.cmd_build(rest),
            "verify" => self.cmd_verify(rest),
            "repair" => self.cmd_repair(rest),
            "run" => self.cmd_run(rest),
            "history" => self.cmd_history(rest),
            "help" | "?" => self.cmd_help(),
            "exit" | "quit" => {
                println!("Goodbye.");
                return true;
            }
            other => println!("Unknown command '{}'. Type 'help' for the list.", other),
        }
        false
    }

    fn active_spec(&self) -> Option<SystemSpec> {
        self.active
            .as_ref()
            .and_then(|name| self.specs.get(name))
            .cloned()
    }

    fn src_dir(&self, arg: &str) -> PathBuf {
        if arg.is_empty() {
            self.config.src_dir.clone()
        } else {
            PathBuf::from(arg)
        }
    }

    /// A runtime carrying the LLM handler, for synthesis commands.
    fn synthesis_runtime(&self) -> Arc<Runtime> {
        let mut runtime = Runtime::new();
        runtime.register_handler(Arc::new(LlmHandler::new(
            self.config.provider.clone(),
            self.config.model.clone(),
        )));
        Arc::new(runtime)
    }

    // --- Commands ---

    fn cmd_load(&mut self, arg: &str) {
        if arg.is_empty() {
            println!("Usage: load <file-or-directory>");
            return;
        }
        let path = Path::new(arg);
        if !path.exists() {
            println!("Path not found: {}", arg);
            return;
        }

        if path.is_dir() {
            let mut count = 0;
            for entry in WalkDir::new(path).into_iter().filter_map(Result::ok) {
                let name = entry.file_name().to_string_lossy().to_string();
                if entry.file_type().is_file() && name.starts_with("SPEC") && name.ends_with(".md")
                {
                    if self.load_single(entry.path()) {
                        count += 1;
                    }
                }
            }
            if count == 0 {
                println!("No SPEC files found in {}", arg);
            } else {
                println!("Loaded {} spec(s) from {}", count, arg);
            }
        } else {
            self.load_single(path);
        }
    }

    fn load_single(&mut self, path: &Path) -> bool {
        match self.compiler.compile_file(path) {
            Ok(spec) => {
                println!(
                    "{} loaded system '{}' from {}",
                    "ok:".green().bold(),
                    spec.name,
                    path.display()
                );
                self.active = Some(spec.name.clone());
                self.specs.insert(spec.name.clone(), spec);
                true
            }
            Err(e) => {
                println!("{} {}", "error:".red().bold(), e);
                false
            }
        }
    }

    fn cmd_list(&self) {
        if self.specs.is_empty() {
            println!("No specs loaded.");
            return;
        }
        println!("Loaded systems:");
        for name in self.specs.keys() {
            let marker = if self.active.as_deref() == Some(name) {
                "*"
            } else {
                " "
            };
            println!("{} {}", marker, name);
        }
    }

    fn cmd_use(&mut self, arg: &str) {
        if !self.specs.contains_key(arg) {
            println!(
                "System '{}' not found. Loaded: {:?}",
                arg,
                self.specs.keys().collect::<Vec<_>>()
            );
            return;
        }
        self.active = Some(arg.to_string());
        println!("Active system set to '{}'", arg);

        let spec = self.specs[arg].clone();
        let loader = ArtifactLoader::new(&self.config.src_dir);
        let src_exists = spec
            .components
            .iter()
            .any(|c| loader.find_component_file(&c.name).is_some());
        let tests_exist = spec.components.iter().any(|c| {
            self.config
                .test_dir
                .join(TestFile::conventional_name(&c.name))
                .exists()
        });

        println!("Next actions:");
        if !src_exists || !tests_exist {
            println!("  - 'build' to generate missing tests and implementations");
        } else {
            println!("  - 'verify' to check correctness");
            println!("  - 'run <Component>' to interact with the built agent");
        }
    }

    fn cmd_show(&self) {
        let Some(spec) = self.active_spec() else {
            println!("No active spec.");
            return;
        };
        println!("System: {}", spec.name.bold());
        for (key, value) in &spec.metadata {
            println!("  meta {} = \"{}\"", key, value);
        }
        for component in &spec.components {
            println!("\n  Component: {}", component.name.cyan());
            if !component.description.is_empty() {
                println!("    {}", component.description);
            }
            for function in &component.functions {
                let params: Vec<String> = function
                    .params
                    .iter()
                    .map(|p| format!("{}: {}", p.name, p.ty))
                    .collect();
                println!(
                    "    - {}({}) -> {}",
                    function.name,
                    params.join(", "),
                    function.return_type
                );
                if let Some(body) = &function.body {
                    println!("      logic: {}", body);
                }
            }
        }
        for effect in &spec.effects {
            println!("\n  Effect: {} ({} operations)", effect.name.cyan(), effect.operations.len());
        }
        for workflow in &spec.workflows {
            println!("\n  Workflow: {}", workflow.name.cyan());
            for step in &workflow.steps {
                println!("    {}", step);
            }
        }
    }

    fn cmd_build(&mut self, arg: &str) {
        let Some(spec) = self.active_spec() else {
            println!("No active spec.");
            return;
        };
        let src_dir = self.src_dir(arg);
        let test_dir = self.config.test_dir.clone();
        if let Err(e) = std::fs::create_dir_all(&src_dir).and_then(|_| std::fs::create_dir_all(&test_dir)) {
            println!("{} {}", "error:".red().bold(), e);
            return;
        }

        println!("Starting spec-driven build for '{}'", spec.name.bold());
        let _guard = AmbientGuard::install(self.synthesis_runtime());

        // Phase 1: test vectors first, so implementations are test-guided.
        println!("Phase 1: test generation");
        let mut test_contents: BTreeMap<String, String> = BTreeMap::new();
        for component in &spec.components {
            let test_path = test_dir.join(TestFile::conventional_name(&component.name));
            if test_path.exists() {
                println!("  using existing tests for {}", component.name);
                if let Ok(existing) = std::fs::read_to_string(&test_path) {
                    test_contents.insert(component.name.clone(), existing);
                }
                continue;
            }
            let yaml = self.builder.generate_tests(component, &spec.name);
            if let Err(e) = std::fs::write(&test_path, &yaml) {
                println!("{} {}", "error:".red().bold(), e);
                continue;
            }
            println!("  {} {}", "created".green(), test_path.display());
            test_contents.insert(component.name.clone(), yaml);
        }

        // Phase 2: implement what the structural pass reports missing.
        println!("Phase 2: implementation");
        let missing: Vec<String> = self
            .verifier
            .verify_structure(&spec, &src_dir)
            .into_iter()
            .filter_map(|finding| match finding {
                StructuralFinding::MissingComponent { component } => Some(component),
                _ => None,
            })
            .collect();
        if missing.is_empty() {
            println!("All components are already implemented. (Run 'repair' if logic is broken.)");
            return;
        }

        for name in missing {
            let Some(component) = spec.component(&name).cloned() else {
                continue;
            };
            let context = match test_contents.get(&name) {
                Some(tests) => format!(
                    "\nThe implementation MUST pass the following tests:\n{}",
                    tests
                ),
                None => String::new(),
            };
            let artifact = self.builder.implement_component(&component, &context);
            let path = src_dir.join(format!("{}.{}", name.to_lowercase(), ARTIFACT_EXT));
            match std::fs::write(&path, &artifact) {
                Ok(()) => println!("  {} {}", "synthesized".green(), path.display()),
                Err(e) => println!("{} {}", "error:".red().bold(), e),
            }
        }
        println!("Build complete. Run 'verify' to confirm.");
    }

    fn cmd_verify(&mut self, arg: &str) {
        let Some(spec) = self.active_spec() else {
            println!("No active spec.");
            return;
        };
        let src_dir = self.src_dir(arg);
        println!("Verifying '{}' against {}", spec.name.bold(), src_dir.display());

        let report = self
            .verifier
            .verify_spec(&spec, &src_dir, &self.config.test_dir);
        for message in report.messages() {
            println!("  {}", message);
        }
        if report.passed() {
            println!("{} implementation matches spec and tests", "PASSED".green().bold());
        } else {
            println!(
                "{} with {} error(s)",
                "FAILED".red().bold(),
                report.error_count()
            );
        }
    }

    fn cmd_repair(&mut self, arg: &str) {
        let Some(spec) = self.active_spec() else {
            println!("No active spec.");
            return;
        };
        let src_dir = self.src_dir(arg);
        println!("Running diagnosis on '{}'", spec.name.bold());

        // Collect behavioral findings per test file.
        let mut per_file = Vec::new();
        for component in &spec.components {
            let test_path = self
                .config
                .test_dir
                .join(TestFile::conventional_name(&component.name));
            if test_path.exists() {
                let findings = self.verifier.verify_behavior(&test_path, &src_dir);
                if !findings.is_empty() {
                    per_file.push((component.name.clone(), test_path, findings));
                }
            }
        }

        if per_file.is_empty() {
            let structural = self.verifier.verify_structure(&spec, &src_dir);
            if structural.is_empty() {
                println!("System is healthy. Nothing to repair.");
            } else {
                println!(
                    "No behavioral errors, but {} structural issue(s); run 'build' to fill gaps:",
                    structural.len()
                );
                for finding in structural {
                    println!("  {}", finding);
                }
            }
            return;
        }

        let total: usize = per_file.iter().map(|(_, _, f)| f.len()).sum();
        println!("Found {} behavioral error(s). Analyzing root cause...", total);

        // Structured diagnosis: argument-binding failures mean the vectors
        // call the implementation incorrectly; anything else points at the
        // implementation.
        let tests_at_fault = per_file
            .iter()
            .any(|(_, _, findings)| findings.iter().any(|f| f.is_bad_invocation()));

        let _guard = AmbientGuard::install(self.synthesis_runtime());
        if tests_at_fault {
            println!("Diagnosis: the TESTS call the implementation incorrectly.");
            for (component, test_path, findings) in &per_file {
                if !findings.iter().any(|f| f.is_bad_invocation()) {
                    continue;
                }
                let error_log: Vec<String> = findings.iter().map(|f| f.to_string()).collect();
                let Ok(broken) = std::fs::read_to_string(test_path) else {
                    continue;
                };
                tracing::warn!(component = %component, "regenerating test vectors");
                let fixed = self.builder.fix_tests(&broken, &error_log.join("\n"));
                match std::fs::write(test_path, fixed) {
                    Ok(()) => println!("  repaired {}", test_path.display()),
                    Err(e) => println!("{} {}", "error:".red().bold(), e),
                }
            }
        } else {
            println!("Diagnosis: the IMPLEMENTATION has logic errors.");
            let loader = ArtifactLoader::new(&src_dir);
            for (component, test_path, findings) in &per_file {
                let Some(artifact_path) = loader.find_component_file(component) else {
                    continue;
                };
                let Ok(broken) = std::fs::read_to_string(&artifact_path) else {
                    continue;
                };
                let mut error_log: Vec<String> =
                    findings.iter().map(|f| f.to_string()).collect();
                if let Ok(tests) = std::fs::read_to_string(test_path) {
                    error_log.push(format!("\nRELATED TEST FILE:\n{}", tests));
                }
                tracing::warn!(component = %component, "regenerating implementation");
                let fixed = self
                    .builder
                    .fix_implementation(&broken, &error_log.join("\n"));
                match std::fs::write(&artifact_path, fixed) {
                    Ok(()) => println!("  repaired {}", artifact_path.display()),
                    Err(e) => println!("{} {}", "error:".red().bold(), e),
                }
            }
        }
        println!("Repair sequence complete. Run 'verify' to check the result.");
    }

    fn cmd_run(&mut self, arg: &str) {
        let Some(spec) = self.active_spec() else {
            println!("No active spec.");
            return;
        };
        let mut words = arg.split_whitespace();
        let component = match words.next() {
            Some(name) => name.to_string(),
            None => match spec.components.first() {
                Some(component) => component.name.clone(),
                None => {
                    println!("System '{}' declares no components.", spec.name);
                    return;
                }
            },
        };

        let loader = ArtifactLoader::new(&self.config.src_dir);
        let instance = match loader.load_component(&component) {
            Ok(instance) => instance,
            Err(e) => {
                println!("{} {}", "error:".red().bold(), e);
                println!("Build the component first with 'build'.");
                return;
            }
        };

        // Default capability set for interactive runs, recursion included.
        let mut runtime = Runtime::new();
        runtime.register_handler(Arc::new(LlmHandler::new(
            self.config.provider.clone(),
            self.config.model.clone(),
        )));
        runtime.register_handler(Arc::new(CodeHandler::new()));
        runtime.register_handler(Arc::new(FileSystemHandler));
        runtime.register_handler(Arc::new(MathHandler));
        runtime.register_handler(Arc::new(RecursionHandler::new(
            loader.clone(),
            vec![Arc::new(MathHandler)],
        )));
        let _guard = AmbientGuard::install(Arc::new(runtime));

        println!("{} instantiated.", component.bold());
        println!(
            "Call methods as '<method> <arg> <arg> ...'; available: {}",
            instance.method_names().join(", ")
        );
        println!("Type 'exit' to return to the kernel shell.");

        loop {
            print!("({}) ", component.to_lowercase());
            if io::stdout().flush().is_err() {
                break;
            }
            let mut line = String::new();
            match io::stdin().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "exit" {
                break;
            }

            let mut parts = line.split_whitespace();
            let method = parts.next().unwrap_or_default();
            let args: Vec<Value> = parts.map(parse_scalar).collect();
            match instance.call_positional(method, args) {
                Ok(value) => {
                    let output = instance.take_output();
                    if !output.is_empty() {
                        print!("{}", output);
                    }
                    println!("=> {}", value);
                }
                Err(e) => println!("{} {}", "error:".red().bold(), e),
            }
        }
    }

    fn cmd_history(&self, arg: &str) {
        let history = self.builder.history();
        if history.is_empty() {
            println!("No LLM interactions yet.");
            return;
        }
        let limit = arg.parse::<usize>().unwrap_or(history.len());
        let start = history.len().saturating_sub(limit);
        println!("Showing last {} interaction(s):", history.len() - start);
        for (i, entry) in history[start..].iter().enumerate() {
            println!("--- [{}] {} ---", start + i + 1, entry.kind);
            if let Some(component) = &entry.component {
                println!("Component: {}", component);
            }
            println!("[PROMPT] {}", truncate(&entry.prompt, 200));
            println!("[RESPONSE] {}", truncate(&entry.response, 200));
        }
    }

    fn cmd_help(&self) {
        println!("Commands:");
        println!("  load PATH       compile a spec file, or every SPEC*.md under a directory");
        println!("  list            enumerate loaded systems (active marked with *)");
        println!("  use NAME        set the active system");
        println!("  show            print the active system's components and functions");
        println!("  build [DIR]     generate missing test vectors, then missing artifacts");
        println!("  verify [DIR]    structural + dynamic verification");
        println!("  repair [DIR]    diagnose failures and regenerate tests or artifacts");
        println!("  run COMP [...]  instantiate a component and call its methods");
        println!("  history [N]     show recent LLM interactions");
        println!("  exit            leave the shell");
    }
}

/// Parse one CLI argument as a YAML scalar, falling back to text.
fn parse_scalar(token: &str) -> Value {
    match serde_yaml::from_str::<serde_json::Value>(token) {
        Ok(json) => Value::from_json(&json),
        Err(_) => Value::Text(token.to_string()),
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let head: String = text.chars().take(limit).collect();
    format!("{}... (truncated)", head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spak_engine::handlers::ScriptedProvider;

    const SPEC: &str = r#"
        system CalculatorAgent {
            component Solver {
                function calculate(a: Float, b: Float, op: Text) -> Float;
            }
        }
    "#;

    const CANNED_TESTS: &str = "```\nsystem: CalculatorAgent\ncomponent: Solver\ntests:\n  - name: adds\n    function: calculate\n    input: {a: 2, b: 3, op: add}\n    expected: 5\n```";

    const CANNED_ARTIFACT: &str =
        "```\ncomponent Solver {\n    fn calculate(a, b, op) {\n        if op == 'add' { return a + b }\n        return math(op, a, b)\n    }\n}\n```";

    fn shell_in(dir: &Path, provider: Arc<ScriptedProvider>) -> Shell {
        Shell::new(ShellConfig {
            src_dir: dir.join("src"),
            test_dir: dir.join("tests"),
            model: "test-model".to_string(),
            provider,
        })
    }

    #[test]
    fn load_build_verify_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let spec_path = dir.path().join("SPEC.calc.md");
        std::fs::write(&spec_path, SPEC).unwrap();

        // One canned completion per synthesis call: tests, then the artifact.
        let provider = Arc::new(ScriptedProvider::new([
            CANNED_TESTS.to_string(),
            CANNED_ARTIFACT.to_string(),
        ]));
        let mut shell = shell_in(dir.path(), provider);

        assert!(!shell.dispatch(&format!("load {}", spec_path.display())));
        assert!(shell.specs.contains_key("CalculatorAgent"));

        shell.dispatch("build");
        assert!(dir.path().join("src/solver.ags").exists());
        assert!(dir.path().join("tests/tests.solver.yaml").exists());

        let spec = shell.active_spec().unwrap();
        let report = shell.verifier.verify_spec(
            &spec,
            &dir.path().join("src"),
            &dir.path().join("tests"),
        );
        assert!(report.passed(), "findings: {:?}", report.messages());

        // Both synthesis calls are on the record.
        assert_eq!(shell.builder.history().len(), 2);
    }

    #[test]
    fn exit_terminates_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = shell_in(dir.path(), Arc::new(ScriptedProvider::default()));
        assert!(shell.dispatch("exit"));
        assert!(!shell.dispatch("list"));
    }

    #[test]
    fn ambient_runtime_does_not_leak_from_build() {
        let dir = tempfile::tempdir().unwrap();
        let spec_path = dir.path().join("SPEC.calc.md");
        std::fs::write(&spec_path, SPEC).unwrap();

        let mut shell = shell_in(dir.path(), Arc::new(ScriptedProvider::default()));
        shell.dispatch(&format!("load {}", spec_path.display()));
        shell.dispatch("build");
        assert!(spak_engine::ambient_runtime().is_none());
    }
}
