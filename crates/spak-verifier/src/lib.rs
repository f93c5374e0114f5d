// SPAK verifier

//! Structural and dynamic verification of synthesized artifacts.
//!
//! Both passes accumulate findings instead of raising: the structural pass
//! checks artifact conformance to the spec AST, the dynamic pass executes
//! behavioral test vectors against the effect runtime with the soft-match
//! policy, and [`Verifier::verify_spec`] composes the two.

use std::path::Path;
use std::sync::Arc;

use spak_engine::handlers::CompletionProvider;
use spak_types::{SystemSpec, TestFile};

pub mod dynamic;
pub mod findings;
pub mod structural;

pub use dynamic::{soft_match, DynamicVerifier};
pub use findings::{BehavioralFinding, StructuralFinding};
pub use structural::StructuralVerifier;

/// Composite report of one `verify_spec` run.
#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    pub structural: Vec<StructuralFinding>,
    pub behavioral: Vec<BehavioralFinding>,
}

impl VerificationReport {
    /// Success iff both error lists are empty.
    pub fn passed(&self) -> bool {
        self.structural.is_empty() && self.behavioral.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.structural.len() + self.behavioral.len()
    }

    /// All findings rendered in report order.
    pub fn messages(&self) -> Vec<String> {
        self.structural
            .iter()
            .map(|f| f.to_string())
            .chain(self.behavioral.iter().map(|f| f.to_string()))
            .collect()
    }
}

/// The two-pass verifier.
#[derive(Debug)]
pub struct Verifier {
    structural: StructuralVerifier,
    dynamic: DynamicVerifier,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Verifier {
    pub fn new() -> Self {
        Self {
            structural: StructuralVerifier::new(),
            dynamic: DynamicVerifier::new(),
        }
    }

    /// Route `Generate` effects performed by code under test through the
    /// given provider.
    pub fn with_provider(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            structural: StructuralVerifier::new(),
            dynamic: DynamicVerifier::with_provider(provider),
        }
    }

    pub fn verify_structure(&self, spec: &SystemSpec, src_dir: &Path) -> Vec<StructuralFinding> {
        self.structural.verify(spec, src_dir)
    }

    pub fn verify_behavior(&self, test_path: &Path, src_dir: &Path) -> Vec<BehavioralFinding> {
        self.dynamic.run_tests(test_path, src_dir)
    }

    /// Structural pass, then the dynamic pass for every component with a
    /// conventional test file under `test_dir`.
    pub fn verify_spec(
        &self,
        spec: &SystemSpec,
        src_dir: &Path,
        test_dir: &Path,
    ) -> VerificationReport {
        let mut report = VerificationReport {
            structural: self.verify_structure(spec, src_dir),
            behavioral: Vec::new(),
        };

        for component in &spec.components {
            let test_path = test_dir.join(TestFile::conventional_name(&component.name));
            if test_path.exists() {
                report
                    .behavioral
                    .extend(self.verify_behavior(&test_path, src_dir));
            }
        }

        if report.passed() {
            tracing::info!(system = %spec.name, "verification passed");
        } else {
            tracing::warn!(
                system = %spec.name,
                errors = report.error_count(),
                "verification failed"
            );
        }
        report
    }
}
