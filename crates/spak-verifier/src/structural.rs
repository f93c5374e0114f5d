// Structural verification
// Conformance of synthesized artifacts to the spec AST.

use std::path::Path;

use spak_engine::script::ScriptFile;
use spak_engine::ArtifactLoader;
use spak_types::{ComponentSpec, SystemSpec};

use crate::findings::StructuralFinding;

/// Checks that every spec component has an artifact declaring it, with every
/// declared function present as a method.
#[derive(Debug, Default)]
pub struct StructuralVerifier;

impl StructuralVerifier {
    pub fn new() -> Self {
        Self
    }

    pub fn verify(&self, spec: &SystemSpec, src_dir: &Path) -> Vec<StructuralFinding> {
        tracing::info!(system = %spec.name, src_dir = %src_dir.display(), "structural verification");
        let loader = ArtifactLoader::new(src_dir);
        let mut findings = Vec::new();

        for component in &spec.components {
            let needle = component.name.to_lowercase();
            let mut found = false;

            // Candidate files follow the synthesis naming rule; a parse
            // failure is recorded and the search moves on.
            for path in loader.artifact_files() {
                let matches_stem = path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(|stem| stem.to_lowercase().starts_with(&needle))
                    .unwrap_or(false);
                if !matches_stem {
                    continue;
                }
                if self.check_file(&path, component, &mut findings) {
                    tracing::debug!(component = %component.name, path = %path.display(), "found");
                    found = true;
                    break;
                }
            }

            if !found {
                findings.push(StructuralFinding::MissingComponent {
                    component: component.name.clone(),
                });
            }
        }

        findings
    }

    /// True when the file declares the component (by exact name). Missing
    /// methods are recorded but still count as found.
    fn check_file(
        &self,
        path: &Path,
        component: &ComponentSpec,
        findings: &mut Vec<StructuralFinding>,
    ) -> bool {
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                findings.push(StructuralFinding::ArtifactParse {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                });
                return false;
            }
        };
        let file = match ScriptFile::compile(&source) {
            Ok(file) => file,
            Err(e) => {
                findings.push(StructuralFinding::ArtifactParse {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                });
                return false;
            }
        };

        let Some(decl) = file.component(&component.name) else {
            return false;
        };

        for function in &component.functions {
            if decl.method(&function.name).is_none() {
                findings.push(StructuralFinding::MissingMethod {
                    component: component.name.clone(),
                    method: function.name.clone(),
                });
            }
        }
        true
    }
}
