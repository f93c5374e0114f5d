// Artifact loader
// Finds and instantiates synthesized component implementations.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use spak_types::SystemSpec;

use crate::error::{EngineError, EngineResult};
use crate::script::{ComponentInstance, ScriptFile};

/// File extension of synthesized AgentScript artifacts.
pub const ARTIFACT_EXT: &str = "ags";

/// Loads component implementations from an artifact directory.
///
/// The search rule matches the synthesis layout: a component `C` lives in a
/// file whose stem, lowercased, starts with `c`.
#[derive(Debug, Clone)]
pub struct ArtifactLoader {
    src_dir: PathBuf,
}

impl ArtifactLoader {
    pub fn new(src_dir: impl Into<PathBuf>) -> Self {
        Self {
            src_dir: src_dir.into(),
        }
    }

    pub fn src_dir(&self) -> &Path {
        &self.src_dir
    }

    /// All artifact files under the source directory, in path order.
    pub fn artifact_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.src_dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension()
                    .map(|ext| ext == ARTIFACT_EXT)
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        files
    }

    /// Find the artifact file for a component by the stem-prefix rule.
    pub fn find_component_file(&self, component: &str) -> Option<PathBuf> {
        let needle = component.to_lowercase();
        self.artifact_files().into_iter().find(|path| {
            path.file_stem()
                .and_then(|stem| stem.to_str())
                .map(|stem| stem.to_lowercase().starts_with(&needle))
                .unwrap_or(false)
        })
    }

    /// Load and instantiate the implementation of `component`.
    ///
    /// The artifact must declare a component whose name equals the spec name
    /// exactly.
    pub fn load_component(&self, component: &str) -> EngineResult<ComponentInstance> {
        let path = self.find_component_file(component).ok_or_else(|| {
            EngineError::ArtifactLoad(format!(
                "no artifact found for component '{}' under {}",
                component,
                self.src_dir.display()
            ))
        })?;
        self.instantiate_from(&path, component)
    }

    fn instantiate_from(&self, path: &Path, component: &str) -> EngineResult<ComponentInstance> {
        let source = std::fs::read_to_string(path)?;
        let file = ScriptFile::compile(&source).map_err(|e| {
            EngineError::ArtifactLoad(format!("{}: {}", path.display(), e))
        })?;
        if file.component(component).is_none() {
            return Err(EngineError::ArtifactLoad(format!(
                "{} does not declare component '{}'",
                path.display(),
                component
            )));
        }
        ComponentInstance::instantiate(&file, component)
            .map_err(|e| EngineError::ArtifactLoad(format!("{}: {}", path.display(), e)))
    }

    /// Resolve a system's canonical entry operation to a loaded component.
    ///
    /// When the spec names the declaring component, its artifact is loaded
    /// directly; otherwise every artifact is searched for a component
    /// declaring a method of the entry's name.
    pub fn load_entry(&self, spec: &SystemSpec) -> EngineResult<(ComponentInstance, String)> {
        let entry = spec.entry_operation().ok_or_else(|| {
            EngineError::ArtifactLoad(format!(
                "system '{}' has no derivable entry operation",
                spec.name
            ))
        })?;

        if let Some(component) = &entry.component {
            let instance = self.load_component(component)?;
            return Ok((instance, entry.operation));
        }

        for path in self.artifact_files() {
            let Ok(source) = std::fs::read_to_string(&path) else {
                continue;
            };
            let Ok(file) = ScriptFile::compile(&source) else {
                continue;
            };
            for component in &file.components {
                if component.method(&entry.operation).is_some() {
                    let instance = ComponentInstance::instantiate(&file, &component.name)
                        .map_err(|e| {
                            EngineError::ArtifactLoad(format!("{}: {}", path.display(), e))
                        })?;
                    return Ok((instance, entry.operation));
                }
            }
        }

        Err(EngineError::ArtifactLoad(format!(
            "no artifact implements entry operation '{}'",
            entry.operation
        )))
    }
}
