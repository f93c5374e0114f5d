// Filesystem handler

use spak_types::Value;

use crate::effect::Effect;
use crate::error::{EngineError, EngineResult};
use crate::runtime::{Handler, HandlerOutcome};

/// Accepts `ReadFile` and `WriteFile`. Contents are UTF-8; writes create
/// parent directories first. I/O failures are handler failures.
#[derive(Debug, Default)]
pub struct FileSystemHandler;

impl Handler for FileSystemHandler {
    fn name(&self) -> &'static str {
        "fs"
    }

    fn can_handle(&self, effect: &Effect) -> bool {
        matches!(effect, Effect::ReadFile(_) | Effect::WriteFile(_))
    }

    fn handle(&self, effect: &Effect) -> EngineResult<HandlerOutcome> {
        match effect {
            Effect::ReadFile(read) => {
                let contents = std::fs::read_to_string(&read.path).map_err(|e| {
                    EngineError::handler(format!(
                        "failed to read {}: {}",
                        read.path.display(),
                        e
                    ))
                })?;
                Ok(HandlerOutcome::Handled(Value::Text(contents)))
            }
            Effect::WriteFile(write) => {
                if let Some(parent) = write.path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent).map_err(|e| {
                            EngineError::handler(format!(
                                "failed to create {}: {}",
                                parent.display(),
                                e
                            ))
                        })?;
                    }
                }
                std::fs::write(&write.path, &write.content).map_err(|e| {
                    EngineError::handler(format!(
                        "failed to write {}: {}",
                        write.path.display(),
                        e
                    ))
                })?;
                Ok(HandlerOutcome::Handled(Value::Unit))
            }
            _ => Ok(HandlerOutcome::Declined),
        }
    }
}
