// spak: the spec-driven agent kernel shell

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use spak_engine::handlers::ScriptedProvider;

mod builder;
mod shell;

use shell::{Shell, ShellConfig};

/// Interactive shell for compiling, building, verifying, and running
/// spec-driven agents.
#[derive(Parser, Debug)]
#[command(name = "spak", author, version, about, long_about = None)]
struct Args {
    /// Spec file or directory to load at startup
    #[arg(long)]
    specs: Option<PathBuf>,

    /// Directory holding synthesized artifacts
    #[arg(long, default_value = "src")]
    src_dir: PathBuf,

    /// Directory holding test vector files
    #[arg(long, default_value = "tests")]
    test_dir: PathBuf,

    /// Default model name passed to the completion provider
    #[arg(long, default_value = "qwen2.5-coder:7b")]
    model: String,

    /// File of canned completions (separated by `---` lines) to seed the
    /// scripted provider; without it, synthesis commands render an
    /// actionable provider hint instead
    #[arg(long)]
    canned: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SPAK_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let provider = match &args.canned {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            Arc::new(ScriptedProvider::new(split_canned(&content)))
        }
        None => Arc::new(ScriptedProvider::default()),
    };

    let mut shell = Shell::new(ShellConfig {
        src_dir: args.src_dir,
        test_dir: args.test_dir,
        model: args.model,
        provider,
    });

    if let Some(specs) = &args.specs {
        shell.dispatch(&format!("load {}", specs.display()));
    }

    shell.run()
}

/// Split a canned-completions file on lines consisting of `---`.
fn split_canned(content: &str) -> Vec<String> {
    content
        .split("\n---\n")
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}
