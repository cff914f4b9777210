use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::block::{runnable_fences, PresentationMeta, RenderedBlock};
use crate::compiler::CompilerLoader;
use crate::config::Config;
use crate::controller::{Playground, PlaygroundRuntime, RunAttempt, StdoutClipboard};

#[derive(Parser)]
#[command(name = "playground")]
#[command(about = "Run documentation code snippets the way the interactive code block does", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Compiler locator (overrides config file and env vars)
    #[arg(long, global = true)]
    pub locator: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a snippet file and print its output
    Run {
        /// Snippet source (may contain `// [!code ignore]` lines)
        file: PathBuf,

        /// Replace the snippet with this file's contents through edit mode
        #[arg(long)]
        edit: Option<PathBuf>,
    },

    /// Run every ts/js code fence of a Markdown or MDX document
    Doc {
        /// Document to scan
        file: PathBuf,
    },

    /// Print the copy text of a snippet file
    Copy {
        /// Snippet source
        file: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    // Load and validate configuration before any command output
    let config = Config::builder()
        .config_path(cli.config)
        .locator(cli.locator)
        .build()?;

    let loader = Arc::new(CompilerLoader::bundled(config.compiler.locator.clone()));
    if CompilerLoader::install_global(loader).is_err() {
        debug!("Global compiler loader already installed");
    }
    let runtime = PlaygroundRuntime::from_config(&config);

    match cli.command {
        Commands::Run { file, edit } => {
            let playground = mount(&file, runtime)?;
            if let Some(edit) = edit {
                let replacement = read(&edit)?;
                playground.toggle_edit();
                playground.edit(replacement)?;
                playground.toggle_edit();
            }
            print_output(&playground.run().await);
        }

        Commands::Doc { file } => {
            let document = read(&file)?;
            let fences = runnable_fences(&document);
            if fences.is_empty() {
                println!("No runnable code blocks in {}", file.display());
                return Ok(());
            }

            let mut runs = Vec::with_capacity(fences.len());
            for fence in fences {
                let heading = fence
                    .meta
                    .title
                    .clone()
                    .unwrap_or_else(|| format!("{}:{}", file.display(), fence.line));
                let playground = Arc::new(Playground::new(fence.block(), fence.meta, runtime.clone()));
                let run = tokio::spawn(async move { playground.run().await });
                runs.push((heading, run));
            }

            for (index, (heading, run)) in runs.into_iter().enumerate() {
                if index > 0 {
                    println!();
                }
                println!("── {} ──", heading);
                let attempt = run.await.context("Snippet run panicked")?;
                print_output(&attempt);
            }
        }

        Commands::Copy { file } => {
            let runtime = runtime.with_clipboard(Arc::new(StdoutClipboard));
            let playground = mount(&file, runtime)?;
            playground.copy();
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn mount(file: &Path, runtime: PlaygroundRuntime) -> Result<Playground> {
    let source = read(file)?;
    let meta = PresentationMeta {
        title: file.file_name().map(|name| name.to_string_lossy().into_owned()),
        ..PresentationMeta::default()
    };
    Ok(Playground::new(RenderedBlock::parse(&source), meta, runtime))
}

fn print_output(attempt: &RunAttempt) {
    if let Some(result) = attempt.result() {
        let text = result.text();
        if !text.is_empty() {
            println!("{}", text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_edit() {
        let cli = Cli::parse_from([
            "playground",
            "--locator",
            "bundled:snippet-script",
            "run",
            "stack.ts",
            "--edit",
            "edited.ts",
        ]);

        assert_eq!(cli.locator.as_deref(), Some("bundled:snippet-script"));
        match cli.command {
            Commands::Run { file, edit } => {
                assert_eq!(file, PathBuf::from("stack.ts"));
                assert_eq!(edit, Some(PathBuf::from("edited.ts")));
            }
            _ => panic!("Expected run command"),
        }
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::parse_from(["playground", "doc", "guide.mdx", "--config", "site.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("site.toml")));
        assert!(matches!(cli.command, Commands::Doc { .. }));
    }

    #[test]
    fn test_mount_reads_decorations() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"a();\nb(); // [!code ignore]\n").unwrap();

        let playground = mount(file.path(), PlaygroundRuntime::default()).unwrap();

        assert_eq!(playground.block().copy_text(), "a();\n");
        assert!(playground.meta().title.is_some());
    }
}
