//! Gantry CLI - compile workflow sources to GitHub Actions YAML

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;

use gantry::error::{FixSuggestion, GantryError};
use gantry::{CompileResult, Compiler, CompilerConfig, Diagnostic, Severity};

#[derive(Parser)]
#[command(name = "gantry")]
#[command(about = "Gantry - compile agent workflows to GitHub Actions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a workflow file to GitHub Actions YAML
    Compile {
        /// Entry source file
        file: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        opts: CommonOpts,
    },

    /// Check a workflow file without emitting output
    Check {
        /// Entry source file
        file: PathBuf,

        /// Print diagnostics as JSON lines
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        opts: CommonOpts,
    },
}

#[derive(clap::Args)]
struct CommonOpts {
    /// Config file (default: gantry.toml next to or above the entry file)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Project root; imports may not leave it
    #[arg(long)]
    root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile { file, output, opts } => compile(&file, output.as_deref(), &opts).await,
        Commands::Check { file, json, opts } => check(&file, json, &opts).await,
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            if let Some(suggestion) = e.fix_suggestion() {
                eprintln!("  {} {}", "Fix:".yellow(), suggestion);
            }
            ExitCode::FAILURE
        }
    }
}

fn compiler(file: &Path, opts: &CommonOpts) -> Result<Compiler, GantryError> {
    let mut config = CompilerConfig::load(opts.config.as_deref(), file)?;
    if let Some(root) = &opts.root {
        config.project_root = Some(root.clone());
    }
    Ok(Compiler::new(config))
}

async fn compile(file: &Path, output: Option<&Path>, opts: &CommonOpts) -> Result<bool, GantryError> {
    let result = compiler(file, opts)?.compile_file(file).await?;
    print_diagnostics(result.diagnostics());

    let CompileResult::Success { value, .. } = result else {
        let errors = result.diagnostics().iter().filter(|d| d.is_error()).count();
        return Err(GantryError::CompileFailed { errors });
    };

    match output {
        Some(path) => {
            fs::write(path, &value).map_err(|source| GantryError::Write {
                path: path.display().to_string(),
                source,
            })?;
            eprintln!(
                "{} Compiled '{}' → '{}'",
                "✓".green(),
                file.display(),
                path.display()
            );
        }
        None => print!("{}", value),
    }
    Ok(true)
}

async fn check(file: &Path, json: bool, opts: &CommonOpts) -> Result<bool, GantryError> {
    let result = compiler(file, opts)?.compile_file(file).await?;

    if json {
        for diagnostic in result.diagnostics() {
            match serde_json::to_string(diagnostic) {
                Ok(line) => println!("{}", line),
                Err(e) => eprintln!("{} {}", "Error:".red().bold(), e),
            }
        }
        return Ok(result.is_success());
    }

    print_diagnostics(result.diagnostics());
    if result.is_success() {
        println!("{} '{}' is valid", "✓".green(), file.display());
    } else {
        print_summary(file, result.diagnostics());
    }
    Ok(result.is_success())
}

// ═══════════════════════════════════════════════════════════════
// DIAGNOSTIC RENDERING
// ═══════════════════════════════════════════════════════════════

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    let mut sources: HashMap<String, Option<String>> = HashMap::new();
    for diagnostic in diagnostics {
        let label = format!("{}[{}]", diagnostic.severity, diagnostic.code);
        let label = match diagnostic.severity {
            Severity::Error => label.red().bold(),
            Severity::Warning => label.yellow().bold(),
            Severity::Info => label.cyan().bold(),
        };
        eprintln!("{}: {}", label, diagnostic.message.bold());

        if let Some(file) = &diagnostic.file {
            let source = sources
                .entry(file.clone())
                .or_insert_with(|| fs::read_to_string(file).ok());
            let location = match source {
                Some(text) => {
                    let (line, column) = line_column(text, diagnostic.span.start);
                    format!("{}:{}:{}", file, line, column)
                }
                None => file.clone(),
            };
            eprintln!("  {} {}", "-->".blue(), location);
        }
        if let Some(hint) = &diagnostic.hint {
            eprintln!("  {} {}", "hint:".yellow(), hint.yellow());
        }
    }
}

fn print_summary(file: &Path, diagnostics: &[Diagnostic]) {
    let errors = diagnostics.iter().filter(|d| d.is_error()).count();
    eprintln!(
        "{} could not compile '{}' ({} error(s))",
        "✗".red(),
        file.display(),
        errors
    );
}

/// 1-based line and column of a byte offset
fn line_column(text: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(text.len());
    let before = text.get(..offset).unwrap_or(text);
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    (line, column)
}
