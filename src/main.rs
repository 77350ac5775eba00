//! gh-aw CLI - compile agentic workflows into lock files

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use gh_aw::error::{AwError, FixSuggestion};
use gh_aw::{ActionMode, Compiler, CompilerConfig, TrialConfig};

#[derive(Parser)]
#[command(name = "gh-aw")]
#[command(about = "Compile agentic workflow Markdown into GitHub Actions lock files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile workflow files into <name>.lock.yml next to each source
    Compile {
        /// Workflow Markdown files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Fail on warnings and forbid write permissions
        #[arg(long)]
        strict: bool,

        /// How setup actions are referenced (dev, release, script)
        #[arg(long)]
        action_mode: Option<ActionMode>,

        /// Check out this repository instead of the workflow's own
        #[arg(long)]
        trial_repo: Option<String>,

        /// Token expression for the trial checkout
        #[arg(long, requires = "trial_repo")]
        trial_token: Option<String>,
    },

    /// Validate a workflow file without writing a lock file
    Validate {
        /// Workflow Markdown file
        file: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let config = match CompilerConfig::load() {
        Ok(config) => config.with_env(),
        Err(e) => {
            init_tracing(false);
            report_error(&e);
            std::process::exit(1);
        }
    };
    init_tracing(config.verbose);

    let ok = match cli.command {
        Commands::Compile {
            files,
            strict,
            action_mode,
            trial_repo,
            trial_token,
        } => {
            let mut config = config;
            config.strict |= strict;
            if action_mode.is_some() {
                config.action_mode = action_mode;
            }
            if let Some(repository) = trial_repo {
                config.trial = Some(TrialConfig {
                    repository,
                    token: trial_token,
                });
            }
            compile_files(&config, &files)
        }
        Commands::Validate { file } => validate_file(&config, &file),
    };

    if !ok {
        std::process::exit(1);
    }
}

fn report_error(e: &AwError) {
    eprintln!("{} {}", "Error:".red().bold(), e);
    if let Some(suggestion) = e.fix_suggestion() {
        eprintln!("  {} {}", "Fix:".yellow(), suggestion);
    }
}

fn report_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("{} {}", "⚠".yellow(), warning);
    }
}

fn compile_files(config: &CompilerConfig, files: &[PathBuf]) -> bool {
    let compiler = match Compiler::from_config(config) {
        Ok(c) => c,
        Err(e) => {
            report_error(&e);
            return false;
        }
    };

    let mut failures = 0;
    let mut warning_count = 0;
    for file in files {
        match compiler.compile_file(file) {
            Ok(compiled) => {
                report_warnings(&compiled.warnings);
                warning_count += compiled.warnings.len();
                println!(
                    "{} {} → {}",
                    "✓".green(),
                    file.display(),
                    compiled.lock_path.display()
                );
            }
            Err(e) => {
                eprintln!("{} {}", "✗".red(), file.display());
                report_error(&e);
                failures += 1;
            }
        }
    }

    println!(
        "Compiled {} workflow(s): {} error(s), {} warning(s)",
        files.len(),
        failures,
        warning_count
    );
    failures == 0
}

fn validate_file(config: &CompilerConfig, file: &Path) -> bool {
    let result = Compiler::from_config(config).and_then(|c| c.validate_file(file));
    match result {
        Ok(warnings) => {
            report_warnings(&warnings);
            println!("{} Workflow '{}' is valid", "✓".green(), file.display());
            true
        }
        Err(e) => {
            report_error(&e);
            false
        }
    }
}
