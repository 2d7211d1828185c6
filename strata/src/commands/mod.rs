mod build;
mod check;

use std::path::PathBuf;

use build::BuildCommand;
use check::CheckCommand;
use clap::{Args, Parser, Subcommand};
use eyre::Result;
use strata_syntax::Project;

/// Extension trait for exiting on project errors with pretty formatting
pub(crate) trait UnwrapOrExit<T> {
    fn unwrap_or_exit(self) -> T;
}

impl<T> UnwrapOrExit<T> for strata_syntax::Result<T> {
    fn unwrap_or_exit(self) -> T {
        match self {
            Ok(v) => v,
            Err(e) => {
                eprintln!("{:?}", miette::Report::new(*e));
                std::process::exit(1);
            }
        }
    }
}

#[derive(Parser)]
#[command(name = "strata")]
#[command(version)]
#[command(about = "Compile resource definitions into Rust code")]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    pub fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Build(cmd) => cmd.run(),
            Commands::Check(cmd) => cmd.run(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compile resources and generate Rust code
    Build(BuildCommand),

    /// Check resources without generating code
    Check(CheckCommand),
}

/// Options shared by every command that loads a project.
#[derive(Args)]
pub(crate) struct ProjectArgs {
    /// Path to strata.toml (defaults to ./strata.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory containing .strata files (overrides [build] source)
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Print diagnostics as JSON
    #[arg(long)]
    pub json: bool,
}

impl ProjectArgs {
    /// Open the project, applying command line overrides.
    pub fn project(&self) -> Project {
        let mut project = match &self.config {
            Some(path) => Project::open(path),
            None => Project::discover("."),
        }
        .unwrap_or_exit();
        if let Some(source) = &self.source {
            project.config_mut().build.source = source.clone();
        }
        project
    }
}
