use std::path::PathBuf;

use clap::Args;
use eyre::Result;

use super::{ProjectArgs, UnwrapOrExit};
use crate::{
    ops::{self, BuildOptions},
    reports::{Report, TerminalOutput},
};

#[derive(Args)]
pub struct BuildCommand {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Output directory (overrides [build] output)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Preview generated code without writing to disk
    #[arg(long)]
    pub dry_run: bool,
}

impl BuildCommand {
    /// Run the build command
    pub fn run(&self) -> Result<()> {
        let mut project = self.project.project();
        if let Some(output) = &self.output {
            project.config_mut().build.output = output.clone();
        }
        let sources = project.load_sources().unwrap_or_exit();

        let report = ops::build(
            &project,
            sources,
            BuildOptions {
                dry_run: self.dry_run,
            },
        )?;

        if self.project.json {
            println!("{}", report.diagnostics.to_json()?);
        } else {
            report.render(&mut TerminalOutput::new());
        }

        if report.diagnostics.has_errors() {
            std::process::exit(1);
        }
        Ok(())
    }
}
