use clap::Args;
use eyre::Result;

use super::{ProjectArgs, UnwrapOrExit};
use crate::{
    ops,
    reports::{Report, TerminalOutput},
};

#[derive(Args)]
pub struct CheckCommand {
    #[command(flatten)]
    pub project: ProjectArgs,
}

impl CheckCommand {
    /// Run the check command
    pub fn run(&self) -> Result<()> {
        let project = self.project.project();
        let sources = project.load_sources().unwrap_or_exit();

        let report = ops::check(&project, sources)?;

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
