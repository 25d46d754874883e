//! `cidx init` command implementation.

use std::path::Path;

use cidx::{Config, Error};
use colored::Colorize;

/// Write the default configuration into the workspace.
pub fn run(workspace: &Path, force: bool) -> Result<(), Error> {
    let path = Config::path_in(workspace);
    if path.exists() && !force {
        return Err(Error::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    Config::default().save(&path)?;
    println!("{} {}", "Wrote".green().bold(), path.display());
    Ok(())
}
