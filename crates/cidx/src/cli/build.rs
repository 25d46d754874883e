//! `cidx build`, `cidx update` and `cidx stale` command implementations.

use std::path::{Path, PathBuf};

use cidx::Cidx;
use colored::Colorize;

use super::display::print_report;

/// Rebuild the whole index.
pub fn run(workspace: &Path) -> Result<(), cidx::Error> {
    println!("{} {}...", "Indexing".cyan().bold(), workspace.display());

    let mut cidx = Cidx::open(workspace)?;
    let report = cidx.build()?;

    print_report("Indexed", &report);
    Ok(())
}

/// Re-index the given files, or every stale file when none are given.
pub fn update(workspace: &Path, files: &[PathBuf]) -> Result<(), cidx::Error> {
    let mut cidx = Cidx::open(workspace)?;

    let report = if files.is_empty() {
        let stale = cidx.stale_files()?;
        if stale.is_empty() {
            println!("{}", "Index is up to date".green());
            return Ok(());
        }
        println!("{} {} stale files...", "Updating".cyan().bold(), stale.len());
        cidx.update_stale()?
    } else {
        // Resolve relative paths against the workspace, not the process cwd
        let files: Vec<PathBuf> = files
            .iter()
            .map(|f| {
                if f.is_absolute() {
                    f.clone()
                } else {
                    workspace.join(f)
                }
            })
            .collect();
        println!("{} {} files...", "Updating".cyan().bold(), files.len());
        cidx.update(&files)?
    };

    print_report("Updated", &report);
    Ok(())
}

/// List the files an update would re-index.
pub fn stale(workspace: &Path) -> Result<(), cidx::Error> {
    let cidx = Cidx::open(workspace)?;
    let stale = cidx.stale_files()?;

    if stale.is_empty() {
        println!("{}", "Index is up to date".green());
        return Ok(());
    }

    println!("{} ({}):", "Stale files".yellow().bold(), stale.len());
    for path in &stale {
        let state = cidx.file_state(&cidx.workspace_root().join(path))?;
        println!(
            "  {} {} {}",
            "•".dimmed(),
            path.display(),
            format!("({})", state_label(state)).dimmed()
        );
    }
    Ok(())
}

fn state_label(state: cidx::FileState) -> &'static str {
    match state {
        cidx::FileState::Unknown => "new",
        cidx::FileState::Indexed => "indexed",
        cidx::FileState::Stale => "modified",
        cidx::FileState::Removed => "removed",
    }
}
