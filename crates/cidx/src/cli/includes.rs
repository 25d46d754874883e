//! `cidx includes` and `cidx includers` command implementations.

use std::path::Path;

use cidx::Cidx;
use colored::Colorize;

/// Show the headers a file includes.
pub fn includes(workspace: &Path, file: &Path, recursive: bool) -> Result<(), cidx::Error> {
    let cidx = Cidx::open(workspace)?;
    let file = if file.is_absolute() {
        file.to_path_buf()
    } else {
        workspace.join(file)
    };
    let headers = cidx.get_includes(&file, recursive)?;

    if headers.is_empty() {
        println!("No includes recorded for {}", file.display().to_string().cyan());
        return Ok(());
    }

    println!("Includes of {}:", file.display().to_string().cyan().bold());
    for header in &headers {
        println!("  {} {header}", "•".dimmed());
    }
    Ok(())
}

/// Show the indexed files including a header.
pub fn includers(workspace: &Path, header: &str) -> Result<(), cidx::Error> {
    let cidx = Cidx::open(workspace)?;
    let files = cidx.get_includers(header)?;

    if files.is_empty() {
        println!("No files include \"{}\"", header.cyan());
        return Ok(());
    }

    println!("Files including \"{}\":", header.cyan().bold());
    for file in &files {
        println!("  {} {file}", "•".dimmed());
    }
    Ok(())
}
