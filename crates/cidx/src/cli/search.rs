//! `cidx search` command implementation.

use std::path::Path;

use cidx::Cidx;
use colored::Colorize;

use super::display::location;

/// Search function or macro names with a SQL `LIKE` pattern.
pub fn run(workspace: &Path, pattern: &str, macros: bool) -> Result<(), cidx::Error> {
    let cidx = Cidx::open(workspace)?;

    let hits: Vec<(String, String)> = if macros {
        cidx.search_macros(pattern)?
            .into_iter()
            .map(|m| {
                let origin = m
                    .file_path
                    .as_deref()
                    .map(|p| location(p, m.line))
                    .unwrap_or_default();
                (m.name, origin)
            })
            .collect()
    } else {
        cidx.search_functions(pattern)?
            .into_iter()
            .map(|f| {
                let origin = location(&f.symbol.file_path, f.symbol.line);
                (f.signature, origin)
            })
            .collect()
    };
    let what = if macros { "macros" } else { "functions" };

    if hits.is_empty() {
        println!("No {what} found matching \"{pattern}\"");
        if !pattern.contains(['%', '_']) {
            println!(
                "\n{}: patterns use SQL wildcards, try '{}'",
                "hint".dimmed(),
                format!("%{pattern}%").cyan()
            );
        }
        return Ok(());
    }

    println!("Found {} {what} matching \"{pattern}\":\n", hits.len());
    for (name, origin) in &hits {
        println!("  {} {name}  {origin}", "•".dimmed());
    }
    Ok(())
}
