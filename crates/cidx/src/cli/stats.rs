//! `cidx stats` command implementation.

use std::path::Path;

use cidx::Cidx;
use colored::Colorize;

/// Run the stats command.
pub fn run(workspace: &Path) -> Result<(), cidx::Error> {
    let cidx = Cidx::open(workspace)?;

    let db_path = cidx.db_path();
    let db_size_str = match std::fs::metadata(db_path) {
        Ok(meta) => format_size(meta.len()),
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => "not created".to_string(),
            std::io::ErrorKind::PermissionDenied => {
                tracing::warn!(path = %db_path.display(), "Permission denied reading database");
                "permission denied".to_string()
            }
            _ => {
                tracing::debug!(error = %e, "Failed to get database file size");
                "size unknown".to_string()
            }
        },
    };

    let stats = cidx.stats()?;

    println!("{}", "Cidx Index Statistics".cyan().bold());
    println!();
    println!(
        "  {}: {} ({})",
        "Database".white().bold(),
        db_path.display(),
        db_size_str
    );
    println!();

    println!("  {}:", "Rows".white().bold());
    let width = stats.tables.keys().map(String::len).max().unwrap_or(0);
    for (table, count) in &stats.tables {
        let count = if *count == 0 {
            count.to_string().dimmed()
        } else {
            count.to_string().green()
        };
        println!("    {}  {count}", format!("{table:width$}").dimmed());
    }

    if !stats.meta.is_empty() {
        println!();
        println!("  {}:", "Extraction".white().bold());
        for (key, value) in &stats.meta {
            println!("    {}: {value}", key.dimmed());
        }
    }

    Ok(())
}

/// Format a byte count as a human-readable size.
#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    match bytes {
        b if b >= GB => format!("{:.1} GB", b as f64 / GB as f64),
        b if b >= MB => format!("{:.1} MB", b as f64 / MB as f64),
        b if b >= KB => format!("{:.1} KB", b as f64 / KB as f64),
        b => format!("{b} B"),
    }
}
