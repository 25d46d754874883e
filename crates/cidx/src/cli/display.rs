//! Common display utilities for CLI commands.

use std::path::Path;

use cidx::{BuildReport, CallSite, CallTree, IndexError};
use colored::Colorize;

const MAX_DISPLAY_ITEMS: usize = 5;

/// `path:line`, dimmed.
pub fn location(path: &Path, line: u32) -> String {
    format!("{}:{line}", path.display()).dimmed().to_string()
}

/// Print the outcome of a build or update.
pub fn print_report(verb: &str, report: &BuildReport) {
    println!();
    println!(
        "{} {} files, {} rows",
        verb.green().bold(),
        report.files_processed,
        report.total_rows()
    );
    if report.files_removed > 0 {
        println!("{}: {} files", "Removed".yellow(), report.files_removed);
    }
    println!(
        "{}: {} resolved, {} unresolved",
        "Calls".dimmed(),
        report.calls_resolved,
        report.calls_unresolved
    );
    println!("{}: {:.2?}", "Duration".dimmed(), report.duration);

    print_errors(&report.errors);
}

/// Print per-file errors, truncated after a few.
fn print_errors(errors: &[IndexError]) {
    if errors.is_empty() {
        return;
    }

    println!();
    println!("{} ({}):", "Errors".red().bold(), errors.len());
    for err in errors.iter().take(MAX_DISPLAY_ITEMS) {
        println!(
            "  {} {}: {} ({})",
            "•".red(),
            err.path.display(),
            err.message,
            err.kind
        );
    }
    if errors.len() > MAX_DISPLAY_ITEMS {
        println!("  ... and {} more", errors.len() - MAX_DISPLAY_ITEMS);
    }
}

/// Print call sites, naming the function on the other end of each.
pub fn print_call_sites(calls: &[CallSite], show_caller: bool) {
    for call in calls {
        let name = if show_caller {
            &call.caller_name
        } else {
            &call.callee_name
        };
        let mut notes = Vec::new();
        if call.is_indirect {
            notes.push("indirect");
        }
        if call.callee_id.is_none() {
            notes.push("unresolved");
        }
        let notes = if notes.is_empty() {
            String::new()
        } else {
            format!(" ({})", notes.join(", ")).yellow().to_string()
        };
        println!(
            "  {} {}{}  {}",
            "•".dimmed(),
            name,
            notes,
            location(&call.file_path, call.line)
        );
    }
}

/// Print a call tree with box-drawing indentation.
pub fn print_tree(tree: &CallTree) {
    println!("{}", tree.name.cyan().bold());
    print_children(&tree.calls, "");
}

fn print_children(calls: &[CallTree], prefix: &str) {
    for (i, node) in calls.iter().enumerate() {
        let last = i + 1 == calls.len();
        let branch = if last { "└── " } else { "├── " };
        let name = if node.truncated {
            format!("{} …", node.name).dimmed().to_string()
        } else {
            node.name.clone()
        };
        println!("{prefix}{branch}{name}");

        let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
        print_children(&node.calls, &child_prefix);
    }
}

/// Hint shown when a query finds nothing in an empty index.
pub fn print_empty_index_hint(cidx: &cidx::Cidx) -> Result<(), cidx::Error> {
    let stats = cidx.stats()?;
    if stats.tables.get("files").copied().unwrap_or(0) == 0 {
        println!(
            "\n{}: The index is empty. Run '{}' to index your workspace.",
            "hint".dimmed(),
            "cidx build".cyan()
        );
    }
    Ok(())
}
