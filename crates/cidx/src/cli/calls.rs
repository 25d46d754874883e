//! `cidx callers`, `callees`, `path` and `tree` command implementations.

use std::path::Path;

use cidx::Cidx;
use colored::Colorize;

use super::display::{print_call_sites, print_empty_index_hint, print_tree};

/// Show the call sites that name `name` as their callee.
pub fn callers(workspace: &Path, name: &str) -> Result<(), cidx::Error> {
    let cidx = Cidx::open(workspace)?;
    let calls = cidx.get_callers(name)?;

    if calls.is_empty() {
        println!("No callers found for \"{}\"", name.cyan());
        return print_empty_index_hint(&cidx);
    }

    println!("Callers of \"{}\":", name.cyan().bold());
    print_call_sites(&calls, true);
    println!();
    println!("{}: {} call sites", "Total".dimmed(), calls.len());
    Ok(())
}

/// Show the calls made by every definition of `name`.
pub fn callees(workspace: &Path, name: &str) -> Result<(), cidx::Error> {
    let cidx = Cidx::open(workspace)?;
    let calls = cidx.get_callees(name)?;

    if calls.is_empty() {
        println!("No calls found in \"{}\"", name.cyan());
        return print_empty_index_hint(&cidx);
    }

    println!("Calls made by \"{}\":", name.cyan().bold());
    print_call_sites(&calls, false);
    println!();
    println!("{}: {} call sites", "Total".dimmed(), calls.len());
    Ok(())
}

/// Print every call path from `from` to `to`.
pub fn path(workspace: &Path, from: &str, to: &str, max_depth: usize) -> Result<(), cidx::Error> {
    let cidx = Cidx::open(workspace)?;
    let paths = cidx.find_call_path(from, to, max_depth)?;

    if paths.is_empty() {
        println!(
            "No call path from \"{}\" to \"{}\" within {max_depth} hops",
            from.cyan(),
            to.cyan()
        );
        return Ok(());
    }

    for path in &paths {
        let arrow = format!(" {} ", "→".dimmed());
        println!("  {}", path.join(&arrow));
    }
    println!();
    println!("{}: {} paths", "Total".dimmed(), paths.len());
    Ok(())
}

/// Print the call tree rooted at `name`.
pub fn tree(workspace: &Path, name: &str, depth: usize) -> Result<(), cidx::Error> {
    let cidx = Cidx::open(workspace)?;

    match cidx.get_call_tree(name, depth)? {
        Some(tree) => {
            print_tree(&tree);
            Ok(())
        }
        None => {
            println!("No function named \"{}\"", name.cyan());
            print_empty_index_hint(&cidx)
        }
    }
}
