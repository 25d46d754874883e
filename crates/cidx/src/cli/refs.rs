//! `cidx refs` command implementation.

use std::path::Path;

use cidx::{Cidx, Definition, ReferenceKind};
use colored::Colorize;

use super::display::{location, print_empty_index_hint};

/// Show where a name is defined and every linked use of it.
pub fn run(workspace: &Path, name: &str, kind: Option<&str>) -> Result<(), cidx::Error> {
    let kind = kind
        .map(str::parse::<ReferenceKind>)
        .transpose()
        .map_err(cidx::Error::Config)?;

    let cidx = Cidx::open(workspace)?;

    match cidx.find_symbol_definition(name)? {
        Some(Definition::Symbol(symbol)) => println!(
            "{} {}  {}",
            symbol.kind.as_str().dimmed(),
            symbol.name.cyan().bold(),
            location(&symbol.file_path, symbol.line)
        ),
        Some(Definition::Macro(mac)) => println!(
            "{} {}  {}",
            "macro".dimmed(),
            mac.name.cyan().bold(),
            mac.file_path
                .as_deref()
                .map_or_else(|| "<builtin>".dimmed().to_string(), |p| location(p, mac.line))
        ),
        None => {
            println!("No symbol named \"{}\"", name.cyan());
            return print_empty_index_hint(&cidx);
        }
    }

    let refs = cidx.find_references(name, kind)?;
    if refs.is_empty() {
        println!("No references found");
        return Ok(());
    }

    println!();
    for reference in &refs {
        let context = reference
            .context_function
            .as_deref()
            .map(|f| format!(" in {f}"))
            .unwrap_or_default();
        println!(
            "  {} {:<8}{context}  {}",
            "•".dimmed(),
            reference.kind.as_str(),
            location(&reference.file_path, reference.line)
        );
    }
    println!();
    println!("{}: {} references", "Total".dimmed(), refs.len());
    Ok(())
}
