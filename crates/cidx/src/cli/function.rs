//! `cidx function` and `cidx source` command implementations.

use std::path::Path;

use cidx::{Cidx, Documentation};
use colored::Colorize;

use super::display::{location, print_empty_index_hint};

/// Show everything the index knows about a function.
pub fn run(workspace: &Path, name: &str) -> Result<(), cidx::Error> {
    let cidx = Cidx::open(workspace)?;
    let functions = cidx.find_function(name)?;

    if functions.is_empty() {
        println!("No function named \"{}\"", name.cyan());
        return print_empty_index_hint(&cidx);
    }

    for function in &functions {
        let symbol = &function.symbol;
        let what = if symbol.is_definition {
            "definition"
        } else {
            "declaration"
        };
        println!(
            "{} {}  {}",
            function.signature.cyan().bold(),
            format!("[{what}, {} linkage]", symbol.linkage.as_str()).dimmed(),
            location(&symbol.file_path, symbol.line)
        );
    }
    println!();

    let params = cidx.get_function_parameters(name)?;
    if !params.is_empty() {
        println!("{}:", "Parameters".white().bold());
        for param in &params {
            println!("  {} {} {}", "•".dimmed(), param.name, param.type_name.dimmed());
        }
    }

    let locals = cidx.get_function_locals(name)?;
    if !locals.is_empty() {
        println!("{}:", "Locals".white().bold());
        for local in &locals {
            let indent = "  ".repeat(usize::try_from(local.scope_depth).unwrap_or(0));
            println!(
                "  {indent}{} {} {}  {}",
                "•".dimmed(),
                local.name,
                local.type_name.dimmed(),
                format!("line {}", local.line).dimmed()
            );
        }
    }

    if let Some(doc) = cidx.get_function_doc(name)? {
        print_doc(&doc);
    }

    Ok(())
}

fn print_doc(doc: &Documentation) {
    println!("{}:", "Documentation".white().bold());
    if let Some(brief) = &doc.brief {
        println!("  {brief}");
    }
    if let Some(detailed) = &doc.detailed {
        for line in detailed.lines() {
            println!("  {}", line.dimmed());
        }
    }
    for param in &doc.params {
        let direction = param
            .direction
            .map(|d| format!("[{}] ", d.as_str()))
            .unwrap_or_default();
        println!("  @param {direction}{} {}", param.name.cyan(), param.description);
    }
    if let Some(ret) = &doc.return_doc {
        println!("  @return {ret}");
    }
}

/// Print the source text of a function definition.
pub fn source(workspace: &Path, name: &str) -> Result<(), cidx::Error> {
    let cidx = Cidx::open(workspace)?;

    match cidx.extract_function_source(name)? {
        Some(text) => {
            println!("{text}");
            Ok(())
        }
        None => {
            println!("No definition found for \"{}\"", name.cyan());
            print_empty_index_hint(&cidx)
        }
    }
}
